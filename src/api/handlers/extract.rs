use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::page;
use crate::services::error::PipelineError;
use crate::services::extractor::OutputFormat;
use crate::services::pipeline::ExtractionOutcome;
use crate::services::progress::{LogProgress, PipelineEvent};
use axum::{
    Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{
        Html, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::mpsc;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ExtractionForm {
    /// Instagram handle or profile URL
    #[validate(length(min = 1, message = "Please provide an Instagram profile or URL"))]
    pub profile: String,

    #[validate(range(min = 1, max = 10, message = "Number of reels must be between 1 and 10"))]
    pub number_of_reels: u32,

    /// "csv" (default) or "json"
    #[serde(default)]
    pub file_format: Option<String>,
}

impl ExtractionForm {
    /// Trim and validate the submitted values
    pub fn normalized(mut self) -> Result<Self, AppError> {
        self.profile = self.profile.trim().to_string();
        self.validate()?;
        Ok(self)
    }

    pub fn format(&self) -> OutputFormat {
        self.file_format
            .as_deref()
            .map(OutputFormat::from_tag)
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExtractionResponse {
    pub filename: String,
    pub key: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl From<ExtractionOutcome> for ExtractionResponse {
    fn from(outcome: ExtractionOutcome) -> Self {
        Self {
            filename: outcome.filename,
            key: outcome.key,
            url: outcome.link.url,
            expires_at: outcome.link.expires_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/extractions",
    request_body = ExtractionForm,
    responses(
        (status = 200, description = "Result file ready", body = ExtractionResponse),
        (status = 400, description = "Invalid profile or reel count"),
        (status = 502, description = "Extraction API rejected the request"),
        (status = 503, description = "Storage client unavailable"),
        (status = 504, description = "Result file did not appear in time")
    ),
    tag = "extractions"
)]
pub async fn create_extraction(
    State(state): State<AppState>,
    Json(payload): Json<ExtractionForm>,
) -> Result<Json<ExtractionResponse>, AppError> {
    let form = payload.normalized()?;
    let outcome = state
        .pipeline
        .run(
            &form.profile,
            form.format(),
            form.number_of_reels,
            &LogProgress::new(),
        )
        .await?;

    Ok(Json(outcome.into()))
}

/// Plain HTML form submission. Blocks until the pipeline finishes.
pub async fn extract_form(
    State(state): State<AppState>,
    Form(form): Form<ExtractionForm>,
) -> Response {
    let form = match form.normalized() {
        Ok(form) => form,
        Err(e) => return (e.status_code(), Html(page::render_error(&e.message()))).into_response(),
    };

    match state
        .pipeline
        .run(
            &form.profile,
            OutputFormat::Csv,
            form.number_of_reels,
            &LogProgress::new(),
        )
        .await
    {
        Ok(outcome) => Html(page::render_result(&outcome)).into_response(),
        Err(e) => {
            let error = AppError::from(e);
            (error.status_code(), Html(page::render_error(&error.message()))).into_response()
        }
    }
}

enum Step {
    Event(PipelineEvent),
    Done(Result<ExtractionOutcome, PipelineError>),
}

/// Runs the pipeline inside the response stream and forwards its events.
/// Closing the connection drops the stream and abandons the poll.
pub async fn extract_events(
    State(state): State<AppState>,
    Query(form): Query<ExtractionForm>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let form = form.normalized()?;
    let pipeline = state.pipeline.clone();

    let stream = async_stream::stream! {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter = move |event: PipelineEvent| {
            let _ = tx.send(event);
        };

        let run = pipeline.run(&form.profile, OutputFormat::Csv, form.number_of_reels, &reporter);
        tokio::pin!(run);

        loop {
            let step = tokio::select! {
                Some(event) = rx.recv() => Step::Event(event),
                result = &mut run => Step::Done(result),
            };

            match step {
                Step::Event(event) => yield Ok::<Event, Infallible>(sse_event(event.name(), &event)),
                Step::Done(result) => {
                    while let Ok(event) = rx.try_recv() {
                        yield Ok::<Event, Infallible>(sse_event(event.name(), &event));
                    }
                    yield Ok::<Event, Infallible>(outcome_event(result));
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn outcome_event(result: Result<ExtractionOutcome, PipelineError>) -> Event {
    match result {
        Ok(outcome) => sse_event("done", &ExtractionResponse::from(outcome)),
        Err(e) => {
            let error = AppError::from(e);
            if error.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
                tracing::error!("Extraction failed: {}", error);
            }
            sse_event(
                "failed",
                &serde_json::json!({ "error": error.message() }),
            )
        }
    }
}

fn sse_event<T: Serialize>(name: &str, payload: &T) -> Event {
    match Event::default().event(name).json_data(payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Failed to serialize {} event: {}", name, e);
            Event::default().event(name)
        }
    }
}
