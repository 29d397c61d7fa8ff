use crate::config::MAX_REELS;
use crate::services::pipeline::ExtractionOutcome;
use axum::response::Html;

const STYLE: &str = r#"
    body { font-family: system-ui, sans-serif; margin: 0; min-height: 100vh;
           background: linear-gradient(to right, #f64f59, #c471ed, #12c2e9); }
    main { max-width: 960px; margin: 40px auto; padding: 20px; border-radius: 10px;
           background-color: rgba(255, 255, 255, 0.85); }
    .columns { display: flex; gap: 48px; flex-wrap: wrap; }
    .columns > section { flex: 1; min-width: 280px; }
    label { display: block; margin: 12px 0 4px; }
    input, select { width: 100%; padding: 8px; box-sizing: border-box; }
    button { margin-top: 16px; color: white; background-color: #4CAF50; border: none;
             border-radius: 4px; padding: 10px 24px; font-size: 16px; cursor: pointer; }
    button:hover { background-color: #45a049; }
    button:disabled { background-color: #999; cursor: wait; }
    progress { width: 100%; }
    .info { background: #e8f0fe; padding: 12px; border-radius: 6px; }
    .success { color: #1e7e34; }
    .error { color: #b00020; }
    .hint { font-size: 0.85em; color: #555; }
"#;

const SCRIPT: &str = r#"
(function () {
  if (!window.EventSource) { return; }
  var form = document.getElementById('extract-form');
  var status = document.getElementById('status');
  var bar = document.getElementById('progress');
  var button = form.querySelector('button');

  function show(html, cls) { status.className = cls || ''; status.innerHTML = html; }
  function text(value) { var d = document.createElement('div'); d.textContent = value; return d.innerHTML; }
  function finish() { button.disabled = false; bar.hidden = true; }

  form.addEventListener('submit', function (e) {
    e.preventDefault();
    var params = new URLSearchParams(new FormData(form));
    var source = new EventSource('/extract/events?' + params.toString());
    button.disabled = true;
    bar.value = 0;
    bar.hidden = false;
    show('Sending request...');

    source.addEventListener('accepted', function (ev) {
      show('Generating file <code>' + text(JSON.parse(ev.data).filename) + '</code> ...', 'info');
    });
    source.addEventListener('progress', function (ev) {
      bar.value = JSON.parse(ev.data).fraction;
    });
    source.addEventListener('done', function (ev) {
      var data = JSON.parse(ev.data);
      source.close();
      finish();
      show('Download link generated! <a href="' + text(data.url) + '">Download file</a>' +
           '<p class="hint">Valid until ' + text(data.expires_at) + '</p>', 'success');
    });
    source.addEventListener('failed', function (ev) {
      source.close();
      finish();
      show(text(JSON.parse(ev.data).error), 'error');
    });
    source.onerror = function () {
      if (source.readyState === EventSource.CLOSED || button.disabled) {
        source.close();
        finish();
        show('Failed to process the request. Check the form and try again later.', 'error');
      }
    };
  });
})();
"#;

pub async fn index() -> Html<String> {
    Html(render_index())
}

pub fn render_index() -> String {
    let options: String = (1..=MAX_REELS)
        .map(|n| format!(r#"<option value="{n}">{n}</option>"#))
        .collect();

    layout(&format!(
        r#"<div class="columns">
  <section>
    <h2>Input</h2>
    <form id="extract-form" method="post" action="/extract">
      <label for="profile">Instagram profile or URL</label>
      <input id="profile" name="profile" type="text" required
             placeholder="@example or https://www.instagram.com/example">
      <label for="number_of_reels">Number of reels to extract</label>
      <select id="number_of_reels" name="number_of_reels">{options}</select>
      <button type="submit">🚀 Process data</button>
    </form>
    <progress id="progress" max="1" value="0" hidden></progress>
    <p class="hint">The bar shows time elapsed against the maximum wait, not the progress of the extraction itself.</p>
    <div id="status"></div>
  </section>
  <section>
    <h2>Instructions</h2>
    <ol class="info">
      <li>Enter the Instagram profile or URL.</li>
      <li>Select how many reels to extract.</li>
      <li>Click "Process data" to get a link to the file.</li>
      <li>The generated link is valid for 24 hours.</li>
    </ol>
  </section>
</div>
<script>{SCRIPT}</script>"#
    ))
}

pub fn render_result(outcome: &ExtractionOutcome) -> String {
    layout(&format!(
        r#"<p class="success">Download link generated!</p>
<p><strong>Click to download:</strong> <a href="{url}">{filename}</a></p>
<p class="hint">Valid until {expires_at}</p>
<p><a href="/">Request another extraction</a></p>"#,
        url = escape_html(&outcome.link.url),
        filename = escape_html(&outcome.key),
        expires_at = outcome.link.expires_at.format("%Y-%m-%d %H:%M UTC"),
    ))
}

pub fn render_error(message: &str) -> String {
    layout(&format!(
        r#"<p class="error">{}</p>
<p><a href="/">Back to the form</a></p>"#,
        escape_html(message)
    ))
}

fn layout(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Reels Scraper</title>
<style>{STYLE}</style>
</head>
<body>
<main>
<h1>📷 Reels Scraper</h1>
{body}
</main>
</body>
</html>"#
    )
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
