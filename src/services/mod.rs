pub mod clock;
pub mod error;
pub mod extractor;
pub mod link;
pub mod pipeline;
pub mod poller;
pub mod progress;
pub mod storage;
