pub mod captions;
pub mod config;
pub mod discovery;
pub mod package;
pub mod pipeline;
pub mod report;
pub mod srt;
