pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod preview;
pub mod session;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, AudioKind, StatusChannel, StemApi};
pub use config::{AppConfig, PollSchedule, TrackMode};
pub use error::{AppError, Result};
pub use preview::{DownloadTarget, PaymentState, PlaybackCommand, PreviewModel};
pub use session::{Phase, ProcessingView, SplitSession};
