mod channel;
mod client;
mod endpoints;

pub use channel::{StatusChannel, decode_frame};
pub use client::ApiClient;
pub use endpoints::Endpoints;

use async_trait::async_trait;
use sp_core::{Job, PaymentAck, PaymentInfo, SplitRequest, SplitResponse};
use crate::error::Result;

/// Which flavor of a stem's audio to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioKind {
    /// Short clip, free to play
    Preview,
    /// Full-quality file, gated on payment
    Download,
}

/// Operations the splitter backend offers.
///
/// Every request-style call maps a non-success status to
/// [`AppError::Request`](crate::error::AppError::Request) carrying the
/// server's message.
#[async_trait]
pub trait StemApi: Send + Sync {
    async fn start_split(&self, request: &SplitRequest) -> Result<SplitResponse>;

    async fn get_status(&self, job_id: &str) -> Result<Job>;

    async fn get_payment_info(&self, job_id: &str) -> Result<PaymentInfo>;

    async fn complete_payment(&self, job_id: &str) -> Result<PaymentAck>;

    /// Subscribe to pushed status updates for one job.
    async fn open_status_channel(&self, job_id: &str) -> Result<StatusChannel>;

    async fn fetch_audio(&self, kind: AudioKind, job_id: &str, filename: &str) -> Result<Vec<u8>>;
}
