pub mod error;
mod job;
mod payment;
mod progress;
mod split;
mod stem;

pub use error::{Error, Result};
pub use job::{Job, JobStatus, JobUpdate, file_name_of};
pub use payment::{PaymentAck, PaymentInfo};
pub use progress::progress_for;
pub use split::{SplitRequest, SplitResponse};
pub use stem::Stem;
