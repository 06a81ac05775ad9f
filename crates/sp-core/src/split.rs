use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::job::JobStatus;
use crate::stem::Stem;

/// Body of `POST /split`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitRequest {
    pub youtube_url: String,
    pub stems: Vec<String>,
}

impl SplitRequest {
    pub fn new(url: &str, stems: &[Stem]) -> Result<Self> {
        let youtube_url = url.trim();
        if youtube_url.is_empty() {
            return Err(Error::EmptyUrl);
        }
        if stems.is_empty() {
            return Err(Error::NoStems);
        }

        Ok(Self {
            youtube_url: youtube_url.to_string(),
            stems: stems.iter().map(|s| s.id().to_string()).collect(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitResponse {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub message: String,
}
