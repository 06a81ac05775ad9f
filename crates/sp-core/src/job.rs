use std::collections::BTreeMap;
use std::fmt;
use serde::{Deserialize, Serialize};

/// Lifecycle phase reported by the backend for a split job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Processing,
    Completed,
    Failed,
    /// Any phase string this client does not know about
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Downloading | Self::Processing)
    }

    /// No further transitions follow a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Downloading => "Downloading",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Pending => "⏳",
            Self::Downloading => "⬇️",
            Self::Processing => "🎵",
            Self::Completed => "✅",
            Self::Failed => "❌",
            Self::Unknown => "⚡",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The server's full view of one split job.
///
/// A `Job` is never patched field by field from the network: each fetch
/// replaces the whole record. The one local mutation is
/// [`Job::mark_payment_completed`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub download_urls: BTreeMap<String, String>,
    #[serde(default)]
    pub preview_urls: BTreeMap<String, String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub song_title: String,
    /// Seconds
    #[serde(default)]
    pub song_duration: f64,
    #[serde(default)]
    pub payment_required: bool,
    #[serde(default)]
    pub payment_completed: bool,
}

impl Job {
    /// Full stems may only be downloaded once any required payment went through.
    pub fn can_download(&self) -> bool {
        !self.payment_required || self.payment_completed
    }

    pub fn mark_payment_completed(&mut self) {
        self.payment_completed = true;
    }

    /// Song duration as `m:ss`
    pub fn duration_display(&self) -> String {
        let total = self.song_duration.max(0.0).floor() as u64;
        format!("{}:{:02}", total / 60, total % 60)
    }

    /// Server-side file name of the full-quality stem
    pub fn file_name_for(&self, stem: &str) -> Option<&str> {
        self.download_urls.get(stem).and_then(|url| file_name_of(url))
    }

    /// Server-side file name of the stem preview clip
    pub fn preview_file_name_for(&self, stem: &str) -> Option<&str> {
        self.preview_urls.get(stem).and_then(|url| file_name_of(url))
    }

    /// Local file name a downloaded stem is saved under
    pub fn download_file_name(&self, stem: &str) -> String {
        format!("{}_{}.wav", self.song_title, stem)
    }

    pub fn stems(&self) -> impl Iterator<Item = &str> {
        self.preview_urls.keys().map(String::as_str)
    }
}

/// Partial job projection pushed over the status channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobUpdate {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub progress: Option<f32>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub download_urls: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub preview_urls: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub song_title: Option<String>,
    #[serde(default)]
    pub song_duration: Option<f64>,
}

/// Last path segment of a URL, if it has one.
pub fn file_name_of(url: &str) -> Option<&str> {
    url.rsplit('/').next().filter(|name| !name.is_empty())
}
