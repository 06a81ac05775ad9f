use crate::api::AudioKind;

/// Builds backend URLs from the configured base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn split(&self) -> String {
        format!("{}/split", self.base)
    }

    pub fn job(&self, job_id: &str) -> String {
        format!("{}/job/{}", self.base, job_id)
    }

    pub fn payment(&self, job_id: &str) -> String {
        format!("{}/payment/{}", self.base, job_id)
    }

    pub fn complete_payment(&self, job_id: &str) -> String {
        format!("{}/payment/{}/complete", self.base, job_id)
    }

    pub fn preview(&self, job_id: &str, filename: &str) -> String {
        format!("{}/preview/{}/{}", self.base, job_id, filename)
    }

    pub fn download(&self, job_id: &str, filename: &str) -> String {
        format!("{}/download/{}/{}", self.base, job_id, filename)
    }

    pub fn audio(&self, kind: AudioKind, job_id: &str, filename: &str) -> String {
        match kind {
            AudioKind::Preview => self.preview(job_id, filename),
            AudioKind::Download => self.download(job_id, filename),
        }
    }

    /// Push channel URL; `http` becomes `ws` and `https` becomes `wss`.
    pub fn status_channel(&self, job_id: &str) -> String {
        let base = if let Some(rest) = self.base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base.clone()
        };
        format!("{}/ws/{}", base, job_id)
    }
}
