use log::{info, warn};
use sp_core::{Job, PaymentAck, PaymentInfo};
use crate::api::{AudioKind, Endpoints, StemApi};
use crate::error::{AppError, Result};

/// Audio player instruction, in the order it must be carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackCommand {
    Play { stem: String, url: String },
    Stop { stem: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentState {
    #[default]
    Idle,
    /// Waiting on the backend; payment and download actions are disabled
    Pending,
    Completed,
}

/// Where a full-quality stem lives and what to save it as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub stem: String,
    pub url: String,
    /// File name on the server
    pub remote_file: String,
    /// Suggested local file name
    pub file_name: String,
}

/// View-model for a finished job: stem previews, payment and downloads.
#[derive(Debug, Clone)]
pub struct PreviewModel {
    job: Job,
    endpoints: Endpoints,
    playing: Option<String>,
    payment_info: Option<PaymentInfo>,
    payment: PaymentState,
}

impl PreviewModel {
    pub fn new(job: Job, endpoints: Endpoints) -> Self {
        let payment = if job.payment_completed {
            PaymentState::Completed
        } else {
            PaymentState::Idle
        };

        Self {
            job,
            endpoints,
            playing: None,
            payment_info: None,
            payment,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn playing(&self) -> Option<&str> {
        self.playing.as_deref()
    }

    pub fn payment_state(&self) -> PaymentState {
        self.payment
    }

    pub fn payment_info(&self) -> Option<&PaymentInfo> {
        self.payment_info.as_ref()
    }

    pub fn needs_payment(&self) -> bool {
        !self.job.can_download()
    }

    /// Payment and download buttons are usable.
    pub fn actions_enabled(&self) -> bool {
        self.payment != PaymentState::Pending
    }

    pub fn downloads_enabled(&self) -> bool {
        self.actions_enabled() && self.job.can_download()
    }

    pub fn preview_url(&self, stem: &str) -> Option<String> {
        self.job
            .preview_file_name_for(stem)
            .map(|file| self.endpoints.preview(&self.job.job_id, file))
    }

    /// Start previewing `stem`, or stop it if it is the one playing.
    ///
    /// Only one preview plays at a time: starting a new one stops the
    /// previous one first.
    pub fn toggle_preview(&mut self, stem: &str) -> Result<Vec<PlaybackCommand>> {
        if self.playing.as_deref() == Some(stem) {
            self.playing = None;
            return Ok(vec![PlaybackCommand::Stop { stem: stem.to_string() }]);
        }

        let url = self
            .preview_url(stem)
            .ok_or_else(|| AppError::UnknownStem(stem.to_string()))?;

        let mut commands = Vec::with_capacity(2);
        if let Some(previous) = self.playing.take() {
            commands.push(PlaybackCommand::Stop { stem: previous });
        }
        self.playing = Some(stem.to_string());
        commands.push(PlaybackCommand::Play {
            stem: stem.to_string(),
            url,
        });

        Ok(commands)
    }

    /// The player reached the end of `stem`'s clip.
    pub fn preview_ended(&mut self, stem: &str) {
        if self.playing.as_deref() == Some(stem) {
            self.playing = None;
        }
    }

    /// Stop whatever is playing, e.g. when the view goes away.
    pub fn stop_preview(&mut self) -> Option<PlaybackCommand> {
        self.playing
            .take()
            .map(|stem| PlaybackCommand::Stop { stem })
    }

    /// Mark a payment as started. Rejected while one is pending or when the
    /// job does not need one.
    pub fn begin_payment(&mut self) -> Result<()> {
        if self.payment == PaymentState::Pending {
            return Err(AppError::PaymentInProgress);
        }
        if !self.needs_payment() {
            return Err(AppError::PaymentNotRequired);
        }

        self.payment = PaymentState::Pending;
        Ok(())
    }

    /// Settle a payment started with [`begin_payment`](Self::begin_payment).
    pub fn finish_payment(&mut self, result: Result<PaymentAck>) -> Result<PaymentAck> {
        match result {
            Ok(ack) => {
                info!("Payment completed for job {}", self.job.job_id);
                self.job.mark_payment_completed();
                self.payment = PaymentState::Completed;
                Ok(ack)
            }
            Err(e) => {
                warn!("Payment failed for job {}: {}", self.job.job_id, e);
                self.payment = PaymentState::Idle;
                Err(e)
            }
        }
    }

    /// Pay for the job. Payment info is fetched the first time only.
    ///
    /// `on_completed` receives the updated job once the backend confirms, so
    /// the owner of the job record can apply the same change.
    pub async fn pay<A, F>(&mut self, api: &A, on_completed: F) -> Result<PaymentAck>
    where
        A: StemApi + ?Sized,
        F: FnOnce(&Job),
    {
        self.begin_payment()?;
        let result = self.settle(api).await;
        let ack = self.finish_payment(result)?;
        on_completed(&self.job);
        Ok(ack)
    }

    async fn settle<A: StemApi + ?Sized>(&mut self, api: &A) -> Result<PaymentAck> {
        if self.payment_info.is_none() {
            let info = api.get_payment_info(&self.job.job_id).await?;
            info!("Payment of {} requested for {}", info.amount_display(), self.job.job_id);
            self.payment_info = Some(info);
        }
        api.complete_payment(&self.job.job_id).await
    }

    /// Resolve the download of one stem, honoring the payment gate.
    pub fn download(&self, stem: &str) -> Result<DownloadTarget> {
        if self.payment == PaymentState::Pending {
            return Err(AppError::PaymentInProgress);
        }
        if !self.job.can_download() {
            return Err(AppError::PaymentRequired);
        }

        let remote_file = self
            .job
            .file_name_for(stem)
            .ok_or_else(|| AppError::UnknownStem(stem.to_string()))?;

        Ok(DownloadTarget {
            stem: stem.to_string(),
            url: self.endpoints.download(&self.job.job_id, remote_file),
            remote_file: remote_file.to_string(),
            file_name: self.job.download_file_name(stem),
        })
    }

    /// Resolve and fetch one stem.
    pub async fn fetch_download<A: StemApi + ?Sized>(&self, api: &A, stem: &str) -> Result<(DownloadTarget, Vec<u8>)> {
        let target = self.download(stem)?;
        let bytes = api
            .fetch_audio(AudioKind::Download, &self.job.job_id, &target.remote_file)
            .await?;
        Ok((target, bytes))
    }
}
