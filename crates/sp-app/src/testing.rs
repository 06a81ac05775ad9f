//! In-memory [`StemApi`] used by unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use sp_core::{Job, JobStatus, JobUpdate, PaymentAck, PaymentInfo, SplitRequest, SplitResponse};
use crate::api::{AudioKind, StatusChannel, StemApi};
use crate::error::{AppError, Result};

pub fn job(job_id: &str, status: JobStatus) -> Job {
    let mut job = Job {
        job_id: job_id.to_string(),
        status,
        download_urls: BTreeMap::new(),
        preview_urls: BTreeMap::new(),
        error_message: None,
        song_title: String::new(),
        song_duration: 0.0,
        payment_required: false,
        payment_completed: false,
    };
    if status == JobStatus::Completed {
        for stem in ["vocals", "drums"] {
            job.download_urls
                .insert(stem.into(), format!("/api/download/{job_id}/{stem}.wav"));
            job.preview_urls
                .insert(stem.into(), format!("/api/preview/{job_id}/{stem}_preview.mp3"));
        }
    }
    job
}

pub fn update(job_id: &str, status: JobStatus) -> JobUpdate {
    JobUpdate {
        job_id: job_id.to_string(),
        status,
        message: String::new(),
        progress: None,
        error_message: None,
        download_urls: None,
        preview_urls: None,
        song_title: None,
        song_duration: None,
    }
}

fn request_error(error: &Option<(u16, String)>) -> Result<()> {
    match error {
        Some((status, message)) => Err(AppError::Request {
            status: *status,
            message: message.clone(),
        }),
        None => Ok(()),
    }
}

/// Scripted backend. `get_status` walks through the scripted jobs and keeps
/// returning the last one once the script runs out.
#[derive(Default)]
pub struct FakeApi {
    split_job_id: String,
    statuses: Mutex<VecDeque<Job>>,
    last_status: Mutex<Option<Job>>,
    status_delay: Duration,
    status_error: Mutex<Option<(u16, String)>>,
    split_error: Mutex<Option<(u16, String)>>,
    payment_error: Mutex<Option<(u16, String)>>,
    payment_info_error: Mutex<Option<(u16, String)>>,
    channel: Mutex<Option<StatusChannel>>,

    status_calls: AtomicUsize,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
    split_calls: AtomicUsize,
    payment_info_calls: AtomicUsize,
    payment_calls: AtomicUsize,
    last_split: Mutex<Option<SplitRequest>>,
}

impl FakeApi {
    pub fn with_statuses(statuses: Vec<Job>) -> Self {
        Self {
            split_job_id: "J1".into(),
            statuses: Mutex::new(statuses.into()),
            ..Self::default()
        }
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }

    pub fn with_channel(self, channel: StatusChannel) -> Self {
        *self.channel.lock().unwrap() = Some(channel);
        self
    }

    pub fn fail_status_with(&self, status: u16, message: &str) {
        *self.status_error.lock().unwrap() = Some((status, message.into()));
    }

    pub fn fail_split_with(&self, status: u16, message: &str) {
        *self.split_error.lock().unwrap() = Some((status, message.into()));
    }

    pub fn fail_payment_with(&self, status: u16, message: &str) {
        *self.payment_error.lock().unwrap() = Some((status, message.into()));
    }

    pub fn fail_payment_info_with(&self, status: u16, message: &str) {
        *self.payment_info_error.lock().unwrap() = Some((status, message.into()));
    }

    pub fn clear_payment_error(&self) {
        *self.payment_error.lock().unwrap() = None;
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_status_calls(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    pub fn split_calls(&self) -> usize {
        self.split_calls.load(Ordering::SeqCst)
    }

    pub fn payment_info_calls(&self) -> usize {
        self.payment_info_calls.load(Ordering::SeqCst)
    }

    pub fn payment_calls(&self) -> usize {
        self.payment_calls.load(Ordering::SeqCst)
    }

    pub fn last_split(&self) -> Option<SplitRequest> {
        self.last_split.lock().unwrap().clone()
    }

    fn next_status(&self) -> Result<Job> {
        request_error(&self.status_error.lock().unwrap())?;

        let next = self.statuses.lock().unwrap().pop_front();
        let mut last = self.last_status.lock().unwrap();
        if let Some(job) = next {
            *last = Some(job);
        }
        last.clone().ok_or_else(|| AppError::Request {
            status: 404,
            message: "Job not found".into(),
        })
    }
}

#[async_trait]
impl StemApi for FakeApi {
    async fn start_split(&self, request: &SplitRequest) -> Result<SplitResponse> {
        self.split_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_split.lock().unwrap() = Some(request.clone());
        request_error(&self.split_error.lock().unwrap())?;

        Ok(SplitResponse {
            job_id: self.split_job_id.clone(),
            status: JobStatus::Pending,
            message: "Job created".into(),
        })
    }

    async fn get_status(&self, _job_id: &str) -> Result<Job> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        if !self.status_delay.is_zero() {
            tokio::time::sleep(self.status_delay).await;
        }
        let result = self.next_status();

        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get_payment_info(&self, job_id: &str) -> Result<PaymentInfo> {
        self.payment_info_calls.fetch_add(1, Ordering::SeqCst);
        request_error(&self.payment_info_error.lock().unwrap())?;

        Ok(PaymentInfo {
            job_id: job_id.to_string(),
            amount: 3.0,
            currency: "usd".into(),
            song_title: "Song".into(),
            stems: vec!["vocals".into()],
            payment_completed: false,
        })
    }

    async fn complete_payment(&self, job_id: &str) -> Result<PaymentAck> {
        self.payment_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        request_error(&self.payment_error.lock().unwrap())?;

        Ok(PaymentAck {
            message: "Payment completed".into(),
            job_id: job_id.to_string(),
        })
    }

    async fn open_status_channel(&self, _job_id: &str) -> Result<StatusChannel> {
        self.channel.lock().unwrap().take().ok_or_else(|| AppError::Request {
            status: 503,
            message: "Status channel unavailable".into(),
        })
    }

    async fn fetch_audio(&self, kind: AudioKind, _job_id: &str, filename: &str) -> Result<Vec<u8>> {
        Ok(format!("{kind:?}:{filename}").into_bytes())
    }
}
