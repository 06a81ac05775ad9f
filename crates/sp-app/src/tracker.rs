use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use futures::StreamExt;
use log::{debug, info, warn};
use sp_core::{Job, JobStatus, JobUpdate, progress_for};
use tokio::sync::OwnedMutexGuard;
use tokio::sync::mpsc::UnboundedSender;
use crate::api::{StatusChannel, StemApi};
use crate::config::PollSchedule;
use crate::events::TrackerEvent;

const PROCESSING_FAILED: &str = "Processing failed";

/// Whether the results of a tracking run still matter.
///
/// Checked before and after every request; once killed, nothing fetched
/// afterwards is applied.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn kill(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-job slots allowing one outstanding status request at a time.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    slots: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl InFlight {
    fn slot(&self, job_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(job_id.to_string()).or_default().clone()
    }

    /// Claim the slot if no request for `job_id` is outstanding.
    pub fn try_claim(&self, job_id: &str) -> Option<OwnedMutexGuard<()>> {
        self.slot(job_id).try_lock_owned().ok()
    }

    /// Wait for the slot.
    pub async fn claim(&self, job_id: &str) -> OwnedMutexGuard<()> {
        self.slot(job_id).lock_owned().await
    }

    pub fn forget(&self, job_id: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.remove(job_id);
    }
}

/// How a tracking task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Completed,
    Failed,
    /// A request failed; the failure was reported as a `Failed` event
    Errored,
    /// The run was killed; nothing more was reported
    Abandoned,
    /// The push channel ended before a terminal status arrived
    ChannelClosed,
}

/// Everything a tracking task needs to report on one job.
#[derive(Debug, Clone)]
pub struct Tracking {
    pub generation: u64,
    pub job_id: String,
    pub liveness: Liveness,
    pub in_flight: InFlight,
    pub events: UnboundedSender<TrackerEvent>,
}

impl Tracking {
    fn emit(&self, event: TrackerEvent) {
        if self.events.send(event).is_err() {
            debug!("No one is listening for job {} anymore", self.job_id);
            self.liveness.kill();
        }
    }

    fn emit_status(&self, status: JobStatus, message: String, progress: u8, song_title: Option<String>) {
        self.emit(TrackerEvent::Status {
            generation: self.generation,
            job_id: self.job_id.clone(),
            status,
            message,
            progress,
            song_title,
        });
    }

    fn emit_completed(&self, job: Job) {
        self.emit(TrackerEvent::Completed {
            generation: self.generation,
            job,
        });
    }

    fn emit_failed(&self, error: String) {
        self.emit(TrackerEvent::Failed {
            generation: self.generation,
            job_id: self.job_id.clone(),
            error,
        });
    }
}

fn failure_message(error: Option<&str>) -> String {
    error
        .filter(|e| !e.trim().is_empty())
        .unwrap_or(PROCESSING_FAILED)
        .to_string()
}

/// Fetch the job status on `schedule` until it is terminal or the run is killed.
///
/// A tick is skipped while another status request for the same job is
/// outstanding.
pub async fn poll_job<A: StemApi + ?Sized>(api: &A, schedule: PollSchedule, ctx: &Tracking) -> TrackOutcome {
    let mut delay = None;

    loop {
        if !ctx.liveness.is_alive() {
            return TrackOutcome::Abandoned;
        }

        if let Some(_slot) = ctx.in_flight.try_claim(&ctx.job_id) {
            debug!("Polling status of job {}", ctx.job_id);
            let result = api.get_status(&ctx.job_id).await;

            if !ctx.liveness.is_alive() {
                return TrackOutcome::Abandoned;
            }

            match result {
                Ok(job) => {
                    ctx.emit_status(
                        job.status,
                        format!("Status: {}", job.status),
                        progress_for(job.status),
                        Some(job.song_title.clone()),
                    );

                    match job.status {
                        JobStatus::Completed => {
                            info!("Job {} completed", ctx.job_id);
                            ctx.emit_completed(job);
                            return TrackOutcome::Completed;
                        }
                        JobStatus::Failed => {
                            info!("Job {} failed", ctx.job_id);
                            ctx.emit_failed(failure_message(job.error_message.as_deref()));
                            return TrackOutcome::Failed;
                        }
                        JobStatus::Unknown => {
                            warn!("Job {} reported an unrecognised status, still polling", ctx.job_id);
                        }
                        _ => {}
                    }
                }
                Err(e) => {
                    warn!("Error polling job status for {}: {}", ctx.job_id, e);
                    ctx.emit_failed(e.tracking_message());
                    return TrackOutcome::Errored;
                }
            }
        } else {
            debug!("Status request for job {} already in flight, skipping tick", ctx.job_id);
        }

        let next = schedule.next_delay(delay);
        delay = Some(next);
        tokio::time::sleep(next).await;
    }
}

/// Report pushed updates until a terminal status arrives or the channel ends.
///
/// Updates are partial, so a `completed` push triggers one status fetch for
/// the full job before it is reported.
pub async fn watch_job<A: StemApi + ?Sized>(api: &A, mut channel: StatusChannel, ctx: &Tracking) -> TrackOutcome {
    while let Some(update) = channel.next().await {
        if !ctx.liveness.is_alive() {
            return TrackOutcome::Abandoned;
        }
        if update.job_id != ctx.job_id {
            debug!("Ignoring update for job {} on channel of {}", update.job_id, ctx.job_id);
            continue;
        }

        let (message, progress) = describe(&update);
        ctx.emit_status(update.status, message, progress, update.song_title.clone());

        match update.status {
            JobStatus::Completed => {
                let result = {
                    let _slot = ctx.in_flight.claim(&ctx.job_id).await;
                    if !ctx.liveness.is_alive() {
                        return TrackOutcome::Abandoned;
                    }
                    api.get_status(&ctx.job_id).await
                };

                if !ctx.liveness.is_alive() {
                    return TrackOutcome::Abandoned;
                }

                return match result {
                    Ok(job) => {
                        info!("Job {} completed", ctx.job_id);
                        ctx.emit_completed(job);
                        TrackOutcome::Completed
                    }
                    Err(e) => {
                        warn!("Could not fetch completed job {}: {}", ctx.job_id, e);
                        ctx.emit_failed(e.tracking_message());
                        TrackOutcome::Errored
                    }
                };
            }
            JobStatus::Failed => {
                info!("Job {} failed", ctx.job_id);
                ctx.emit_failed(failure_message(update.error_message.as_deref()));
                return TrackOutcome::Failed;
            }
            _ => {}
        }
    }

    if ctx.liveness.is_alive() {
        info!("Status channel for job {} ended before the job finished", ctx.job_id);
        TrackOutcome::ChannelClosed
    } else {
        TrackOutcome::Abandoned
    }
}

fn describe(update: &JobUpdate) -> (String, u8) {
    let message = if update.message.trim().is_empty() {
        format!("Status: {}", update.status)
    } else {
        update.message.clone()
    };
    let progress = update
        .progress
        .filter(|p| p.is_finite())
        .map(|p| p.clamp(0.0, 100.0).round() as u8)
        .unwrap_or_else(|| progress_for(update.status));

    (message, progress)
}
