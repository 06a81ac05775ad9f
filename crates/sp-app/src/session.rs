use std::sync::Arc;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use sp_core::{Job, JobStatus, PaymentAck, SplitRequest, Stem, progress_for};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use crate::api::StemApi;
use crate::config::{AppConfig, PollSchedule, TrackMode};
use crate::error::{AppError, Result};
use crate::events::TrackerEvent;
use crate::preview::PreviewModel;
use crate::tracker::{InFlight, Liveness, TrackOutcome, Tracking, poll_job, watch_job};

/// What the user sees while a job is running.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingView {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    pub progress: u8,
    pub song_title: String,
    pub started_at: DateTime<Utc>,
}

impl ProcessingView {
    fn new(job_id: String, status: JobStatus, message: String) -> Self {
        Self {
            job_id,
            status,
            message,
            progress: progress_for(status),
            song_title: String::new(),
            started_at: Utc::now(),
        }
    }

    pub fn elapsed_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Phase {
    #[default]
    Input,
    Processing(ProcessingView),
    Preview(Job),
    Error(String),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Processing(_) => "processing",
            Self::Preview(_) => "preview",
            Self::Error(_) => "error",
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Processing(_))
    }

    /// Fold a tracker event into the phase.
    ///
    /// Only a `Processing` phase for the event's job reacts; everything else
    /// is returned unchanged.
    pub fn apply(self, event: TrackerEvent) -> Phase {
        let Phase::Processing(mut view) = self else {
            return self;
        };
        if event.job_id() != view.job_id {
            return Phase::Processing(view);
        }

        match event {
            TrackerEvent::Status { status, message, progress, song_title, .. } => {
                view.status = status;
                view.message = message;
                view.progress = progress;
                if let Some(title) = song_title.filter(|t| !t.is_empty()) {
                    view.song_title = title;
                }
                Phase::Processing(view)
            }
            TrackerEvent::Completed { job, .. } => Phase::Preview(job),
            TrackerEvent::Failed { error, .. } => Phase::Error(error),
        }
    }
}

/// One user's split flow: submit, track, then preview or error.
///
/// Tracking runs in spawned tasks that report through a channel; the session
/// applies their events in [`SplitSession::next_event`]. Each submission
/// bumps the generation so events from an abandoned run are ignored.
pub struct SplitSession<A: StemApi + 'static> {
    api: Arc<A>,
    schedule: PollSchedule,
    mode: TrackMode,

    phase: Phase,
    generation: u64,
    tracked: Option<(String, Liveness)>,
    tasks: Vec<JoinHandle<TrackOutcome>>,
    in_flight: InFlight,

    events_tx: UnboundedSender<TrackerEvent>,
    events_rx: UnboundedReceiver<TrackerEvent>,
}

impl<A: StemApi + 'static> SplitSession<A> {
    pub fn new(api: Arc<A>, config: &AppConfig) -> Self {
        let (events_tx, events_rx) = unbounded_channel();

        Self {
            api,
            schedule: config.poll,
            mode: config.track_mode,
            phase: Phase::Input,
            generation: 0,
            tracked: None,
            tasks: Vec::new(),
            in_flight: InFlight::default(),
            events_tx,
            events_rx,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a split job and begin tracking it. Returns the job id.
    ///
    /// Invalid input leaves the session in `Input`; a rejected request moves
    /// it to `Error` with the server's message.
    pub async fn submit(&mut self, url: &str, stems: &[Stem]) -> Result<String> {
        if !matches!(self.phase, Phase::Input) {
            return Err(AppError::InvalidPhase(self.phase.name()));
        }
        let request = SplitRequest::new(url, stems)?;

        let response = match self.api.start_split(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to start split: {}", e);
                self.phase = Phase::Error(e.to_string());
                return Err(e);
            }
        };

        info!("Split job {} created ({})", response.job_id, response.status);
        self.generation += 1;
        let message = if response.message.is_empty() {
            "Initializing...".to_string()
        } else {
            response.message
        };
        self.phase = Phase::Processing(ProcessingView::new(
            response.job_id.clone(),
            response.status,
            message,
        ));
        self.start_tracking(&response.job_id);

        Ok(response.job_id)
    }

    fn start_tracking(&mut self, job_id: &str) {
        self.stop_tracking();

        let liveness = Liveness::new();
        let ctx = Tracking {
            generation: self.generation,
            job_id: job_id.to_string(),
            liveness: liveness.clone(),
            in_flight: self.in_flight.clone(),
            events: self.events_tx.clone(),
        };

        if self.mode.polls() {
            let api = self.api.clone();
            let ctx = ctx.clone();
            let schedule = self.schedule;
            self.tasks.push(tokio::spawn(async move {
                poll_job(api.as_ref(), schedule, &ctx).await
            }));
        }

        if self.mode.pushes() {
            let api = self.api.clone();
            let ctx = ctx.clone();
            let push_only = !self.mode.polls();
            self.tasks.push(tokio::spawn(async move {
                let channel = match api.open_status_channel(&ctx.job_id).await {
                    Ok(channel) => channel,
                    Err(e) => {
                        warn!("Could not open status channel for {}: {}", ctx.job_id, e);
                        if push_only && ctx.liveness.is_alive() {
                            let _ = ctx.events.send(TrackerEvent::Failed {
                                generation: ctx.generation,
                                job_id: ctx.job_id.clone(),
                                error: e.tracking_message(),
                            });
                        }
                        return TrackOutcome::Errored;
                    }
                };

                let outcome = watch_job(api.as_ref(), channel, &ctx).await;
                if outcome == TrackOutcome::ChannelClosed && push_only {
                    let _ = ctx.events.send(TrackerEvent::Failed {
                        generation: ctx.generation,
                        job_id: ctx.job_id.clone(),
                        error: "Status channel closed before the job finished".to_string(),
                    });
                }
                outcome
            }));
        }

        self.tracked = Some((job_id.to_string(), liveness));
    }

    /// Kill the current tracking run: pending timers are cancelled and open
    /// channels closed. The remote job keeps running.
    fn stop_tracking(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some((job_id, liveness)) = self.tracked.take() {
            liveness.kill();
            self.in_flight.forget(&job_id);
        }
    }

    /// Wait for the next tracker event of the current run and apply it.
    ///
    /// Returns `None` once the session is not processing anything.
    pub async fn next_event(&mut self) -> Option<&Phase> {
        loop {
            if !self.phase.is_processing() {
                return None;
            }

            let event = self.events_rx.recv().await?;
            if event.generation() != self.generation {
                debug!("Dropping stale event for job {}", event.job_id());
                continue;
            }

            let terminal = event.is_terminal();
            let phase = std::mem::take(&mut self.phase);
            self.phase = phase.apply(event);

            if terminal || !self.phase.is_processing() {
                info!("Session moved to {}", self.phase.name());
                self.stop_tracking();
            }
            return Some(&self.phase);
        }
    }

    /// Apply events until the job reaches `Preview` or `Error`.
    pub async fn run_until_settled(&mut self) -> &Phase {
        while self.next_event().await.is_some() {}
        &self.phase
    }

    /// Pay for the previewed job through `model`, recording the completion
    /// on the session's job as well.
    pub async fn pay(&mut self, model: &mut PreviewModel) -> Result<PaymentAck> {
        let api = Arc::clone(&self.api);
        model
            .pay(api.as_ref(), |job| self.payment_completed(&job.job_id))
            .await
    }

    fn payment_completed(&mut self, job_id: &str) {
        match &mut self.phase {
            Phase::Preview(job) if job.job_id == job_id => job.mark_payment_completed(),
            _ => debug!("Ignoring payment for {} outside its preview", job_id),
        }
    }

    /// Back to `Input`, discarding the current job.
    pub fn reset(&mut self) {
        self.stop_tracking();
        self.generation += 1;
        while self.events_rx.try_recv().is_ok() {}
        self.phase = Phase::Input;
    }
}

impl<A: StemApi + 'static> Drop for SplitSession<A> {
    fn drop(&mut self) {
        self.stop_tracking();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use crate::api::{Endpoints, StatusChannel};
    use crate::testing::{FakeApi, job, update};
    use super::*;

    fn config(mode: TrackMode) -> AppConfig {
        AppConfig {
            poll: PollSchedule::fixed(Duration::from_secs(3)),
            track_mode: mode,
            ..AppConfig::default()
        }
    }

    fn processing(job_id: &str) -> Phase {
        Phase::Processing(ProcessingView::new(
            job_id.into(),
            JobStatus::Pending,
            "Initializing...".into(),
        ))
    }

    fn status_event(generation: u64, job_id: &str, status: JobStatus) -> TrackerEvent {
        TrackerEvent::Status {
            generation,
            job_id: job_id.into(),
            status,
            message: format!("Status: {status}"),
            progress: progress_for(status),
            song_title: Some("Song".into()),
        }
    }

    #[test]
    fn test_reducer_updates_processing_view() {
        let phase = processing("J1").apply(status_event(1, "J1", JobStatus::Downloading));
        let Phase::Processing(view) = phase else {
            panic!("expected processing, got {phase:?}");
        };
        assert_eq!(view.status, JobStatus::Downloading);
        assert_eq!(view.progress, 30);
        assert_eq!(view.song_title, "Song");
    }

    #[test]
    fn test_reducer_ignores_other_jobs_and_settled_phases() {
        let phase = processing("J1");
        assert_eq!(
            phase.clone().apply(status_event(1, "J2", JobStatus::Processing)),
            phase
        );

        let settled = Phase::Error("boom".into());
        assert_eq!(
            settled.clone().apply(status_event(1, "J1", JobStatus::Processing)),
            settled
        );
    }

    #[test]
    fn test_reducer_terminal_events() {
        let done = job("J1", JobStatus::Completed);
        assert_eq!(
            processing("J1").apply(TrackerEvent::Completed { generation: 1, job: done.clone() }),
            Phase::Preview(done)
        );
        assert_eq!(
            processing("J1").apply(TrackerEvent::Failed {
                generation: 1,
                job_id: "J1".into(),
                error: "Processing failed".into(),
            }),
            Phase::Error("Processing failed".into())
        );
    }

    #[tokio::test]
    async fn test_blank_url_stays_in_input() {
        let api = Arc::new(FakeApi::with_statuses(vec![]));
        let mut session = SplitSession::new(api.clone(), &config(TrackMode::Poll));

        let err = session.submit("   ", &[Stem::Vocals]).await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter a YouTube URL");
        assert_eq!(session.phase(), &Phase::Input);
        assert_eq!(api.split_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_split_moves_to_error() {
        let api = Arc::new(FakeApi::with_statuses(vec![]));
        api.fail_split_with(400, "Invalid YouTube URL");
        let mut session = SplitSession::new(api, &config(TrackMode::Poll));

        assert!(session.submit("https://example.com", &[Stem::Vocals]).await.is_err());
        assert_eq!(session.phase(), &Phase::Error("Invalid YouTube URL".into()));

        session.reset();
        assert_eq!(session.phase(), &Phase::Input);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_flow_reaches_preview() {
        let mut done = job("J1", JobStatus::Completed);
        done.song_title = "Song".into();
        let api = Arc::new(FakeApi::with_statuses(vec![
            job("J1", JobStatus::Pending),
            job("J1", JobStatus::Downloading),
            job("J1", JobStatus::Processing),
            done.clone(),
        ]));
        let mut session = SplitSession::new(api.clone(), &config(TrackMode::Poll));

        let job_id = session.submit("https://youtu.be/abc", &[Stem::Vocals]).await.unwrap();
        assert_eq!(job_id, "J1");
        assert_eq!(
            api.last_split().unwrap().stems,
            vec!["vocals".to_string()]
        );

        let mut seen = Vec::new();
        while let Some(phase) = session.next_event().await {
            if let Phase::Processing(view) = phase {
                seen.push(view.progress);
            }
        }

        assert_eq!(seen, vec![5, 30, 70, 100]);
        assert_eq!(session.phase(), &Phase::Preview(done));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_outside_input_is_rejected() {
        let api = Arc::new(FakeApi::with_statuses(vec![job("J1", JobStatus::Pending)]));
        let mut session = SplitSession::new(api.clone(), &config(TrackMode::Poll));

        session.submit("https://youtu.be/abc", &[Stem::Bass]).await.unwrap();
        let err = session.submit("https://youtu.be/abc", &[Stem::Bass]).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidPhase("processing")));
        assert_eq!(api.split_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stops_polling_and_drops_stale_events() {
        let api = Arc::new(FakeApi::with_statuses(vec![job("J1", JobStatus::Processing)]));
        let mut session = SplitSession::new(api.clone(), &config(TrackMode::Poll));

        session.submit("https://youtu.be/abc", &[Stem::Drums]).await.unwrap();
        session.next_event().await;
        let calls = api.status_calls();
        let generation = session.generation();

        session.reset();
        assert_eq!(session.phase(), &Phase::Input);
        assert_eq!(session.generation(), generation + 1);
        assert!(session.next_event().await.is_none());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.status_calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let api = Arc::new(FakeApi::with_statuses(vec![job("J1", JobStatus::Processing)]));
        {
            let mut session = SplitSession::new(api.clone(), &config(TrackMode::Poll));
            session.submit("https://youtu.be/abc", &[Stem::Drums]).await.unwrap();
            session.next_event().await;
        }
        let calls = api.status_calls();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.status_calls(), calls);
    }

    #[tokio::test]
    async fn test_push_flow_reaches_preview() {
        let (tx, channel) = StatusChannel::detached();
        let done = job("J1", JobStatus::Completed);
        let api = Arc::new(FakeApi::with_statuses(vec![done.clone()]).with_channel(channel));
        let mut session = SplitSession::new(api.clone(), &config(TrackMode::Push));

        session.submit("https://youtu.be/abc", &[Stem::Vocals]).await.unwrap();
        tx.send(update("J1", JobStatus::Downloading)).unwrap();
        tx.send(update("J1", JobStatus::Completed)).unwrap();

        assert_eq!(session.run_until_settled().await, &Phase::Preview(done));
        assert_eq!(api.status_calls(), 1);
    }

    #[tokio::test]
    async fn test_push_only_without_channel_moves_to_error() {
        let api = Arc::new(FakeApi::with_statuses(vec![]));
        let mut session = SplitSession::new(api, &config(TrackMode::Push));

        session.submit("https://youtu.be/abc", &[Stem::Vocals]).await.unwrap();
        assert_eq!(
            session.run_until_settled().await,
            &Phase::Error("Status channel unavailable".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_modes_keep_one_request_in_flight() {
        let (tx, channel) = StatusChannel::detached();
        let mut statuses: Vec<Job> = (0..4).map(|_| job("J1", JobStatus::Processing)).collect();
        statuses.push(job("J1", JobStatus::Completed));
        let api = Arc::new(
            FakeApi::with_statuses(statuses)
                .with_status_delay(Duration::from_secs(2))
                .with_channel(channel),
        );
        let mut session = SplitSession::new(api.clone(), &config(TrackMode::Both));

        session.submit("https://youtu.be/abc", &[Stem::Vocals]).await.unwrap();
        tx.send(update("J1", JobStatus::Completed)).unwrap();

        let phase = session.run_until_settled().await;
        assert!(matches!(phase, Phase::Preview(_)));
        assert_eq!(api.max_concurrent_status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_payment_completed_only_applies_in_preview() {
        let mut done = job("J1", JobStatus::Completed);
        done.payment_required = true;
        let api = Arc::new(FakeApi::with_statuses(vec![done.clone()]));
        let mut session = SplitSession::new(api, &config(TrackMode::Poll));

        session.payment_completed("J1");
        assert_eq!(session.phase(), &Phase::Input);

        session.submit("https://youtu.be/abc", &[Stem::Vocals]).await.unwrap();
        session.run_until_settled().await;
        session.payment_completed("OTHER");
        assert_eq!(session.phase(), &Phase::Preview(done.clone()));

        session.payment_completed("J1");
        let mut expected = done;
        expected.payment_completed = true;
        assert_eq!(session.phase(), &Phase::Preview(expected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pay_keeps_session_and_preview_jobs_equal() {
        let mut done = job("J1", JobStatus::Completed);
        done.payment_required = true;
        let api = Arc::new(FakeApi::with_statuses(vec![done]));
        let mut session = SplitSession::new(api.clone(), &config(TrackMode::Poll));

        session.submit("https://youtu.be/abc", &[Stem::Vocals]).await.unwrap();
        let Phase::Preview(job) = session.run_until_settled().await.clone() else {
            panic!("expected preview");
        };
        let mut model = PreviewModel::new(job, Endpoints::new("http://localhost:8000/api"));

        session.pay(&mut model).await.unwrap();

        assert!(model.job().payment_completed);
        assert_eq!(session.phase(), &Phase::Preview(model.job().clone()));
        assert_eq!(api.payment_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pay_leaves_session_job_unpaid() {
        let mut done = job("J1", JobStatus::Completed);
        done.payment_required = true;
        let api = Arc::new(FakeApi::with_statuses(vec![done.clone()]));
        api.fail_payment_with(402, "Card declined");
        let mut session = SplitSession::new(api, &config(TrackMode::Poll));

        session.submit("https://youtu.be/abc", &[Stem::Vocals]).await.unwrap();
        session.run_until_settled().await;
        let mut model = PreviewModel::new(done.clone(), Endpoints::new("http://localhost:8000/api"));

        assert!(session.pay(&mut model).await.is_err());
        assert_eq!(session.phase(), &Phase::Preview(done));
    }
}
