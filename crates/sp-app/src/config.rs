use std::env;
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// How a session learns about status changes of a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackMode {
    /// Re-fetch `GET /job/{id}` on an interval
    #[default]
    Poll,
    /// Listen on the `/ws/{id}` push channel
    Push,
    /// Run both independently; the first terminal status wins
    Both,
}

impl TrackMode {
    pub fn polls(&self) -> bool {
        matches!(self, Self::Poll | Self::Both)
    }

    pub fn pushes(&self) -> bool {
        matches!(self, Self::Push | Self::Both)
    }
}

impl FromStr for TrackMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "poll" => Ok(Self::Poll),
            "push" => Ok(Self::Push),
            "both" => Ok(Self::Both),
            other => Err(AppError::Config(format!("unknown track mode '{other}'"))),
        }
    }
}

/// Delay between status polls. A backoff above 1.0 stretches the delay after
/// every non-terminal poll, up to `max_interval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub backoff: f64,
    pub max_interval: Duration,
}

impl PollSchedule {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            backoff: 1.0,
            max_interval: interval,
        }
    }

    /// Delay to wait before the next poll, given the delay used last time.
    pub fn next_delay(&self, previous: Option<Duration>) -> Duration {
        match previous {
            None => self.interval,
            Some(prev) => {
                let stretched = prev.mul_f64(self.backoff.max(1.0));
                stretched.min(self.max_interval.max(self.interval))
            }
        }
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            backoff: 1.0,
            max_interval: Duration::from_millis(30_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Base URL every endpoint path is appended to, without a trailing slash
    pub api_base_url: String,
    pub poll: PollSchedule,
    pub request_timeout: Duration,
    pub track_mode: TrackMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            poll: PollSchedule::default(),
            request_timeout: Duration::from_secs(30),
            track_mode: TrackMode::default(),
        }
    }
}

impl AppConfig {
    /// Load from a `.env` file (if any) and `SPLITTER_*` environment variables.
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(AppError::Config(format!(".env: {e}")));
            }
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let api_base_url = lookup("SPLITTER_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_base_url);

        let interval = parse_var(&lookup, "SPLITTER_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll.interval);
        if interval.is_zero() {
            return Err(AppError::Config(
                "SPLITTER_POLL_INTERVAL_MS must be greater than 0".to_string(),
            ));
        }
        let max_interval = parse_var(&lookup, "SPLITTER_MAX_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll.max_interval);
        let backoff: f64 = parse_var(&lookup, "SPLITTER_POLL_BACKOFF")?
            .unwrap_or(defaults.poll.backoff);
        if !backoff.is_finite() || backoff < 1.0 {
            return Err(AppError::Config(
                "SPLITTER_POLL_BACKOFF must be at least 1.0".to_string(),
            ));
        }

        let request_timeout = parse_var(&lookup, "SPLITTER_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let track_mode = match lookup("SPLITTER_TRACK_MODE") {
            Some(mode) => mode.parse()?,
            None => defaults.track_mode,
        };

        Ok(Self {
            api_base_url,
            poll: PollSchedule {
                interval,
                backoff,
                max_interval,
            },
            request_timeout,
            track_mode,
        })
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{key} must be a number, got '{raw}'"))),
    }
}
