use std::path::PathBuf;
use clap::{Parser, Subcommand};
use sp_core::Stem;
use sp_app::{AppConfig, TrackMode};

/// splitter - split a song into stems with the Splitter backend
#[derive(Parser, Debug)]
#[command(name = "splitter")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a song and follow the job until it finishes
    Split {
        /// YouTube URL of the song
        url: String,

        /// Stem to extract
        #[arg(short, long, default_value = "vocals", value_parser = parse_stem)]
        stem: Stem,

        /// How to follow the job: poll, push or both
        #[arg(long, value_parser = parse_mode)]
        mode: Option<TrackMode>,

        /// Status poll interval in milliseconds
        #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
        poll_interval: Option<u64>,

        /// Pay for the full-quality stems once the job is done
        #[arg(long, default_value = "false")]
        pay: bool,

        /// Save the full-quality stems into this directory
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,
    },

    /// Print the current status of a job
    Status {
        job_id: String,
    },
}

fn parse_stem(s: &str) -> Result<Stem, String> {
    s.parse().map_err(|e: sp_core::Error| e.to_string())
}

fn parse_mode(s: &str) -> Result<TrackMode, String> {
    s.parse().map_err(|e: sp_app::AppError| e.to_string())
}

impl Cli {
    /// Apply command line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.api_url {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }

        if let Command::Split { mode, poll_interval, .. } = &self.command {
            if let Some(mode) = mode {
                config.track_mode = *mode;
            }
            if let Some(ms) = poll_interval {
                config.poll.interval = std::time::Duration::from_millis(*ms);
            }
        }
    }

    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
