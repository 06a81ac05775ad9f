mod cli;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use sp_app::{ApiClient, AppConfig, Phase, PreviewModel, SplitSession, StemApi};
use sp_core::Stem;
use crate::cli::{Cli, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;
    cli.apply(&mut config);

    let api = Arc::new(ApiClient::new(&config)?);
    info!("Using backend at {}", api.endpoints().base());

    match cli.command {
        Command::Split { url, stem, pay, download_dir, .. } => {
            split(api, &config, &url, stem, pay, download_dir.as_deref()).await
        }
        Command::Status { job_id } => {
            let job = api.get_status(&job_id).await?;
            println!("{} {} ({}%)", job.status.icon(), job.status.label(), sp_core::progress_for(job.status));
            if !job.song_title.is_empty() {
                println!("{} [{}]", job.song_title, job.duration_display());
            }
            if let Some(error) = &job.error_message {
                println!("Error: {}", error);
            }
            Ok(())
        }
    }
}

async fn split(
    api: Arc<ApiClient>,
    config: &AppConfig,
    url: &str,
    stem: Stem,
    pay: bool,
    download_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let mut session = SplitSession::new(api.clone(), config);

    let job_id = session.submit(url, &[stem]).await?;
    println!("{} Splitting out {} (job {})", stem.icon(), stem.name(), job_id);

    while let Some(phase) = session.next_event().await {
        if let Phase::Processing(view) = phase {
            println!(
                "{} {:<12} {:>3}%  {}  {} ({}s)",
                view.status.icon(),
                view.status.label(),
                view.progress,
                view.message,
                view.song_title,
                view.elapsed_secs()
            );
        }
    }

    let job = match session.phase() {
        Phase::Preview(job) => job.clone(),
        Phase::Error(message) => anyhow::bail!("{}", message),
        other => anyhow::bail!("Job ended in unexpected phase {}", other.name()),
    };

    let mut model = PreviewModel::new(job, api.endpoints().clone());
    println!();
    println!("{} [{}] - Processing Complete", model.job().song_title, model.job().duration_display());
    for name in model.job().stems() {
        let preview = model.preview_url(name).unwrap_or_default();
        println!("  {:<8} preview: {}", name, preview);
    }

    if model.needs_payment() {
        if pay {
            let ack = session.pay(&mut model).await?;
            println!("Payment complete! {}", ack.message);
        } else {
            println!("Payment required to download full stems (rerun with --pay)");
        }
    }

    if let Some(dir) = download_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;

        let stems: Vec<String> = model.job().download_urls.keys().cloned().collect();
        for name in stems {
            match model.fetch_download(api.as_ref(), &name).await {
                Ok((target, bytes)) => {
                    let path = dir.join(&target.file_name);
                    std::fs::write(&path, &bytes)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Saved {} ({} bytes)", path.display(), bytes.len());
                }
                Err(e) => println!("{}: {}", name, e),
            }
        }
    }

    Ok(())
}
