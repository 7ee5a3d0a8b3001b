//! Command-line runner: generate one story and print the result.
//!
//! ```text
//! bcast-worker <story.json> [--out <result.json>]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use bcast_models::{GenerationProgress, Story};
use bcast_providers::{CancelSignal, ProviderConfig};
use bcast_storage::BucketConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bcast_worker::{FnReporter, PipelineConfig, VideoPipeline};

struct Args {
    story: PathBuf,
    out: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut story = None;
    let mut out = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out" | "-o" => {
                out = Some(PathBuf::from(args.next().context("--out needs a path")?));
            }
            _ if story.is_none() => story = Some(PathBuf::from(arg)),
            other => bail!("unexpected argument: {other}"),
        }
    }
    Ok(Args {
        story: story.context("usage: bcast-worker <story.json> [--out <result.json>]")?,
        out,
    })
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("bcast=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        bail!("failed to install rustls crypto provider");
    }

    dotenvy::dotenv().ok();
    init_tracing()?;

    let args = parse_args()?;

    if let Ok(port) = std::env::var("METRICS_PORT") {
        let port: u16 = port.parse().context("invalid METRICS_PORT")?;
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("failed to start metrics exporter")?;
        info!(port, "Metrics exporter listening");
    }

    let raw = tokio::fs::read_to_string(&args.story)
        .await
        .with_context(|| format!("reading {}", args.story.display()))?;
    let story: Story = serde_json::from_str(&raw).context("parsing story")?;

    let config = PipelineConfig::from_env();
    let providers = ProviderConfig::from_env();
    let bucket = BucketConfig::from_env()?;
    info!(story_id = %story.story_id, segments = story.segments.len(), "Starting bcast-worker");

    let pipeline = VideoPipeline::from_config(config, &providers, bucket)
        .await?
        .with_reporter(Arc::new(FnReporter::new(|p: &GenerationProgress| {
            info!(
                progress = p.progress,
                segment_id = p.current_segment.as_deref().unwrap_or(""),
                "{}",
                p.current_step
            );
        })));

    let (cancel_tx, cancel) = CancelSignal::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, cancelling generation");
            let _ = cancel_tx.send(true);
        }
    });

    let video = pipeline.generate_video_with_cancel(&story, cancel).await?;
    let json = serde_json::to_string_pretty(&video)?;
    match args.out {
        Some(path) => {
            tokio::fs::write(&path, &json)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Result written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
