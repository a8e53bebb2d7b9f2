//! Headless Sunnyside session.
//!
//! Joins one player standing in the middle of the village and treats every
//! stdin line as something that player says. Everything the village does is
//! printed to stdout as one JSON object per line; logs go to stderr.
//!
//! ```text
//! sunny-sim [sunny.toml] < lines.txt > events.jsonl
//! ```
//!
//! Providers are read from the `[llm]` table; their keys come from the
//! environment variables it names. With no usable provider every reply is
//! a contextual fallback line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sunny_core::PersonalityCatalog;
use sunny_llm::{ContextualFallback, GenerationPipeline};
use sunny_world::{PlayerEvent, PlayerId, Runner, Session, SimConfig, TokioClock, VillageLayout};

/// How long the village keeps running after stdin closes, so pending
/// replies are still shown.
const LINGER: Duration = Duration::from_secs(20);

fn init_logging(config: &SimConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if config.general.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => SimConfig::from_file(&path).with_context(|| format!("loading {}", path.display()))?,
        None => SimConfig::default(),
    };
    init_logging(&config);
    info!("sunny-sim starting");

    let catalog = Arc::new(PersonalityCatalog::sunnyside().context("loading personalities")?);
    let roster = catalog.names();
    let providers = sunny_llm::provider::from_config(&config.llm);
    info!(providers = providers.len(), "providers configured");
    let fallback = ContextualFallback::sunnyside().context("loading fallback phrases")?;
    let pipeline = GenerationPipeline::spawn(config.llm.clone(), providers, fallback, &roster)
        .context("starting generation pipeline")?;
    let layout = VillageLayout::sunnyside().context("loading village layout")?;
    let session = Session::new(config, catalog, layout, pipeline, Arc::new(TokioClock::new()))
        .context("starting session")?;

    let (in_tx, in_rx) = mpsc::channel(64);
    let (out_tx, mut out_rx) = mpsc::channel(256);
    let runner = tokio::spawn(Runner::new(session).run(in_rx, out_tx));

    let printer = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!(error = %err, "unprintable event"),
            }
        }
    });

    let player = PlayerId::from("stdin");
    in_tx
        .send(PlayerEvent::Join {
            player: player.clone(),
            name: std::env::var("SUNNY_PLAYER").unwrap_or_default(),
            position: None,
            viewport: None,
        })
        .await
        .context("session stopped early")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(text) = lines.next_line().await.context("reading stdin")? {
        in_tx
            .send(PlayerEvent::Say {
                player: player.clone(),
                text,
            })
            .await
            .context("session stopped early")?;
    }

    info!(linger_secs = LINGER.as_secs(), "stdin closed, letting the village finish");
    tokio::time::sleep(LINGER).await;
    in_tx.send(PlayerEvent::Leave { player }).await.ok();
    drop(in_tx);

    let session = runner.await.context("session task panicked")?;
    printer.await.context("printer task panicked")?;
    let snapshot = serde_json::to_string(&session.snapshot()).context("serialising snapshot")?;
    info!(snapshot = %snapshot, "session finished");
    Ok(())
}
