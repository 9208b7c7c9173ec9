use anyhow::Result;
use clap::Parser;
use frametab::producer::{PatternRenderer, ProducerConfig, ProducerGroup};
use frametab::{Payload, RunConfig, RunMode, Session};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Batch frames from simulated producers, or replay a recording of them
#[derive(Parser, Debug)]
#[command(name = "frametab", version)]
struct Args {
    /// Replay from disk instead of receiving from producers
    #[arg(long)]
    replay: bool,

    /// Record the live stream
    #[arg(long)]
    record: bool,

    /// JSON run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of simulated producers in live mode
    #[arg(long, default_value_t = 2)]
    producers: u32,

    /// Simulated render time per frame
    #[arg(long, default_value_t = 20)]
    render_ms: u64,

    /// Stop after this many steps instead of the planned budget
    #[arg(long)]
    steps: Option<u64>,
}

/// sRGB gamma on the color channels of RGBA images, alpha untouched
fn gamma_correct(mut payload: Payload) -> Payload {
    if payload.shape.last() == Some(&4) {
        for pixel in payload.data.chunks_exact_mut(4) {
            for c in &mut pixel[..3] {
                let linear = *c as f32 / 255.0;
                *c = (255.0 * linear.powf(1.0 / 2.2)) as u8;
            }
        }
    }
    payload
}

fn consume(mut session: Session, steps: Option<u64>) -> Result<Session> {
    loop {
        let step = session.assembler().step();
        let budget = steps.unwrap_or_else(|| session.assembler().planned_steps());
        if step >= budget {
            break;
        }

        match session.next_batch() {
            Ok(Some(batch)) => info!(
                step = batch.step,
                producer_ids = ?batch.producer_ids(),
                frame_ids = ?batch.frame_ids(),
                "received batch"
            ),
            Ok(None) => break,
            Err(e) if e.is_recoverable() => warn!(error = %e, "step skipped"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(session)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if args.replay {
        config.mode = RunMode::Replay;
    }
    if args.record {
        config.record = true;
    }
    config.validate()?;

    let (group, handles) = match config.mode {
        RunMode::Live => {
            let producer_config = ProducerConfig {
                capacity: config.channel_capacity,
                max_frames: None,
            };
            let render_delay = Duration::from_millis(args.render_ms);
            let (group, handles) = ProducerGroup::spawn(args.producers, producer_config, |_| {
                PatternRenderer::new(64, 48).with_delay(render_delay)
            });
            (Some(group), handles)
        }
        RunMode::Replay => (None, Vec::new()),
    };

    let session = Session::open(&config, handles)?.with_transform(gamma_correct);
    let steps = args.steps;
    let session = tokio::task::spawn_blocking(move || consume(session, steps)).await??;

    if let Some(monitor) = session.monitor() {
        println!("{}", monitor.generate_report());
    }
    if let Some(summary) = session.finish()? {
        info!(path = ?summary.path, records = summary.records, "recording written");
    }
    if let Some(group) = group {
        let sent = group.shutdown().await?;
        info!(?sent, "producers stopped");
    }

    Ok(())
}
