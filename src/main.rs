use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use deckmap::backend::BackendClient;
use deckmap::config::ViewerConfig;
use deckmap::controller::Overlay;
use deckmap::types::{Deck, MapError, Pose};
use deckmap::view::{MapView, ViewContext, ViewStatus};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("no frame drawn within {0} ms")]
    Timeout(u64),
    #[error("view produced no frame to capture")]
    NoFrame,
    #[error("failed to write {path}: {source}")]
    Write { path: String, source: image::ImageError },
    #[error("stdin read failed: {0}")]
    Stdin(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "deckmap", about = "Render a deck floor plan with the robot's pose")]
struct Cli {
    #[arg(long, env = "DECKMAP_BACKEND_URL")]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mount a view, wait for the first frame and write it as PNG.
    Snapshot(SnapshotArgs),
    /// Mount a view fed by JSON-lines poses on stdin and log frame stats.
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
struct DeckArgs {
    #[arg(long)]
    deck_id: String,
    #[arg(long)]
    site_id: String,
}

impl DeckArgs {
    fn deck(&self) -> Deck {
        Deck::new(self.deck_id.clone(), self.site_id.clone())
    }
}

#[derive(Args, Debug)]
struct SnapshotArgs {
    #[command(flatten)]
    deck: DeckArgs,
    /// Robot pose as `x,y,yaw` (meters, radians).
    #[arg(long, value_parser = parse_pose)]
    pose: Option<Pose>,
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct WatchArgs {
    #[command(flatten)]
    deck: DeckArgs,
    /// Stop after this many seconds; otherwise runs until stdin closes or Ctrl-C.
    #[arg(long)]
    seconds: Option<u64>,
}

fn parse_pose(raw: &str) -> Result<Pose, String> {
    let parts = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid pose `{raw}`: {e}"))?;
    match parts.as_slice() {
        [x, y, yaw] => Ok(Pose::new(*x, *y, 0.0, *yaw)),
        _ => Err(format!("invalid pose `{raw}`: expected x,y,yaw")),
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, "no .env loaded");
    }

    let cli = Cli::parse();
    let mut config = ViewerConfig::from_env()?;
    if let Some(url) = cli.backend_url {
        config.backend_url = url.trim_end_matches('/').to_string();
    }
    let client = Arc::new(BackendClient::from_config(&config)?);
    info!(backend_url = %config.backend_url, "deckmap starting");

    match cli.command {
        Command::Snapshot(args) => run_snapshot(&config, client, args).await,
        Command::Watch(args) => run_watch(&config, client, args).await,
    }
}

fn context(config: &ViewerConfig, client: Arc<BackendClient>, poses: watch::Receiver<Option<Pose>>) -> ViewContext {
    ViewContext { metadata: client.clone(), images: client, poses, options: config.view }
}

async fn run_snapshot(config: &ViewerConfig, client: Arc<BackendClient>, args: SnapshotArgs) -> Result<(), CliError> {
    let (_poses, rx) = watch::channel(args.pose);
    let view = MapView::mount(context(config, client, rx), args.deck.deck());

    let waited = tokio::time::timeout(Duration::from_millis(args.timeout_ms), view.wait_for(ViewStatus::is_displaying)).await;
    let status = match waited {
        Ok(status) => status?,
        Err(_) => {
            view.unmount().await;
            return Err(CliError::Timeout(args.timeout_ms));
        }
    };
    let pixels = view.capture().await?.ok_or(CliError::NoFrame)?;
    view.unmount().await;

    pixels
        .save(&args.out)
        .map_err(|source| CliError::Write { path: args.out.display().to_string(), source })?;
    println!("{} ({}x{}) {}", args.out.display(), pixels.width(), pixels.height(), describe(&status));
    Ok(())
}

async fn run_watch(config: &ViewerConfig, client: Arc<BackendClient>, args: WatchArgs) -> Result<(), CliError> {
    let (poses, rx) = watch::channel(None);
    let view = MapView::mount(context(config, client, rx), args.deck.deck());

    let feed = feed_poses(BufReader::new(tokio::io::stdin()), &poses);
    tokio::pin!(feed);
    let mut report = tokio::time::interval(Duration::from_secs(1));
    report.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let deadline = args.seconds.map(|s| Instant::now() + Duration::from_secs(s));
    let status = view.status();
    let mut last_frames = 0;

    let outcome = loop {
        tokio::select! {
            fed = &mut feed => {
                break fed.map(|applied| info!(applied, "pose input closed; unmounting"));
            }
            _ = report.tick() => {
                let current = status.borrow().clone();
                info!(
                    state = ?current.state,
                    generation = %current.generation,
                    fps = current.frames_drawn.saturating_sub(last_frames),
                    frames = current.frames_drawn,
                    overlay = %describe(&current),
                    "frame stats"
                );
                last_frames = current.frames_drawn;
            }
            () = until(deadline) => break Ok(()),
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "ctrl-c handler failed");
                }
                break Ok(());
            }
        }
    };

    view.unmount().await;
    outcome.map_err(CliError::from)
}

/// Forward JSON-lines poses from `input` into the pose feed until EOF.
///
/// Blank and malformed lines are skipped. Returns the number of poses applied.
async fn feed_poses<R>(input: R, poses: &watch::Sender<Option<Pose>>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut applied = 0;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Pose>(&line) {
            Ok(pose) => {
                poses.send_replace(Some(pose));
                applied += 1;
            }
            Err(e) => warn!(error = %e, "ignoring malformed pose line"),
        }
    }
    Ok(applied)
}

/// Resolves at `deadline`; never resolves without one.
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

fn describe(status: &ViewStatus) -> String {
    match status.last_frame.map(|frame| frame.overlay) {
        Some(Overlay::Marker(pose)) => format!("marker at ({:.1}, {:.1}) heading {:.2} rad", pose.x, pose.y, pose.rotation),
        Some(Overlay::Skipped(reason)) => format!("no marker ({reason:?})"),
        None => "no frame yet".to_string(),
    }
}
