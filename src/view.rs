//! Mountable map view: the async host around [`ViewCore`].
//!
//! DESIGN
//! ======
//! One spawned task owns the session (core, surface, ticker) so no locks
//! guard it. Fetches run as their own tasks and report back over a channel,
//! tagged with the generation they were started under; the core drops
//! results whose tag no longer matches. Deck changes stop the ticker before
//! the new load starts. Unmounting (or dropping the [`MapView`]) closes the
//! command channel; the task tears the session down and exits. Fetches that
//! resolve after that find the event channel closed and drop their results,
//! which releases any image handle they acquired.

use std::sync::Arc;

use image::RgbaImage;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ViewOptions;
use crate::controller::{FrameReport, Generation, MetadataStep, ViewCore, ViewState};
use crate::map_image::{LoadedImage, MapImageLoader};
use crate::metadata::{MapMetadata, MapMetadataStore};
use crate::types::{Deck, MapError, Pose};

#[cfg(test)]
#[path = "view_test.rs"]
mod view_test;

const COMMAND_CAPACITY: usize = 16;
const EVENT_CAPACITY: usize = 8;

/// Collaborators a view is mounted with.
#[derive(Clone)]
pub struct ViewContext {
    pub metadata: Arc<dyn MapMetadataStore>,
    pub images: Arc<dyn MapImageLoader>,
    /// Latest robot pose; `None` until the feed reports one.
    pub poses: watch::Receiver<Option<Pose>>,
    pub options: ViewOptions,
}

/// Snapshot of the view published after every transition and frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewStatus {
    pub state: ViewState,
    pub generation: Generation,
    pub deck_id: Option<String>,
    pub has_metadata: bool,
    pub frames_drawn: u64,
    pub last_frame: Option<FrameReport>,
    pub error: Option<MapError>,
}

impl ViewStatus {
    fn from_core(core: &ViewCore) -> Self {
        Self {
            state: core.state(),
            generation: core.generation(),
            deck_id: core.deck().map(|deck| deck.id.clone()),
            has_metadata: core.metadata().is_some(),
            frames_drawn: core.frames_drawn(),
            last_frame: core.last_frame(),
            error: core.last_error().cloned(),
        }
    }

    /// Whether the view has something to show (map or placeholder).
    #[must_use]
    pub fn is_displaying(&self) -> bool {
        self.frames_drawn > 0
    }
}

enum Command {
    SelectDeck(Deck),
    Capture(oneshot::Sender<Option<RgbaImage>>),
}

enum LoadEvent {
    Metadata { generation: Generation, result: Result<MapMetadata, MapError> },
    Image { generation: Generation, result: Result<LoadedImage, MapError> },
}

/// Handle to a mounted map view.
pub struct MapView {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ViewStatus>,
    task: JoinHandle<()>,
}

impl MapView {
    /// Mount a view for `deck`. Loading starts immediately.
    #[must_use]
    pub fn mount(ctx: ViewContext, deck: Deck) -> Self {
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let core = ViewCore::new(&ctx.options);
        let (status_tx, status) = watch::channel(ViewStatus::from_core(&core));
        let task = tokio::spawn(run_view(ctx, core, deck, command_rx, status_tx));
        Self { commands, status, task }
    }

    /// Switch the view to another deck.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::ViewClosed`] if the view task has exited.
    pub async fn select_deck(&self, deck: Deck) -> Result<(), MapError> {
        self.commands
            .send(Command::SelectDeck(deck))
            .await
            .map_err(|_| MapError::ViewClosed)
    }

    /// Copy of the surface pixels, or `None` before the first frame.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::ViewClosed`] if the view task has exited.
    pub async fn capture(&self) -> Result<Option<RgbaImage>, MapError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Capture(reply))
            .await
            .map_err(|_| MapError::ViewClosed)?;
        rx.await.map_err(|_| MapError::ViewClosed)
    }

    #[must_use]
    pub fn status(&self) -> watch::Receiver<ViewStatus> {
        self.status.clone()
    }

    /// Wait until the published status satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::ViewClosed`] if the view exits first.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<ViewStatus, MapError>
    where
        F: FnMut(&ViewStatus) -> bool,
    {
        let mut rx = self.status.clone();
        let status = rx.wait_for(predicate).await.map_err(|_| MapError::ViewClosed)?;
        Ok(status.clone())
    }

    /// Tear the view down and wait for its task to finish.
    pub async fn unmount(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            warn!(error = %e, "map view task ended abnormally");
        }
    }
}

// =============================================================================
// VIEW TASK
// =============================================================================

async fn run_view(
    ctx: ViewContext,
    mut core: ViewCore,
    deck: Deck,
    mut commands: mpsc::Receiver<Command>,
    status: watch::Sender<ViewStatus>,
) {
    let (events_tx, mut events) = mpsc::channel::<LoadEvent>(EVENT_CAPACITY);
    let mut ticker: Option<Interval> = None;

    begin_load(&ctx, &mut core, &mut ticker, deck, &events_tx);
    status.send_replace(ViewStatus::from_core(&core));

    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(Command::SelectDeck(deck)) => {
                        begin_load(&ctx, &mut core, &mut ticker, deck, &events_tx);
                        status.send_replace(ViewStatus::from_core(&core));
                    }
                    Some(Command::Capture(reply)) => {
                        let pixels = (core.frames_drawn() > 0).then(|| core.surface().pixels().clone());
                        if reply.send(pixels).is_err() {
                            debug!("capture requester went away");
                        }
                    }
                    None => break,
                }
            }
            Some(event) = events.recv() => {
                handle_event(&ctx, &mut core, &mut ticker, event, &events_tx);
                status.send_replace(ViewStatus::from_core(&core));
            }
            () = next_tick(&mut ticker) => {
                let pose = *ctx.poses.borrow();
                if core.tick(pose.as_ref()).is_some() {
                    status.send_replace(ViewStatus::from_core(&core));
                }
            }
        }
    }

    stop_loop(&mut ticker, core.generation());
    core.teardown();
    status.send_replace(ViewStatus::from_core(&core));
    info!("map view unmounted");
}

/// Cancel the current session and start fetching metadata for `deck`.
fn begin_load(
    ctx: &ViewContext,
    core: &mut ViewCore,
    ticker: &mut Option<Interval>,
    deck: Deck,
    events: &mpsc::Sender<LoadEvent>,
) {
    stop_loop(ticker, core.generation());
    let deck_id = deck.id.clone();
    let generation = core.select_deck(deck);

    let store = Arc::clone(&ctx.metadata);
    let events = events.clone();
    tokio::spawn(async move {
        let result = store.fetch_metadata(&deck_id).await;
        if events.send(LoadEvent::Metadata { generation, result }).await.is_err() {
            debug!(%generation, "view closed; metadata result dropped");
        }
    });
}

fn handle_event(
    ctx: &ViewContext,
    core: &mut ViewCore,
    ticker: &mut Option<Interval>,
    event: LoadEvent,
    events: &mpsc::Sender<LoadEvent>,
) {
    match event {
        LoadEvent::Metadata { generation, result } => match core.on_metadata(generation, result) {
            MetadataStep::FetchImage { site_id, map_name } => {
                let loader = Arc::clone(&ctx.images);
                let events = events.clone();
                tokio::spawn(async move {
                    let result = loader.fetch_image(&site_id, &map_name).await;
                    if events.send(LoadEvent::Image { generation, result }).await.is_err() {
                        debug!(%generation, "view closed; image result dropped");
                    }
                });
            }
            MetadataStep::Placeholder => start_loop(ctx, core, ticker),
            MetadataStep::Stale => {}
        },
        LoadEvent::Image { generation, result } => {
            if core.on_image(generation, result) {
                start_loop(ctx, core, ticker);
            }
        }
    }
}

fn start_loop(ctx: &ViewContext, core: &mut ViewCore, ticker: &mut Option<Interval>) {
    if !core.start_rendering() || ticker.is_some() {
        return;
    }
    let mut interval = tokio::time::interval(ctx.options.frame_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    *ticker = Some(interval);
    info!(
        generation = %core.generation(),
        state = ?core.state(),
        interval_ms = ctx.options.frame_interval.as_millis(),
        "render loop started"
    );
}

fn stop_loop(ticker: &mut Option<Interval>, generation: Generation) {
    if ticker.take().is_some() {
        info!(%generation, "render loop stopped");
    }
}

/// Resolves on the next frame tick; never resolves while no loop runs.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
