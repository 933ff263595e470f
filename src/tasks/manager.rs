use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Configuration, Settings};
use crate::connectivity::ConnectivityProbe;
use crate::events::{FrameState, NavigationEvent};
use crate::remote::RemoteCatalog;
use crate::tasks::queue::{Advance, PlaybackQueue};
use crate::tasks::reconcile::{ReconcileMode, ReconcileOutcome, reconcile};
use crate::tasks::settings;
use crate::tasks::viewer::Renderer;

/// How long to wait between polls while there is nothing to show.
const IDLE_WAIT: Duration = Duration::from_secs(5);

/// Everything the slideshow loop needs from the outside world.
pub struct FrameContext {
    pub config: Configuration,
    pub catalog: Arc<dyn RemoteCatalog>,
    pub probe: Arc<dyn ConnectivityProbe>,
    /// Id of the remote `settings` folder, when startup managed to find it.
    pub settings_container: Option<String>,
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub syncs: usize,
    pub settings_checks: usize,
    pub photos_shown: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RebuildReason {
    /// Nothing queued yet.
    Initial,
    /// The search query changed, so the pinned block must be recomputed.
    SearchChanged,
}

/// Monotonic poll schedule. A timer that never fired, or was forced, is due.
#[derive(Debug)]
struct PollTimer {
    interval: Duration,
    last: Option<Instant>,
}

impl PollTimer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    fn due(&self, now: Instant) -> bool {
        self.last
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    fn force(&mut self) {
        self.last = None;
    }
}

struct Frame {
    ctx: FrameContext,
    settings: Settings,
    queue: PlaybackQueue,
    state: FrameState,
    connectivity: PollTimer,
    settings_poll: PollTimer,
    sync_poll: PollTimer,
    pending_rebuild: Option<RebuildReason>,
    consecutive_failures: usize,
    rng: StdRng,
    report: FrameReport,
    cancel: CancellationToken,
}

/// Drive the slideshow until an exit key or cancellation.
///
/// Rules:
/// - Start in `AwaitingRefresh`; the first online iteration syncs and reads settings.
/// - While offline, polls are suspended and the existing order keeps playing.
/// - Regaining connectivity forces exactly one sync and one settings check.
/// - A changed search query rebuilds the order; other setting changes apply in place.
/// - Otherwise new photos are spliced in at the cursor.
pub async fn run(
    ctx: FrameContext,
    settings: Settings,
    renderer: &mut dyn Renderer,
    cancel: CancellationToken,
    seed: Option<u64>,
) -> Result<FrameReport> {
    let mut rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
    let queue = PlaybackQueue::new(settings.shuffle, StdRng::seed_from_u64(rng.random()));
    let mut frame = Frame {
        connectivity: PollTimer::new(ctx.config.connectivity.check_interval),
        settings_poll: PollTimer::new(ctx.config.settings_poll_interval),
        sync_poll: PollTimer::new(settings.sync_interval),
        ctx,
        settings,
        queue,
        state: FrameState::AwaitingRefresh,
        pending_rebuild: None,
        consecutive_failures: 0,
        rng,
        report: FrameReport::default(),
        cancel: cancel.clone(),
    };
    info!(
        shuffle = frame.settings.shuffle,
        display_interval = %humantime::format_duration(frame.settings.display_interval),
        sync_interval = %humantime::format_duration(frame.settings.sync_interval),
        "slideshow starting"
    );

    while frame.state != FrameState::Exited {
        if cancel.is_cancelled() {
            frame.state = FrameState::Exited;
            break;
        }
        frame.step(renderer).await;
    }
    info!(
        syncs = frame.report.syncs,
        settings_checks = frame.report.settings_checks,
        photos_shown = frame.report.photos_shown,
        "slideshow stopped"
    );
    Ok(frame.report)
}

impl Frame {
    async fn step(&mut self, renderer: &mut dyn Renderer) {
        if self.connectivity.due(Instant::now()) {
            self.connectivity.mark(Instant::now());
            self.check_connectivity().await;
        }

        if self.state == FrameState::Offline {
            if self.queue.is_empty() {
                self.load_offline_inventory().await;
            }
        } else {
            if self.settings_poll.due(Instant::now()) {
                self.settings_poll.mark(Instant::now());
                self.poll_settings().await;
            }
            if self.sync_poll.due(Instant::now()) {
                self.sync_poll.mark(Instant::now());
                self.sync().await;
            }
            self.state = FrameState::Running;
        }

        self.show_current(renderer).await
    }

    async fn check_connectivity(&mut self) {
        let online = self.ctx.probe.is_online().await;
        match (self.state, online) {
            (FrameState::Offline, true) => {
                info!("connectivity restored; checking for changes");
                self.state = FrameState::AwaitingRefresh;
                self.sync_poll.force();
                self.settings_poll.force();
            }
            (FrameState::Offline, false) | (_, true) => {}
            (_, false) => {
                warn!("connectivity lost; pausing remote polls");
                self.state = FrameState::Offline;
            }
        }
    }

    async fn poll_settings(&mut self) {
        self.report.settings_checks += 1;
        let catalog = self.ctx.catalog.as_ref();
        let resolved = match self.ctx.settings_container.clone() {
            Some(container) => settings::resolve(catalog, &container, &self.settings)
                .await
                .map(|(resolved, _)| resolved),
            None => match settings::bootstrap(
                catalog,
                &self.ctx.config.remote_folder_id,
                &self.settings,
            )
            .await
            {
                Ok((container, resolved)) => {
                    info!(id = %container, "found remote settings folder");
                    self.ctx.settings_container = Some(container);
                    Ok(resolved)
                }
                Err(err) => Err(err),
            },
        };
        match resolved {
            Ok(resolved) => self.apply_settings(resolved),
            Err(err) => warn!(error = %err, "settings check failed; keeping current settings"),
        }
    }

    fn apply_settings(&mut self, next: Settings) {
        let changed = self.settings.changed_keys(&next);
        if changed.is_empty() {
            debug!("remote settings unchanged");
            return;
        }
        info!(?changed, "remote settings changed");
        if self.settings.requires_rebuild(&next) {
            self.pending_rebuild = Some(RebuildReason::SearchChanged);
            self.sync_poll.force();
        }
        if next.shuffle != self.settings.shuffle {
            self.queue.set_shuffle(next.shuffle);
        }
        self.sync_poll.interval = next.sync_interval;
        self.settings = next;
    }

    async fn sync(&mut self) {
        self.report.syncs += 1;
        let outcome = reconcile(
            self.ctx.catalog.as_ref(),
            &self.ctx.config.remote_folder_id,
            &self.ctx.config.photo_library_path,
            &self.settings,
            true,
            &mut self.rng,
        )
        .await;
        match outcome {
            Ok(outcome) => self.apply_outcome(outcome),
            Err(err) => warn!(error = %err, "reconciliation failed"),
        }
    }

    async fn load_offline_inventory(&mut self) {
        let outcome = reconcile(
            self.ctx.catalog.as_ref(),
            &self.ctx.config.remote_folder_id,
            &self.ctx.config.photo_library_path,
            &self.settings,
            false,
            &mut self.rng,
        )
        .await;
        match outcome {
            Ok(outcome) => self.apply_outcome(outcome),
            Err(err) => warn!(error = %err, "failed to read local mirror"),
        }
    }

    fn apply_outcome(&mut self, outcome: ReconcileOutcome) {
        let reason = match self.pending_rebuild {
            Some(reason) if outcome.mode == ReconcileMode::Mirrored => Some(reason),
            _ if self.queue.is_empty() => Some(RebuildReason::Initial),
            _ => None,
        };
        match reason {
            Some(reason) => {
                if reason == RebuildReason::SearchChanged {
                    self.pending_rebuild = None;
                }
                self.queue.rebuild(&outcome.all_items, outcome.pinned);
                info!(
                    ?reason,
                    photos = self.queue.len(),
                    pinned = outcome.pinned,
                    "playback order rebuilt"
                );
            }
            None => {
                self.queue.set_universe(&outcome.all_items);
                let spliced = self.queue.splice(&outcome.new_items);
                if spliced > 0 {
                    info!(spliced, "new photos queued next");
                }
            }
        }
    }

    async fn show_current(&mut self, renderer: &mut dyn Renderer) {
        let Some(relative) = self.queue.current().map(str::to_owned) else {
            let event = self.idle(renderer, "no photos to show yet").await;
            self.apply_event(event);
            return;
        };
        let path: PathBuf = self.ctx.config.photo_library_path.join(&relative);
        if !path.is_file() {
            self.queue.skip_missing();
            return;
        }

        let event = match renderer
            .display(&path, self.settings.display_interval, self.settings.rotation)
            .await
        {
            Ok(event) => {
                self.consecutive_failures = 0;
                self.report.photos_shown += 1;
                event
            }
            Err(err) => {
                warn!(path = %path.display(), error = ?err, "failed to show photo; skipping");
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.queue.len() {
                    self.consecutive_failures = 0;
                    let event = self.idle(renderer, "no displayable photos").await;
                    if event != NavigationEvent::Next {
                        self.apply_event(event);
                        return;
                    }
                }
                NavigationEvent::Next
            }
        };
        self.apply_event(event);
    }

    /// A renderer that cannot even idle is waited out, never propagated.
    async fn idle(&self, renderer: &mut dyn Renderer, message: &str) -> NavigationEvent {
        match renderer.idle(message, IDLE_WAIT).await {
            Ok(event) => event,
            Err(err) => {
                warn!(error = ?err, "renderer failed while idle; retrying later");
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(IDLE_WAIT) => {}
                }
                NavigationEvent::Next
            }
        }
    }

    fn apply_event(&mut self, event: NavigationEvent) {
        match event {
            NavigationEvent::Next => {
                if self.queue.advance() == Advance::Exhausted {
                    debug!(photos = self.queue.len(), "reached end of playback order");
                }
            }
            NavigationEvent::Back => {
                if !self.queue.back() {
                    debug!("no earlier photo to go back to");
                }
            }
            NavigationEvent::Reshuffle => {
                self.queue.reshuffle();
                info!(photos = self.queue.len(), "playback order reshuffled");
            }
            NavigationEvent::New => {
                self.sync_poll.force();
                self.settings_poll.force();
                if self.state != FrameState::Offline {
                    self.state = FrameState::AwaitingRefresh;
                }
                info!("checking for new photos");
            }
            NavigationEvent::Exit => {
                info!("exit requested");
                self.state = FrameState::Exited;
            }
        }
    }
}
