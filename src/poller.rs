use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::TrackerError;
use crate::wallet::{WalletFetcher, WalletSnapshot};

/// Results handed from the tracker to whoever renders them.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    Snapshot(WalletSnapshot),
    Failed(TrackerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub generation: u64,
    pub address: String,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    address: Option<String>,
}

/// The address being monitored. Every write bumps a generation counter so
/// that a refresh started for an older value can be recognised as stale.
#[derive(Default)]
pub struct TrackedAddress {
    slot: Mutex<Slot>,
}

impl TrackedAddress {
    pub fn set(&self, address: String) -> u64 {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        slot.address = Some(address);
        slot.generation
    }

    pub fn clear(&self) {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        slot.address = None;
    }

    pub fn current(&self) -> Option<Target> {
        let slot = self.slot.lock();
        slot.address.as_ref().map(|address| Target {
            generation: slot.generation,
            address: address.clone(),
        })
    }

    pub fn address(&self) -> Option<String> {
        self.slot.lock().address.clone()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.slot.lock().generation == generation
    }
}

/// Everything the background task needs, handed over at spawn time.
#[derive(Clone)]
struct PollContext {
    fetcher: Arc<WalletFetcher>,
    target: Arc<TrackedAddress>,
    events: mpsc::UnboundedSender<TrackerEvent>,
    interval: Duration,
}

impl PollContext {
    async fn refresh(&self, target: Target) {
        debug!(address = %target.address, generation = target.generation, "refreshing");
        let event = match self.fetcher.fetch(&target.address).await {
            Ok(snapshot) => TrackerEvent::Snapshot(snapshot),
            Err(err) => {
                warn!(address = %target.address, "refresh failed: {err}");
                TrackerEvent::Failed(err)
            }
        };
        self.deliver(target.generation, event);
    }

    async fn tick(&self) {
        match self.target.current() {
            Some(target) => self.refresh(target).await,
            None => debug!("no tracked address, skipping tick"),
        }
    }

    /// Forward `event` unless the tracked address changed since its fetch began.
    fn deliver(&self, generation: u64, event: TrackerEvent) {
        // Held while sending so a retarget cannot slip in between.
        let slot = self.target.slot.lock();
        if slot.generation != generation {
            debug!(generation, current = slot.generation, "discarding stale result");
            return;
        }
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

async fn poll_loop(ctx: PollContext, mut cancel: watch::Receiver<bool>) {
    info!(interval_secs = ctx.interval.as_secs(), "poll loop started");

    loop {
        // A dropped sender counts as cancellation too.
        let cancelled = tokio::select! {
            () = tokio::time::sleep(ctx.interval) => false,
            _ = cancel.changed() => true,
        };
        if cancelled || *cancel.borrow() {
            break;
        }
        ctx.tick().await;
    }

    info!("poll loop stopped");
}

struct PollTask {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

enum PollState {
    Idle,
    Running(PollTask),
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    Idle,
    Running,
    Stopped,
}

/// Owns the tracked address and the single background poll loop.
pub struct Tracker {
    ctx: PollContext,
    state: Mutex<PollState>,
}

impl Tracker {
    pub fn new(
        fetcher: WalletFetcher,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<TrackerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let tracker = Self {
            ctx: PollContext {
                fetcher: Arc::new(fetcher),
                target: Arc::new(TrackedAddress::default()),
                events,
                interval,
            },
            state: Mutex::new(PollState::Idle),
        };
        (tracker, receiver)
    }

    pub fn tracked_address(&self) -> Option<String> {
        self.ctx.target.address()
    }

    pub fn status(&self) -> LoopStatus {
        match &*self.state.lock() {
            PollState::Idle => LoopStatus::Idle,
            PollState::Running(task) if task.handle.is_finished() => LoopStatus::Stopped,
            PollState::Running(_) => LoopStatus::Running,
            PollState::Stopped => LoopStatus::Stopped,
        }
    }

    /// Track `input`: refresh once right away, then keep refreshing in the
    /// background. A loop that is already running is retargeted, not respawned.
    ///
    /// Malformed input is rejected before anything changes.
    pub async fn start(&self, input: &str) -> Result<(), TrackerError> {
        let address = self.ctx.fetcher.validate(input)?;
        let generation = self.ctx.target.set(address.clone());
        info!(%address, "tracking address");

        self.ctx.refresh(Target { generation, address }).await;
        self.ensure_running(generation);
        Ok(())
    }

    /// Launch the loop on behalf of the start that wrote `generation`. A later
    /// start launches it itself; after stop or clear nothing should.
    fn ensure_running(&self, generation: u64) {
        // Checked under the state lock, which stop also holds while clearing.
        let mut state = self.state.lock();
        if !self.ctx.target.is_current(generation) {
            debug!(generation, "target moved on, not launching the poll loop");
            return;
        }
        if let PollState::Running(task) = &*state {
            if !task.handle.is_finished() {
                debug!("poll loop already running");
                return;
            }
        }

        let (cancel, cancelled) = watch::channel(false);
        let handle = tokio::spawn(poll_loop(self.ctx.clone(), cancelled));
        *state = PollState::Running(PollTask { cancel, handle });
    }

    /// Stop monitoring without shutting the loop down; ticks become no-ops.
    pub fn clear(&self) {
        self.ctx.target.clear();
        info!("tracking cleared");
    }

    /// Cancel the loop and wait for it to exit. A tick in progress is allowed
    /// to finish, but its result is dropped.
    pub async fn stop(&self) {
        let previous = {
            let mut state = self.state.lock();
            self.ctx.target.clear();
            std::mem::replace(&mut *state, PollState::Stopped)
        };

        if let PollState::Running(task) = previous {
            // Fails only if the loop already exited.
            let _ = task.cancel.send(true);
            if let Err(err) = task.handle.await {
                warn!("poll loop ended abnormally: {err}");
            }
        }
        info!("tracker stopped");
    }
}
