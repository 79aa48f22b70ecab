//! Simulated staged flash runner.
//!
//! The runner walks a fixed ordered stage table, sleeping for each
//! stage's nominal duration and emitting progress events over a channel.
//! No bytes are fetched or written anywhere; this is a deliberate
//! simulation boundary. A real flasher would keep the identical state
//! machine shape and perform actual I/O per stage, which is why stage
//! tables are injectable via [`start`].

use std::fmt;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::models::CancelToken;

/// One discrete step of the flashing sequence. The stage's position in
/// its table is its ordinal; progress percentages are non-decreasing
/// across a table.
#[derive(Debug, Clone)]
pub struct FlashStage {
    pub progress_percent: u8,
    pub label: &'static str,
    pub nominal_duration: Duration,
}

/// The stage table used for the simulated flash.
pub const FLASH_STAGES: &[FlashStage] = &[
    FlashStage {
        progress_percent: 10,
        label: "Connecting to device...",
        nominal_duration: Duration::from_millis(500),
    },
    FlashStage {
        progress_percent: 20,
        label: "Erasing flash...",
        nominal_duration: Duration::from_millis(1000),
    },
    FlashStage {
        progress_percent: 40,
        label: "Writing firmware...",
        nominal_duration: Duration::from_millis(2000),
    },
    FlashStage {
        progress_percent: 70,
        label: "Writing firmware...",
        nominal_duration: Duration::from_millis(2000),
    },
    FlashStage {
        progress_percent: 90,
        label: "Verifying...",
        nominal_duration: Duration::from_millis(1000),
    },
    FlashStage {
        progress_percent: 100,
        label: "Complete!",
        nominal_duration: Duration::from_millis(500),
    },
];

/// Runner lifecycle. `Running` holds the ordinal of the stage currently
/// executing; `Failed` exists for real flasher implementations that hit
/// I/O errors mid-sequence, the simulation never enters it.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerState {
    Idle,
    Running(usize),
    Completed,
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlashEvent {
    Progress {
        /// Ordinal of the stage this update belongs to.
        stage: usize,
        percent: u8,
        label: &'static str,
        /// Synthetic transfer speed, cosmetic only.
        speed_kb_s: u32,
        seconds_remaining: u32,
    },
    Completed,
    Cancelled,
    Failed(String),
}

impl FlashEvent {
    /// True for events that end the sequence.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FlashEvent::Progress { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// `start` was called while the engine's enablement rules said
    /// flashing is not allowed.
    PreconditionFailed,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashError::PreconditionFailed => {
                write!(f, "flash preconditions not met: need a validated firmware URL, a connected device and no flash in progress")
            }
        }
    }
}

impl std::error::Error for FlashError {}

/// Handle to a running flash sequence.
pub struct FlashHandle {
    events: mpsc::Receiver<FlashEvent>,
    cancel: CancelToken,
}

impl FlashHandle {
    /// Receives the next event; `None` once the runner task is gone.
    pub async fn next_event(&mut self) -> Option<FlashEvent> {
        self.events.recv().await
    }

    /// Requests cooperative cancellation. Takes effect at the next stage
    /// boundary; the in-flight wait is never interrupted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Spawns the staged runner over the given stage table and returns a
/// handle for consuming its events. Precondition checks live in the
/// selection engine, not here.
pub fn start(stages: &'static [FlashStage]) -> FlashHandle {
    let cancel = CancelToken::new();
    let (tx, rx) = mpsc::channel(16);

    let token = cancel.clone();
    tokio::spawn(async move {
        run_stages(stages, token, tx).await;
    });

    FlashHandle { events: rx, cancel }
}

async fn run_stages(
    stages: &[FlashStage],
    cancel: CancelToken,
    tx: mpsc::Sender<FlashEvent>,
) {
    let mut state = RunnerState::Idle;
    debug!(?state, "Flash runner starting with {} stages", stages.len());

    for (ordinal, stage) in stages.iter().enumerate() {
        state = RunnerState::Running(ordinal);
        debug!(?state, label = stage.label, "Entering flash stage");

        // The only suspension point in the sequence.
        tokio::time::sleep(stage.nominal_duration).await;

        if cancel.is_cancelled() {
            state = RunnerState::Cancelled;
            warn!(?state, "Flash cancelled between stages, stopping");
            let _ = tx.send(FlashEvent::Cancelled).await;
            return;
        }

        let event = FlashEvent::Progress {
            stage: ordinal,
            percent: stage.progress_percent,
            label: stage.label,
            speed_kb_s: rand::thread_rng().gen_range(50..150),
            seconds_remaining: u32::from(100 - stage.progress_percent) / 10,
        };
        info!("{} ({}%)", stage.label, stage.progress_percent);
        let _ = tx.send(event).await;
    }

    state = RunnerState::Completed;
    info!(?state, "Simulated flash finished");
    let _ = tx.send(FlashEvent::Completed).await;
}
