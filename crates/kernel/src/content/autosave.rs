//! Debounced auto-save with a single in-flight save per value.
//!
//! Two layers:
//! - `AutoSave<T>`: the pure state machine. Callers pass the current time in,
//!   so every transition is testable without timers.
//! - `AutoSaver<S>`: a tokio task that drives the machine, runs saves against
//!   a `SaveTarget`, and publishes `SaveStatus` on a watch channel.
//!
//! Guarantees: a burst of edits within the debounce window produces one save
//! carrying the last value; a save never starts while another is in flight;
//! failures are not retried on a timer; closing waits for the in-flight save
//! and flushes the last dirty value.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Default trailing window during which external state is rejected.
pub const DEFAULT_TYPING_WINDOW: Duration = Duration::from_millis(1500);

/// Timing settings for auto-save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSaveSettings {
    pub debounce: Duration,
    pub typing_window: Duration,
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            typing_window: DEFAULT_TYPING_WINDOW,
        }
    }
}

/// Internal state of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    /// Local equals the acknowledged value.
    Idle,
    /// Dirty; a save is issued once `due` passes.
    Pending { due: Instant },
    /// A save is in flight and local has not changed since it started.
    Saving,
    /// A save is in flight and local changed meanwhile.
    SavingDirty { due: Instant },
    /// The last save failed; waits for an edit or `retry`.
    Failed { error: String },
}

/// Client-facing save indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SaveStatus {
    Idle,
    Pending,
    Saving,
    Failed { error: String },
}

/// Pure auto-save state machine.
#[derive(Debug, Clone)]
pub struct AutoSave<T> {
    local: T,
    acknowledged: T,
    in_flight: Option<T>,
    state: SaveState,
    settings: AutoSaveSettings,
    last_keystroke: Option<Instant>,
}

impl<T: Clone + PartialEq> AutoSave<T> {
    /// Start from a value the store already holds.
    pub fn new(value: T, settings: AutoSaveSettings) -> Self {
        Self {
            local: value.clone(),
            acknowledged: value,
            in_flight: None,
            state: SaveState::Idle,
            settings,
            last_keystroke: None,
        }
    }

    /// Current local value.
    pub fn value(&self) -> &T {
        &self.local
    }

    /// Last value the store acknowledged.
    pub fn acknowledged(&self) -> &T {
        &self.acknowledged
    }

    pub fn state(&self) -> &SaveState {
        &self.state
    }

    /// Whether local differs from the acknowledged value.
    pub fn is_dirty(&self) -> bool {
        self.local != self.acknowledged
    }

    fn is_saving(&self) -> bool {
        matches!(self.state, SaveState::Saving | SaveState::SavingDirty { .. })
    }

    /// Whether a keystroke happened within the typing window.
    pub fn is_typing(&self, now: Instant) -> bool {
        self.last_keystroke
            .is_some_and(|t| now.saturating_duration_since(t) < self.settings.typing_window)
    }

    /// Record a local edit and re-arm the debounce window.
    pub fn on_change(&mut self, value: T, now: Instant) {
        self.local = value;
        self.last_keystroke = Some(now);
        let due = now + self.settings.debounce;

        self.state = if self.is_saving() {
            SaveState::SavingDirty { due }
        } else if self.is_dirty() {
            SaveState::Pending { due }
        } else {
            SaveState::Idle
        };
    }

    /// When the next save should start, if one is scheduled.
    pub fn due(&self) -> Option<Instant> {
        match self.state {
            SaveState::Pending { due } => Some(due),
            _ => None,
        }
    }

    /// Start a save if one is due. Returns the value to send.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = self.due()?;
        if now < due {
            return None;
        }
        let value = self.local.clone();
        self.in_flight = Some(value.clone());
        self.state = SaveState::Saving;
        Some(value)
    }

    /// The in-flight save succeeded.
    pub fn on_saved(&mut self, now: Instant) {
        let Some(sent) = self.in_flight.take() else {
            return;
        };
        self.acknowledged = sent;

        let dirty_due = match &self.state {
            SaveState::SavingDirty { due } => Some(*due),
            _ => None,
        };
        self.state = if !self.is_dirty() {
            SaveState::Idle
        } else {
            // The window may already have passed during the save
            SaveState::Pending {
                due: dirty_due.unwrap_or(now),
            }
        };
    }

    /// The in-flight save failed. The value stays dirty; no retry is scheduled.
    pub fn on_failed(&mut self, error: impl Into<String>) {
        self.in_flight = None;
        self.state = SaveState::Failed {
            error: error.into(),
        };
    }

    /// Resend after a failure.
    pub fn retry(&mut self, now: Instant) {
        if matches!(self.state, SaveState::Failed { .. }) {
            self.state = if self.is_dirty() {
                SaveState::Pending { due: now }
            } else {
                SaveState::Idle
            };
        }
    }

    /// Make any pending value due immediately. Used when closing.
    pub fn flush(&mut self, now: Instant) {
        self.state = match &self.state {
            SaveState::Pending { .. } => SaveState::Pending { due: now },
            SaveState::SavingDirty { .. } => SaveState::SavingDirty { due: now },
            SaveState::Failed { .. } if self.is_dirty() => SaveState::Pending { due: now },
            other => other.clone(),
        };
    }

    /// Offer externally sourced state (e.g. a refetch).
    ///
    /// Rejected while the user is typing, while local edits are unsaved, or
    /// while a save is in flight. Returns whether it was applied.
    pub fn accept_external(&mut self, value: T, now: Instant) -> bool {
        if self.is_typing(now) || self.is_dirty() || self.is_saving() {
            return false;
        }
        self.local = value.clone();
        self.acknowledged = value;
        self.state = SaveState::Idle;
        true
    }

    /// Nothing left to send: idle, or failed and waiting for the user.
    pub fn is_settled(&self) -> bool {
        matches!(self.state, SaveState::Idle | SaveState::Failed { .. })
    }

    pub fn status(&self) -> SaveStatus {
        match &self.state {
            SaveState::Idle => SaveStatus::Idle,
            SaveState::Pending { .. } => SaveStatus::Pending,
            SaveState::Saving | SaveState::SavingDirty { .. } => SaveStatus::Saving,
            SaveState::Failed { error } => SaveStatus::Failed {
                error: error.clone(),
            },
        }
    }
}

/// Where an `AutoSaver` persists values.
#[async_trait]
pub trait SaveTarget: Send + Sync + 'static {
    type Value: Clone + PartialEq + Send + Sync + 'static;
    type Output: Send + 'static;

    async fn save(&self, value: Self::Value) -> AppResult<Self::Output>;
}

enum Command<V> {
    Change(V),
    External(V, oneshot::Sender<bool>),
    Retry,
    Close,
}

/// Result of closing an `AutoSaver`.
#[derive(Debug)]
pub struct Closed<O> {
    /// Outputs of saves not yet taken, oldest first.
    pub saved: Vec<O>,
    pub status: SaveStatus,
}

/// Tokio driver for `AutoSave`.
pub struct AutoSaver<S: SaveTarget> {
    commands: mpsc::UnboundedSender<Command<S::Value>>,
    status: watch::Receiver<SaveStatus>,
    saved: mpsc::UnboundedReceiver<S::Output>,
    task: JoinHandle<()>,
}

impl<S: SaveTarget> AutoSaver<S> {
    /// Spawn the driver task for a value the store already holds.
    pub fn spawn(target: Arc<S>, initial: S::Value, settings: AutoSaveSettings) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SaveStatus::Idle);
        let (saved_tx, saved) = mpsc::unbounded_channel();
        let machine = AutoSave::new(initial, settings);

        let task = tokio::spawn(drive(target, machine, command_rx, status_tx, saved_tx));

        Self {
            commands,
            status,
            saved,
            task,
        }
    }

    fn send(&self, command: Command<S::Value>) {
        if self.commands.send(command).is_err() {
            debug!("auto-save driver already stopped");
        }
    }

    /// Feed a local edit.
    pub fn change(&self, value: S::Value) {
        self.send(Command::Change(value));
    }

    /// Resend the dirty value after a failure.
    pub fn retry(&self) {
        self.send(Command::Retry);
    }

    /// Offer external state; resolves to whether it was applied.
    pub async fn offer_external(&self, value: S::Value) -> bool {
        let (reply, response) = oneshot::channel();
        self.send(Command::External(value, reply));
        response.await.unwrap_or(false)
    }

    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }

    /// Take the output of a completed save, if any.
    pub fn try_saved(&mut self) -> Option<S::Output> {
        self.saved.try_recv().ok()
    }

    /// Flush and stop. Waits for an in-flight save; never cancels one.
    pub async fn close(mut self) -> AppResult<Closed<S::Output>> {
        self.send(Command::Close);
        self.task
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("auto-save task failed: {e}")))?;

        let mut saved = Vec::new();
        while let Ok(output) = self.saved.try_recv() {
            saved.push(output);
        }
        let status = self.status.borrow().clone();
        Ok(Closed { saved, status })
    }
}

async fn sleep_until(due: Option<Instant>) {
    match due {
        Some(due) => tokio::time::sleep_until(due).await,
        None => std::future::pending().await,
    }
}

async fn drive<S: SaveTarget>(
    target: Arc<S>,
    mut machine: AutoSave<S::Value>,
    mut commands: mpsc::UnboundedReceiver<Command<S::Value>>,
    status: watch::Sender<SaveStatus>,
    saved: mpsc::UnboundedSender<S::Output>,
) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<AppResult<S::Output>>();
    let mut closing = false;

    loop {
        if let Some(value) = machine.poll(Instant::now()) {
            let target = Arc::clone(&target);
            let done = done_tx.clone();
            // Runs to completion even if the driver stops listening
            tokio::spawn(async move {
                let _ = done.send(target.save(value).await);
            });
        }
        status.send_replace(machine.status());

        if closing && machine.is_settled() {
            break;
        }

        tokio::select! {
            command = commands.recv(), if !closing => match command {
                Some(Command::Change(value)) => machine.on_change(value, Instant::now()),
                Some(Command::External(value, reply)) => {
                    let _ = reply.send(machine.accept_external(value, Instant::now()));
                }
                Some(Command::Retry) => machine.retry(Instant::now()),
                Some(Command::Close) | None => {
                    closing = true;
                    machine.flush(Instant::now());
                }
            },
            Some(result) = done_rx.recv() => match result {
                Ok(output) => {
                    machine.on_saved(Instant::now());
                    let _ = saved.send(output);
                }
                Err(e) => {
                    warn!(error = %e, transient = e.is_transient(), "auto-save failed");
                    machine.on_failed(e.to_string());
                }
            },
            () = sleep_until(machine.due()) => {}
        }
    }

    debug!("auto-save driver stopped");
}
