//! Progress reporting
//!
//! The optimizer coordinator is the only writer of the [`ProgressTracker`]
//! record. A separate polling task copies the record on a fixed interval and
//! pushes it to each observer whose last received copy differs. Slow
//! observers are never waited on: a full channel is retried on the next poll.

use super::{ProgressMessage, ProgressSnapshot, ProgressStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Per-observer channel capacity
const OBSERVER_BUFFER: usize = 16;

/// Shared progress record
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    record: Arc<Mutex<ProgressSnapshot>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProgressSnapshot> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset for a run of `total` units
    pub fn start(&self, total: usize) {
        *self.lock() = ProgressSnapshot {
            status: ProgressStatus::Running,
            current: 0,
            total,
            current_combination_label: String::new(),
        };
    }

    /// Record a completed unit
    pub fn advance(&self, current: usize, label: &str) {
        let mut record = self.lock();
        record.current = current;
        if record.current_combination_label != label {
            record.current_combination_label = label.to_string();
        }
    }

    pub fn complete(&self) {
        self.lock().status = ProgressStatus::Complete;
    }

    pub fn fail(&self) {
        self.lock().status = ProgressStatus::Error;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().clone()
    }
}

enum Command {
    Subscribe {
        id: u64,
        tx: mpsc::Sender<ProgressMessage>,
    },
    Ping(u64),
    Shutdown,
}

struct ObserverSlot {
    id: u64,
    tx: mpsc::Sender<ProgressMessage>,
    /// `None` until the first successful push
    last_sent: Option<ProgressSnapshot>,
    pending_pongs: usize,
}

impl ObserverSlot {
    /// Push pongs and a changed snapshot. Returns false once the observer is gone.
    fn flush(&mut self, snapshot: &ProgressSnapshot) -> bool {
        while self.pending_pongs > 0 {
            match self.tx.try_send(ProgressMessage::Pong) {
                Ok(()) => self.pending_pongs -= 1,
                Err(TrySendError::Full(_)) => return true,
                Err(TrySendError::Closed(_)) => return false,
            }
        }

        if self.last_sent.as_ref() == Some(snapshot) {
            return true;
        }
        match self.tx.try_send(ProgressMessage::Update(snapshot.clone())) {
            Ok(()) => {
                self.last_sent = Some(snapshot.clone());
                true
            }
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => false,
        }
    }

    fn is_settled(&self, snapshot: &ProgressSnapshot) -> bool {
        self.pending_pongs == 0 && self.last_sent.as_ref() == Some(snapshot)
    }
}

/// Handle to the polling task
pub struct ProgressReporter {
    tracker: ProgressTracker,
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Spawn the polling task on the current runtime
    pub fn spawn(tracker: ProgressTracker, poll_interval: Duration) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Self::run(tracker.clone(), rx, poll_interval));
        Self {
            tracker,
            commands,
            next_id: Arc::new(AtomicU64::new(0)),
            handle,
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Attach an observer. Its first message is always the current record.
    pub fn subscribe(&self) -> Observer {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, updates) = mpsc::channel(OBSERVER_BUFFER);

        if let Err(mpsc::error::SendError(Command::Subscribe { tx, .. })) =
            self.commands.send(Command::Subscribe { id, tx })
        {
            // Reporter already finished: hand over the final record directly
            let _ = tx.try_send(ProgressMessage::Update(self.tracker.snapshot()));
        }

        Observer {
            id,
            updates,
            commands: self.commands.clone(),
        }
    }

    /// Flush the current record to every observer and stop the task
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Progress reporter task failed");
        }
    }

    async fn run(
        tracker: ProgressTracker,
        mut commands: mpsc::UnboundedReceiver<Command>,
        poll_interval: Duration,
    ) {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut observers: Vec<ObserverSlot> = Vec::new();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let snapshot = tracker.snapshot();
                    observers.retain_mut(|o| o.flush(&snapshot));

                    if snapshot.status.is_terminal()
                        && observers.iter().all(|o| o.is_settled(&snapshot))
                    {
                        tracing::debug!(
                            status = snapshot.status.as_str(),
                            observers = observers.len(),
                            "Progress reporter finished"
                        );
                        break;
                    }
                }

                command = commands.recv() => {
                    match command {
                        Some(Command::Subscribe { id, tx }) => {
                            observers.push(ObserverSlot {
                                id,
                                tx,
                                last_sent: None,
                                pending_pongs: 0,
                            });
                        }
                        Some(Command::Ping(id)) => {
                            if let Some(slot) = observers.iter_mut().find(|o| o.id == id) {
                                slot.pending_pongs += 1;
                            }
                        }
                        Some(Command::Shutdown) | None => {
                            let snapshot = tracker.snapshot();
                            observers.retain_mut(|o| o.flush(&snapshot));
                            tracing::debug!("Progress reporter shutting down");
                            break;
                        }
                    }
                }
            }
        }

        // Late subscribers still get the final record
        commands.close();
        let snapshot = tracker.snapshot();
        while let Ok(command) = commands.try_recv() {
            if let Command::Subscribe { tx, .. } = command {
                let _ = tx.try_send(ProgressMessage::Update(snapshot.clone()));
            }
        }
    }
}

/// Receiving end of one subscription
pub struct Observer {
    id: u64,
    updates: mpsc::Receiver<ProgressMessage>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Observer {
    /// Next message; `None` once the reporter has stopped and the
    /// channel is drained
    pub async fn recv(&mut self) -> Option<ProgressMessage> {
        self.updates.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ProgressMessage> {
        self.updates.try_recv().ok()
    }

    /// Heartbeat. Answered with [`ProgressMessage::Pong`] on the next poll;
    /// returns false when the reporter is gone.
    pub fn ping(&self) -> bool {
        self.commands.send(Command::Ping(self.id)).is_ok()
    }

    /// Receive until a terminal status arrives, returning it
    pub async fn wait_terminal(&mut self) -> Option<ProgressSnapshot> {
        while let Some(message) = self.recv().await {
            if let ProgressMessage::Update(snapshot) = message {
                if snapshot.status.is_terminal() {
                    return Some(snapshot);
                }
            }
        }
        None
    }
}
