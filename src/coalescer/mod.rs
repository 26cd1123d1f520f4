//! Client side: turns a stream of prompt edits into at most one outstanding
//! generation per settled prompt and keeps a short history of results.

pub mod client;
pub mod history;
pub mod session;

use crate::{
    error::{PaintError, Result},
    models::GeneratedImage,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_stream::wrappers::WatchStream;

pub use client::{GatewayClient, GenerationSource};
pub use history::{GenerationRecord, History, HISTORY_CAPACITY};
pub use session::{Completion, FetchPlan, Phase, Session, SessionSnapshot, DEBOUNCE_WINDOW};

#[derive(Debug, Clone)]
pub struct CoalescerSettings {
    pub debounce: Duration,
    pub history_capacity: usize,
}

impl Default for CoalescerSettings {
    fn default() -> Self {
        Self {
            debounce: DEBOUNCE_WINDOW,
            history_capacity: HISTORY_CAPACITY,
        }
    }
}

/// A failed generation, shown once to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub prompt: String,
    pub message: String,
}

enum Command {
    Edit(String),
    IterativeMode(bool),
    ApiKey(Option<String>),
    Select(usize, oneshot::Sender<Result<()>>),
    Shutdown,
}

pub struct Coalescer {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    task: JoinHandle<()>,
}

impl Coalescer {
    pub fn spawn(source: Arc<dyn GenerationSource>, settings: CoalescerSettings) -> Self {
        let session = Session::new(
            settings.debounce,
            History::with_capacity(settings.history_capacity),
        );
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(session.snapshot());
        let (notice_tx, notifications) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(session, source, command_rx, snapshot_tx, notice_tx));

        Self {
            commands,
            snapshots,
            notifications,
            task,
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PaintError::SessionClosed)
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) -> Result<()> {
        self.send(Command::Edit(prompt.into()))
    }

    pub fn set_iterative_mode(&self, enabled: bool) -> Result<()> {
        self.send(Command::IterativeMode(enabled))
    }

    pub fn set_api_key(&self, key: Option<String>) -> Result<()> {
        self.send(Command::ApiKey(key))
    }

    pub async fn select(&self, index: usize) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Select(index, reply))?;
        response.await.map_err(|_| PaintError::SessionClosed)?
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshots(&self) -> WatchStream<SessionSnapshot> {
        WatchStream::new(self.snapshots.clone())
    }

    pub async fn next_notification(&mut self) -> Option<Notification> {
        self.notifications.recv().await
    }

    pub fn try_notification(&mut self) -> Option<Notification> {
        self.notifications.try_recv().ok()
    }

    /// Resolves with the first snapshot matching `predicate`.
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| PaintError::SessionClosed)?;
        Ok(snapshot.clone())
    }

    /// Tears the session down and returns its final (empty) state.
    pub async fn shutdown(self) -> SessionSnapshot {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            log::error!("❌ Session task ended abnormally: {}", e);
        }
        let snapshot = self.snapshots.borrow().clone();
        snapshot
    }
}

async fn run(
    mut session: Session,
    source: Arc<dyn GenerationSource>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
    notices: mpsc::UnboundedSender<Notification>,
) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(u64, String, Result<GeneratedImage>)>();

    loop {
        let deadline = session.debounce_deadline();

        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Edit(prompt)) => session.edit(prompt, Instant::now()),
                Some(Command::IterativeMode(enabled)) => session.set_iterative_mode(enabled),
                Some(Command::ApiKey(key)) => session.set_api_key(key),
                Some(Command::Select(index, reply)) => {
                    let _ = reply.send(session.select(index));
                }
                Some(Command::Shutdown) | None => {
                    session.teardown();
                    snapshots.send_replace(session.snapshot());
                    break;
                }
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(plan) = session.settle(Instant::now()) {
                    log::debug!("🐛 Requesting #{} for {:?}", plan.seq, plan.request.prompt);
                    let source = source.clone();
                    let done = done_tx.clone();
                    // Not cancelled on shutdown; the result is simply ignored.
                    tokio::spawn(async move {
                        let outcome = source.generate(&plan.request).await;
                        let _ = done.send((plan.seq, plan.request.prompt, outcome));
                    });
                }
            },
            Some((seq, prompt, outcome)) = done_rx.recv() => {
                if let Completion::Failed(message) = session.complete(seq, outcome) {
                    log::warn!("⚠️  Generation failed for {:?}: {}", prompt, message);
                    let _ = notices.send(Notification { prompt, message });
                }
            },
        }

        snapshots.send_replace(session.snapshot());
    }
}
