//! Handle to a running session loop.

use gfxs_api::{SessionCommand, SessionEvent};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::SessionStatus;
use crate::KernelError;

pub struct SessionHandle {
    pub(super) commands: mpsc::UnboundedSender<SessionCommand>,
    pub(super) status: watch::Receiver<SessionStatus>,
    pub(super) events: broadcast::Sender<SessionEvent>,
    pub(super) join: JoinHandle<()>,
}

impl SessionHandle {
    /// Queue a command for the session loop.
    pub fn send(&self, command: SessionCommand) -> Result<(), KernelError> {
        self.commands
            .send(command)
            .map_err(|_| KernelError::SessionClosed)
    }

    /// Latest published status.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Seconds until the next automatic render, if one is scheduled.
    pub fn remaining_seconds(&self) -> Option<u64> {
        self.status.borrow().remaining_seconds(Instant::now())
    }

    /// Another receiver for session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
        self.join().await;
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            tracing::error!("session loop panicked: {}", e);
        }
    }
}
