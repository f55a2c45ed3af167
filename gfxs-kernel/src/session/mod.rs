//! Render session - the state machine behind one editing session.
//!
//! All orchestration state (buffers, render request state, debounce
//! deadline, overlay) lives in [`Session`] and changes only inside
//! [`Session::update`]. Remote calls leave `update` as [`Task`]s; their
//! results come back as [`Message`]s. The loop started by [`Session::spawn`]
//! processes one message at a time, so no state needs a lock.
//!
//! Phases: `Idle -> Scheduled` on activity, `Scheduled -> InFlight` when the
//! deadline fires and the document changed, `InFlight -> Scheduled` on every
//! completion.

mod handle;
mod task;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

pub use handle::SessionHandle;
pub use task::Task;

use std::sync::Arc;

use gfxs_api::{
    BackendError, BackendResult, BatchArchive, DroppedFile, FilterStore, RenderBackend,
    RenderReply, SectionBuffers, SessionCommand, SessionEvent, split,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;

use crate::config::SessionConfig;
use crate::debounce::{Debounce, seconds_until};
use crate::dispatcher::{Dispatch, Outcome, RenderDispatcher, RenderTicket};
use crate::pipeline::{DropPlan, Overlay, classify};

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 1024;

/// Why a filter is being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPurpose {
    /// Initial filter at session start; followed by a normal render.
    Bootstrap,
    /// Picked by the user; followed by a forced render.
    User,
}

/// Everything that can change session state.
#[derive(Debug)]
pub enum Message {
    Command(SessionCommand),
    /// The debounce deadline passed.
    TimerFired,
    Rendered {
        ticket: RenderTicket,
        result: BackendResult<RenderReply>,
    },
    Uploaded(BackendResult<()>),
    BatchRendered(BackendResult<BatchArchive>),
    FiltersListed(BackendResult<Vec<String>>),
    FilterLoaded {
        name: String,
        purpose: LoadPurpose,
        result: BackendResult<String>,
    },
    FilterSaved {
        name: String,
        result: BackendResult<()>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Scheduled,
    InFlight,
}

/// Snapshot of session state for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub phase: RenderPhase,
    /// When the next automatic render fires.
    pub scheduled_at: Option<Instant>,
    pub overlay_visible: bool,
    pub has_images: bool,
}

impl SessionStatus {
    /// Countdown display value; never gates firing.
    pub fn remaining_seconds(&self, now: Instant) -> Option<u64> {
        self.scheduled_at.map(|deadline| seconds_until(deadline, now))
    }
}

pub struct Session {
    config: SessionConfig,
    backend: Arc<dyn RenderBackend>,
    store: Arc<dyn FilterStore>,
    buffers: SectionBuffers,
    dispatcher: RenderDispatcher,
    debounce: Debounce,
    overlay: Overlay,
    filters: Vec<String>,
    events: broadcast::Sender<SessionEvent>,
    shutting_down: bool,
}

impl Session {
    /// Create a session and a receiver for its events.
    pub fn new(
        config: SessionConfig,
        backend: Arc<dyn RenderBackend>,
        store: Arc<dyn FilterStore>,
    ) -> (Self, broadcast::Receiver<SessionEvent>) {
        let (events, events_rx) = broadcast::channel(EVENT_CAPACITY);
        let session = Self {
            debounce: Debounce::new(config.render_delay),
            config,
            backend,
            store,
            buffers: SectionBuffers::default(),
            dispatcher: RenderDispatcher::new(),
            overlay: Overlay::default(),
            filters: Vec::new(),
            events,
            shutting_down: false,
        };
        (session, events_rx)
    }

    /// Start from the given buffers instead of empty ones.
    pub fn with_buffers(mut self, buffers: SectionBuffers) -> Self {
        self.buffers = buffers;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn buffers(&self) -> &SectionBuffers {
        &self.buffers
    }

    pub fn dispatcher(&self) -> &RenderDispatcher {
        &self.dispatcher
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        let phase = if self.dispatcher.is_in_flight() {
            RenderPhase::InFlight
        } else if self.debounce.is_armed() {
            RenderPhase::Scheduled
        } else {
            RenderPhase::Idle
        };
        SessionStatus {
            phase,
            scheduled_at: self.debounce.deadline(),
            overlay_visible: self.overlay.is_visible(),
            has_images: self.dispatcher.images().is_some(),
        }
    }

    pub fn remaining_seconds(&self) -> Option<u64> {
        self.debounce.remaining_seconds(Instant::now())
    }

    /// Initial work: list filters, load the initial filter, render.
    pub fn start(&mut self) -> Task {
        let list = self.list_filters();
        let next = match self.config.initial_filter.clone() {
            Some(name) => self.load_filter(name, LoadPurpose::Bootstrap),
            None => self.render(false),
        };
        Task::batch([list, next])
    }

    // =========================================================================
    // Update
    // =========================================================================

    pub fn update(&mut self, message: Message) -> Task {
        match message {
            Message::Command(command) => self.handle_command(command),
            Message::TimerFired => {
                self.debounce.cancel();
                self.render(false)
            }
            Message::Rendered { ticket, result } => self.finish_render(ticket, result),
            Message::Uploaded(result) => self.finish_upload(result),
            Message::BatchRendered(result) => self.finish_batch(result),
            Message::FiltersListed(result) => {
                match result {
                    Ok(names) => {
                        self.filters = names.clone();
                        self.emit(SessionEvent::FiltersListed(names));
                    }
                    Err(e) => tracing::warn!("failed to list filters: {}", e),
                }
                Task::none()
            }
            Message::FilterLoaded {
                name,
                purpose,
                result,
            } => self.finish_load(name, purpose, result),
            Message::FilterSaved { name, result } => match result {
                Ok(()) => {
                    tracing::info!("saved filter {}", name);
                    self.emit(SessionEvent::FilterSaved(name));
                    self.list_filters()
                }
                Err(e) => {
                    self.emit(SessionEvent::Error(format!("failed to save filter: {e}")));
                    Task::none()
                }
            },
        }
    }

    fn handle_command(&mut self, command: SessionCommand) -> Task {
        match command {
            SessionCommand::Edit { section, text } => {
                self.buffers.set(section, text);
                self.debounce.on_activity(Instant::now());
                Task::none()
            }
            SessionCommand::Cursor { .. } => {
                self.debounce.on_activity(Instant::now());
                Task::none()
            }
            SessionCommand::ForceRender => {
                // No stale auto-fire right after a forced render.
                self.debounce.cancel();
                self.render(true)
            }
            SessionCommand::Drop(files) => self.handle_drop(files),
            SessionCommand::LoadFilter(name) => self.load_filter(name, LoadPurpose::User),
            SessionCommand::SaveFilter(name) => self.save_filter(name),
            SessionCommand::RefreshFilters => self.list_filters(),
            SessionCommand::Shutdown => {
                tracing::info!("session shutting down");
                self.debounce.cancel();
                self.shutting_down = true;
                Task::none()
            }
        }
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    fn render(&mut self, force: bool) -> Task {
        let document = self.buffers.assemble();
        match self.dispatcher.begin(document, force) {
            Dispatch::Suppressed => {
                tracing::trace!("render suppressed, document unchanged");
                Task::none()
            }
            Dispatch::Dropped => {
                tracing::debug!("render dropped, another render is in flight");
                Task::none()
            }
            Dispatch::Deferred => {
                tracing::debug!("forced render deferred until the current one finishes");
                Task::none()
            }
            Dispatch::Started(ticket) => {
                tracing::debug!(
                    "render started (forced: {}, {} bytes)",
                    ticket.forced,
                    ticket.document.len()
                );
                self.emit(SessionEvent::RenderStarted);
                let backend = self.backend.clone();
                let document = ticket.document.clone();
                Task::perform(
                    self.config.request_timeout,
                    async move { backend.render(&document).await },
                    move |result| Message::Rendered { ticket, result },
                )
            }
        }
    }

    fn finish_render(&mut self, ticket: RenderTicket, result: BackendResult<RenderReply>) -> Task {
        let report = self.dispatcher.complete(ticket, result);
        match report.outcome {
            Outcome::Updated(pair) => {
                tracing::info!("render updated images");
                self.emit(SessionEvent::ImagesUpdated(pair));
            }
            Outcome::Unchanged => {
                self.emit(SessionEvent::Notice("No update from render.".into()));
            }
            Outcome::Failed(e) => {
                tracing::warn!("render failed: {}", e);
                self.emit(SessionEvent::Error(format!("Failed to render: {e}")));
            }
        }
        self.emit(SessionEvent::RenderFinished);

        if self.shutting_down {
            return Task::none();
        }
        self.debounce.on_activity(Instant::now());
        if report.run_deferred {
            return self.render(true);
        }
        Task::none()
    }

    // =========================================================================
    // Drops
    // =========================================================================

    fn handle_drop(&mut self, files: Vec<DroppedFile>) -> Task {
        match classify(files) {
            DropPlan::Ignore => Task::none(),
            DropPlan::Single(file) => {
                tracing::info!("uploading {}", file.name);
                self.show_overlay();
                let backend = self.backend.clone();
                Task::perform(
                    self.config.request_timeout,
                    async move { backend.upload_image(&file).await },
                    Message::Uploaded,
                )
            }
            DropPlan::Batch(files) => {
                tracing::info!("batch rendering {} files", files.len());
                self.show_overlay();
                let backend = self.backend.clone();
                let document = self.buffers.assemble();
                Task::perform(
                    self.config.request_timeout,
                    async move { backend.render_batch(&document, &files).await },
                    Message::BatchRendered,
                )
            }
        }
    }

    fn finish_upload(&mut self, result: BackendResult<()>) -> Task {
        self.hide_overlay();
        match result {
            Ok(()) => {
                self.debounce.cancel();
                self.render(true)
            }
            Err(e) => {
                self.emit(SessionEvent::Error(format!("Failed to upload image: {e}")));
                Task::none()
            }
        }
    }

    fn finish_batch(&mut self, result: BackendResult<BatchArchive>) -> Task {
        self.hide_overlay();
        match result {
            Ok(mut archive) => {
                if archive.file_name.is_empty() {
                    archive.file_name = self.config.archive_name.clone();
                }
                tracing::info!(
                    "batch archive ready: {} ({} bytes)",
                    archive.file_name,
                    archive.bytes.len()
                );
                self.emit(SessionEvent::ArchiveReady(archive));
            }
            Err(e) => {
                self.emit(SessionEvent::Error(format!("Batch render failed: {e}")));
            }
        }
        self.debounce.cancel();
        self.render(true)
    }

    fn show_overlay(&mut self) {
        if self.overlay.show() {
            self.emit(SessionEvent::OverlayShown);
        }
    }

    fn hide_overlay(&mut self) {
        if self.overlay.hide() {
            self.emit(SessionEvent::OverlayHidden);
        }
    }

    // =========================================================================
    // Filters
    // =========================================================================

    fn list_filters(&self) -> Task {
        let store = self.store.clone();
        Task::perform(
            self.config.request_timeout,
            async move { store.list().await },
            Message::FiltersListed,
        )
    }

    fn load_filter(&self, name: String, purpose: LoadPurpose) -> Task {
        let store = self.store.clone();
        let key = name.clone();
        Task::perform(
            self.config.request_timeout,
            async move { store.read(&key).await },
            move |result| Message::FilterLoaded {
                name,
                purpose,
                result,
            },
        )
    }

    fn finish_load(
        &mut self,
        name: String,
        purpose: LoadPurpose,
        result: BackendResult<String>,
    ) -> Task {
        match result {
            Ok(text) => {
                let replaced = self.buffers.apply(&split(&text));
                tracing::info!("loaded filter {} ({} sections)", name, replaced.len());
                for section in replaced {
                    let text = self.buffers.get(section).to_string();
                    self.emit(SessionEvent::BufferReplaced { section, text });
                }
            }
            Err(BackendError::NotFound(_)) if purpose == LoadPurpose::Bootstrap => {
                tracing::debug!("initial filter {} not found, starting empty", name);
            }
            Err(e) => {
                self.emit(SessionEvent::Error(format!("Failed to load filter {name}: {e}")));
                if purpose == LoadPurpose::User {
                    return Task::none();
                }
            }
        }

        match purpose {
            LoadPurpose::Bootstrap => self.render(false),
            LoadPurpose::User => {
                self.debounce.cancel();
                self.render(true)
            }
        }
    }

    fn save_filter(&self, name: String) -> Task {
        let name = name.trim().to_string();
        if name.is_empty() {
            self.emit(SessionEvent::Error("A filter name is required.".into()));
            return Task::none();
        }
        let store = self.store.clone();
        let document = self.buffers.assemble();
        let key = name.clone();
        Task::perform(
            self.config.request_timeout,
            async move { store.write(&key, &document).await },
            move |result| Message::FilterSaved { name, result },
        )
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine: the UI may not be listening yet.
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Loop
    // =========================================================================

    /// Run the session on a tokio task.
    pub fn spawn(self) -> SessionHandle {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(self.status());
        let events = self.events.clone();
        let join = tokio::spawn(self.run(commands_rx, status_tx));
        SessionHandle {
            commands,
            status,
            events,
            join,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        status: watch::Sender<SessionStatus>,
    ) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Message>();

        let boot = self.start();
        spawn_task(boot, &done_tx);
        status.send_replace(self.status());

        loop {
            let deadline = self.debounce.deadline();
            let message = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => Message::Command(command),
                    None => break,
                },
                Some(done) = done_rx.recv() => done,
                _ = wait_until(deadline) => Message::TimerFired,
            };

            let task = self.update(message);
            spawn_task(task, &done_tx);
            status.send_replace(self.status());

            if self.shutting_down {
                break;
            }
        }

        tracing::debug!("session loop exited");
    }
}

fn spawn_task(task: Task, done: &mpsc::UnboundedSender<Message>) {
    for future in task.into_futures() {
        let done = done.clone();
        tokio::spawn(async move {
            let message = future.await;
            // The loop may have exited; the result is dropped with it.
            let _ = done.send(message);
        });
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
