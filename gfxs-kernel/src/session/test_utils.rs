//! Test doubles for session tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gfxs_api::{
    BackendError, BackendResult, BatchArchive, DroppedFile, ImagePair, RenderBackend, RenderReply,
    SessionEvent,
};
use tokio::sync::{Semaphore, broadcast};

use super::Message;
use super::Task;
use crate::config::SessionConfig;

/// Scripted renderer that counts its calls.
#[derive(Default)]
pub struct MockBackend {
    pub render_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    documents: Mutex<Vec<String>>,
    replies: Mutex<VecDeque<BackendResult<RenderReply>>>,
    upload_error: Mutex<Option<BackendError>>,
    batch_error: Mutex<Option<BackendError>>,
    panic_on_render: AtomicBool,
    hold: Option<Semaphore>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Renders wait for [`MockBackend::release`] before replying.
    pub fn held() -> Arc<Self> {
        Arc::new(Self {
            hold: Some(Semaphore::new(0)),
            ..Self::default()
        })
    }

    pub fn panicking() -> Arc<Self> {
        let backend = Self::default();
        backend.panic_on_render.store(true, Ordering::SeqCst);
        Arc::new(backend)
    }

    pub fn push_reply(&self, reply: BackendResult<RenderReply>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn fail_upload(&self, error: BackendError) {
        *self.upload_error.lock().unwrap() = Some(error);
    }

    pub fn fail_batch(&self, error: BackendError) {
        *self.batch_error.lock().unwrap() = Some(error);
    }

    pub fn release(&self, renders: usize) {
        if let Some(hold) = &self.hold {
            hold.add_permits(renders);
        }
    }

    pub fn renders(&self) -> usize {
        self.render_calls.load(Ordering::SeqCst)
    }

    pub fn documents(&self) -> Vec<String> {
        self.documents.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderBackend for MockBackend {
    async fn render(&self, document: &str) -> BackendResult<RenderReply> {
        let n = self.render_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.documents.lock().unwrap().push(document.to_string());
        if self.panic_on_render.load(Ordering::SeqCst) {
            panic!("renderer exploded");
        }
        if let Some(hold) = &self.hold {
            hold.acquire().await.unwrap().forget();
        }
        let scripted = self.replies.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            let tag = n as u8;
            Ok(RenderReply::Updated(ImagePair::new(vec![tag], vec![tag, tag])))
        })
    }

    async fn upload_image(&self, _image: &DroppedFile) -> BackendResult<()> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        match self.upload_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn render_batch(
        &self,
        _document: &str,
        images: &[DroppedFile],
    ) -> BackendResult<BatchArchive> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.batch_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(BatchArchive {
            file_name: String::new(),
            bytes: vec![0u8; images.len()],
        })
    }
}

/// Short delays so loop tests read naturally.
pub fn test_config() -> SessionConfig {
    SessionConfig {
        render_delay: Duration::from_secs(10),
        request_timeout: Duration::from_secs(60),
        initial_filter: None,
        ..SessionConfig::default()
    }
}

/// Await every future in a task, in order, collecting the messages.
pub async fn drain(task: Task) -> Vec<Message> {
    let mut messages = Vec::new();
    for future in task.into_futures() {
        messages.push(future.await);
    }
    messages
}

/// Await a task that holds exactly one future.
pub async fn single(task: Task) -> Message {
    assert_eq!(task.len(), 1, "expected exactly one pending call");
    let mut messages = drain(task).await;
    messages.remove(0)
}

/// Everything currently buffered on an event receiver.
pub fn collect_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn image(name: &str) -> DroppedFile {
    DroppedFile::new(name, Some("image/png".to_string()), vec![0x89, b'P', b'N', b'G'])
}
