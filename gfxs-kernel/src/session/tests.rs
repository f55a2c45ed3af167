use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use gfxs_api::{
    BackendError, DroppedFile, FilterStore, RenderReply, Section, SessionCommand, SessionEvent,
};
use tokio::sync::broadcast;

use super::test_utils::*;
use super::*;
use crate::persistence::MemoryFilterStore;

fn session_with(backend: Arc<MockBackend>) -> (Session, broadcast::Receiver<SessionEvent>) {
    Session::new(test_config(), backend, Arc::new(MemoryFilterStore::new()))
}

fn edit(section: Section, text: &str) -> Message {
    Message::Command(SessionCommand::Edit {
        section,
        text: text.to_string(),
    })
}

fn command(command: SessionCommand) -> Message {
    Message::Command(command)
}

/// Feed every completion back into the session until no calls remain.
async fn settle(session: &mut Session, task: Task) {
    let mut queue: VecDeque<Message> = drain(task).await.into();
    while let Some(message) = queue.pop_front() {
        let next = session.update(message);
        queue.extend(drain(next).await);
    }
}

fn ticket_of(message: &Message) -> &RenderTicket {
    match message {
        Message::Rendered { ticket, .. } => ticket,
        other => panic!("expected Rendered, got {:?}", other),
    }
}

// -----------------------------------------------------------------------------
// Start
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_start_lists_filters_and_renders() {
    let backend = MockBackend::new();
    let (mut session, mut rx) = session_with(backend.clone());

    let task = session.start();
    assert_eq!(task.len(), 2);
    settle(&mut session, task).await;

    assert_eq!(backend.renders(), 1);
    let events = collect_events(&mut rx);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SessionEvent::FiltersListed(names) if names.is_empty()))
    );
    assert!(events.iter().any(|e| matches!(e, SessionEvent::ImagesUpdated(_))));
}

#[tokio::test]
async fn test_bootstrap_applies_initial_filter_without_forcing() {
    let backend = MockBackend::new();
    let store =
        MemoryFilterStore::new().with_filter("default", "[VARS]\nv = 1\n\n[FILTERS]\nsepia\n");
    let config = SessionConfig {
        initial_filter: Some("default".into()),
        ..test_config()
    };
    let (mut session, mut rx) = Session::new(config, backend.clone(), Arc::new(store));

    let mut messages = drain(session.start()).await;
    let loaded = messages.pop().unwrap();
    let listed = messages.pop().unwrap();
    assert!(session.update(listed).is_empty());

    let render = single(session.update(loaded)).await;
    assert!(!ticket_of(&render).forced);
    assert_eq!(session.buffers().get(Section::Vars), "v = 1");
    assert_eq!(session.buffers().get(Section::Filters), "sepia");

    let replaced: Vec<Section> = collect_events(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::BufferReplaced { section, .. } => Some(section),
            _ => None,
        })
        .collect();
    assert_eq!(replaced, vec![Section::Vars, Section::Filters]);
}

#[tokio::test]
async fn test_bootstrap_missing_filter_is_quiet() {
    let backend = MockBackend::new();
    let config = SessionConfig {
        initial_filter: Some("default".into()),
        ..test_config()
    };
    let (mut session, mut rx) =
        Session::new(config, backend.clone(), Arc::new(MemoryFilterStore::new()));

    let task = session.start();
    settle(&mut session, task).await;

    assert_eq!(backend.renders(), 1);
    assert!(
        !collect_events(&mut rx)
            .iter()
            .any(|e| matches!(e, SessionEvent::Error(_)))
    );
}

// -----------------------------------------------------------------------------
// Debounce and suppression
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_edit_only_arms_the_countdown() {
    let backend = MockBackend::new();
    let (mut session, _rx) = session_with(backend.clone());

    assert!(session.update(edit(Section::Filters, "blur 3")).is_empty());
    assert_eq!(session.status().phase, RenderPhase::Scheduled);
    assert_eq!(session.remaining_seconds(), Some(10));
    assert_eq!(session.buffers().get(Section::Filters), "blur 3");

    let cursor = command(SessionCommand::Cursor {
        section: Section::Layers,
    });
    assert!(session.update(cursor).is_empty());
    assert_eq!(backend.renders(), 0);
}

#[tokio::test]
async fn test_timer_renders_once_then_suppresses_identical_text() {
    let backend = MockBackend::new();
    let (mut session, mut rx) = session_with(backend.clone());

    assert!(session.update(edit(Section::Vars, "a = 1")).is_empty());
    let task = session.update(Message::TimerFired);
    assert_eq!(session.status().phase, RenderPhase::InFlight);
    settle(&mut session, task).await;

    assert_eq!(backend.renders(), 1);
    assert_eq!(backend.documents()[0], session.buffers().assemble());
    assert_eq!(session.dispatcher().last_rendered(), session.buffers().assemble());

    // Completion re-arms; the next tick finds nothing new.
    assert_eq!(session.status().phase, RenderPhase::Scheduled);
    assert!(session.update(Message::TimerFired).is_empty());
    assert_eq!(session.status().phase, RenderPhase::Idle);

    let events = collect_events(&mut rx);
    assert!(matches!(events[0], SessionEvent::RenderStarted));
    assert!(matches!(events[1], SessionEvent::ImagesUpdated(_)));
    assert!(matches!(events[2], SessionEvent::RenderFinished));
}

#[tokio::test]
async fn test_force_renders_unchanged_text() {
    let backend = MockBackend::new();
    let (mut session, _rx) = session_with(backend.clone());

    assert!(session.update(edit(Section::Vars, "a")).is_empty());
    let task = session.update(Message::TimerFired);
    settle(&mut session, task).await;

    let task = session.update(command(SessionCommand::ForceRender));
    let message = single(task).await;
    assert!(ticket_of(&message).forced);
    assert_eq!(backend.renders(), 2);
}

#[tokio::test]
async fn test_force_cancels_pending_countdown() {
    let backend = MockBackend::new();
    let (mut session, _rx) = session_with(backend.clone());

    assert!(session.update(edit(Section::Vars, "a")).is_empty());
    let _task = session.update(command(SessionCommand::ForceRender));
    assert_eq!(session.status().scheduled_at, None);
    assert_eq!(session.status().phase, RenderPhase::InFlight);
}

// -----------------------------------------------------------------------------
// Single flight
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_trigger_during_flight_is_dropped() {
    let backend = MockBackend::new();
    let (mut session, _rx) = session_with(backend.clone());

    assert!(session.update(edit(Section::Vars, "a")).is_empty());
    let first = session.update(Message::TimerFired);
    assert_eq!(first.len(), 1);

    assert!(session.update(edit(Section::Vars, "b")).is_empty());
    assert!(session.update(Message::TimerFired).is_empty());

    let done = single(first).await;
    assert!(session.update(done).is_empty());
    assert_eq!(backend.renders(), 1);

    // The newer text is still eligible on the next tick.
    let next = single(session.update(Message::TimerFired)).await;
    assert!(ticket_of(&next).document.contains("b"));
}

#[tokio::test]
async fn test_force_during_flight_runs_after_completion() {
    let backend = MockBackend::new();
    let (mut session, _rx) = session_with(backend.clone());

    assert!(session.update(edit(Section::Vars, "a")).is_empty());
    let first = session.update(Message::TimerFired);

    assert!(session.update(command(SessionCommand::ForceRender)).is_empty());
    assert!(session.dispatcher().has_deferred());

    let follow = session.update(single(first).await);
    // The completion re-arms even though the deferred render starts at once.
    assert!(session.status().scheduled_at.is_some());
    assert_eq!(session.status().phase, RenderPhase::InFlight);

    let message = single(follow).await;
    assert!(ticket_of(&message).forced);
    assert_eq!(backend.renders(), 2);
}

// -----------------------------------------------------------------------------
// Outcomes
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_failed_render_keeps_images_and_rearms() {
    let backend = MockBackend::new();
    let (mut session, mut rx) = session_with(backend.clone());

    assert!(session.update(edit(Section::Vars, "a")).is_empty());
    let task = session.update(Message::TimerFired);
    settle(&mut session, task).await;
    let before = session.buffers().assemble();

    backend.push_reply(Err(BackendError::Status {
        code: 500,
        body: "boom".into(),
    }));
    assert!(session.update(edit(Section::Vars, "b")).is_empty());
    let task = session.update(Message::TimerFired);
    settle(&mut session, task).await;

    assert_eq!(session.dispatcher().last_rendered(), before);
    assert_eq!(session.dispatcher().images().map(|p| p.original.clone()), Some(vec![1]));
    assert_eq!(session.status().phase, RenderPhase::Scheduled);

    let events = collect_events(&mut rx);
    assert!(events.iter().any(|e| matches!(e, SessionEvent::Error(msg) if msg.contains("500"))));
    assert!(matches!(events.last(), Some(SessionEvent::RenderFinished)));
}

#[tokio::test]
async fn test_unchanged_reply_posts_notice() {
    let backend = MockBackend::new();
    backend.push_reply(Ok(RenderReply::Unchanged));
    let (mut session, mut rx) = session_with(backend.clone());

    assert!(session.update(edit(Section::Layers, "x")).is_empty());
    let task = session.update(Message::TimerFired);
    settle(&mut session, task).await;

    assert_eq!(session.dispatcher().last_rendered(), "");
    assert!(session.dispatcher().images().is_none());
    let events = collect_events(&mut rx);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SessionEvent::Notice(msg) if msg == "No update from render."))
    );
}

#[tokio::test]
async fn test_panicking_backend_releases_guard() {
    let backend = MockBackend::panicking();
    let (mut session, mut rx) = session_with(backend.clone());

    assert!(session.update(edit(Section::Vars, "a")).is_empty());
    let message = single(session.update(Message::TimerFired)).await;
    assert!(matches!(
        &message,
        Message::Rendered {
            result: Err(BackendError::Transport(_)),
            ..
        }
    ));

    let _task = session.update(message);
    assert!(!session.dispatcher().is_in_flight());
    assert!(
        collect_events(&mut rx)
            .iter()
            .any(|e| matches!(e, SessionEvent::Error(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn test_stalled_backend_times_out() {
    let backend = MockBackend::held();
    let config = SessionConfig {
        request_timeout: Duration::from_secs(1),
        ..test_config()
    };
    let (mut session, _rx) =
        Session::new(config, backend.clone(), Arc::new(MemoryFilterStore::new()));

    assert!(session.update(edit(Section::Vars, "a")).is_empty());
    let message = single(session.update(Message::TimerFired)).await;
    assert!(matches!(
        &message,
        Message::Rendered {
            result: Err(BackendError::Timeout(d)),
            ..
        } if *d == Duration::from_secs(1)
    ));

    let _task = session.update(message);
    assert!(!session.dispatcher().is_in_flight());
}

// -----------------------------------------------------------------------------
// Drops
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_single_image_uploads_then_forces_render() {
    let backend = MockBackend::new();
    let (mut session, mut rx) = session_with(backend.clone());

    let task = session.update(command(SessionCommand::Drop(vec![image("cat.png")])));
    assert!(session.status().overlay_visible);
    let uploaded = single(task).await;
    assert!(matches!(uploaded, Message::Uploaded(Ok(()))));

    let render = single(session.update(uploaded)).await;
    assert!(ticket_of(&render).forced);
    assert!(!session.status().overlay_visible);
    assert_eq!(backend.upload_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    let events = collect_events(&mut rx);
    assert!(matches!(events[0], SessionEvent::OverlayShown));
    assert!(matches!(events[1], SessionEvent::OverlayHidden));
    assert!(matches!(events[2], SessionEvent::RenderStarted));
}

#[tokio::test]
async fn test_failed_upload_reports_and_skips_render() {
    let backend = MockBackend::new();
    backend.fail_upload(BackendError::Transport("refused".into()));
    let (mut session, mut rx) = session_with(backend.clone());

    let drop = command(SessionCommand::Drop(vec![image("a.png")]));
    let uploaded = single(session.update(drop)).await;
    assert!(session.update(uploaded).is_empty());
    assert!(!session.status().overlay_visible);
    assert_eq!(backend.renders(), 0);
    assert!(
        collect_events(&mut rx)
            .iter()
            .any(|e| matches!(e, SessionEvent::Error(msg) if msg.contains("refused")))
    );
}

#[tokio::test]
async fn test_non_image_and_empty_drops_are_ignored() {
    let backend = MockBackend::new();
    let (mut session, mut rx) = session_with(backend.clone());

    let text = DroppedFile::new("notes.txt", Some("text/plain".into()), b"hi".to_vec());
    assert!(session.update(command(SessionCommand::Drop(vec![text]))).is_empty());
    assert!(session.update(command(SessionCommand::Drop(vec![]))).is_empty());
    assert!(collect_events(&mut rx).is_empty());
}

#[tokio::test]
async fn test_batch_delivers_archive_then_forces_render() {
    let backend = MockBackend::new();
    let (mut session, mut rx) = session_with(backend.clone());

    let drop = SessionCommand::Drop(vec![image("a.png"), image("b.png"), image("c.png")]);
    let batch = single(session.update(command(drop))).await;
    let render = single(session.update(batch)).await;
    assert!(ticket_of(&render).forced);

    let archive = collect_events(&mut rx).into_iter().find_map(|e| match e {
        SessionEvent::ArchiveReady(archive) => Some(archive),
        _ => None,
    });
    let archive = archive.expect("no archive event");
    assert_eq!(archive.file_name, "batch.zip");
    assert_eq!(archive.bytes.len(), 3);
}

#[tokio::test]
async fn test_unnamed_archive_takes_configured_name() {
    let backend = MockBackend::new();
    let config = SessionConfig {
        archive_name: "renders.zip".into(),
        ..test_config()
    };
    let (mut session, mut rx) =
        Session::new(config, backend.clone(), Arc::new(MemoryFilterStore::new()));

    let drop = SessionCommand::Drop(vec![image("a.png"), image("b.png")]);
    let batch = single(session.update(command(drop))).await;
    let _task = session.update(batch);

    let archive = collect_events(&mut rx).into_iter().find_map(|e| match e {
        SessionEvent::ArchiveReady(archive) => Some(archive),
        _ => None,
    });
    assert_eq!(archive.expect("no archive event").file_name, "renders.zip");
}

#[tokio::test]
async fn test_failed_batch_still_renders() {
    let backend = MockBackend::new();
    backend.fail_batch(BackendError::Status {
        code: 400,
        body: "bad".into(),
    });
    let (mut session, mut rx) = session_with(backend.clone());

    let batch = single(session.update(command(SessionCommand::Drop(vec![
        image("a.png"),
        image("b.png"),
    ]))))
    .await;
    assert_eq!(session.update(batch).len(), 1);
    assert!(!session.status().overlay_visible);
    assert!(
        collect_events(&mut rx)
            .iter()
            .any(|e| matches!(e, SessionEvent::Error(_)))
    );
}

#[tokio::test]
async fn test_overlapping_drops_share_one_overlay() {
    let backend = MockBackend::new();
    let (mut session, mut rx) = session_with(backend.clone());

    let first = single(session.update(command(SessionCommand::Drop(vec![image("a.png")])))).await;
    let second = single(session.update(command(SessionCommand::Drop(vec![image("b.png")])))).await;

    let _ = session.update(first);
    assert!(session.status().overlay_visible);
    let _ = session.update(second);
    assert!(!session.status().overlay_visible);

    let overlay: Vec<_> = collect_events(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::OverlayShown | SessionEvent::OverlayHidden))
        .collect();
    assert_eq!(overlay.len(), 2);
}

// -----------------------------------------------------------------------------
// Filters
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_user_load_replaces_buffers_and_forces_render() {
    let backend = MockBackend::new();
    let store = MemoryFilterStore::new().with_filter("sepia", "[FILTERS]\nsepia 0.8\n");
    let (mut session, _rx) = Session::new(test_config(), backend.clone(), Arc::new(store));

    assert!(session.update(edit(Section::Vars, "keep me")).is_empty());
    let loaded = single(session.update(command(SessionCommand::LoadFilter("sepia".into())))).await;
    let render = single(session.update(loaded)).await;

    assert!(ticket_of(&render).forced);
    assert_eq!(session.buffers().get(Section::Filters), "sepia 0.8");
    assert_eq!(session.buffers().get(Section::Vars), "keep me");
}

#[tokio::test]
async fn test_user_load_of_missing_filter_reports() {
    let backend = MockBackend::new();
    let (mut session, mut rx) = session_with(backend.clone());

    let loaded = single(session.update(command(SessionCommand::LoadFilter("nope".into())))).await;
    assert!(session.update(loaded).is_empty());
    assert!(
        collect_events(&mut rx)
            .iter()
            .any(|e| matches!(e, SessionEvent::Error(msg) if msg.contains("nope")))
    );
}

#[tokio::test]
async fn test_save_writes_document_and_refreshes_list() {
    let backend = MockBackend::new();
    let store = Arc::new(MemoryFilterStore::new());
    let (mut session, mut rx) = Session::new(test_config(), backend, store.clone());

    assert!(session.update(edit(Section::Composition, "stack")).is_empty());
    let task = session.update(command(SessionCommand::SaveFilter("mine".into())));
    settle(&mut session, task).await;

    assert_eq!(store.read("mine").await.unwrap(), session.buffers().assemble());
    assert_eq!(session.filters(), ["mine".to_string()]);
    let events = collect_events(&mut rx);
    assert!(events.iter().any(|e| matches!(e, SessionEvent::FilterSaved(name) if name == "mine")));
}

#[tokio::test]
async fn test_save_requires_a_name() {
    let backend = MockBackend::new();
    let (mut session, mut rx) = session_with(backend);

    assert!(session.update(command(SessionCommand::SaveFilter("  ".into()))).is_empty());
    assert!(
        collect_events(&mut rx)
            .iter()
            .any(|e| matches!(e, SessionEvent::Error(_)))
    );
}

#[tokio::test]
async fn test_shutdown_stops_rearming() {
    let backend = MockBackend::new();
    let (mut session, _rx) = session_with(backend.clone());

    assert!(session.update(edit(Section::Vars, "a")).is_empty());
    let task = session.update(Message::TimerFired);
    assert!(session.update(command(SessionCommand::Shutdown)).is_empty());
    settle(&mut session, task).await;

    assert_eq!(session.status().phase, RenderPhase::Idle);
}

// -----------------------------------------------------------------------------
// Loop
// -----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_loop_renders_after_quiet_period() {
    let backend = MockBackend::new();
    let (session, _rx) = session_with(backend.clone());
    let handle = session.spawn();

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(backend.renders(), 1, "start render");

    handle.send(SessionCommand::Edit {
        section: Section::Filters,
        text: "blur 1".into(),
    })
    .unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(handle.remaining_seconds(), Some(10));

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(backend.renders(), 2);

    // Nothing changed since; later ticks stay quiet.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.renders(), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_loop_coalesces_rapid_edits() {
    let backend = MockBackend::new();
    let (session, _rx) = session_with(backend.clone());
    let handle = session.spawn();
    tokio::time::sleep(Duration::from_millis(1)).await;

    for text in ["a", "ab", "abc"] {
        handle.send(SessionCommand::Edit {
            section: Section::Vars,
            text: text.into(),
        })
        .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    // 5s after the last edit.
    assert_eq!(backend.renders(), 1);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(backend.renders(), 2);
    assert!(backend.documents()[1].contains("abc"));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_loop_publishes_events_and_exits() {
    let backend = MockBackend::new();
    let (session, _rx) = session_with(backend.clone());
    let handle = session.spawn();
    let mut events = handle.subscribe();

    handle.send(SessionCommand::ForceRender).unwrap();
    let mut saw_images = false;
    while let Ok(event) = events.recv().await {
        if matches!(event, SessionEvent::ImagesUpdated(_)) {
            saw_images = true;
            break;
        }
    }
    assert!(saw_images);
    assert!(handle.status().has_images);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_send_after_exit_fails() {
    let backend = MockBackend::new();
    let (session, _rx) = session_with(backend);
    let handle = session.spawn();
    let commands = handle.commands.clone();
    handle.shutdown().await;

    assert!(commands.send(SessionCommand::ForceRender).is_err());
}
