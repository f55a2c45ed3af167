//! `gfxs watch` - live rendering of a script file.
//!
//! The script file stands in for the four editor buffers: every save is
//! diffed section by section and the changed sections are sent to the
//! session as edits, so the session's debounce decides when to render.
//! Stdin takes the commands a user would otherwise click.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use gfxs_api::{Section, SectionBuffers, SessionCommand, SessionEvent};
use gfxs_kernel::{Session, SessionHandle};
use gfxs_pixels::{DisplaySize, ImageSlot, PixelSampler};
use notify::{RecursiveMode, Watcher};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use crate::cli::{parse_point, parse_size};
use crate::commands::{read_drop, read_script, write_archive, write_pair};
use crate::config::GfxsConfig;

const HELP: &str = "\
commands:
  r            render now
  l NAME       load a stored filter
  s NAME       store the script as a filter
  ls           list stored filters
  d FILE...    drop image files (one: upload, several: batch)
  p X,Y [WxH]  show the processed pixel under a display position
  q            quit";

/// A line typed on stdin.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Render,
    Load(String),
    Save(String),
    List,
    Drop(Vec<PathBuf>),
    Sample {
        at: (f64, f64),
        display: Option<DisplaySize>,
    },
    Help,
    Quit,
}

/// Parse one stdin line. Blank lines are `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ReplCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match (head, rest.as_slice()) {
        ("r", []) => ReplCommand::Render,
        ("l", [name]) => ReplCommand::Load(name.to_string()),
        ("s", [name]) => ReplCommand::Save(name.to_string()),
        ("ls", []) => ReplCommand::List,
        ("d", files) if !files.is_empty() => {
            ReplCommand::Drop(files.iter().map(PathBuf::from).collect())
        }
        ("p", [at]) => ReplCommand::Sample {
            at: parse_point(at)?,
            display: None,
        },
        ("p", [at, size]) => ReplCommand::Sample {
            at: parse_point(at)?,
            display: Some(parse_size(size)?),
        },
        ("h" | "help" | "?", []) => ReplCommand::Help,
        ("q" | "quit", []) => ReplCommand::Quit,
        _ => return Err(format!("unknown command '{}' (h for help)", line.trim())),
    };
    Ok(Some(command))
}

/// Edits that turn `current` into `next`.
pub fn edits(current: &SectionBuffers, next: &SectionBuffers) -> Vec<SessionCommand> {
    Section::ALL
        .into_iter()
        .filter(|&section| current.get(section) != next.get(section))
        .map(|section| SessionCommand::Edit {
            section,
            text: next.get(section).to_string(),
        })
        .collect()
}

struct Watch {
    handle: SessionHandle,
    script: PathBuf,
    out: PathBuf,
    archive_name: String,
    /// Buffers as last sent to, or received from, the session.
    current: SectionBuffers,
    sampler: PixelSampler,
    last_countdown: Option<u64>,
}

pub async fn run(config: &GfxsConfig, script: PathBuf, out: PathBuf) -> Result<()> {
    let current = read_script(&script)?;
    let backend = config.backend()?;
    let store = config.filter_store(backend.clone());

    let mut session_config = config.session.clone();
    if current != SectionBuffers::default() {
        // The script is the source of truth once it has content.
        session_config.initial_filter = None;
    }

    let (session, events) = Session::new(session_config, backend, store);
    let handle = session.with_buffers(current.clone()).spawn();

    let (changes_tx, changes) = mpsc::unbounded_channel();
    let _watcher = watch_file(&script, changes_tx)?;

    tracing::info!("watching {} (h for help)", script.display());

    let watch = Watch {
        handle,
        script,
        out,
        archive_name: config.session.archive_name.clone(),
        current,
        sampler: PixelSampler::new(),
        last_countdown: None,
    };
    watch.run(events, changes).await
}

fn watch_file(
    script: &Path,
    changes: mpsc::UnboundedSender<()>,
) -> Result<notify::RecommendedWatcher> {
    let file_name = script
        .file_name()
        .map(|n| n.to_os_string())
        .context("script path has no file name")?;
    let dir = match script.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                let relevant = (event.kind.is_modify() || event.kind.is_create())
                    && event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                if relevant {
                    let _ = changes.send(());
                }
            }
            Err(e) => tracing::warn!("file watch error: {}", e),
        }
    })
    .context("create file watcher")?;

    // Watch the directory: editors often replace the file on save.
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("watch '{}'", dir.display()))?;
    Ok(watcher)
}

impl Watch {
    async fn run(
        mut self,
        mut events: broadcast::Receiver<SessionEvent>,
        mut changes: mpsc::UnboundedReceiver<()>,
    ) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                Some(()) = changes.recv() => self.reload(),
                line = lines.next_line() => match line {
                    Ok(Some(line)) => match parse_line(&line) {
                        Ok(Some(ReplCommand::Quit)) => break,
                        Ok(Some(command)) => self.command(command),
                        Ok(None) => {}
                        Err(msg) => eprintln!("{msg}"),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("stdin closed: {}", e);
                        break;
                    }
                },
                event = events.recv() => match event {
                    Ok(event) => self.event(event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("missed {} session events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = ticker.tick() => self.countdown(),
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        self.handle.shutdown().await;
        Ok(())
    }

    fn reload(&mut self) {
        let next = match read_script(&self.script) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!("{:#}", e);
                return;
            }
        };
        let edits = edits(&self.current, &next);
        if edits.is_empty() {
            return;
        }
        tracing::debug!("{} section(s) changed", edits.len());
        self.current = next;
        for edit in edits {
            self.send(edit);
        }
    }

    fn command(&mut self, command: ReplCommand) {
        match command {
            ReplCommand::Render => self.send(SessionCommand::ForceRender),
            ReplCommand::Load(name) => self.send(SessionCommand::LoadFilter(name)),
            ReplCommand::Save(name) => self.send(SessionCommand::SaveFilter(name)),
            ReplCommand::List => self.send(SessionCommand::RefreshFilters),
            ReplCommand::Drop(paths) => {
                let files = paths
                    .iter()
                    .map(|p| read_drop(p))
                    .collect::<Result<Vec<_>>>();
                match files {
                    Ok(files) => self.send(SessionCommand::Drop(files)),
                    Err(e) => eprintln!("{e:#}"),
                }
            }
            ReplCommand::Sample { at, display } => self.sample(at, display),
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => {}
        }
    }

    fn sample(&self, at: (f64, f64), display: Option<DisplaySize>) {
        let slot = ImageSlot::Processed;
        let Some((width, height)) = self.sampler.natural_size(slot) else {
            eprintln!("no processed image yet");
            return;
        };
        let display = display.unwrap_or(DisplaySize::new(width, height));
        match self.sampler.sample(slot, at.0, at.1, display) {
            Some(pixel) => println!("{pixel}"),
            None => eprintln!("({}, {}) is outside the image", at.0, at.1),
        }
    }

    fn send(&self, command: SessionCommand) {
        if let Err(e) = self.handle.send(command) {
            tracing::error!("{}", e);
        }
    }

    async fn event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::RenderStarted => tracing::info!("rendering"),
            SessionEvent::RenderFinished => tracing::debug!("render finished"),
            SessionEvent::ImagesUpdated(pair) => {
                if let Err(e) = write_pair(&self.out, &pair).await {
                    tracing::error!("{:#}", e);
                }
                if let Err(e) = self.sampler.capture_pair(&pair) {
                    tracing::warn!("pixel readout unavailable: {}", e);
                }
            }
            SessionEvent::Notice(msg) => println!("{msg}"),
            SessionEvent::Error(msg) => eprintln!("error: {msg}"),
            SessionEvent::OverlayShown => tracing::info!("uploading"),
            SessionEvent::OverlayHidden => tracing::debug!("upload finished"),
            SessionEvent::ArchiveReady(archive) => {
                if let Err(e) = write_archive(&self.out, &archive, &self.archive_name).await {
                    tracing::error!("{:#}", e);
                }
            }
            SessionEvent::BufferReplaced { section, text } => {
                self.current.set(section, text);
                // Keep the file in step so the next save diffs correctly.
                if let Err(e) = tokio::fs::write(&self.script, self.current.assemble()).await {
                    tracing::error!("failed to update {}: {}", self.script.display(), e);
                }
            }
            SessionEvent::FiltersListed(names) => {
                if names.is_empty() {
                    println!("no stored filters");
                } else {
                    println!("filters: {}", names.join(", "));
                }
            }
            SessionEvent::FilterSaved(name) => println!("saved filter {name}"),
        }
    }

    fn countdown(&mut self) {
        let remaining = self.handle.remaining_seconds();
        if remaining != self.last_countdown {
            if let Some(secs) = remaining {
                tracing::debug!("next render in {}s", secs);
            }
            self.last_countdown = remaining;
        }
    }
}
