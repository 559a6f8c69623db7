use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use logpanel_logs::{FileWatcher, LogBuffer};
use logpanel_types::{Request, SourceKind, WatchMode};

use crate::config::Config;
use crate::controller::LogSourceController;
use crate::surface::Surface;

/// Inputs serialized through a source's event loop
pub enum SourceEvent {
    FileChanged(PathBuf),
    Request(Request),
    Attach(Arc<dyn Surface>),
    Detach,
}

/// Timing for one running source
#[derive(Clone, Copy, Debug)]
pub struct RunnerOptions {
    /// Flush delay after the first pending line, and search refresh period
    pub refresh_interval: Duration,
    pub watch_mode: WatchMode,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_millis(200),
            watch_mode: WatchMode::Native,
        }
    }
}

impl From<&Config> for RunnerOptions {
    fn from(config: &Config) -> Self {
        Self {
            refresh_interval: config.refresh_interval(),
            watch_mode: config.watch_mode,
        }
    }
}

/// Handle to a running source task.
///
/// Dropping the handle stops the task; [`dispose`](Self::dispose) also waits
/// for it to finish.
pub struct SourceHandle {
    kind: SourceKind,
    events: mpsc::UnboundedSender<SourceEvent>,
    buffer: LogBuffer,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SourceHandle {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Read-only access to the source's buffer
    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    /// Queue a request; returns false once the source has stopped
    pub fn send(&self, request: Request) -> bool {
        self.events.send(SourceEvent::Request(request)).is_ok()
    }

    pub fn attach(&self, surface: Arc<dyn Surface>) -> bool {
        self.events.send(SourceEvent::Attach(surface)).is_ok()
    }

    pub fn detach(&self) -> bool {
        self.events.send(SourceEvent::Detach).is_ok()
    }

    /// Report a change to one of the source's files
    pub fn notify_change(&self, path: PathBuf) -> bool {
        self.events.send(SourceEvent::FileChanged(path)).is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the task and wait until timers and watchers are released
    pub async fn dispose(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(source = %self.kind, error = %e, "Source task failed");
            }
        }
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run `controller` on its own task.
///
/// Must be called from within a tokio runtime. In native mode the file
/// watcher feeds change events into the loop; if it cannot start, or in poll
/// mode, every file is checked once per refresh interval instead.
pub fn spawn_source(controller: LogSourceController, options: RunnerOptions) -> SourceHandle {
    let kind = controller.kind();
    let buffer = controller.buffer().clone();
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let watcher = match options.watch_mode {
        WatchMode::Native => {
            let events = tx.clone();
            let started = FileWatcher::start(controller.paths(), move |path| {
                let _ = events.send(SourceEvent::FileChanged(path));
            });
            match started {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(
                        source = %kind,
                        error = %e,
                        "File watcher unavailable, polling instead"
                    );
                    None
                }
            }
        }
        WatchMode::Poll => None,
    };

    let task = tokio::spawn(run_source(
        controller,
        rx,
        cancel.clone(),
        watcher,
        options.refresh_interval,
    ));

    SourceHandle {
        kind,
        events: tx,
        buffer,
        cancel,
        task: Some(task),
    }
}

async fn run_source(
    mut controller: LogSourceController,
    mut events: mpsc::UnboundedReceiver<SourceEvent>,
    cancel: CancellationToken,
    watcher: Option<FileWatcher>,
    interval: Duration,
) {
    let kind = controller.kind();
    let poll_files = watcher.is_none();
    // Held for the lifetime of the loop; dropping it releases the registrations
    let _watcher = watcher;

    let flush_timer = tokio::time::sleep(interval);
    tokio::pin!(flush_timer);
    let mut flush_armed = false;

    let mut refresh = tokio::time::interval(interval);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut file_poll = tokio::time::interval(interval);
    file_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(source = %kind, poll_files, "Source loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SourceEvent::FileChanged(path) => controller.on_file_change(&path),
                    SourceEvent::Request(request) => {
                        let restarts_search = matches!(request, Request::SearchLog { .. });
                        controller.handle(request);
                        if restarts_search {
                            refresh.reset();
                        }
                    }
                    SourceEvent::Attach(surface) => controller.attach(surface),
                    SourceEvent::Detach => controller.detach(),
                }
            }

            () = &mut flush_timer, if flush_armed => {
                flush_armed = false;
                controller.flush();
            }

            _ = refresh.tick(), if controller.search_active() => {
                controller.refresh_search();
            }

            _ = file_poll.tick(), if poll_files => {
                controller.poll_files();
            }
        }

        // One timer per burst: the first pending line arms it, later lines ride along
        if !flush_armed && controller.has_pending() {
            flush_timer.as_mut().reset(Instant::now() + interval);
            flush_armed = true;
        }
    }

    tracing::debug!(source = %kind, "Source loop stopped");
}
