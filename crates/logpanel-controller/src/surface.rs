use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use logpanel_types::{Push, SourceKind};

/// Presentation surface that receives pushes from one controller
pub trait Surface: Send + Sync {
    fn post(&self, push: Push);
}

/// Forwards pushes, tagged with their source, into a channel
pub struct ChannelSurface {
    kind: SourceKind,
    tx: mpsc::UnboundedSender<(SourceKind, Push)>,
}

impl ChannelSurface {
    pub fn new(kind: SourceKind, tx: mpsc::UnboundedSender<(SourceKind, Push)>) -> Self {
        Self { kind, tx }
    }
}

impl Surface for ChannelSurface {
    fn post(&self, push: Push) {
        if self.tx.send((self.kind, push)).is_err() {
            tracing::debug!(source = %self.kind, "Surface channel closed, dropping push");
        }
    }
}

/// Keeps every push in memory
#[derive(Clone, Default)]
pub struct MemorySurface {
    pushes: Arc<Mutex<Vec<Push>>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything received so far
    pub fn take(&self) -> Vec<Push> {
        std::mem::take(&mut *self.pushes.lock())
    }

    pub fn len(&self) -> usize {
        self.pushes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pushes.lock().is_empty()
    }
}

impl Surface for MemorySurface {
    fn post(&self, push: Push) {
        self.pushes.lock().push(push);
    }
}
