//! Downstream publishing of samples.
//!
//! The collector hands each instance's batch to a [`Publisher`] and calls
//! [`Publisher::flush`] once the cycle is complete.

use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

use crate::sample::Sample;

pub trait Publisher: Send + Sync {
    fn publish(&self, samples: Vec<Sample>) -> anyhow::Result<()>;

    /// Called at the end of every cycle.
    fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Keeps the samples of the latest completed cycle in memory.
#[derive(Default)]
pub struct SnapshotPublisher {
    pending: Mutex<Vec<Sample>>,
    latest: RwLock<Arc<Vec<Sample>>>,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples of the most recently flushed cycle.
    pub fn latest(&self) -> Arc<Vec<Sample>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Publisher for SnapshotPublisher {
    fn publish(&self, samples: Vec<Sample>) -> anyhow::Result<()> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(samples);
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        let snapshot = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        debug!("Snapshot publisher swapped in {} samples", snapshot.len());
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        Ok(())
    }
}

/// Appends samples as JSON lines to a file.
pub struct FilePublisher {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FilePublisher {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open publish file {}", path.display()))?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Publisher for FilePublisher {
    fn publish(&self, samples: Vec<Sample>) -> anyhow::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        for sample in &samples {
            serde_json::to_writer(&mut *writer, sample)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))
    }
}

/// Forwards every batch to each inner publisher.
pub struct FanoutPublisher {
    publishers: Vec<Arc<dyn Publisher>>,
}

impl FanoutPublisher {
    pub fn new(publishers: Vec<Arc<dyn Publisher>>) -> Self {
        Self { publishers }
    }
}

impl Publisher for FanoutPublisher {
    fn publish(&self, samples: Vec<Sample>) -> anyhow::Result<()> {
        let mut first_error = None;
        for publisher in &self.publishers {
            if let Err(e) = publisher.publish(samples.clone()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn flush(&self) -> anyhow::Result<()> {
        let mut first_error = None;
        for publisher in &self.publishers {
            if let Err(e) = publisher.flush() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
