use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Plain-text copy of the messages a command emits, next to its outputs.
pub struct RunLog {
    file: Option<File>,
}

impl RunLog {
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(File::create(p).with_context(|| format!("create {}", p.display()))?),
            None => None,
        };
        Ok(Self { file })
    }

    pub fn line(&mut self, message: &str) -> Result<()> {
        info!("{message}");
        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{message}")?;
        }
        Ok(())
    }

    pub fn warn(&mut self, message: &str) -> Result<()> {
        warn!("{message}");
        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{message}")?;
        }
        Ok(())
    }
}

/// Shared completion counter for long loops that run across threads.
#[derive(Debug)]
pub struct Progress {
    label: &'static str,
    total: usize,
    done: AtomicUsize,
}

impl Progress {
    pub fn new(label: &'static str, total: usize) -> Self {
        Self {
            label,
            total,
            done: AtomicUsize::new(0),
        }
    }

    /// Records one finished unit and logs the running count.
    pub fn tick(&self) -> usize {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        info!("{}: {done}/{} done", self.label, self.total);
        done
    }
}
