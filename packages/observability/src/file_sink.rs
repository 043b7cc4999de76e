//! Append-only JSONL file sink.
//!
//! Each log line is flushed as it is written so `tail -f` sees it
//! immediately and concurrent portal processes never interleave half lines.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Default log file location: `~/.ministry-media/logs/portal.jsonl`.
///
/// Falls back to the system temp directory when no home directory exists
/// (containers, CI).
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".ministry-media")
        .join("logs")
        .join("portal.jsonl")
}

/// Line-flushed file writer shared by every event the JSON layer emits.
#[derive(Clone)]
pub struct FileLogWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl FileLogWriter {
    /// Open `path` in append mode, creating parent directories.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for FileLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for FileLogWriter {
    type Writer = FileLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
