//! Metric sinks: a JSON lines file, one-line summaries on stderr, and
//! in-process channels.

use std::{
    fs::{File, OpenOptions}, io::{self, LineWriter, Write}, path::{Path, PathBuf}, sync::{Mutex, PoisonError, mpsc::Sender}
};

use crate::recorder::{MetricExporter, MetricRecord};

/// Appends each record to a file as one JSON object per line.
pub struct JsonlExporter {
    path: PathBuf,
    file: Mutex<LineWriter<File>>,
}

impl JsonlExporter {
    /// Open `path` for appending, creating it if needed.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(LineWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricExporter for JsonlExporter {
    fn export(&self, record: &MetricRecord) {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let written = serde_json::to_writer(&mut *file, record)
            .map_err(io::Error::from)
            .and_then(|()| file.write_all(b"\n"));
        if let Err(error) = written {
            tracing::error!(target: "instrument", path = %self.path.display(), %error, "failed to append metric record");
        }
    }
}

/// Prints a one-line summary of each record to stderr, leaving stdout to the program.
#[derive(Debug, Default)]
pub struct ConsoleExporter;

impl MetricExporter for ConsoleExporter {
    fn export(&self, record: &MetricRecord) {
        let _ = writeln!(
            io::stderr().lock(),
            "[metric {}] {}",
            record.recorded_at.format("%H:%M:%S%.3f"),
            record.event
        );
    }
}

/// Forwards a copy of each record; a closed receiver is ignored.
impl MetricExporter for Sender<MetricRecord> {
    fn export(&self, record: &MetricRecord) {
        let _ = self.send(record.clone());
    }
}
