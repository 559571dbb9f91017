//! Per-job output sinks.
//!
//! Job stdout/stderr is an external concern for the queue core: the
//! executor only needs an append-only byte stream per job id. The
//! default sink writes `job_<id>.log` files under a configured
//! directory.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::core::Utc;

/// An append-only output stream keyed by job id.
///
/// `open_append` hands out a raw file handle so the executor can plug it
/// straight into the child's stdout/stderr without pumping bytes through
/// the runtime.
pub trait LogSink: Send + Sync {
    fn open_append(&self, job_id: &str) -> io::Result<File>;

    /// Append a single timestamped marker line for the job.
    fn append_line(&self, job_id: &str, text: &str) -> io::Result<()> {
        let mut file = self.open_append(job_id)?;
        writeln!(file, "[{}] {}", Utc::now().to_rfc3339(), text)
    }
}

/// Sink writing `job_<id>.log` files into a directory.
#[derive(Debug, Clone)]
pub struct FileLogSink {
    dir: PathBuf,
}

impl FileLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the log file for `job_id`.
    pub fn path_for(&self, job_id: &str) -> PathBuf {
        // Job ids are opaque strings; keep them from escaping the log dir.
        let safe: String = job_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("job_{safe}.log"))
    }
}

impl LogSink for FileLogSink {
    fn open_append(&self, job_id: &str) -> io::Result<File> {
        std::fs::create_dir_all(&self.dir)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(job_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileLogSink::new(dir.path());

        sink.append_line("a", "first").unwrap();
        sink.append_line("a", "second").unwrap();

        let content = std::fs::read_to_string(sink.path_for("a")).unwrap();
        assert!(content.contains("first"));
        assert!(content.contains("second"));
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn hostile_ids_stay_inside_the_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileLogSink::new(dir.path());

        let path = sink.path_for("../../etc/passwd");
        assert!(path.starts_with(dir.path()));
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "job_.._.._etc_passwd.log"
        );
    }

    #[test]
    fn creates_directory_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileLogSink::new(dir.path().join("nested/logs"));

        sink.append_line("x", "hello").unwrap();
        assert!(sink.path_for("x").exists());
    }
}
