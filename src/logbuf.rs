// src/logbuf.rs

//! Bounded per-project log buffers.
//!
//! Each project keeps three append-only streams (stdout / log / stderr) of
//! timestamped entries, consumed by both local tracing output and the
//! dashboard snapshots. Streams are FIFO-bounded so memory stays flat under
//! long watch sessions.

use std::collections::VecDeque;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::pipeline::stage::Stage;

/// Per-stream entry capacity, shared by all projects.
pub const LOG_CAPACITY: usize = 500;

/// Which of the three streams an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stdlog,
    Stderr,
}

impl StreamKind {
    pub fn label(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stdlog => "stdlog",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// One captured line or status record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub text: String,

    /// Source path the entry relates to (triggering file or workdir).
    #[serde(default)]
    pub path: String,

    /// Pipeline stage that produced the entry, if any.
    #[serde(default)]
    pub stage: Option<Stage>,

    pub stream: StreamKind,

    /// Compiler-style diagnostics extracted from the text.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl LogEntry {
    /// Entry for a captured output line. stderr lines get diagnostics
    /// extraction applied.
    pub fn line(stream: StreamKind, stage: Option<Stage>, text: impl Into<String>) -> Self {
        let text = text.into();
        let errors = if stream == StreamKind::Stderr {
            extract_errors(&text)
        } else {
            Vec::new()
        };
        Self {
            time: Utc::now(),
            text,
            path: String::new(),
            stage,
            stream,
            errors,
        }
    }

    /// Status record on the log stream (stage started/finished/skipped).
    pub fn status(stage: Option<Stage>, text: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            text: text.into(),
            path: String::new(),
            stage,
            stream: StreamKind::Stdlog,
            errors: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

/// Bounded three-stream buffer. Appends are exclusive to the owning
/// coordinator; snapshot reads clone consistent state under the caller's
/// lock.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    std_out: VecDeque<LogEntry>,
    std_log: VecDeque<LogEntry>,
    std_err: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            std_out: VecDeque::new(),
            std_log: VecDeque::new(),
            std_err: VecDeque::new(),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest entry of that stream when the
    /// stream is at capacity.
    pub fn append(&mut self, entry: LogEntry) {
        let stream = match entry.stream {
            StreamKind::Stdout => &mut self.std_out,
            StreamKind::Stdlog => &mut self.std_log,
            StreamKind::Stderr => &mut self.std_err,
        };
        if stream.len() == self.capacity {
            stream.pop_front();
        }
        stream.push_back(entry);
    }

    pub fn len(&self, stream: StreamKind) -> usize {
        match stream {
            StreamKind::Stdout => self.std_out.len(),
            StreamKind::Stdlog => self.std_log.len(),
            StreamKind::Stderr => self.std_err.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.std_out.is_empty() && self.std_log.is_empty() && self.std_err.is_empty()
    }

    /// Clone the current contents for serialization.
    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            std_out: self.std_out.iter().cloned().collect(),
            std_log: self.std_log.iter().cloned().collect(),
            std_err: self.std_err.iter().cloned().collect(),
        }
    }
}

/// Wire form of a log buffer, embedded in dashboard snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BufferSnapshot {
    #[serde(rename = "stdOut")]
    pub std_out: Vec<LogEntry>,
    #[serde(rename = "stdLog")]
    pub std_log: Vec<LogEntry>,
    #[serde(rename = "stdErr")]
    pub std_err: Vec<LogEntry>,
}

/// Extract `file:line[:col]: message` diagnostics from a line of tool
/// output. Returns one formatted diagnostic per match (at most one per line
/// for the compilers this targets).
pub fn extract_errors(text: &str) -> Vec<String> {
    static DIAG: OnceLock<Regex> = OnceLock::new();
    let re = DIAG.get_or_init(|| {
        Regex::new(r"^\s*([^\s:]+\.[A-Za-z0-9_]+):(\d+)(?::(\d+))?:\s*(.+)$")
            .expect("diagnostic regex is valid")
    });

    re.captures(text)
        .map(|caps| {
            let file = &caps[1];
            let line = &caps[2];
            let message = caps[4].trim();
            match caps.get(3) {
                Some(col) => format!("{file}:{line}:{}: {message}", col.as_str()),
                None => format!("{file}:{line}: {message}"),
            }
        })
        .into_iter()
        .collect()
}
