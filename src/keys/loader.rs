//! Key file loader
//!
//! Reads a whole key file into a private staging list and then either
//! replaces the live key set with it or throws it away. Any malformed entry
//! rejects the file: the previously active keys stay in place.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::ops::ControlFlow;
use std::path::Path;
use tracing::{debug, error, info};
use zeroize::Zeroizing;

use super::budget::{ErrorBudget, DEFAULT_ABORT_LIMIT, DEFAULT_LOG_LIMIT};
use super::entry::{EntryBuilder, ErrorKind, LineOutcome};
use super::store::{KeyId, KeyRecord, KeyStore, MAX_KEY_ID};
use crate::metrics;

/// Longest line considered; the rest of a longer line is discarded
pub const MAX_LINE_LEN: usize = 511;

const READ_CHUNK: usize = 4096;

/// Tunables for one loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderLimits {
    pub log_limit: u32,
    pub abort_limit: u32,
    pub max_key_id: KeyId,
}

impl Default for LoaderLimits {
    fn default() -> Self {
        Self {
            log_limit: DEFAULT_LOG_LIMIT,
            abort_limit: DEFAULT_ABORT_LIMIT,
            max_key_id: MAX_KEY_ID,
        }
    }
}

/// Why a load left the key store unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The file could not be opened or read
    FileUnreadable { path: String, message: String },
    /// The scan stopped early after exceeding the abort limit
    TooManyErrors { errors: u32 },
    /// The scan completed but found malformed entries
    RejectedEntries { errors: u32 },
}

impl AbortReason {
    /// Error category for the two hard failures
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AbortReason::FileUnreadable { .. } => Some(ErrorKind::FileUnreadable),
            AbortReason::TooManyErrors { .. } => Some(ErrorKind::TooManyErrors),
            AbortReason::RejectedEntries { .. } => None,
        }
    }

    fn metric_label(&self) -> &'static str {
        match self {
            AbortReason::FileUnreadable { .. } => "unreadable",
            AbortReason::TooManyErrors { .. } => "too_many_errors",
            AbortReason::RejectedEntries { .. } => "rejected",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::FileUnreadable { path, message } => {
                write!(f, "file '{}' unreadable: {}", path, message)
            }
            AbortReason::TooManyErrors { errors } => {
                write!(f, "{} errors (emergency break)", errors)
            }
            AbortReason::RejectedEntries { errors } => write!(f, "{} error(s)", errors),
        }
    }
}

/// Result of one load attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub committed: bool,
    /// Entries that passed validation, whether or not they were installed
    pub accepted_count: usize,
    /// Malformed entries and access-list segments seen
    pub rejected_count: u32,
    pub abort_reason: Option<AbortReason>,
    /// Lines read before the scan ended
    pub lines_scanned: usize,
    /// Generation of the live key set after the attempt
    pub generation: u64,
}

impl LoadOutcome {
    fn aborted(reason: AbortReason, scan: &Scan, generation: u64) -> Self {
        Self {
            committed: false,
            accepted_count: scan.staged.len(),
            rejected_count: scan.budget.count(),
            abort_reason: Some(reason),
            lines_scanned: scan.lines,
            generation,
        }
    }
}

/// Loads key files into a [`KeyStore`]
#[derive(Debug, Clone, Copy)]
pub struct KeyLoader<'a> {
    store: &'a KeyStore,
    limits: LoaderLimits,
}

/// Load `path` into the process-wide key store with default limits
pub fn load_keys<P: AsRef<Path>>(path: P) -> LoadOutcome {
    KeyLoader::new(KeyStore::global()).load(path)
}

impl<'a> KeyLoader<'a> {
    pub fn new(store: &'a KeyStore) -> Self {
        Self::with_limits(store, LoaderLimits::default())
    }

    pub fn with_limits(store: &'a KeyStore, limits: LoaderLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> LoaderLimits {
        self.limits
    }

    /// Read `path` and replace the store contents if it is entirely valid
    pub fn load<P: AsRef<Path>>(&self, path: P) -> LoadOutcome {
        let path_str = path.as_ref().display().to_string();
        let _span = crate::logging::load_span(&path_str).entered();

        let session = self.store.begin_load();
        let file = match File::open(path.as_ref()) {
            Ok(file) => file,
            Err(e) => {
                error!("authreadkeys: file '{}': {}", path_str, e);
                let reason = AbortReason::FileUnreadable {
                    path: path_str,
                    message: e.to_string(),
                };
                metrics::record_key_load(reason.metric_label(), 0);
                let generation = session.current().generation();
                return LoadOutcome::aborted(reason, &Scan::new(&self.limits), generation);
            }
        };

        self.finish(session, &path_str, file)
    }

    /// Like [`KeyLoader::load`], reading from an already open source
    pub fn load_from_reader<R: Read>(&self, name: &str, reader: R) -> LoadOutcome {
        let _span = crate::logging::load_span(name).entered();
        let session = self.store.begin_load();
        self.finish(session, name, reader)
    }

    fn finish<R: Read>(
        &self,
        session: super::store::LoadSession<'_>,
        name: &str,
        reader: R,
    ) -> LoadOutcome {
        let mut scan = Scan::new(&self.limits);
        let read_result = scan.run(name, reader, EntryBuilder::new(self.limits.max_key_id));

        let reason = match read_result {
            Err(e) => {
                error!("authreadkeys: file '{}': {}", name, e);
                Some(AbortReason::FileUnreadable {
                    path: name.to_string(),
                    message: e.to_string(),
                })
            }
            Ok(()) if scan.budget.is_exhausted() => {
                error!(
                    "authreadkeys: rejecting file '{}' after {} errors (emergency break)",
                    name,
                    scan.budget.count()
                );
                Some(AbortReason::TooManyErrors {
                    errors: scan.budget.count(),
                })
            }
            Ok(()) if scan.budget.count() > 0 => {
                error!(
                    "authreadkeys: rejecting file '{}' after {} error(s)",
                    name,
                    scan.budget.count()
                );
                Some(AbortReason::RejectedEntries {
                    errors: scan.budget.count(),
                })
            }
            Ok(()) => None,
        };

        if let Some(reason) = reason {
            let outcome = LoadOutcome::aborted(reason, &scan, session.current().generation());
            if let Some(reason) = &outcome.abort_reason {
                metrics::record_key_load(reason.metric_label(), scan.budget.count());
            }
            debug!(
                suppressed = scan.budget.suppressed(),
                lines = scan.lines,
                "Key file rejected, keeping previous keys"
            );
            session.abort(scan.staged);
            return outcome;
        }

        let accepted_count = scan.staged.len();
        let lines_scanned = scan.lines;
        let summary = session.commit(scan.staged);
        metrics::record_key_load("committed", 0);
        metrics::set_active_keys(summary.installed);
        info!(
            key_file = %name,
            accepted = accepted_count,
            installed = summary.installed,
            duplicates = summary.duplicates,
            generation = summary.generation,
            "Key file loaded"
        );

        LoadOutcome {
            committed: true,
            accepted_count,
            rejected_count: 0,
            abort_reason: None,
            lines_scanned,
            generation: summary.generation,
        }
    }
}

/// State of one pass over a key file
struct Scan {
    staged: Vec<KeyRecord>,
    budget: ErrorBudget,
    lines: usize,
}

impl Scan {
    fn new(limits: &LoaderLimits) -> Self {
        Self {
            staged: Vec::new(),
            budget: ErrorBudget::new(limits.log_limit, limits.abort_limit),
            lines: 0,
        }
    }

    fn run<R: Read>(&mut self, name: &str, reader: R, builder: EntryBuilder) -> io::Result<()> {
        let mut lines = LineReader::new(reader);
        let mut line = Zeroizing::new(Vec::with_capacity(MAX_LINE_LEN));

        while !self.budget.is_exhausted() {
            if !lines.next_line(&mut line)? {
                break;
            }
            self.lines += 1;

            let budget = &mut self.budget;
            let outcome = builder.parse_line(&line, |err| {
                if budget.record(name, &err) {
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            });

            match outcome {
                LineOutcome::Empty => {}
                LineOutcome::Entry(record) => {
                    debug!(key_id = record.key_id(), algorithm = %record.algorithm(), "Staged key");
                    self.staged.push(record);
                }
                LineOutcome::Rejected(err) => {
                    self.budget.record(name, &err);
                }
            }
        }

        Ok(())
    }
}

/// Line reader whose buffers are wiped when dropped
///
/// Lines longer than [`MAX_LINE_LEN`] are cut; the excess is skipped.
struct LineReader<R> {
    inner: R,
    buf: Zeroizing<Vec<u8>>,
    start: usize,
    end: usize,
    eof: bool,
}

impl<R: Read> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Zeroizing::new(vec![0; READ_CHUNK]),
            start: 0,
            end: 0,
            eof: false,
        }
    }

    /// Fill `line` with the next line, newline included; false at end of input
    fn next_line(&mut self, line: &mut Vec<u8>) -> io::Result<bool> {
        line.clear();
        let mut seen = false;

        loop {
            if self.start == self.end {
                if self.eof {
                    return Ok(seen);
                }
                let n = match self.inner.read(&mut self.buf[..]) {
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                };
                if n == 0 {
                    self.eof = true;
                    return Ok(seen);
                }
                self.start = 0;
                self.end = n;
            }

            seen = true;
            let available = &self.buf[self.start..self.end];
            let (chunk, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (&available[..=i], true),
                None => (available, false),
            };

            let room = MAX_LINE_LEN.saturating_sub(line.len());
            line.extend_from_slice(&chunk[..chunk.len().min(room)]);
            self.start += chunk.len();

            if complete {
                return Ok(true);
            }
        }
    }
}
