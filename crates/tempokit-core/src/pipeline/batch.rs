//! Lazy per-source result stream
//!
//! A [`Batch`] pulls one source at a time from the resolver and runs the
//! operation's step on it. Per-source errors become [`Outcome::Failed`] and
//! the batch moves on; a configuration error, or too many consecutive
//! computation errors, ends it with [`Outcome::Aborted`]. Sources left over
//! after an abort are still listed, as [`Outcome::NotRun`], without being
//! read.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, PipelineError, Result};
use crate::source::{FileAudioSource, Sources};

/// What one step did with its source
pub enum Step<R> {
    Done(R),
    /// Nothing to do; the reason is reported as a skip
    Unchanged(String),
}

/// One entry of a batch's result stream
#[derive(Debug, Clone)]
pub enum Outcome<R> {
    Processed(R),
    /// No-op: the source needed no change and nothing was written
    Skipped { source: PathBuf, reason: String },
    /// The source failed; the batch continued
    Failed { source: PathBuf, error: PipelineError },
    /// The source failed and the batch stopped
    Aborted { source: PathBuf, error: PipelineError },
    /// Never attempted because the batch had already been aborted
    NotRun { source: PathBuf },
}

impl<R> Outcome<R> {
    pub fn processed(&self) -> Option<&R> {
        match self {
            Outcome::Processed(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            Outcome::Failed { error, .. } | Outcome::Aborted { error, .. } => Some(error),
            _ => None,
        }
    }
}

type StepFn<'a, R> = Box<dyn FnMut(&FileAudioSource) -> Result<Step<R>> + 'a>;

/// Lazy, single-pass sequence of [`Outcome`]s
///
/// Nothing is read or written until the batch is iterated. Dropping it
/// early stops after the source in flight.
pub struct Batch<'a, R> {
    operation: &'static str,
    sources: Sources,
    step: StepFn<'a, R>,
    failure_limit: Option<usize>,
    consecutive_failures: usize,
    state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    /// Aborted; remaining sources are listed but not read
    Draining,
    Finished,
}

impl<'a, R> Batch<'a, R> {
    pub(crate) fn new(
        operation: &'static str,
        sources: Sources,
        failure_limit: Option<usize>,
        step: impl FnMut(&FileAudioSource) -> Result<Step<R>> + 'a,
    ) -> Self {
        Self {
            operation,
            sources,
            step: Box::new(step),
            failure_limit,
            consecutive_failures: 0,
            state: State::Running,
        }
    }

    /// Drain the batch into its processed results and a summary
    pub fn run(self) -> (Vec<R>, BatchSummary) {
        let mut summary = BatchSummary::default();
        let mut results = Vec::new();
        for outcome in self {
            summary.record(&outcome);
            if let Outcome::Processed(result) = outcome {
                results.push(result);
            }
        }
        (results, summary)
    }

    fn fail(&mut self, source: PathBuf, error: PipelineError) -> Outcome<R> {
        log::error!(
            "{}: {:?} failed ({}): {}",
            self.operation,
            source,
            error.kind(),
            error
        );

        if error.kind() == ErrorKind::Configuration {
            self.state = State::Draining;
            return Outcome::Aborted { source, error };
        }

        if error.kind() == ErrorKind::Computation {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }

        if let Some(limit) = self.failure_limit {
            if self.consecutive_failures >= limit {
                log::error!(
                    "{}: aborting after {} consecutive computation failures",
                    self.operation,
                    self.consecutive_failures
                );
                self.state = State::Draining;
                return Outcome::Aborted { source, error };
            }
        }

        Outcome::Failed { source, error }
    }
}

impl<R> Iterator for Batch<'_, R> {
    type Item = Outcome<R>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Finished => return None,
            State::Draining => {
                let next = self.sources.next_path();
                if next.is_none() {
                    self.state = State::Finished;
                }
                return next.map(|path| {
                    let source = path
                        .unwrap_or_else(|e| e.path().map(Path::to_path_buf).unwrap_or_default());
                    log::warn!("{}: not running {:?}, batch aborted", self.operation, source);
                    Outcome::NotRun { source }
                });
            }
            State::Running => {}
        }

        let source = match self.sources.next() {
            None => {
                self.state = State::Finished;
                return None;
            }
            Some(Ok(source)) => source,
            Some(Err(error)) => {
                let path = error.path().map(Path::to_path_buf).unwrap_or_default();
                return Some(self.fail(path, error));
            }
        };

        let path = source.path().to_path_buf();
        log::info!("{}: processing {:?}", self.operation, path);

        let outcome = match (self.step)(&source) {
            Ok(Step::Done(result)) => {
                self.consecutive_failures = 0;
                Outcome::Processed(result)
            }
            Ok(Step::Unchanged(reason)) => {
                self.consecutive_failures = 0;
                log::info!("{}: skipping {:?}, {}", self.operation, path, reason);
                Outcome::Skipped { source: path, reason }
            }
            Err(error) => self.fail(path, error),
        };
        Some(outcome)
    }
}

/// Accounting of every source a batch saw
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failures: Vec<(PathBuf, PipelineError)>,
    /// Sources left unattempted after an abort
    pub not_run: Vec<PathBuf>,
    /// Set when the batch stopped early
    pub aborted: bool,
}

impl BatchSummary {
    pub fn record<R>(&mut self, outcome: &Outcome<R>) {
        match outcome {
            Outcome::Processed(_) => self.processed += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { source, error } => self.failures.push((source.clone(), error.clone())),
            Outcome::Aborted { source, error } => {
                self.failures.push((source.clone(), error.clone()));
                self.aborted = true;
            }
            Outcome::NotRun { source } => self.not_run.push(source.clone()),
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Every source seen, whatever happened to it
    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed() + self.not_run.len()
    }

    pub fn merge(&mut self, other: BatchSummary) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
        self.not_run.extend(other.not_run);
        self.aborted |= other.aborted;
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {}, skipped (no-op) {}, failed {}",
            self.processed,
            self.skipped,
            self.failed()
        )?;
        if !self.not_run.is_empty() {
            write!(f, ", not run {}", self.not_run.len())?;
        }
        if self.aborted {
            write!(f, " (aborted)")?;
        }
        Ok(())
    }
}
