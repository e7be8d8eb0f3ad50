//! Source enumeration from a file or directory path

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::FileAudioSource;
use crate::error::{PipelineError, Result};
use crate::types::FormatFilter;

/// Enumerates audio sources under a path
///
/// A file path yields that one file. A directory yields its immediate
/// entries (or the whole tree when `recursive`), skipping hidden entries,
/// sub-directories and files the [`FormatFilter`] rejects.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceResolver {
    filter: FormatFilter,
    recursive: bool,
}

impl SourceResolver {
    pub fn new(filter: FormatFilter) -> Self {
        Self {
            filter,
            recursive: false,
        }
    }

    /// Descend into sub-directories
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Start enumerating `path`
    ///
    /// Only the existence check happens here. Each call re-scans the
    /// filesystem lazily as the returned iterator is pulled.
    ///
    /// # Errors
    ///
    /// `SourceNotFound` if `path` doesn't exist.
    pub fn resolve(&self, path: &Path) -> Result<Sources> {
        if !path.exists() {
            return Err(PipelineError::SourceNotFound(path.to_path_buf()));
        }

        if !path.is_dir() {
            log::debug!("resolve: single file {:?}", path);
            return Ok(Sources {
                inner: SourcesInner::Single(Some(path.to_path_buf())),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        log::info!(
            "resolve: scanning {:?} (filter: {}, recursive: {})",
            path,
            self.filter,
            self.recursive
        );
        let walker = WalkDir::new(path)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter();

        Ok(Sources {
            inner: SourcesInner::Directory {
                walker,
                filter: self.filter,
            },
        })
    }
}

/// Lazy, single-pass sequence of sources produced by [`SourceResolver::resolve`]
///
/// Items are per-source results: a file that can't be ingested yields an
/// `Err` without ending the sequence.
pub struct Sources {
    inner: SourcesInner,
}

enum SourcesInner {
    Single(Option<PathBuf>),
    Directory {
        walker: walkdir::IntoIter,
        filter: FormatFilter,
    },
}

impl Sources {
    /// Next matching path, without reading it
    pub(crate) fn next_path(&mut self) -> Option<Result<PathBuf>> {
        match &mut self.inner {
            SourcesInner::Single(path) => path.take().map(Ok),
            SourcesInner::Directory { walker, filter } => loop {
                let entry = match walker.next()? {
                    Ok(entry) => entry,
                    Err(e) => {
                        let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                        return Some(Err(PipelineError::ingestion(path, e)));
                    }
                };

                let path = entry.path();
                let is_dir = entry.file_type().is_dir();

                if is_hidden(path) {
                    log::info!("resolve: skipping hidden entry {:?}", path);
                    if is_dir {
                        walker.skip_current_dir();
                    }
                    continue;
                }

                if is_dir {
                    log::info!("resolve: skipping directory {:?}", path);
                    continue;
                }

                if !filter.matches(path) {
                    log::info!(
                        "resolve: skipping {:?}, extension does not match filter `{}`",
                        path,
                        filter
                    );
                    continue;
                }

                return Some(Ok(path.to_path_buf()));
            },
        }
    }
}

impl Iterator for Sources {
    type Item = Result<FileAudioSource>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_path().map(|path| path.and_then(FileAudioSource::open))
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}
