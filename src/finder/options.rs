//! Options for a scan
//!
//! This module provides the builder-style options a scan is configured with.

use std::path::PathBuf;
use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use log::debug;

use super::content::{parse_encoding, DecodePolicy, Newline};
use super::filter::{FilterSet, FilterSpec};
use super::matcher::Matcher;
use super::row::Column;
use crate::errors::{FindError, FindResult};
use crate::pathutil::{is_subdirectory_of, normcase};

/// Results beyond this count need confirmation before display
pub const DEFAULT_MAX_RESULTS: usize = 50_000;

/// How often progress is reported and cancellation checked
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Parameters for reading file contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    pub encoding: &'static Encoding,
    pub errors: DecodePolicy,
    pub newline: Newline,
}

impl ReadOptions {
    /// UTF-8, strict decoding, universal newlines
    pub fn new() -> Self {
        Self {
            encoding: UTF_8,
            errors: DecodePolicy::Strict,
            newline: Newline::Universal,
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the encoding by label, e.g. `"latin1"` or `"utf-16le"`
    pub fn with_encoding_label(self, label: &str) -> FindResult<Self> {
        Ok(self.with_encoding(parse_encoding(label)?))
    }

    pub fn with_errors(mut self, errors: DecodePolicy) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_newline(mut self, newline: Newline) -> Self {
        self.newline = newline;
        self
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A root directory with the prune paths that lie under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRoot {
    pub path: PathBuf,
    /// Absolute, case-normalized directories to skip
    pub prune: Vec<PathBuf>,
}

impl ScanRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            prune: Vec::new(),
        }
    }
}

/// Pairs every root with the prune paths below it.
///
/// Roots and prune paths must be absolute. A root that is itself pruned
/// is left out.
pub fn pair_roots(roots: Vec<PathBuf>, prune_paths: &[PathBuf]) -> Vec<ScanRoot> {
    let prune: Vec<PathBuf> = prune_paths.iter().map(|p| normcase(p)).collect();

    roots
        .into_iter()
        .filter_map(|root| {
            let key = normcase(&root);
            if is_subdirectory_of(&key, &prune) {
                debug!("Skipping pruned root {}", root.display());
                return None;
            }
            let under: Vec<PathBuf> = prune
                .iter()
                .filter(|p| is_subdirectory_of(p, std::slice::from_ref(&key)))
                .cloned()
                .collect();
            Some(ScanRoot {
                path: root,
                prune: under,
            })
        })
        .collect()
}

/// Options for configuring one scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub roots: Vec<ScanRoot>,

    /// Whether to descend into subdirectories
    pub recurse: bool,

    /// Directories whose base name matches are skipped
    pub prune_names: Option<Matcher>,

    pub filters: FilterSet,

    pub read_options: ReadOptions,

    /// Optional columns computed for every row
    pub columns: Vec<Column>,

    /// Advisory threshold, checked by the caller
    pub max_results: usize,

    /// `None` checks cancellation before every entry and reports no progress
    pub progress_interval: Option<Duration>,
}

impl ScanOptions {
    /// Create a new ScanOptions with default values
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            recurse: true,
            prune_names: None,
            filters: FilterSet::new(),
            read_options: ReadOptions::new(),
            columns: Vec::new(),
            max_results: DEFAULT_MAX_RESULTS,
            progress_interval: Some(DEFAULT_PROGRESS_INTERVAL),
        }
    }

    /// Add one root without prune paths
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(ScanRoot::new(root));
        self
    }

    /// Set roots, pairing each with the prune paths below it
    pub fn with_roots(mut self, roots: Vec<PathBuf>, prune_paths: &[PathBuf]) -> Self {
        self.roots = pair_roots(roots, prune_paths);
        self
    }

    pub fn with_recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn with_prune_names(mut self, matcher: Option<Matcher>) -> Self {
        self.prune_names = matcher;
        self
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    /// Add one filter
    pub fn with_filter(mut self, spec: FilterSpec) -> FindResult<Self> {
        self.filters.push(spec)?;
        Ok(self)
    }

    pub fn with_read_options(mut self, read_options: ReadOptions) -> Self {
        self.read_options = read_options;
        self
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_progress_interval(mut self, interval: Option<Duration>) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Checks what a scan needs before it can start
    pub fn validate(&self) -> FindResult<()> {
        if self.roots.is_empty() {
            return Err(FindError::NoRoots);
        }
        if let Some(interval) = self.progress_interval {
            if interval.is_zero() {
                return Err(FindError::InvalidValue {
                    field: "progress interval",
                    value: format!("{:?}", interval),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new()
    }
}
