//! Operations on collected result rows
//!
//! Sorting, placeholder expansion for external commands, and deletion of
//! the underlying files. Nothing here is executed during a scan.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::finder::row::ResultRow;

/// Sort by directory, then by name
pub fn sort_rows(rows: &mut [ResultRow]) {
    rows.par_sort_by(compare_rows);
}

fn compare_rows(a: &ResultRow, b: &ResultRow) -> Ordering {
    a.directory
        .cmp(&b.directory)
        .then_with(|| a.name.cmp(&b.name))
}

/// One tab-separated output line: type symbol, directory, name, extension,
/// size, display size, then the requested columns
pub fn format_row(row: &ResultRow) -> String {
    let mut fields = vec![
        row.file_type.symbol().to_string(),
        row.directory.to_string_lossy().into_owned(),
        row.name.clone(),
        row.extension.clone(),
        row.size_bytes.to_string(),
        row.display_size.clone(),
    ];
    fields.extend(row.extras.iter().map(|(_, value)| value.to_string()));
    fields.join("\t")
}

/// Quotes a value for use inside a longer command-line argument
#[cfg(windows)]
fn quoted(s: &str) -> String {
    format!("\"{}\"", s)
}

/// Quotes a value for use inside a longer command-line argument
#[cfg(not(windows))]
fn quoted(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Substitutes `%P` (path), `%D` (directory) and `%N` (name) in `args`.
///
/// The first argument is the program and is left alone. An argument that
/// is exactly a placeholder becomes the bare value; a placeholder inside a
/// longer argument becomes the quoted value. Any other `%` is kept.
pub fn expand_placeholders(args: &[String], row: &ResultRow) -> Vec<String> {
    let value = |key: &str| -> Option<String> {
        match key {
            "%P" => Some(row.path().to_string_lossy().into_owned()),
            "%D" => Some(row.directory.to_string_lossy().into_owned()),
            "%N" => Some(row.name.clone()),
            _ => None,
        }
    };

    let mut out = Vec::with_capacity(args.len());
    let mut iter = args.iter();
    if let Some(program) = iter.next() {
        out.push(program.clone());
    }

    for arg in iter {
        if let Some(v) = value(arg.as_str()) {
            out.push(v);
            continue;
        }

        let mut expanded = String::with_capacity(arg.len());
        let mut rest = arg.as_str();
        while let Some(j) = rest.find('%') {
            expanded.push_str(&rest[..j]);
            match rest.get(j..j + 2).and_then(value) {
                Some(v) => {
                    expanded.push_str(&quoted(&v));
                    rest = &rest[j + 2..];
                }
                None => {
                    expanded.push('%');
                    rest = &rest[j + 1..];
                }
            }
        }
        expanded.push_str(rest);
        out.push(expanded);
    }
    out
}

/// Outcome of [`delete_rows`]
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub deleted: Vec<PathBuf>,
    /// Path and reason
    pub failed: Vec<(PathBuf, String)>,
}

/// Deletes the files and directories behind `rows`, deepest path first.
///
/// Directories are removed with their contents. With `enabled` false
/// nothing is touched and every path is reported as failed.
pub fn delete_rows(rows: &[ResultRow], enabled: bool) -> DeleteReport {
    let mut targets: Vec<(PathBuf, bool)> = rows.iter().map(|r| (r.path(), r.is_dir())).collect();
    targets.sort_by(|a, b| b.0.cmp(&a.0));

    let mut report = DeleteReport::default();
    for (path, is_dir) in targets {
        if !enabled {
            report.failed.push((path, "deletion is disabled".to_string()));
            continue;
        }

        let result = if is_dir {
            remove_tree(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                report.deleted.push(path);
            }
            Err(e) => {
                warn!("Cannot delete {}: {}", path.display(), e);
                report.failed.push((path, e.to_string()));
            }
        }
    }
    report
}

/// Removes a directory and everything below it without following links
fn remove_tree(root: &Path) -> io::Result<()> {
    for entry in WalkDir::new(root).follow_links(false).contents_first(true) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            fs::remove_dir(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
