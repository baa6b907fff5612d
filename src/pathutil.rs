//! Path helpers
//!
//! String-level path utilities used by the scanner and by callers that
//! prepare scan roots: containment tests, lexical normalization and
//! `~` / `$VAR` expansion. Nothing in here except [`process_input_dirs`]
//! touches the file system.

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

use log::debug;

use crate::errors::{FindError, FindResult};

/// Returns true if `candidate` is one of `ancestors` or lies below one of them.
///
/// Both sides must already be absolute and passed through [`normcase`].
/// The comparison is purely textual.
pub fn is_subdirectory_of(candidate: &Path, ancestors: &[PathBuf]) -> bool {
    let sub = candidate.as_os_str().as_encoded_bytes();
    let sep = MAIN_SEPARATOR as u8;

    ancestors.iter().any(|ancestor| {
        let parent = ancestor.as_os_str().as_encoded_bytes();
        if parent.is_empty() || !sub.starts_with(parent) {
            return false;
        }
        // identical, or parent is a root such as `/` or `C:\`
        sub.len() == parent.len() || parent.last() == Some(&sep) || sub[parent.len()] == sep
    })
}

/// Case-normalizes a path for comparisons.
///
/// On Windows this lowercases and converts `/` to `\`, elsewhere it is the identity.
#[cfg(windows)]
pub fn normcase(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().replace('/', "\\").to_lowercase())
}

/// Case-normalizes a path for comparisons.
///
/// On Windows this lowercases and converts `/` to `\`, elsewhere it is the identity.
#[cfg(not(windows))]
pub fn normcase(path: &Path) -> PathBuf {
    path.to_path_buf()
}

/// Lexically normalizes a path: drops `.`, resolves `..` against preceding
/// components and collapses repeated separators.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
        }
    }

    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Expands a leading `~` to the current user's home directory.
pub fn expand_user(input: &str) -> String {
    let Some(rest) = input.strip_prefix('~') else {
        return input.to_string();
    };
    if !(rest.is_empty() || rest.starts_with('/') || rest.starts_with(MAIN_SEPARATOR)) {
        return input.to_string();
    }

    match directories::BaseDirs::new() {
        Some(dirs) => format!("{}{}", dirs.home_dir().to_string_lossy(), rest),
        None => input.to_string(),
    }
}

/// Expands `$NAME` and `${NAME}` from the environment.
///
/// Unknown variables are left untouched.
pub fn expand_vars(input: &str) -> String {
    if !input.contains('$') {
        return input.to_string();
    }

    let is_name_char = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) if braced[..end].chars().all(is_name_char) => (&braced[..end], end + 2),
                _ => ("", 0),
            },
            None => {
                let end = after.find(|c: char| !is_name_char(c)).unwrap_or(after.len());
                (&after[..end], end)
            }
        };

        if name.is_empty() {
            out.push('$');
            rest = after;
            continue;
        }

        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                out.push('$');
                out.push_str(&after[..consumed]);
            }
        }
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}

/// Turns user input into a normalized absolute path.
///
/// `~` and environment variables are expanded first. A relative result is
/// joined to `base_dir` when given, otherwise to the current directory.
pub fn resolve_full_path(input: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = PathBuf::from(expand_vars(&expand_user(input)));

    let absolute = if expanded.is_absolute() {
        expanded
    } else if let Some(base) = base_dir {
        base.join(expanded)
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(expanded),
            Err(_) => expanded,
        }
    };

    normalize(&absolute)
}

/// Resolves a list of user supplied directories.
///
/// Duplicates are removed. With `must_exist` every entry has to be an
/// existing directory that is not a symbolic link. With `no_subdirs`
/// entries nested under another entry are dropped, which is what a
/// recursive scan needs to avoid visiting a tree twice.
pub fn process_input_dirs<S: AsRef<str>>(
    inputs: &[S],
    must_exist: bool,
    no_subdirs: bool,
) -> FindResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let mut seen: Vec<PathBuf> = Vec::new();

    for input in inputs {
        let dir = resolve_full_path(input.as_ref(), None);
        let key = normcase(&dir);
        if seen.contains(&key) {
            continue;
        }
        if must_exist && (!dir.is_dir() || dir.is_symlink()) {
            return Err(FindError::InvalidPath(dir));
        }
        dirs.push(dir);
        seen.push(key);
    }

    if no_subdirs {
        dirs.retain(|dir| {
            let key = normcase(dir);
            let nested = seen
                .iter()
                .any(|other| *other != key && is_subdirectory_of(&key, std::slice::from_ref(other)));
            if nested {
                debug!("Dropping nested directory {}", dir.display());
            }
            !nested
        });
    }

    Ok(dirs)
}
