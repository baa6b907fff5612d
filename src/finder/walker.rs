//! 文件系统遍历功能
//!
//! 本模块提供可剪枝的目录树遍历器。遍历器按需列出目录，
//! 从不跟随符号链接，单个条目或目录的错误不会中止遍历。

use std::ffi::OsString;
use std::fs::{self, DirEntry, FileType, Metadata, ReadDir};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use super::matcher::Matcher;
use crate::pathutil::{is_subdirectory_of, normcase};

/// 遍历得到的一个目录条目
#[derive(Debug)]
pub struct WalkEntry {
    /// 所在目录（绝对路径）
    pub parent: Arc<Path>,
    pub entry: DirEntry,
    /// 不跟随符号链接得到的类型
    pub file_type: FileType,
}

impl WalkEntry {
    pub fn file_name(&self) -> OsString {
        self.entry.file_name()
    }

    pub fn path(&self) -> PathBuf {
        self.entry.path()
    }

    pub fn is_dir(&self) -> bool {
        self.file_type.is_dir()
    }

    /// 获取元数据（不跟随符号链接）
    pub fn metadata(&self) -> io::Result<Metadata> {
        self.entry.metadata()
    }
}

/// 遍历器产生的事件
#[derive(Debug)]
pub enum WalkEvent {
    Entry(WalkEntry),
    /// 无法确定某个条目的类型
    ItemError { path: PathBuf, error: io::Error },
    /// 无法列出某个目录，该目录的其余内容被跳过
    DirError { path: PathBuf, error: io::Error },
}

/// 可剪枝的目录树遍历器
///
/// 目录先于其内容产生。被剪枝的目录本身不会产生，也不会被打开。
/// 同一目录内条目的顺序由操作系统决定。
pub struct TreeWalker<'a> {
    stack: Vec<(Arc<Path>, ReadDir)>,
    pending: Option<PathBuf>,
    recurse: bool,
    prune_paths: &'a [PathBuf],
    prune_names: Option<&'a Matcher>,
    dirs_visited: usize,
}

impl<'a> TreeWalker<'a> {
    /// 创建遍历器；根目录在第一次调用 `next` 时才被打开
    ///
    /// `prune_paths` 必须是经过 [`normcase`] 处理的绝对路径。
    pub fn new(
        root: impl Into<PathBuf>,
        recurse: bool,
        prune_paths: &'a [PathBuf],
        prune_names: Option<&'a Matcher>,
    ) -> Self {
        Self {
            stack: Vec::new(),
            pending: Some(root.into()),
            recurse,
            prune_paths,
            prune_names,
            dirs_visited: 0,
        }
    }

    /// 已成功打开的目录数（包括根目录）
    pub fn dirs_visited(&self) -> usize {
        self.dirs_visited
    }

    /// 打开目录并压栈；失败时返回目录错误
    fn open(&mut self, dir: PathBuf) -> Option<WalkEvent> {
        match fs::read_dir(&dir) {
            Ok(read_dir) => {
                self.dirs_visited += 1;
                debug!("进入目录: {}", dir.display());
                self.stack.push((Arc::from(dir), read_dir));
                None
            }
            Err(error) => Some(WalkEvent::DirError { path: dir, error }),
        }
    }

    /// 检查目录是否应被剪枝
    fn is_pruned(&self, path: &Path, name: &OsString) -> bool {
        if !self.prune_paths.is_empty() && is_subdirectory_of(&normcase(path), self.prune_paths) {
            debug!("按路径跳过目录: {}", path.display());
            return true;
        }
        if let Some(matcher) = self.prune_names {
            if matcher.is_match(&name.to_string_lossy()) {
                debug!("按名称跳过目录: {}", path.display());
                return true;
            }
        }
        false
    }
}

impl Iterator for TreeWalker<'_> {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(dir) = self.pending.take() {
                if let Some(error) = self.open(dir) {
                    return Some(error);
                }
            }

            let (parent, read_dir) = self.stack.last_mut()?;
            let parent = Arc::clone(parent);

            let entry = match read_dir.next() {
                None => {
                    self.stack.pop();
                    continue;
                }
                Some(Err(error)) => {
                    // 列目录中途失败，放弃该目录的剩余条目
                    self.stack.pop();
                    return Some(WalkEvent::DirError {
                        path: parent.to_path_buf(),
                        error,
                    });
                }
                Some(Ok(entry)) => entry,
            };

            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(error) => {
                    return Some(WalkEvent::ItemError {
                        path: entry.path(),
                        error,
                    })
                }
            };

            if file_type.is_dir() {
                let path = entry.path();
                if self.is_pruned(&path, &entry.file_name()) {
                    continue;
                }
                if self.recurse {
                    self.pending = Some(path);
                }
            }

            return Some(WalkEvent::Entry(WalkEntry {
                parent,
                entry,
                file_type,
            }));
        }
    }
}
