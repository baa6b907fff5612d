//! 文件扫描模块
//!
//! 这个模块把目录遍历和过滤组合成一次扫描：按固定顺序应用过滤器，
//! 每个条目最多 stat 一次、最多打开一次，错误按类别累积而不会中止扫描，
//! 并支持协作式取消和进度报告。

pub mod content;
pub mod filter;
pub mod matcher;
pub mod options;
pub mod progress;
pub mod row;
pub mod walker;

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::slice;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::errors::{ErrorCategory, FindError, FindResult, ScanError, ScanErrors};
use self::content::open_lines;
use self::progress::Ticker;
use self::row::{extension_of, meta, mode_string, EntryType};
use self::walker::{TreeWalker, WalkEntry, WalkEvent};

pub use self::filter::{FileFilter, FilterSet, FilterSpec};
pub use self::matcher::{MatchMode, Matcher};
pub use self::options::{ReadOptions, ScanOptions, ScanRoot};
pub use self::progress::{CancelToken, ProgressSnapshot, ScanProgress};
pub use self::row::{Column, ResultRow};

/// 扫描状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanState::Idle => "idle",
            ScanState::Running => "running",
            ScanState::Completed => "completed",
            ScanState::Cancelled => "cancelled",
            ScanState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 扫描管线
///
/// 同一实例同时只能运行一个扫描。进度计数器可以在扫描进行时
/// 从其他线程读取。
#[derive(Debug)]
pub struct ScanPipeline {
    state: Mutex<ScanState>,
    progress: Arc<ScanProgress>,
}

impl ScanPipeline {
    /// 创建新的扫描管线
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScanState::Idle),
            progress: Arc::new(ScanProgress::new()),
        }
    }

    /// 进度计数器的共享句柄
    pub fn progress(&self) -> Arc<ScanProgress> {
        Arc::clone(&self.progress)
    }

    pub fn state(&self) -> ScanState {
        *self.lock_state()
    }

    fn lock_state(&self) -> MutexGuard<'_, ScanState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ScanState) {
        *self.lock_state() = state;
    }

    /// 开始扫描，返回惰性的结果序列
    ///
    /// 结果序列只能消费一次；重新扫描需要再次调用本方法。
    pub fn scan<'a>(&'a self, options: &'a ScanOptions, cancel: CancelToken) -> FindResult<Scan<'a>> {
        options.validate()?;

        {
            let mut state = self.lock_state();
            if *state == ScanState::Running {
                return Err(FindError::Busy);
            }
            *state = ScanState::Running;
        }
        self.progress.reset();

        let ticker = match options.progress_interval {
            Some(interval) => match Ticker::start(interval) {
                Ok(ticker) => Some(ticker),
                Err(e) => {
                    self.set_state(ScanState::Failed);
                    return Err(e);
                }
            },
            None => None,
        };

        info!("开始扫描 {} 个根目录", options.roots.len());
        for root in &options.roots {
            debug!("根目录: {} (剪枝 {} 个路径)", root.path.display(), root.prune.len());
        }
        for description in options.filters.descriptions() {
            debug!("过滤器: {}", description);
        }

        Ok(Scan {
            pipeline: self,
            options,
            cancel,
            ticker,
            progress: Arc::clone(&self.progress),
            roots: options.roots.iter(),
            walker: None,
            dirs_done: 0,
            errors: ScanErrors::default(),
            outcome: None,
        })
    }

    /// 运行完整的扫描并收集结果
    ///
    /// 扫描中的 panic 会被捕获并作为 [`FindError::Fault`] 返回，
    /// 此时状态为 `Failed`。
    pub fn run(&self, options: &ScanOptions, cancel: CancelToken) -> FindResult<ScanReport> {
        let mut scan = self.scan(options, cancel)?;

        match panic::catch_unwind(AssertUnwindSafe(|| scan.by_ref().collect::<Vec<_>>())) {
            Ok(rows) => {
                let summary = scan.finish();
                Ok(ScanReport {
                    rows,
                    state: summary.state,
                    progress: summary.progress,
                    errors: summary.errors,
                    max_results: options.max_results,
                })
            }
            Err(payload) => {
                scan.conclude(ScanState::Failed);
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(FindError::Fault(message))
            }
        }
    }
}

impl Default for ScanPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// 扫描结束时的状态、进度与错误
#[derive(Debug)]
pub struct ScanSummary {
    pub state: ScanState,
    pub progress: ProgressSnapshot,
    pub errors: ScanErrors,
}

/// 完整扫描的结果
#[derive(Debug)]
pub struct ScanReport {
    pub rows: Vec<ResultRow>,
    pub state: ScanState,
    pub progress: ProgressSnapshot,
    pub errors: ScanErrors,
    pub max_results: usize,
}

impl ScanReport {
    /// 结果数量是否超过需要确认的阈值
    pub fn exceeds_limit(&self) -> bool {
        self.rows.len() > self.max_results
    }
}

/// 正在进行的扫描，按需产生匹配的结果行
pub struct Scan<'a> {
    pipeline: &'a ScanPipeline,
    options: &'a ScanOptions,
    cancel: CancelToken,
    ticker: Option<Ticker>,
    progress: Arc<ScanProgress>,
    roots: slice::Iter<'a, ScanRoot>,
    walker: Option<TreeWalker<'a>>,
    dirs_done: usize,
    errors: ScanErrors,
    outcome: Option<ScanState>,
}

impl<'a> Scan<'a> {
    /// 目前为止累积的错误
    pub fn errors(&self) -> &ScanErrors {
        &self.errors
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// 结束扫描；未遍历完就调用视为取消
    pub fn finish(mut self) -> ScanSummary {
        if self.outcome.is_none() {
            self.conclude(ScanState::Cancelled);
        }
        ScanSummary {
            state: self.outcome.unwrap_or(ScanState::Cancelled),
            progress: self.progress.snapshot(),
            errors: std::mem::take(&mut self.errors),
        }
    }

    /// 停止计时线程并记录最终状态
    fn conclude(&mut self, state: ScanState) {
        if self.outcome.is_some() {
            return;
        }
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
        self.progress.finish();
        self.pipeline.set_state(state);
        self.outcome = Some(state);

        let snapshot = self.progress.snapshot();
        info!(
            "扫描{}: 检查 {} 项，匹配 {} 项，访问 {} 个目录，{} 个错误，耗时 {:.2?}",
            state,
            snapshot.items_examined,
            snapshot.items_matched,
            snapshot.dirs_visited,
            snapshot.error_count(),
            snapshot.elapsed
        );
    }

    /// 是否应在处理下一个条目前检查取消信号
    fn check_due(&self) -> bool {
        match &self.ticker {
            None => true,
            Some(ticker) => {
                if !ticker.take_tick() {
                    return false;
                }
                let s = self.progress.snapshot();
                info!(
                    "已检查 {} 项，匹配 {} 项，{} 个目录，{} 个错误",
                    s.items_examined,
                    s.items_matched,
                    s.dirs_visited,
                    s.error_count()
                );
                true
            }
        }
    }

    fn record(&mut self, category: ErrorCategory, path: PathBuf, error: io::Error) {
        warn!("{} {}: {}", category, path.display(), error);
        self.progress.add_error(category);
        self.errors.push(category, ScanError::new(path, error));
    }

    /// 从当前根目录的遍历器取下一个事件，必要时切换到下一个根目录
    fn next_event(&mut self) -> Option<WalkEvent> {
        let options: &'a ScanOptions = self.options;
        loop {
            if let Some(walker) = self.walker.as_mut() {
                if let Some(event) = walker.next() {
                    self.progress.set_dirs_visited(self.dirs_done + walker.dirs_visited());
                    return Some(event);
                }
                self.dirs_done += walker.dirs_visited();
                self.walker = None;
            }

            let root = self.roots.next()?;
            debug!("扫描根目录: {}", root.path.display());
            self.walker = Some(TreeWalker::new(
                root.path.clone(),
                options.recurse,
                &root.prune,
                options.prune_names.as_ref(),
            ));
        }
    }

    /// 按固定顺序应用过滤器；通过全部过滤器的条目变成结果行
    fn evaluate(&mut self, entry: WalkEntry) -> Option<ResultRow> {
        let options: &'a ScanOptions = self.options;
        let filters = &options.filters;
        let name = entry.file_name().to_string_lossy().into_owned();

        if !filters.names.iter().all(|f| f.keep(&name)) {
            return None;
        }
        if !filters.paths.is_empty() {
            let path = entry.path();
            let path = path.to_string_lossy();
            if !filters.paths.iter().all(|f| f.keep(&path)) {
                return None;
            }
        }

        let entry_type = EntryType::from_file_type(entry.file_type);
        if let Some(extension) = &filters.extension {
            if !extension.keep(extension_of(&name)) {
                return None;
            }
        }
        if let Some(file_type) = &filters.file_type {
            if !file_type.keep(entry_type.class()) {
                return None;
            }
        }

        let mut metadata = None;
        let mut cached_mode = None;
        if filters.needs_stat() {
            let stat = match entry.metadata() {
                Ok(stat) => stat,
                Err(e) => {
                    self.record(ErrorCategory::Item, entry.path(), e);
                    return None;
                }
            };
            if let Some(size) = &filters.size {
                if !size.keep(stat.len()) {
                    return None;
                }
            }
            if let Some(time) = &filters.time {
                match time.field().timestamp(&stat) {
                    Ok(timestamp) if time.keep(timestamp) => {}
                    Ok(_) => return None,
                    Err(e) => {
                        self.record(ErrorCategory::Item, entry.path(), e);
                        return None;
                    }
                }
            }
            if let Some(owner) = &filters.owner {
                if !owner.keep(meta::uid(&stat), meta::gid(&stat)) {
                    return None;
                }
            }
            if let Some(mode) = &filters.mode {
                let permissions = mode_string(meta::mode(&stat));
                if !mode.keep(&permissions) {
                    return None;
                }
                cached_mode = Some(permissions);
            }
            if let Some(links) = &filters.links {
                if !links.keep(meta::nlink(&stat)) {
                    return None;
                }
            }
            metadata = Some(stat);
        }

        if let Some(content) = &filters.content {
            if entry_type != EntryType::Regular {
                return None;
            }
            let path = entry.path();
            // 文件在此语句结束前关闭
            let matched = open_lines(&path, &options.read_options)
                .and_then(|lines| content.matcher().matches_lines(lines));
            match matched {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    self.record(ErrorCategory::Content, path, e);
                    return None;
                }
            }
        }

        let stat = match metadata {
            Some(stat) => stat,
            None => match entry.metadata() {
                Ok(stat) => stat,
                Err(e) => {
                    self.record(ErrorCategory::Item, entry.path(), e);
                    return None;
                }
            },
        };
        let file_type = match entry_type {
            EntryType::Unknown => EntryType::from_file_type(stat.file_type()),
            known => known,
        };

        match ResultRow::assemble(file_type, &entry.parent, name, &stat, &options.columns, cached_mode) {
            Ok(row) => Some(row),
            Err(e) => {
                self.record(ErrorCategory::Item, entry.path(), e);
                None
            }
        }
    }
}

impl Iterator for Scan<'_> {
    type Item = ResultRow;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.outcome.is_some() {
                return None;
            }
            if self.check_due() && self.cancel.is_cancelled() {
                self.conclude(ScanState::Cancelled);
                return None;
            }

            let Some(event) = self.next_event() else {
                self.conclude(ScanState::Completed);
                return None;
            };

            match event {
                WalkEvent::DirError { path, error } => self.record(ErrorCategory::Traversal, path, error),
                WalkEvent::ItemError { path, error } => {
                    self.progress.add_examined();
                    self.record(ErrorCategory::Item, path, error);
                }
                WalkEvent::Entry(entry) => {
                    self.progress.add_examined();
                    if let Some(row) = self.evaluate(entry) {
                        self.progress.add_matched();
                        return Some(row);
                    }
                }
            }
        }
    }
}

impl Drop for Scan<'_> {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            self.conclude(ScanState::Cancelled);
        }
    }
}
