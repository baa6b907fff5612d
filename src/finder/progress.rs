//! 扫描进度与取消模块
//!
//! 提供可在任意线程读取的进度计数器、可克隆的取消令牌，
//! 以及按固定间隔设置"该报告进度了"标志的计时线程。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;

use crate::errors::{ErrorCategory, FindError, FindResult};

/// 扫描进度计数器
///
/// 扫描线程原地更新，调用方可以随时（包括扫描进行中）读取快照。
#[derive(Debug, Default)]
pub struct ScanProgress {
    items_examined: AtomicUsize,
    items_matched: AtomicUsize,
    dirs_visited: AtomicUsize,
    traversal_errors: AtomicUsize,
    item_errors: AtomicUsize,
    content_errors: AtomicUsize,
    started: Mutex<Option<Instant>>,
    finished: Mutex<Option<Instant>>,
}

/// 某一时刻的进度快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub items_examined: usize,
    pub items_matched: usize,
    pub dirs_visited: usize,
    pub traversal_errors: usize,
    pub item_errors: usize,
    pub content_errors: usize,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn error_count(&self) -> usize {
        self.traversal_errors + self.item_errors + self.content_errors
    }
}

impl ScanProgress {
    /// 创建新的进度计数器
    pub fn new() -> Self {
        Self::default()
    }

    /// 清零所有计数并记录开始时间
    pub(crate) fn reset(&self) {
        for counter in [
            &self.items_examined,
            &self.items_matched,
            &self.dirs_visited,
            &self.traversal_errors,
            &self.item_errors,
            &self.content_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        if let Ok(mut finished) = self.finished.lock() {
            *finished = None;
        }
    }

    /// 记录结束时间，之后的快照耗时不再增长
    pub(crate) fn finish(&self) {
        if let Ok(mut finished) = self.finished.lock() {
            finished.get_or_insert_with(Instant::now);
        }
    }

    pub(crate) fn add_examined(&self) {
        self.items_examined.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_matched(&self) {
        self.items_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_dirs_visited(&self, count: usize) {
        self.dirs_visited.store(count, Ordering::Relaxed);
    }

    pub(crate) fn add_error(&self, category: ErrorCategory) {
        let counter = match category {
            ErrorCategory::Traversal => &self.traversal_errors,
            ErrorCategory::Item => &self.item_errors,
            ErrorCategory::Content => &self.content_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取当前进度快照
    pub fn snapshot(&self) -> ProgressSnapshot {
        let started = self.started.lock().ok().and_then(|s| *s);
        let finished = self.finished.lock().ok().and_then(|f| *f);
        let elapsed = match (started, finished) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        };

        ProgressSnapshot {
            items_examined: self.items_examined.load(Ordering::Relaxed),
            items_matched: self.items_matched.load(Ordering::Relaxed),
            dirs_visited: self.dirs_visited.load(Ordering::Relaxed),
            traversal_errors: self.traversal_errors.load(Ordering::Relaxed),
            item_errors: self.item_errors.load(Ordering::Relaxed),
            content_errors: self.content_errors.load(Ordering::Relaxed),
            elapsed,
        }
    }
}

/// 取消令牌
///
/// 克隆后共享同一个标志；任意一方调用 [`CancelToken::cancel`] 后，
/// 扫描会在下一次检查时停止。
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// 进度计时线程
///
/// 每隔固定时间设置一次 tick 标志。停止时关闭通道并等待线程退出，
/// 因此停止之后不会再有 tick。
#[derive(Debug)]
pub struct Ticker {
    tick: Arc<AtomicBool>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// 启动计时线程
    pub fn start(interval: Duration) -> FindResult<Self> {
        let tick = Arc::new(AtomicBool::new(false));
        let (stop, stopped) = mpsc::channel::<()>();

        let flag = Arc::clone(&tick);
        let handle = thread::Builder::new()
            .name("scan-ticker".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => flag.store(true, Ordering::Release),
                    // 发送端被丢弃或收到停止信号
                    _ => break,
                }
            })
            .map_err(|e| FindError::Fault(format!("无法启动进度计时线程: {}", e)))?;

        debug!("进度计时线程已启动，间隔 {:?}", interval);
        Ok(Self {
            tick,
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// 如果自上次调用以来计时器触发过，返回 true 并清除标志
    pub fn take_tick(&self) -> bool {
        self.tick.swap(false, Ordering::AcqRel)
    }

    /// 停止计时线程并等待其退出，可重复调用
    pub fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!("进度计时线程异常退出");
            }
        }
        self.tick.store(false, Ordering::Release);
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
