//! 按条件扫描目录树的库
//!
//! 本库是"查找文件"工具的扫描引擎，支持：
//! - 可剪枝、按需进行的目录遍历（不跟随符号链接）
//! - 名称、路径、扩展名、类型、大小、时间、所有者、权限和内容过滤
//! - 精确、包含、前缀、后缀、通配符和正则匹配
//! - 每个条目最多 stat 一次、打开一次
//! - 协作式取消和进度报告
//! - 按类别累积的错误报告，单个错误不会中止扫描
//!
//! ## 使用场景
//!
//! - 在大型目录树中按多个条件查找文件
//! - 在文件内容中搜索文本
//! - 清理过时或大文件
//!
//! # 示例
//!
//! 基本用法：
//! ```no_run
//! use treefind::finder::{CancelToken, FilterSpec, ScanOptions, ScanPipeline};
//! use treefind::finder::filter::{ExtensionSpec, SizeSpec};
//!
//! # fn main() -> Result<(), treefind::FindError> {
//! // 查找 /data 下大于 1 KiB 的 .txt 文件
//! let mut options = ScanOptions::new()
//!     .with_root("/data")
//!     .with_filter(FilterSpec::Size(SizeSpec::new(Some(1024), None)?))?;
//! if let Some(ext) = ExtensionSpec::parse(".txt", true)? {
//!     options = options.with_filter(FilterSpec::Extension(ext))?;
//! }
//!
//! let pipeline = ScanPipeline::new();
//! let cancel = CancelToken::new();
//! let mut scan = pipeline.scan(&options, cancel.clone())?;
//!
//! // 结果按需产生，可以随时取消
//! for row in scan.by_ref() {
//!     println!("{}\t{}", row.path().display(), row.display_size);
//! }
//!
//! let summary = scan.finish();
//! println!("{}: {} 个错误", summary.state, summary.errors.len());
//! # Ok(())
//! # }
//! ```
//!
//! 更多用法请参考各模块文档。

pub mod cli;
pub mod errors;
pub mod finder;
pub mod pathutil;
pub mod results;

// Re-export main types for convenience
pub use errors::{FindError, FindResult, ScanError, ScanErrors};
pub use finder::{ScanPipeline, ScanReport, ScanState};
