use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for operations that can produce FindError
pub type FindResult<T> = Result<T, FindError>;

/// treefind 的错误类型
///
/// 这些错误会在扫描开始之前（构造过滤器、处理输入目录）或者
/// 扫描因内部故障中止时返回。扫描过程中单个条目的错误不会出现在这里，
/// 而是累积到 [`ScanErrors`] 中。
#[derive(Debug, Error)]
pub enum FindError {
    /// 没有可搜索的目录
    #[error("没有可搜索的目录")]
    NoRoots,

    /// 路径不可访问或不是目录
    #[error("路径不可访问或不是目录: {}", .0.display())]
    InvalidPath(PathBuf),

    /// 模式匹配错误
    #[error("模式匹配错误: {message}")]
    PatternError { message: String },

    /// 正则表达式无法编译
    #[error("无法编译正则表达式 '{pattern}': {source}")]
    RegexError {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// 无效的文件类型
    #[error("无效的文件类型: {0}")]
    InvalidFileType(String),

    /// 无效的输入值（数字、大小、时间等）
    #[error("无效的{field} '{value}': {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// 区间过滤器缺少边界
    #[error("过滤器 \"{0}\" 至少需要一个边界")]
    MissingBound(&'static str),

    /// 过滤器已启用但没有任何条件
    #[error("过滤器 \"{0}\": 没有可搜索的内容")]
    NothingToSearch(&'static str),

    /// 同一类过滤器只能有一个
    #[error("过滤器 \"{0}\" 重复")]
    DuplicateFilter(&'static str),

    /// 未知的文本编码
    #[error("未知的编码: '{0}'")]
    UnknownEncoding(String),

    /// 已有扫描正在运行
    #[error("已有扫描正在运行")]
    Busy,

    /// 扫描过程中出现的内部故障
    #[error("扫描过程中出现内部错误: {0}")]
    Fault(String),
}

/// 扫描过程中某个路径上的错误
///
/// 这类错误不会中止扫描，只会跳过对应的条目或目录。
#[derive(Debug, Error)]
#[error("{}: {source}", path.display())]
pub struct ScanError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl ScanError {
    pub fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// 扫描错误的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 遍历目录时的错误（目录不可读、无法列出）
    Traversal,
    /// 处理单个条目时的错误（分类或 stat 失败）
    Item,
    /// 搜索文件内容时的错误（打开或解码失败）
    Content,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Traversal => write!(f, "during file system traversal"),
            ErrorCategory::Item => write!(f, "during item processing"),
            ErrorCategory::Content => write!(f, "during file content search"),
        }
    }
}

/// 按类别分开保存的扫描错误
#[derive(Debug, Default)]
pub struct ScanErrors {
    pub traversal: Vec<ScanError>,
    pub item: Vec<ScanError>,
    pub content: Vec<ScanError>,
}

impl ScanErrors {
    pub fn push(&mut self, category: ErrorCategory, error: ScanError) {
        self.list_mut(category).push(error);
    }

    pub fn list(&self, category: ErrorCategory) -> &[ScanError] {
        match category {
            ErrorCategory::Traversal => &self.traversal,
            ErrorCategory::Item => &self.item,
            ErrorCategory::Content => &self.content,
        }
    }

    fn list_mut(&mut self, category: ErrorCategory) -> &mut Vec<ScanError> {
        match category {
            ErrorCategory::Traversal => &mut self.traversal,
            ErrorCategory::Item => &mut self.item,
            ErrorCategory::Content => &mut self.content,
        }
    }

    pub fn len(&self) -> usize {
        self.traversal.len() + self.item.len() + self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Error messages of one category, sorted
    pub fn messages(&self, category: ErrorCategory) -> Vec<String> {
        let mut messages: Vec<String> = self
            .list(category)
            .iter()
            .map(ToString::to_string)
            .collect();
        messages.sort();
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_display() {
        let find_error = FindError::InvalidPath(PathBuf::from("/invalid/path"));
        assert_eq!(find_error.to_string(), "路径不可访问或不是目录: /invalid/path");
    }

    #[test]
    fn test_missing_bound_display() {
        let find_error = FindError::MissingBound("Size");
        assert_eq!(find_error.to_string(), "过滤器 \"Size\" 至少需要一个边界");
    }

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::new(
            "/data/locked",
            io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        );
        assert_eq!(err.to_string(), "/data/locked: permission denied");
    }

    #[test]
    fn test_scan_errors_are_partitioned() {
        let mut errors = ScanErrors::default();
        errors.push(
            ErrorCategory::Item,
            ScanError::new("/b", io::Error::new(io::ErrorKind::Other, "x")),
        );
        errors.push(
            ErrorCategory::Item,
            ScanError::new("/a", io::Error::new(io::ErrorKind::Other, "y")),
        );
        errors.push(
            ErrorCategory::Content,
            ScanError::new("/c", io::Error::new(io::ErrorKind::InvalidData, "z")),
        );

        assert_eq!(errors.len(), 3);
        assert!(errors.traversal.is_empty());
        assert_eq!(errors.messages(ErrorCategory::Item), vec!["/a: y", "/b: x"]);
        assert_eq!(errors.list(ErrorCategory::Content).len(), 1);
    }
}
