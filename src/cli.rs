//! treefind 的命令行接口
//!
//! 本模块提供了命令行参数的定义、验证，以及把参数转换为
//! [`ScanOptions`] 的功能。模式参数使用 `|` 分隔的原始输入语法。

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::debug;

use crate::errors::{FindError, FindResult};
use crate::finder::content::{DecodePolicy, Newline};
use crate::finder::filter::{
    split_patterns, ContentSpec, ExtensionSpec, FilterSet, FilterSpec, IdSet, LinksSpec, OwnerSpec,
    PatternSpec, SizeSpec, SizeUnit, TimeField, TimeSpec, TypeSpec,
};
use crate::finder::options::DEFAULT_MAX_RESULTS;
use crate::finder::{Column, MatchMode, Matcher, ReadOptions, ScanOptions};
use crate::pathutil::process_input_dirs;

/// 按条件扫描目录树
#[derive(Parser, Debug)]
#[command(name = "treefind", author, version, about, long_about = None)]
pub struct Cli {
    /// 搜索的根目录（默认：当前目录）
    #[arg(default_value = ".")]
    pub paths: Vec<String>,

    /// 只搜索根目录本身，不进入子目录
    #[arg(long)]
    pub no_recurse: bool,

    /// 跳过的目录（可多次指定）
    #[arg(long, value_name = "DIR")]
    pub skip_dir: Vec<String>,

    /// 按目录名跳过目录，`|` 分隔多个模式
    #[arg(long, value_name = "PATTERNS")]
    pub skip_name: Option<String>,

    #[arg(long, value_name = "MODE", default_value = "WildCard")]
    pub skip_name_mode: MatchMode,

    /// 目录名匹配不区分大小写
    #[arg(long)]
    pub skip_name_ic: bool,

    /// 文件名必须匹配（可多次指定）
    #[arg(short = 'n', long, value_name = "PATTERNS")]
    pub name: Vec<String>,

    /// 文件名不能匹配（可多次指定）
    #[arg(long, value_name = "PATTERNS")]
    pub not_name: Vec<String>,

    #[arg(long, value_name = "MODE", default_value = "WildCard")]
    pub name_mode: MatchMode,

    /// 文件名匹配不区分大小写
    #[arg(short = 'i', long)]
    pub name_ic: bool,

    /// 完整路径必须匹配（可多次指定）
    #[arg(long, value_name = "PATTERNS")]
    pub path: Vec<String>,

    /// 完整路径不能匹配（可多次指定）
    #[arg(long, value_name = "PATTERNS")]
    pub not_path: Vec<String>,

    #[arg(long, value_name = "MODE", default_value = "WildCard")]
    pub path_mode: MatchMode,

    /// 路径匹配不区分大小写
    #[arg(long)]
    pub path_ic: bool,

    /// 扩展名必须在列表中，例如 `.txt|.md|""`
    #[arg(long, value_name = "EXTS", conflicts_with = "not_ext")]
    pub ext: Option<String>,

    /// 扩展名不能在列表中
    #[arg(long, value_name = "EXTS")]
    pub not_ext: Option<String>,

    /// 文件类型：`-`（或 `f`）普通文件，`d` 目录，`l` 符号链接，`o` 其他
    #[arg(short = 't', long = "type", value_name = "TYPES", allow_hyphen_values = true)]
    pub file_type: Option<String>,

    /// 大小下限（不含）
    #[arg(long, value_name = "SIZE")]
    pub size_min: Option<String>,

    /// 大小上限（不含）
    #[arg(long, value_name = "SIZE")]
    pub size_max: Option<String>,

    /// 大小单位：bytes、K M G T（1024 进制）、k m g t（1000 进制）
    #[arg(long, value_name = "UNIT", default_value = "bytes")]
    pub size_unit: SizeUnit,

    /// 比较的时间字段：MTIME、CTIME 或 ATIME
    #[arg(long, value_name = "FIELD", default_value = "MTIME")]
    pub time_field: TimeField,

    /// 时间下限（不含），格式 `YYYY-MM-DD HH:MM:SS`
    #[arg(long, value_name = "TIME")]
    pub after: Option<String>,

    /// 时间上限（不含）
    #[arg(long, value_name = "TIME")]
    pub before: Option<String>,

    /// 所有者 UID 必须在列表中
    #[arg(long, value_name = "IDS", conflicts_with = "not_uid")]
    pub uid: Option<String>,

    #[arg(long, value_name = "IDS")]
    pub not_uid: Option<String>,

    /// 所属组 GID 必须在列表中
    #[arg(long, value_name = "IDS", conflicts_with = "not_gid")]
    pub gid: Option<String>,

    #[arg(long, value_name = "IDS")]
    pub not_gid: Option<String>,

    /// 只保留硬链接数大于 N 的条目
    #[arg(long, value_name = "N")]
    pub nlink_gt: Option<u64>,

    /// 权限字符串必须匹配，例如 `-rw*`
    #[arg(long, value_name = "PATTERNS", conflicts_with = "not_mode", allow_hyphen_values = true)]
    pub mode: Option<String>,

    #[arg(long, value_name = "PATTERNS", allow_hyphen_values = true)]
    pub not_mode: Option<String>,

    #[arg(long, value_name = "MODE", default_value = "WildCard")]
    pub mode_mode: MatchMode,

    /// 文件内容中必须有一行匹配
    #[arg(short = 'c', long, value_name = "PATTERN", allow_hyphen_values = true)]
    pub content: Option<String>,

    #[arg(long, value_name = "MODE", default_value = "Contains")]
    pub content_mode: MatchMode,

    /// 内容匹配不区分大小写
    #[arg(long)]
    pub content_ic: bool,

    /// 读取文件内容使用的编码
    #[arg(long, value_name = "LABEL", default_value = "utf-8")]
    pub encoding: String,

    /// 解码错误处理：strict、replace 或 ignore
    #[arg(long, value_name = "POLICY", default_value = "strict")]
    pub errors: DecodePolicy,

    /// 换行符：universal、lf、cr 或 crlf
    #[arg(long, value_name = "NEWLINE", default_value = "universal")]
    pub newline: Newline,

    /// 额外输出的列，逗号分隔，例如 `MTIME,MODE,LinkTo`
    #[arg(long, value_name = "COLUMNS", value_delimiter = ',')]
    pub columns: Vec<Column>,

    /// 超过此数量的结果需要 `--yes` 确认才会输出
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_RESULTS)]
    pub max_results: usize,

    /// 确认输出大量结果或执行删除
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// 对每个结果展开的命令模板，支持 %P（路径）、%D（目录）、%N（名称）
    #[arg(long, value_name = "COMMAND")]
    pub template: Option<String>,

    /// 删除找到的文件和目录（需要 `--yes`）
    #[arg(long)]
    pub delete: bool,

    /// 进度报告间隔（秒）；0 表示每个条目前都检查取消信号
    #[arg(long, value_name = "SECS", default_value_t = 2.0)]
    pub progress_interval: f64,

    /// 启用调试日志
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    /// 是否递归搜索
    pub fn recurse(&self) -> bool {
        !self.no_recurse
    }

    /// 验证命令行参数
    pub fn validate(&self) -> FindResult<()> {
        if !self.progress_interval.is_finite() || self.progress_interval < 0.0 {
            return Err(FindError::InvalidValue {
                field: "progress interval",
                value: self.progress_interval.to_string(),
                reason: "must be a non-negative number of seconds".to_string(),
            });
        }
        if let Some(template) = &self.template {
            if template.split_whitespace().next().is_none() {
                return Err(FindError::InvalidValue {
                    field: "template",
                    value: template.clone(),
                    reason: "needs at least a program name".to_string(),
                });
            }
        }
        Ok(())
    }

    /// 命令模板拆分后的参数列表
    pub fn template_args(&self) -> Option<Vec<String>> {
        self.template
            .as_ref()
            .map(|t| t.split_whitespace().map(str::to_string).collect())
    }

    /// 进度间隔，0 表示不启动计时线程
    pub fn progress_interval(&self) -> Option<Duration> {
        if self.progress_interval > 0.0 {
            Duration::try_from_secs_f64(self.progress_interval).ok()
        } else {
            None
        }
    }

    /// 处理根目录和跳过的目录
    ///
    /// 根目录必须存在；递归搜索时嵌套在其他根目录下的根目录被去掉。
    pub fn resolve_dirs(&self) -> FindResult<(Vec<PathBuf>, Vec<PathBuf>)> {
        let roots = process_input_dirs(&self.paths, true, self.recurse())?;
        if roots.is_empty() {
            return Err(FindError::NoRoots);
        }
        let prune = process_input_dirs(&self.skip_dir, false, false)?;
        Ok((roots, prune))
    }

    /// 构建过滤器集合
    pub fn build_filters(&self) -> FindResult<FilterSet> {
        let mut filters = FilterSet::new();

        for (raw, include) in tagged(&self.name, &self.not_name) {
            if let Some(spec) = PatternSpec::name(raw, self.name_mode, self.name_ic, include)? {
                filters.push(FilterSpec::Name(spec))?;
            }
        }
        for (raw, include) in tagged(&self.path, &self.not_path) {
            if let Some(spec) = PatternSpec::path(raw, self.path_mode, self.path_ic, include)? {
                filters.push(FilterSpec::Path(spec))?;
            }
        }

        if let Some((raw, include)) = either(&self.ext, &self.not_ext) {
            if let Some(spec) = ExtensionSpec::parse(raw, include)? {
                filters.push(FilterSpec::Extension(spec))?;
            }
        }

        if let Some(raw) = &self.file_type {
            if let Some(spec) = TypeSpec::parse(raw)? {
                filters.push(FilterSpec::Type(spec))?;
            }
        }

        if let Some(spec) = SizeSpec::parse(
            self.size_min.as_deref().unwrap_or(""),
            self.size_max.as_deref().unwrap_or(""),
            self.size_unit,
        )? {
            filters.push(FilterSpec::Size(spec))?;
        }

        if let Some(spec) = TimeSpec::parse(
            self.time_field,
            self.after.as_deref().unwrap_or(""),
            self.before.as_deref().unwrap_or(""),
        )? {
            filters.push(FilterSpec::Time(spec))?;
        }

        let uids = match either(&self.uid, &self.not_uid) {
            Some((raw, include)) => IdSet::parse("UID", raw, include)?,
            None => None,
        };
        let gids = match either(&self.gid, &self.not_gid) {
            Some((raw, include)) => IdSet::parse("GID", raw, include)?,
            None => None,
        };
        if let Some(spec) = OwnerSpec::new(uids, gids) {
            filters.push(FilterSpec::Owner(spec))?;
        }

        if let Some((raw, include)) = either(&self.mode, &self.not_mode) {
            if let Some(spec) = PatternSpec::mode(raw, self.mode_mode, include)? {
                filters.push(FilterSpec::Mode(spec))?;
            }
        }

        if let Some(n) = self.nlink_gt {
            filters.push(FilterSpec::Links(LinksSpec::new(n)))?;
        }

        if let Some(raw) = &self.content {
            let spec = ContentSpec::parse(raw, self.content_mode, self.content_ic)?;
            filters.push(FilterSpec::Content(spec))?;
        }

        Ok(filters)
    }

    /// 目录名剪枝匹配器
    pub fn prune_name_matcher(&self) -> FindResult<Option<Matcher>> {
        let Some(raw) = &self.skip_name else {
            return Ok(None);
        };
        let sep = if self.skip_name_mode == MatchMode::RegExp {
            None
        } else {
            Some('|')
        };
        let patterns = split_patterns(raw, sep, false);
        if patterns.is_empty() {
            return Ok(None);
        }
        Matcher::new(self.skip_name_mode, patterns, self.skip_name_ic).map(Some)
    }

    /// 构建扫描选项
    pub fn build_options(&self) -> FindResult<ScanOptions> {
        self.validate()?;

        let (roots, prune) = self.resolve_dirs()?;
        debug!("根目录: {:?}，跳过: {:?}", roots, prune);

        let read_options = ReadOptions::new()
            .with_encoding_label(&self.encoding)?
            .with_errors(self.errors)
            .with_newline(self.newline);

        let options = ScanOptions::new()
            .with_roots(roots, &prune)
            .with_recurse(self.recurse())
            .with_prune_names(self.prune_name_matcher()?)
            .with_filters(self.build_filters()?)
            .with_read_options(read_options)
            .with_columns(self.columns.clone())
            .with_max_results(self.max_results)
            .with_progress_interval(self.progress_interval());
        options.validate()?;
        Ok(options)
    }
}

/// 把包含和排除两组参数合并为 (参数, 是否包含)
fn tagged<'a>(include: &'a [String], exclude: &'a [String]) -> impl Iterator<Item = (&'a str, bool)> {
    include
        .iter()
        .map(|s| (s.as_str(), true))
        .chain(exclude.iter().map(|s| (s.as_str(), false)))
}

fn either<'a>(include: &'a Option<String>, exclude: &'a Option<String>) -> Option<(&'a str, bool)> {
    match (include, exclude) {
        (Some(raw), _) => Some((raw.as_str(), true)),
        (None, Some(raw)) => Some((raw.as_str(), false)),
        (None, None) => None,
    }
}
