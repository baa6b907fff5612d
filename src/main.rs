use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};

use treefind::cli::Cli;
use treefind::errors::{ErrorCategory, ScanErrors};
use treefind::finder::{CancelToken, ScanPipeline};
use treefind::results::{delete_rows, expand_placeholders, format_row, sort_rows};

fn main() -> Result<()> {
    // 解析命令行参数
    let cli = Cli::parse();

    // 初始化日志
    env_logger::Builder::new()
        .filter_level(if cli.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    info!("开始运行 treefind");

    let options = cli.build_options().context("无效的命令行参数")?;
    let template = cli.template_args();

    let pipeline = ScanPipeline::new();
    let mut report = pipeline
        .run(&options, CancelToken::new())
        .context("扫描失败")?;

    print_errors(&report.errors)?;

    if report.exceeds_limit() && !cli.yes {
        warn!(
            "找到 {} 个结果，超过上限 {}；使用 --yes 显示",
            report.rows.len(),
            report.max_results
        );
        return Ok(());
    }

    sort_rows(&mut report.rows);

    // 输出结果
    let mut out = BufWriter::new(io::stdout().lock());
    for row in &report.rows {
        match &template {
            Some(args) => writeln!(out, "{}", expand_placeholders(args, row).join(" "))?,
            None => writeln!(out, "{}", format_row(row))?,
        }
    }
    out.flush()?;

    if cli.delete {
        if !cli.yes {
            warn!("删除需要 --yes 确认");
        }
        let deletion = delete_rows(&report.rows, cli.yes);
        for (path, reason) in &deletion.failed {
            debug!("未删除 {}: {}", path.display(), reason);
        }
        info!(
            "已删除 {} 项，{} 项未删除",
            deletion.deleted.len(),
            deletion.failed.len()
        );
    }

    let progress = report.progress;
    info!(
        "搜索{}，找到 {} 项，检查 {} 项，访问 {} 个目录，{} 个错误，耗时 {:.2?}",
        report.state,
        report.rows.len(),
        progress.items_examined,
        progress.dirs_visited,
        report.errors.len(),
        progress.elapsed
    );

    Ok(())
}

/// 把三类错误分别输出到标准错误
fn print_errors(errors: &ScanErrors) -> io::Result<()> {
    let mut err = io::stderr().lock();
    for category in [ErrorCategory::Traversal, ErrorCategory::Item, ErrorCategory::Content] {
        let messages = errors.messages(category);
        if messages.is_empty() {
            continue;
        }
        writeln!(err, "Errors {}:", category)?;
        for message in messages {
            writeln!(err, "    {}", message)?;
        }
    }
    Ok(())
}
