use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use tempfile::{tempdir, TempDir};

use treefind::errors::ErrorCategory;
use treefind::finder::filter::{
    ContentSpec, ExtensionSpec, IdSet, LinksSpec, OwnerSpec, PatternSpec, SizeSpec, TimeField, TimeSpec, TypeSpec,
};
use treefind::finder::row::ColumnValue;
use treefind::finder::{CancelToken, Column, FilterSpec, MatchMode, ScanOptions, ScanPipeline, ScanState};
use treefind::pathutil::is_subdirectory_of;
use treefind::results::sort_rows;

/// root/a.txt (512 B), root/sub/b.txt (2048 B), root/sub2/c.log
fn create_data_tree() -> Result<TempDir, Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let base = temp_dir.path();

    fs::create_dir(base.join("sub"))?;
    fs::create_dir(base.join("sub2"))?;
    File::create(base.join("a.txt"))?.write_all(&[b'a'; 512])?;
    File::create(base.join("sub/b.txt"))?.write_all(&[b'b'; 2048])?;
    File::create(base.join("sub2/c.log"))?.write_all(b"log")?;

    Ok(temp_dir)
}

fn options_for(root: &Path) -> ScanOptions {
    ScanOptions::new()
        .with_roots(vec![root.to_path_buf()], &[])
        .with_progress_interval(None)
}

fn names(rows: &[treefind::finder::ResultRow]) -> BTreeSet<String> {
    rows.iter().map(|r| r.name.clone()).collect()
}

#[test]
fn test_extension_filter_and_display_size() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = create_data_tree()?;
    let ext = ExtensionSpec::parse(".txt", true)?.ok_or("no extension filter")?;
    let options = options_for(temp_dir.path()).with_filter(FilterSpec::Extension(ext))?;

    let mut report = ScanPipeline::new().run(&options, CancelToken::new())?;
    sort_rows(&mut report.rows);

    assert_eq!(report.state, ScanState::Completed);
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rows[0].name, "a.txt");
    assert_eq!(report.rows[0].display_size, "512 B");
    assert_eq!(report.rows[0].extension, ".txt");
    assert_eq!(report.rows[1].name, "b.txt");
    assert_eq!(report.rows[1].display_size, "2 K");
    assert_eq!(report.rows[1].size_bytes, 2048);
    assert_eq!(report.rows[1].directory, temp_dir.path().join("sub"));
    Ok(())
}

#[test]
fn test_not_name_ignore_case() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = create_data_tree()?;
    let name = PatternSpec::name("B", MatchMode::Contains, true, false)?.ok_or("no name filter")?;
    let file_type = TypeSpec::parse("-")?.ok_or("no type filter")?;
    let options = options_for(temp_dir.path())
        .with_filter(FilterSpec::Name(name))?
        .with_filter(FilterSpec::Type(file_type))?;

    let report = ScanPipeline::new().run(&options, CancelToken::new())?;
    assert_eq!(names(&report.rows), BTreeSet::from(["a.txt".to_string(), "c.log".to_string()]));
    Ok(())
}

#[test]
fn test_prune_path() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = create_data_tree()?;
    let pruned = temp_dir.path().join("sub2");
    let file_type = TypeSpec::parse("-")?.ok_or("no type filter")?;
    let options = ScanOptions::new()
        .with_roots(vec![temp_dir.path().to_path_buf()], std::slice::from_ref(&pruned))
        .with_progress_interval(None)
        .with_filter(FilterSpec::Type(file_type))?;

    let report = ScanPipeline::new().run(&options, CancelToken::new())?;

    assert_eq!(names(&report.rows), BTreeSet::from(["a.txt".to_string(), "b.txt".to_string()]));
    let prune: Vec<PathBuf> = vec![pruned];
    assert!(report.rows.iter().all(|r| !is_subdirectory_of(&r.directory, &prune)));
    // 根目录和 sub，不含 sub2
    assert_eq!(report.progress.dirs_visited, 2);
    Ok(())
}

#[test]
fn test_prune_name() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = create_data_tree()?;
    let matcher = treefind::finder::Matcher::new(MatchMode::Exact, vec!["SUB".to_string()], true)?;
    let options = options_for(temp_dir.path()).with_prune_names(Some(matcher));

    let report = ScanPipeline::new().run(&options, CancelToken::new())?;
    assert_eq!(
        names(&report.rows),
        BTreeSet::from(["a.txt".to_string(), "c.log".to_string(), "sub2".to_string()])
    );
    Ok(())
}

#[test]
fn test_content_filter() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("a.txt"), "first line\nhello world\n")?;
    fs::write(temp_dir.path().join("other.txt"), "nothing to see\n")?;
    fs::create_dir(temp_dir.path().join("hello"))?;

    let content = ContentSpec::parse("hello", MatchMode::Contains, false)?;
    let options = options_for(temp_dir.path()).with_filter(FilterSpec::Content(content))?;

    let report = ScanPipeline::new().run(&options, CancelToken::new())?;
    assert_eq!(names(&report.rows), BTreeSet::from(["a.txt".to_string()]));
    assert!(report.errors.list(ErrorCategory::Content).is_empty());
    Ok(())
}

#[test]
fn test_content_decode_error_is_recorded() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("bad.txt"), b"hello \xff\xfe world\n")?;

    let content = ContentSpec::parse("hello", MatchMode::Contains, false)?;
    let options = options_for(temp_dir.path()).with_filter(FilterSpec::Content(content))?;

    let report = ScanPipeline::new().run(&options, CancelToken::new())?;
    assert!(report.rows.is_empty());
    assert_eq!(report.errors.list(ErrorCategory::Content).len(), 1);
    assert_eq!(report.progress.content_errors, 1);
    assert_eq!(report.state, ScanState::Completed);
    Ok(())
}

#[test]
fn test_size_is_an_open_interval() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("exact.bin"), vec![0u8; 1024])?;
    fs::write(temp_dir.path().join("bigger.bin"), vec![0u8; 2048])?;

    let size = SizeSpec::new(Some(1024), None)?;
    let options = options_for(temp_dir.path()).with_filter(FilterSpec::Size(size))?;

    let report = ScanPipeline::new().run(&options, CancelToken::new())?;
    assert_eq!(names(&report.rows), BTreeSet::from(["bigger.bin".to_string()]));
    Ok(())
}

#[test]
fn test_cancel_keeps_earlier_rows() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = create_data_tree()?;
    let options = options_for(temp_dir.path());
    let pipeline = ScanPipeline::new();
    let cancel = CancelToken::new();

    let mut scan = pipeline.scan(&options, cancel.clone())?;
    let first = scan.next();
    assert!(first.is_some());

    cancel.cancel();
    assert_eq!(scan.by_ref().count(), 0);

    let summary = scan.finish();
    assert_eq!(summary.state, ScanState::Cancelled);
    assert_eq!(summary.progress.items_matched, 1);
    assert_eq!(pipeline.state(), ScanState::Cancelled);
    Ok(())
}

#[test]
fn test_scan_is_repeatable() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = create_data_tree()?;
    let options = options_for(temp_dir.path()).with_columns(vec![Column::Mode, Column::Nlink]);
    let pipeline = ScanPipeline::new();

    let mut first = pipeline.run(&options, CancelToken::new())?;
    let mut second = pipeline.run(&options, CancelToken::new())?;
    sort_rows(&mut first.rows);
    sort_rows(&mut second.rows);

    assert_eq!(first.rows, second.rows);
    assert_eq!(first.rows.len(), 5);
    assert_eq!(first.errors.len(), second.errors.len());
    assert!(first.rows.iter().all(|r| r.column(Column::Mode).is_some()));
    Ok(())
}

#[test]
fn test_multiple_roots() -> Result<(), Box<dyn std::error::Error>> {
    let first = create_data_tree()?;
    let second = tempdir()?;
    fs::write(second.path().join("z.txt"), "z")?;

    let ext = ExtensionSpec::parse(".txt", true)?.ok_or("no extension filter")?;
    let options = ScanOptions::new()
        .with_roots(vec![first.path().to_path_buf(), second.path().to_path_buf()], &[])
        .with_progress_interval(None)
        .with_filter(FilterSpec::Extension(ext))?;

    let report = ScanPipeline::new().run(&options, CancelToken::new())?;
    assert_eq!(
        names(&report.rows),
        BTreeSet::from(["a.txt".to_string(), "b.txt".to_string(), "z.txt".to_string()])
    );
    assert_eq!(report.progress.dirs_visited, 4);
    Ok(())
}

#[test]
fn test_time_filter() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = create_data_tree()?;
    let hour_ago = SystemTime::now() - Duration::from_secs(3600);
    let file_type = TypeSpec::parse("-")?.ok_or("no type filter")?;

    let recent = TimeSpec::new(TimeField::Modified, Some(hour_ago), None)?;
    let options = options_for(temp_dir.path())
        .with_filter(FilterSpec::Type(file_type.clone()))?
        .with_filter(FilterSpec::Time(recent))?;
    let report = ScanPipeline::new().run(&options, CancelToken::new())?;
    assert_eq!(report.rows.len(), 3);

    let old = TimeSpec::new(TimeField::Changed, None, Some(hour_ago))?;
    let options = options_for(temp_dir.path())
        .with_filter(FilterSpec::Type(file_type))?
        .with_filter(FilterSpec::Time(old))?;
    let report = ScanPipeline::new().run(&options, CancelToken::new())?;
    assert!(report.rows.is_empty());
    assert!(report.errors.is_empty());
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_owner_filter() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::fs::MetadataExt;

    let temp_dir = create_data_tree()?;
    let stat = fs::metadata(temp_dir.path().join("a.txt"))?;

    let uids = IdSet::parse("UID", &format!("{}|4294967294", stat.uid()), true)?;
    let owner = OwnerSpec::new(uids, None).ok_or("no owner filter")?;
    let options = options_for(temp_dir.path()).with_filter(FilterSpec::Owner(owner))?;
    let report = ScanPipeline::new().run(&options, CancelToken::new())?;
    assert_eq!(report.rows.len(), 5);

    let gids = IdSet::parse("GID", &stat.gid().to_string(), false)?;
    let owner = OwnerSpec::new(None, gids).ok_or("no owner filter")?;
    let options = options_for(temp_dir.path()).with_filter(FilterSpec::Owner(owner))?;
    let report = ScanPipeline::new().run(&options, CancelToken::new())?;
    assert!(report.rows.is_empty());
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_mode_filter_fills_mode_column() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = tempdir()?;
    let shared = temp_dir.path().join("shared.txt");
    let private = temp_dir.path().join("private.txt");
    fs::write(&shared, "s")?;
    fs::write(&private, "p")?;
    fs::set_permissions(&shared, fs::Permissions::from_mode(0o640))?;
    fs::set_permissions(&private, fs::Permissions::from_mode(0o600))?;

    let mode = PatternSpec::mode("-rw-r-*", MatchMode::WildCard, true)?.ok_or("no mode filter")?;
    let options = options_for(temp_dir.path())
        .with_filter(FilterSpec::Mode(mode))?
        .with_columns(vec![Column::Nlink, Column::Mode]);

    let report = ScanPipeline::new().run(&options, CancelToken::new())?;
    assert_eq!(names(&report.rows), BTreeSet::from(["shared.txt".to_string()]));
    assert_eq!(
        report.rows[0].column(Column::Mode),
        Some(&ColumnValue::Text("-rw-r-----".to_string()))
    );
    assert_eq!(report.rows[0].column(Column::Nlink), Some(&ColumnValue::Number(1)));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_links_filter() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("first.txt"), "shared")?;
    fs::hard_link(temp_dir.path().join("first.txt"), temp_dir.path().join("second.txt"))?;
    fs::write(temp_dir.path().join("single.txt"), "alone")?;

    let mode = PatternSpec::mode("-*", MatchMode::WildCard, true)?.ok_or("no mode filter")?;
    let links = LinksSpec::parse("1")?.ok_or("no links filter")?;
    let time = TimeSpec::new(TimeField::Changed, Some(SystemTime::UNIX_EPOCH), None)?;
    let options = options_for(temp_dir.path())
        .with_filter(FilterSpec::Mode(mode))?
        .with_filter(FilterSpec::Links(links))?
        .with_filter(FilterSpec::Time(time))?
        .with_columns(vec![Column::Nlink]);

    let report = ScanPipeline::new().run(&options, CancelToken::new())?;
    assert_eq!(
        names(&report.rows),
        BTreeSet::from(["first.txt".to_string(), "second.txt".to_string()])
    );
    assert!(report
        .rows
        .iter()
        .all(|r| r.column(Column::Nlink) == Some(&ColumnValue::Number(2))));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_stat_failure_is_an_item_error() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = tempdir()?;
    let locked = temp_dir.path().join("locked");
    fs::create_dir(&locked)?;
    fs::write(locked.join("hidden.bin"), vec![0u8; 16])?;
    fs::write(temp_dir.path().join("open.bin"), vec![0u8; 16])?;

    // 可列出但不可进入：条目名可见，stat 失败
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o444))?;
    if fs::symlink_metadata(locked.join("hidden.bin")).is_ok() {
        // root 用户不受权限位限制
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;
        return Ok(());
    }

    let file_type = TypeSpec::parse("-")?.ok_or("no type filter")?;
    let size = SizeSpec::new(Some(1), None)?;
    let options = options_for(temp_dir.path())
        .with_filter(FilterSpec::Type(file_type))?
        .with_filter(FilterSpec::Size(size))?;
    let result = ScanPipeline::new().run(&options, CancelToken::new());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;
    let report = result?;

    assert_eq!(report.state, ScanState::Completed);
    assert_eq!(names(&report.rows), BTreeSet::from(["open.bin".to_string()]));
    let item_errors = report.errors.list(ErrorCategory::Item);
    assert!(item_errors.iter().any(|e| e.path == locked.join("hidden.bin")));
    assert!(report.errors.list(ErrorCategory::Traversal).is_empty());
    assert_eq!(report.progress.item_errors, item_errors.len());
    Ok(())
}

#[test]
fn test_cancel_seen_on_tick() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    for i in 0..50 {
        File::create(temp_dir.path().join(format!("f{:02}.txt", i)))?;
    }
    let options = ScanOptions::new()
        .with_roots(vec![temp_dir.path().to_path_buf()], &[])
        .with_progress_interval(Some(Duration::from_millis(1)));
    let pipeline = ScanPipeline::new();
    let cancel = CancelToken::new();

    let mut scan = pipeline.scan(&options, cancel.clone())?;
    cancel.cancel();
    thread::sleep(Duration::from_millis(50));
    let yielded = scan.by_ref().count();

    let summary = scan.finish();
    assert_eq!(summary.state, ScanState::Cancelled);
    assert!(yielded < 50);
    assert_eq!(summary.progress.items_matched, yielded);
    assert_eq!(pipeline.state(), ScanState::Cancelled);
    Ok(())
}

#[test]
fn test_cancel_waits_for_tick() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = create_data_tree()?;
    let options = ScanOptions::new()
        .with_roots(vec![temp_dir.path().to_path_buf()], &[])
        .with_progress_interval(Some(Duration::from_secs(3600)));
    let pipeline = ScanPipeline::new();
    let cancel = CancelToken::new();

    let mut scan = pipeline.scan(&options, cancel.clone())?;
    cancel.cancel();
    // 计时器未触发前不检查取消信号
    assert_eq!(scan.by_ref().count(), 5);
    assert_eq!(scan.finish().state, ScanState::Completed);
    Ok(())
}
