//! Result rows
//!
//! A [`ResultRow`] is built once for every entry that survives all active
//! filters. Optional columns are only computed when requested.

use std::fmt;
use std::fs::{self, FileType, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::errors::FindError;
use crate::pathutil::normalize;

/// Sortable timestamp format used for display and for time filter input
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Coarse file type selectable in the type filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeClass {
    Regular,
    Directory,
    Symlink,
    /// Sockets, devices, FIFOs and anything else
    Other,
}

impl TypeClass {
    pub const ALL: [TypeClass; 4] = [
        TypeClass::Regular,
        TypeClass::Directory,
        TypeClass::Symlink,
        TypeClass::Other,
    ];

    pub fn symbol(self) -> char {
        match self {
            TypeClass::Regular => '-',
            TypeClass::Directory => 'd',
            TypeClass::Symlink => 'l',
            TypeClass::Other => 'o',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '-' | 'f' => Some(TypeClass::Regular),
            'd' => Some(TypeClass::Directory),
            'l' => Some(TypeClass::Symlink),
            'o' => Some(TypeClass::Other),
            _ => None,
        }
    }
}

/// File type of an entry, classified without following symbolic links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Regular,
    Directory,
    Symlink,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
    Unknown,
}

impl EntryType {
    pub fn from_file_type(file_type: FileType) -> Self {
        if file_type.is_symlink() {
            return EntryType::Symlink;
        }
        if file_type.is_dir() {
            return EntryType::Directory;
        }
        if file_type.is_file() {
            return EntryType::Regular;
        }
        Self::special(file_type)
    }

    #[cfg(unix)]
    fn special(file_type: FileType) -> Self {
        use std::os::unix::fs::FileTypeExt;

        if file_type.is_char_device() {
            EntryType::CharDevice
        } else if file_type.is_block_device() {
            EntryType::BlockDevice
        } else if file_type.is_fifo() {
            EntryType::Fifo
        } else if file_type.is_socket() {
            EntryType::Socket
        } else {
            EntryType::Unknown
        }
    }

    #[cfg(not(unix))]
    fn special(_file_type: FileType) -> Self {
        EntryType::Unknown
    }

    /// Type character as shown in the first position of `ls -l`
    pub fn symbol(self) -> char {
        match self {
            EntryType::Regular => '-',
            EntryType::Directory => 'd',
            EntryType::Symlink => 'l',
            EntryType::CharDevice => 'c',
            EntryType::BlockDevice => 'b',
            EntryType::Fifo => 'p',
            EntryType::Socket => 's',
            EntryType::Unknown => '?',
        }
    }

    pub fn class(self) -> TypeClass {
        match self {
            EntryType::Regular => TypeClass::Regular,
            EntryType::Directory => TypeClass::Directory,
            EntryType::Symlink => TypeClass::Symlink,
            _ => TypeClass::Other,
        }
    }
}

/// Optional columns a caller can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Mtime,
    Ctime,
    Atime,
    LinkTo,
    Mode,
    Uid,
    Gid,
    Nlink,
    Ino,
    Dev,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::Mtime,
        Column::Ctime,
        Column::Atime,
        Column::LinkTo,
        Column::Mode,
        Column::Uid,
        Column::Gid,
        Column::Nlink,
        Column::Ino,
        Column::Dev,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Mtime => "MTIME",
            Column::Ctime => "CTIME",
            Column::Atime => "ATIME",
            Column::LinkTo => "LinkTo",
            Column::Mode => "MODE",
            Column::Uid => "UID",
            Column::Gid => "GID",
            Column::Nlink => "NLINK",
            Column::Ino => "INO",
            Column::Dev => "DEV",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = FindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Column::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| FindError::InvalidValue {
                field: "column",
                value: s.to_string(),
                reason: format!(
                    "expected one of {}",
                    Column::ALL.map(Column::name).join(", ")
                ),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Text(String),
    Number(u64),
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Text(s) => f.write_str(s),
            ColumnValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// One matched entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub file_type: EntryType,
    pub directory: PathBuf,
    pub name: String,
    pub extension: String,
    pub size_bytes: u64,
    pub display_size: String,
    /// Requested optional columns, in request order
    pub extras: Vec<(Column, ColumnValue)>,
}

impl ResultRow {
    /// Assembles a row from the entry's cached metadata.
    ///
    /// `cached_mode` is a permission string already computed by the mode
    /// filter. Reading a link target is the only I/O done here.
    pub fn assemble(
        file_type: EntryType,
        directory: &Path,
        name: String,
        metadata: &Metadata,
        columns: &[Column],
        cached_mode: Option<String>,
    ) -> io::Result<Self> {
        let size_bytes = metadata.len();
        let display_size = if file_type == EntryType::Directory {
            "<DIR>".to_string()
        } else {
            display_size(size_bytes)
        };

        let mut cached_mode = cached_mode;
        let mut extras = Vec::with_capacity(columns.len());
        for &column in columns {
            let value = match column {
                Column::Mtime => ColumnValue::Text(format_time(metadata.modified()?)),
                Column::Ctime => ColumnValue::Text(format_time(meta::changed(metadata)?)),
                Column::Atime => ColumnValue::Text(format_time(metadata.accessed()?)),
                Column::LinkTo => ColumnValue::Text(if file_type == EntryType::Symlink {
                    link_to(&directory.join(&name), directory)?
                } else {
                    String::new()
                }),
                Column::Mode => ColumnValue::Text(
                    cached_mode
                        .take()
                        .unwrap_or_else(|| mode_string(meta::mode(metadata))),
                ),
                Column::Uid => ColumnValue::Number(u64::from(meta::uid(metadata))),
                Column::Gid => ColumnValue::Number(u64::from(meta::gid(metadata))),
                Column::Nlink => ColumnValue::Number(meta::nlink(metadata)),
                Column::Ino => ColumnValue::Number(meta::ino(metadata)),
                Column::Dev => ColumnValue::Number(meta::dev(metadata)),
            };
            extras.push((column, value));
        }

        Ok(Self {
            file_type,
            extension: extension_of(&name).to_string(),
            directory: directory.to_path_buf(),
            name,
            size_bytes,
            display_size,
            extras,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.name)
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == EntryType::Directory
    }

    pub fn column(&self, column: Column) -> Option<&ColumnValue> {
        self.extras
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, value)| value)
    }
}

/// Extension including the dot, or "" when the name has none.
///
/// A leading dot does not start an extension, so `.bashrc` has none.
pub fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(j) if j > 0 => &name[j..],
        _ => "",
    }
}

/// Human-readable size in whole binary units.
///
/// A unit switches to the next one where rounding would show 1024.
pub fn display_size(bytes: u64) -> String {
    const UNITS: [(u32, &str); 4] = [(10, "K"), (20, "M"), (30, "G"), (40, "T")];

    if bytes < 1 << 10 {
        return format!("{} B", bytes);
    }
    for (shift, unit) in UNITS {
        let limit = (1u64 << (shift + 10)) - (1u64 << (shift + 9));
        if bytes < limit {
            return format!("{:.0} {}", bytes as f64 / (1u64 << shift) as f64, unit);
        }
    }
    ">= 1 P".to_string()
}

pub fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format(TIME_FORMAT).to_string()
}

/// Permission string such as `-rw-r--r--` from raw mode bits
pub fn mode_string(mode: u32) -> String {
    const S_IFMT: u32 = 0o170000;
    let kind = match mode & S_IFMT {
        0o140000 => 's',
        0o120000 => 'l',
        0o100000 => '-',
        0o060000 => 'b',
        0o040000 => 'd',
        0o020000 => 'c',
        0o010000 => 'p',
        _ => '?',
    };

    let mut out = String::with_capacity(10);
    out.push(kind);

    // (read, write, execute, special bit, special char when x set)
    let triads = [
        (0o400, 0o200, 0o100, 0o4000, 's'),
        (0o040, 0o020, 0o010, 0o2000, 's'),
        (0o004, 0o002, 0o001, 0o1000, 't'),
    ];
    for (r, w, x, special, ch) in triads {
        out.push(if mode & r != 0 { 'r' } else { '-' });
        out.push(if mode & w != 0 { 'w' } else { '-' });
        out.push(match (mode & x != 0, mode & special != 0) {
            (true, true) => ch,
            (false, true) => ch.to_ascii_uppercase(),
            (true, false) => 'x',
            (false, false) => '-',
        });
    }
    out
}

/// `"[c] target"` for a symbolic link, where `c` is the type character of
/// what the link resolves to and `!` marks a dangling link
pub fn link_to(link: &Path, directory: &Path) -> io::Result<String> {
    let target = fs::read_link(link)?;
    let resolved = if target.is_absolute() {
        target.clone()
    } else {
        normalize(&directory.join(&target))
    };
    let symbol = match fs::symlink_metadata(&resolved) {
        Ok(metadata) => EntryType::from_file_type(metadata.file_type()).symbol(),
        Err(_) => '!',
    };
    Ok(format!("[{}] {}", symbol, target.display()))
}

/// Platform access to the stat fields the filters and columns use
pub mod meta {
    use std::fs::Metadata;
    use std::io;
    use std::time::SystemTime;

    #[cfg(unix)]
    use std::os::unix::fs::MetadataExt;

    #[cfg(unix)]
    pub fn mode(m: &Metadata) -> u32 {
        m.mode()
    }

    #[cfg(unix)]
    pub fn uid(m: &Metadata) -> u32 {
        m.uid()
    }

    #[cfg(unix)]
    pub fn gid(m: &Metadata) -> u32 {
        m.gid()
    }

    #[cfg(unix)]
    pub fn nlink(m: &Metadata) -> u64 {
        m.nlink()
    }

    #[cfg(unix)]
    pub fn ino(m: &Metadata) -> u64 {
        m.ino()
    }

    #[cfg(unix)]
    pub fn dev(m: &Metadata) -> u64 {
        m.dev()
    }

    /// Inode change time
    #[cfg(unix)]
    pub fn changed(m: &Metadata) -> io::Result<SystemTime> {
        use std::time::{Duration, UNIX_EPOCH};

        let nanos = Duration::from_nanos(m.ctime_nsec().clamp(0, 999_999_999) as u64);
        let time = if m.ctime() >= 0 {
            UNIX_EPOCH + Duration::from_secs(m.ctime() as u64) + nanos
        } else {
            UNIX_EPOCH - Duration::from_secs(m.ctime().unsigned_abs()) + nanos
        };
        Ok(time)
    }

    #[cfg(not(unix))]
    pub fn mode(m: &Metadata) -> u32 {
        let kind = if m.is_dir() {
            0o040000
        } else if m.file_type().is_symlink() {
            0o120000
        } else {
            0o100000
        };
        let perm = if m.permissions().readonly() { 0o444 } else { 0o666 };
        kind | perm
    }

    #[cfg(not(unix))]
    pub fn uid(_m: &Metadata) -> u32 {
        0
    }

    #[cfg(not(unix))]
    pub fn gid(_m: &Metadata) -> u32 {
        0
    }

    #[cfg(not(unix))]
    pub fn nlink(_m: &Metadata) -> u64 {
        1
    }

    #[cfg(not(unix))]
    pub fn ino(_m: &Metadata) -> u64 {
        0
    }

    #[cfg(not(unix))]
    pub fn dev(_m: &Metadata) -> u64 {
        0
    }

    /// Creation time, the closest equivalent outside Unix
    #[cfg(not(unix))]
    pub fn changed(m: &Metadata) -> io::Result<SystemTime> {
        m.created()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_display_size() {
        assert_eq!(display_size(0), "0 B");
        assert_eq!(display_size(512), "512 B");
        assert_eq!(display_size(1023), "1023 B");
        assert_eq!(display_size(1024), "1 K");
        assert_eq!(display_size(2048), "2 K");
        assert_eq!(display_size(7 * 1024 + 100), "7 K");
        // would round to 1024 K
        assert_eq!(display_size((1 << 20) - (1 << 9)), "1 M");
        assert_eq!(display_size((1 << 20) - (1 << 9) - 1), "1023 K");
        assert_eq!(display_size(3 << 30), "3 G");
        assert_eq!(display_size(1 << 50), ">= 1 P");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.txt"), ".txt");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of(".bashrc"), "");
        assert_eq!(extension_of("Makefile"), "");
        assert_eq!(extension_of("trailing."), ".");
    }

    #[test]
    fn test_mode_string() {
        assert_eq!(mode_string(0o100644), "-rw-r--r--");
        assert_eq!(mode_string(0o040755), "drwxr-xr-x");
        assert_eq!(mode_string(0o120777), "lrwxrwxrwx");
        assert_eq!(mode_string(0o104755), "-rwsr-xr-x");
        assert_eq!(mode_string(0o102644), "-rw-r-Sr--");
        assert_eq!(mode_string(0o041777), "drwxrwxrwt");
        assert_eq!(mode_string(0o041776), "drwxrwxrwT");
    }

    #[test]
    fn test_column_parsing() {
        assert_eq!("mtime".parse::<Column>().unwrap(), Column::Mtime);
        assert_eq!("LinkTo".parse::<Column>().unwrap(), Column::LinkTo);
        assert_eq!(" NLINK ".parse::<Column>().unwrap(), Column::Nlink);
        assert!("SIZE".parse::<Column>().is_err());
    }

    #[test]
    fn test_type_symbols() {
        for class in TypeClass::ALL {
            assert_eq!(TypeClass::from_symbol(class.symbol()), Some(class));
        }
        assert_eq!(EntryType::Fifo.class(), TypeClass::Other);
        assert_eq!(EntryType::Fifo.symbol(), 'p');
    }

    #[test]
    fn test_assemble_row() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("b.txt");
        File::create(&path)?.write_all(&[b'x'; 2048])?;
        let metadata = fs::symlink_metadata(&path)?;

        let row = ResultRow::assemble(
            EntryType::Regular,
            temp_dir.path(),
            "b.txt".to_string(),
            &metadata,
            &[Column::Mode, Column::LinkTo],
            Some("-rw-------".to_string()),
        )?;

        assert_eq!(row.extension, ".txt");
        assert_eq!(row.size_bytes, 2048);
        assert_eq!(row.display_size, "2 K");
        assert_eq!(row.path(), path);
        assert_eq!(
            row.column(Column::Mode),
            Some(&ColumnValue::Text("-rw-------".to_string()))
        );
        assert_eq!(row.column(Column::LinkTo), Some(&ColumnValue::Text(String::new())));
        assert_eq!(row.column(Column::Ino), None);
        Ok(())
    }

    #[test]
    fn test_directory_display_size() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let metadata = fs::symlink_metadata(temp_dir.path())?;
        let row = ResultRow::assemble(
            EntryType::Directory,
            temp_dir.path(),
            "x".to_string(),
            &metadata,
            &[],
            None,
        )?;
        assert_eq!(row.display_size, "<DIR>");
        assert!(row.is_dir());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_link_to() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let dir = temp_dir.path();
        File::create(dir.join("target.txt"))?;
        std::os::unix::fs::symlink("target.txt", dir.join("good"))?;
        std::os::unix::fs::symlink("missing.txt", dir.join("dangling"))?;

        assert_eq!(link_to(&dir.join("good"), dir)?, "[-] target.txt");
        assert_eq!(link_to(&dir.join("dangling"), dir)?, "[!] missing.txt");
        Ok(())
    }
}
