use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::warn;

use crate::IoError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 命令结果日志：每次调用追加一行。写入失败不会中断命令。
pub trait Journal {
    fn record(&mut self, message: &str);
}

/// 生成 `YYYY-MM-DD HH:MM:SS <message>\n` 格式的日志行。
pub fn format_line(timestamp: NaiveDateTime, message: &str) -> String {
    format!("{} {}\n", timestamp.format(TIMESTAMP_FORMAT), message)
}

#[derive(Debug, Clone)]
pub struct FileJournal {
    path: PathBuf,
}

impl FileJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, message: &str) -> Result<(), IoError> {
        let line = format_line(Local::now().naive_local(), message);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|source| IoError::WriteError {
                path: self.path.clone(),
                source,
            })
    }
}

impl Journal for FileJournal {
    fn record(&mut self, message: &str) {
        if let Err(err) = self.append(message) {
            warn!(path = %self.path.display(), error = %err, "写入命令日志失败");
        }
    }
}

/// 内存日志，便于测试或嵌入式调用方检查输出。
#[derive(Debug, Default, Clone)]
pub struct MemoryJournal {
    entries: Vec<String>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

impl Journal for MemoryJournal {
    fn record(&mut self, message: &str) {
        self.entries.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn line_format_uses_second_precision_timestamp() {
        let timestamp = NaiveDate::from_ymd_opt(2024, 3, 7)
            .and_then(|date| date.and_hms_opt(9, 5, 1))
            .expect("valid timestamp");
        assert_eq!(
            format_line(timestamp, "UPD success (4)"),
            "2024-03-07 09:05:01 UPD success (4)\n"
        );
    }

    #[test]
    fn file_journal_appends_lines() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("dimlabel.log");
        let mut journal = FileJournal::new(&path);
        journal.record("Initialize: SUCCESS");
        journal.record("UPM success (2)");

        let content = std::fs::read_to_string(&path).expect("read journal");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" Initialize: SUCCESS"));
        assert!(lines[1].ends_with(" UPM success (2)"));
        // "YYYY-MM-DD HH:MM:SS " 前缀
        assert_eq!(lines[0].find(" Initialize"), Some(19));
    }

    #[test]
    fn unwritable_journal_reports_error_without_panicking() {
        let dir = tempfile::tempdir().expect("temp dir");
        let journal = FileJournal::new(dir.path());
        assert!(matches!(
            journal.append("ignored"),
            Err(IoError::WriteError { .. })
        ));

        let mut journal = journal;
        journal.record("still fine");
    }

    #[test]
    fn memory_journal_keeps_messages() {
        let mut journal = MemoryJournal::new();
        journal.record("one");
        journal.record("two");
        assert_eq!(journal.entries(), ["one".to_string(), "two".to_string()]);
    }
}
