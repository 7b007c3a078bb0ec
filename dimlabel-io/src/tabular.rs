use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::IoError;

/// 表格中的一行，仅保留前两列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularRow {
    pub key: String,
    pub value: String,
}

impl TabularRow {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// 外部表格来源。文件不存在时返回 `Ok(None)`，而非错误。
pub trait TabularSource {
    fn load(&self, path: &Path) -> Result<Option<Vec<TabularRow>>, IoError>;
}

/// 读取逗号或制表符分隔的两列文本表，支持双引号转义。
#[derive(Debug, Default, Clone, Copy)]
pub struct DelimitedTableLoader {
    delimiter: Option<char>,
}

impl DelimitedTableLoader {
    pub fn new() -> Self {
        Self { delimiter: None }
    }

    pub fn with_delimiter(delimiter: char) -> Self {
        Self {
            delimiter: Some(delimiter),
        }
    }

    fn delimiter_for(&self, path: &Path, content: &str) -> char {
        if let Some(delimiter) = self.delimiter {
            return delimiter;
        }
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => ',',
            Some("tsv") | Some("tab") => '\t',
            _ => detect_delimiter(content),
        }
    }
}

impl TabularSource for DelimitedTableLoader {
    fn load(&self, path: &Path) -> Result<Option<Vec<TabularRow>>, IoError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "表格文件不存在");
                return Ok(None);
            }
            Err(source) => {
                return Err(IoError::ReadError {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        let delimiter = self.delimiter_for(path, content);
        let records = parse_records(content, delimiter).map_err(|message| {
            IoError::InvalidTable {
                path: path.to_path_buf(),
                message,
            }
        })?;

        let rows: Vec<TabularRow> = records
            .into_iter()
            .filter(|cells| !cells.is_empty())
            .map(|cells| {
                let mut cells = cells.into_iter();
                let key = cells.next().unwrap_or_default();
                let value = cells.next().unwrap_or_default();
                TabularRow { key, value }
            })
            .collect();
        debug!(path = %path.display(), rows = rows.len(), "已读取表格");
        Ok(Some(rows))
    }
}

fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or_default();
    [',', '\t', ';']
        .into_iter()
        .filter_map(|candidate| first_line.find(candidate).map(|pos| (pos, candidate)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, candidate)| candidate)
        .unwrap_or(',')
}

/// 逐字符解析记录；空行产生空记录，由调用方过滤。
fn parse_records(content: &str, delimiter: char) -> Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut quote_line = 0usize;
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    cell.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    cell.push('\n');
                }
                other => cell.push(other),
            }
            continue;
        }
        match ch {
            '"' if cell.trim().is_empty() => {
                cell.clear();
                in_quotes = true;
                quote_line = line;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                finish_record(&mut records, &mut record, &mut cell);
                line += 1;
            }
            c if c == delimiter => record.push(std::mem::take(&mut cell)),
            other => cell.push(other),
        }
    }

    if in_quotes {
        return Err(format!("第 {quote_line} 行的引号未闭合"));
    }
    if !cell.is_empty() || !record.is_empty() {
        finish_record(&mut records, &mut record, &mut cell);
    }
    Ok(records)
}

fn finish_record(records: &mut Vec<Vec<String>>, record: &mut Vec<String>, cell: &mut String) {
    if record.is_empty() && cell.trim().is_empty() {
        cell.clear();
        records.push(Vec::new());
        return;
    }
    record.push(std::mem::take(cell));
    records.push(std::mem::take(record));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_cells_keep_delimiters_and_escaped_quotes() {
        let records =
            parse_records("\"ACME, Inc\",\"Say \"\"hi\"\"\"\r\nB,2\n", ',').expect("parse");
        assert_eq!(
            records,
            vec![
                vec!["ACME, Inc".to_string(), "Say \"hi\"".to_string()],
                vec!["B".to_string(), "2".to_string()],
            ]
        );
    }

    #[test]
    fn blank_lines_become_empty_records() {
        let records = parse_records("A,1\n\nB,2", ',').expect("parse");
        assert_eq!(records.len(), 3);
        assert!(records[1].is_empty());
        assert_eq!(records[2], vec!["B".to_string(), "2".to_string()]);
    }

    #[test]
    fn quoted_cell_may_span_lines() {
        let records = parse_records("K,\"line one\nline two\"\n", ',').expect("parse");
        assert_eq!(records[0][1], "line one\nline two");
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        let err = parse_records("A,1\nB,\"open", ',').unwrap_err();
        assert!(err.contains('2'));
    }

    #[test]
    fn delimiter_detection_prefers_first_seen() {
        assert_eq!(detect_delimiter("KEY\tVALUE,x"), '\t');
        assert_eq!(detect_delimiter("KEY;VALUE"), ';');
        assert_eq!(detect_delimiter("single"), ',');
    }
}
