use std::collections::HashMap;
use std::path::Path;

use dimlabel_io::{IoError, TabularRow, TabularSource};
use tracing::{debug, info};

/// 两列替换表：键去除首尾空白后比较，重复键保留首次出现的值。
#[derive(Debug, Default, Clone)]
pub struct LookupTable {
    map: HashMap<String, String>,
}

impl LookupTable {
    /// 空表，所有查询原样返回。
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = TabularRow>,
    {
        let mut map = HashMap::new();
        for row in rows {
            let key = row.key.trim();
            if key.is_empty() {
                continue;
            }
            map.entry(key.to_string())
                .or_insert_with(|| row.value.trim().to_string());
        }
        Self { map }
    }

    /// 从外部表格构建；文件不存在时得到空表。
    pub fn build(source: &dyn TabularSource, path: &Path) -> Result<Self, IoError> {
        match source.load(path)? {
            Some(rows) => {
                let table = Self::from_rows(rows);
                info!(path = %path.display(), entries = table.len(), "已加载替换表");
                Ok(table)
            }
            None => {
                debug!(path = %path.display(), "替换表文件不存在，使用原值透传");
                Ok(Self::empty())
            }
        }
    }

    /// 命中时返回映射值，否则返回输入本身。
    pub fn lookup<'a>(&'a self, value: &'a str) -> &'a str {
        self.map
            .get(value.trim())
            .map(String::as_str)
            .unwrap_or(value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// 公司与用途两张替换表，由调度层构建后显式传入命令。
#[derive(Debug, Default, Clone)]
pub struct LookupTables {
    pub company: LookupTable,
    pub purpose: LookupTable,
}

impl LookupTables {
    pub fn new(company: LookupTable, purpose: LookupTable) -> Self {
        Self { company, purpose }
    }

    pub fn load(
        source: &dyn TabularSource,
        company_path: &Path,
        purpose_path: &Path,
    ) -> Result<Self, IoError> {
        Ok(Self {
            company: LookupTable::build(source, company_path)?,
            purpose: LookupTable::build(source, purpose_path)?,
        })
    }
}
