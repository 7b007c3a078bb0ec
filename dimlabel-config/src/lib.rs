use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV: &str = "DIMLABEL_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub lookups: LookupConfig,
    #[serde(default)]
    pub fields: FieldNames,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub dimension: DimensionConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 自动发现配置文件：优先读取环境变量 `DIMLABEL_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置：`level` 作为 tracing 过滤器，`journal_file` 为命令结果追加日志。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    #[serde(default = "LoggingConfig::default_journal_file")]
    pub journal_file: PathBuf,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }

    fn default_journal_file() -> PathBuf {
        PathBuf::from("dimlabel.log")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            journal_file: Self::default_journal_file(),
        }
    }
}

/// 两张替换表的来源文件。
#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "LookupConfig::default_company")]
    pub company: PathBuf,
    #[serde(default = "LookupConfig::default_purpose")]
    pub purpose: PathBuf,
}

impl LookupConfig {
    fn default_company() -> PathBuf {
        PathBuf::from("CompanyLookup.csv")
    }

    fn default_purpose() -> PathBuf {
        PathBuf::from("PurposeLookup.csv")
    }

    /// 相对路径基于 `directory`（若配置）解析。
    pub fn company_path(&self) -> PathBuf {
        self.resolve(&self.company)
    }

    pub fn purpose_path(&self) -> PathBuf {
        self.resolve(&self.purpose)
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        match &self.directory {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file.to_path_buf(),
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            directory: None,
            company: Self::default_company(),
            purpose: Self::default_purpose(),
        }
    }
}

/// 属性记录中使用的字段名。
#[derive(Debug, Clone, Deserialize)]
pub struct FieldNames {
    #[serde(default = "FieldNames::default_identifier")]
    pub identifier: String,
    #[serde(default = "FieldNames::default_company")]
    pub company: String,
    #[serde(default = "FieldNames::default_purpose")]
    pub purpose: String,
}

impl FieldNames {
    fn default_identifier() -> String {
        "DISP_NUM".to_string()
    }

    fn default_company() -> String {
        "COMPANY".to_string()
    }

    fn default_purpose() -> String {
        "PURPCD".to_string()
    }
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            identifier: Self::default_identifier(),
            company: Self::default_company(),
            purpose: Self::default_purpose(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlacementConfig {
    #[serde(default = "PlacementConfig::default_fallback_text_height")]
    pub fallback_text_height: f64,
}

impl PlacementConfig {
    fn default_fallback_text_height() -> f64 {
        2.5
    }
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            fallback_text_height: Self::default_fallback_text_height(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementMode {
    /// 两位小数并去除末尾零。
    #[default]
    Plain,
    /// 取整或吸附到常用施工尺寸，固定两位小数。
    Palette,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DimensionConfig {
    #[serde(default)]
    pub measurement: MeasurementMode,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
