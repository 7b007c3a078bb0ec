use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dimlabel_engine::CommandRequest;

/// 根据要素属性数据生成并放置组合标注文字。
#[derive(Debug, Parser)]
#[command(name = "dimlabel", version, about)]
pub struct Cli {
    /// 配置文件路径，缺省时按环境变量或 `config/default.toml` 查找。
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// 图纸 JSON 快照。
    #[arg(long, value_name = "SNAPSHOT", global = true)]
    pub drawing: Option<PathBuf>,

    /// 写回位置，缺省时覆盖原快照。
    #[arg(long, value_name = "PATH", global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, Subcommand)]
pub enum Action {
    /// 重写对齐标注的覆盖文字并重新定位。
    Upd {
        dimension: u64,
        feature: u64,
        /// `plain` 或 `palette`，缺省取配置值。
        mode: Option<String>,
    },
    /// 用属性数据重写已有多行文字。
    Upm { mtext: u64, feature: u64 },
    /// 在指定位置新建多行文字标签。
    Upc {
        feature: u64,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        #[arg(allow_negative_numbers = true)]
        z: Option<f64>,
    },
    /// 列出可用命令。
    Commands,
}

impl Action {
    /// 转换为命令总线请求；`Commands` 不需要文档，返回 `None`。
    pub fn into_request(self) -> Option<CommandRequest> {
        match self {
            Action::Upd {
                dimension,
                feature,
                mode,
            } => {
                let mut args = vec![dimension.to_string(), feature.to_string()];
                args.extend(mode);
                Some(CommandRequest::new("UPD", args))
            }
            Action::Upm { mtext, feature } => Some(CommandRequest::new(
                "UPM",
                [mtext.to_string(), feature.to_string()],
            )),
            Action::Upc { feature, x, y, z } => {
                let mut args = vec![feature.to_string(), x.to_string(), y.to_string()];
                args.extend(z.map(|z| z.to_string()));
                Some(CommandRequest::new("UPC", args))
            }
            Action::Commands => None,
        }
    }
}
