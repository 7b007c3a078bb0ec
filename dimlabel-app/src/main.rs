use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use dimlabel_config::{AppConfig, CONFIG_ENV, ConfigError, LoggingConfig};
use dimlabel_engine::{CommandBus, CommandContext, LabelSettings, LookupTables};
use dimlabel_io::{
    DelimitedTableLoader, DocumentLoader, DocumentSaver, FileJournal, Journal, JsonSnapshot,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod cli;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let (config, discovery_error) = match load_configuration(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("错误：无法加载标注配置：{err}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging);
    if let Some(err) = discovery_error {
        warn!(
            env = CONFIG_ENV,
            error = %err,
            "未能读取标注配置，字段名与替换表路径使用内建默认值"
        );
    }

    match run(cli, &config) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "命令执行失败");
            eprintln!("错误：{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: &AppConfig) -> Result<ExitCode> {
    let bus = CommandBus::new();
    let Some(request) = cli.action.into_request() else {
        let mut commands: Vec<&str> = bus.available_commands().copied().collect();
        commands.sort_unstable();
        println!("支持的命令: {}", commands.join(", "));
        return Ok(ExitCode::SUCCESS);
    };

    let drawing = cli
        .drawing
        .context("需要通过 `--drawing` 指定图纸快照")?;
    let mut journal = FileJournal::new(&config.logging.journal_file);
    let lookups = initialize(config, &mut journal);

    let snapshot = JsonSnapshot::new();
    let mut document = snapshot
        .load(&drawing)
        .with_context(|| format!("无法读取图纸快照 {}", drawing.display()))?;
    let settings = LabelSettings::from_config(config);

    let response = {
        let mut context = CommandContext {
            document: &mut document,
            lookups: &lookups,
            settings: &settings,
            journal: &mut journal,
        };
        bus.dispatch(&request, &mut context)
    };
    if let Some(message) = &response.message {
        println!("{message}");
    }
    if !response.success {
        return Ok(ExitCode::FAILURE);
    }

    let output = cli.output.unwrap_or(drawing);
    snapshot
        .save(&document, &output)
        .with_context(|| format!("无法写回图纸快照 {}", output.display()))?;
    info!(path = %output.display(), "已写回图纸快照");
    Ok(ExitCode::SUCCESS)
}

/// 加载两张替换表并记录初始化结果；失败时退回空表，查询原样透传。
fn initialize(config: &AppConfig, journal: &mut dyn Journal) -> LookupTables {
    let company = config.lookups.company_path();
    let purpose = config.lookups.purpose_path();
    match LookupTables::load(&DelimitedTableLoader::new(), &company, &purpose) {
        Ok(tables) => {
            info!(
                company = tables.company.len(),
                purpose = tables.purpose.len(),
                "替换表已加载"
            );
            journal.record("Initialize: SUCCESS");
            tables
        }
        Err(err) => {
            warn!(error = %err, "加载替换表失败，使用空表");
            journal.record(&format!("Initialize: ERROR – {err}"));
            LookupTables::default()
        }
    }
}

/// 显式指定的配置必须可读；自动发现失败时退回内建默认值，错误留待日志初始化后告警。
fn load_configuration(
    explicit: Option<&Path>,
) -> Result<(AppConfig, Option<ConfigError>), ConfigError> {
    if let Some(path) = explicit {
        return AppConfig::from_file(path).map(|config| (config, None));
    }
    match AppConfig::discover() {
        Ok(config) => Ok((config, None)),
        Err(err) => Ok((AppConfig::default(), Some(err))),
    }
}

/// `RUST_LOG` 优先于配置中的级别；诊断日志写到 stderr，stdout 只输出命令结果。
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
