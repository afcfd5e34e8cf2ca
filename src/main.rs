use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use relay::{telemetry::init_metrics, Application};
use relay_core::{init_logging, AppConfig, SenderKind, ShutdownSignal};
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("relay")
        .version("1.0.0")
        .about("可靠分发与迭代引擎")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("输入文件，每行一个条目")
                .required(true),
        )
        .arg(
            Arg::new("sender")
                .short('s')
                .long("sender")
                .value_name("KIND")
                .help("发送器类型，覆盖配置文件")
                .value_parser(["echo", "shell", "queue"]),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");
    let input = matches
        .get_one::<String>("input")
        .map(PathBuf::from)
        .context("缺少输入文件参数")?;

    // 加载配置
    let mut config = AppConfig::load(config_path.map(String::as_str))
        .with_context(|| format!("加载配置失败: {}", config_path.map_or("-", |p| p.as_str())))?;
    if let Some(kind) = matches.get_one::<String>("sender") {
        config.sender.kind = kind.parse::<SenderKind>()?;
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = format.clone();
    }

    // 初始化日志系统
    init_logging(&config.logging.level, &config.logging.format)?;
    if let Some(address) = &config.logging.metrics_address {
        init_metrics(address)?;
    }

    info!("启动可靠分发与迭代引擎");
    info!("输入文件: {}", input.display());

    let shutdown = Arc::new(ShutdownSignal::new());
    let app = Application::new(config, &shutdown).await?;

    tokio::spawn({
        let shutdown = Arc::clone(&shutdown);
        async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("收到Ctrl+C信号，中断迭代");
                    shutdown.trigger();
                }
                Err(e) => warn!("安装Ctrl+C信号处理器失败: {e}"),
            }
        }
    });

    match app.run_file(&input).await {
        Ok(report) => {
            println!("{}", report.render());
            info!(
                "迭代完成, 条目数 {}, 出口 [{}]",
                report.count(),
                report.forward_name()
            );
            Ok(())
        }
        Err(e) => {
            error!("迭代失败: {e:#}");
            Err(e)
        }
    }
}
