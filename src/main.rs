//! Notify Herald CLI
//!
//! 监听桌面通知，按 endpoint 配置决定静默、记录或播报

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use notify_herald::{
    default_config_path, load_registry, Collaborators, Dispatched, EndpointProcessor,
    EndpointRegistry, Event, NotificationMonitor,
};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Notify Herald - 桌面通知的匹配、静默与播报")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ~/.config/notify-herald/endpoints.json）
    #[arg(long, global = true, env = "HERALD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 监听会话总线上的通知（SIGHUP 重新加载配置）
    Run,
    /// 校验配置并打印摘要
    Check {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 手动分发一条通知
    Dispatch {
        /// 应用名
        #[arg(long)]
        name: String,
        /// 标题
        #[arg(long, default_value = "")]
        summary: String,
        /// 正文
        #[arg(long, default_value = "")]
        body: String,
        /// 判定时间（RFC 3339），默认当前时间
        #[arg(long)]
        at: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    notify_herald::logging::init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config)?;

    match cli.command {
        Commands::Run => run(&config_path).await?,
        Commands::Check { json } => {
            let registry = load_registry(&config_path)
                .with_context(|| format!("配置校验失败: {}", config_path.display()))?;
            print_summary(&config_path, &registry, json)?;
        }
        Commands::Dispatch {
            name,
            summary,
            body,
            at,
        } => {
            let now = match at {
                Some(at) => DateTime::parse_from_rfc3339(&at)
                    .with_context(|| format!("无效的时间: {at}"))?
                    .naive_local(),
                None => Local::now().naive_local(),
            };
            let registry = load_registry(&config_path)?;
            let processor = EndpointProcessor::new(registry, Collaborators::system());
            let event = Event::new(name, summary, body);
            print_outcome(&processor.dispatch(&event, now));
        }
    }

    Ok(())
}

fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    explicit
        .or_else(default_config_path)
        .ok_or_else(|| anyhow!("无法确定配置文件路径，请使用 --config 指定"))
}

async fn run(config_path: &Path) -> Result<()> {
    let registry = load_registry(config_path)
        .with_context(|| format!("加载配置失败: {}", config_path.display()))?;
    info!(
        path = %config_path.display(),
        endpoints = registry.len(),
        "Configurations loaded"
    );

    let mut processor = EndpointProcessor::new(registry, Collaborators::system());
    // 子进程句柄需要一直持有，drop 时 dbus-monitor 被结束
    let (_monitor, mut events) = NotificationMonitor::new().spawn()?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("Notification source ended, shutting down");
                    break;
                };
                let now = Local::now().naive_local();
                let outcome = dispatch_blocking(&processor, &event, now);
                debug!(app = %event.name, outcome = ?outcome, "Notification dispatched");
            }
            _ = sighup.recv() => {
                if let Err(e) = processor.reload(config_path) {
                    error!(
                        path = %config_path.display(),
                        error = %e,
                        "Failed to reload configurations, keeping previous endpoints"
                    );
                }
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// 分发过程会调用 xwininfo、打开视频设备，都是阻塞操作
fn dispatch_blocking(processor: &EndpointProcessor, event: &Event, now: NaiveDateTime) -> Dispatched {
    tokio::task::block_in_place(|| processor.dispatch(event, now))
}

fn print_summary(path: &Path, registry: &EndpointRegistry, json: bool) -> Result<()> {
    if json {
        let summary = serde_json::json!({
            "path": path.display().to_string(),
            "default": registry.has_default(),
            "endpoints": registry.len(),
            "names": registry.names(),
            "unnamed": registry.unnamed_count(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("配置有效: {}", path.display());
    println!(
        "  默认 endpoint: {}",
        if registry.has_default() { "已配置" } else { "未配置" }
    );
    println!("  endpoint 数量: {}", registry.len());
    for name in registry.names() {
        let count = registry.candidates(name).filter(|e| e.name.is_some()).count();
        println!("    {name} ({count})");
    }
    println!("  匿名 endpoint: {}", registry.unnamed_count());
    Ok(())
}

fn print_outcome(outcome: &Dispatched) {
    match outcome {
        Dispatched::Delivered { endpoint, delivery } => {
            let channels: Vec<String> = delivery.channels.iter().map(ToString::to_string).collect();
            println!("delivered via {endpoint} [{}]: {}", channels.join(", "), delivery.text);
        }
        Dispatched::Suppressed { endpoint, gate } => {
            println!("suppressed by {endpoint} ({gate})");
        }
        Dispatched::Unhandled => println!("unhandled"),
    }
}
