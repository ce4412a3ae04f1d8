//! 日志初始化
//!
//! LOG 渠道的输出走 `announce` target，所以格式里保留 target，
//! 播报行与诊断日志才能区分开，也可以单独过滤: RUST_LOG=announce=off

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// 未设置 RUST_LOG 时的过滤规则
pub const DEFAULT_FILTER: &str = "notify_herald=info,herald=info,announce=info";

pub fn subscriber<W>(writer: W, filter: EnvFilter) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt()
        .with_writer(writer)
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .finish()
}

/// 输出到 stderr，通过 RUST_LOG 控制日志级别，例如: RUST_LOG=debug herald run
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    subscriber(std::io::stderr, filter).init();
}
