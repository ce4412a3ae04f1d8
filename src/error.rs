//! 配置加载错误
//!
//! 运行期（分发阶段）的错误一律使用 `anyhow`，在单个 endpoint 内部被吞掉；
//! 只有加载阶段的错误会以 [`ConfigError`] 的形式返回给调用方。

use std::path::PathBuf;

/// 配置语义校验失败（重复的默认 endpoint、非法的时间格式等）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// 加载配置时可能出现的所有错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 配置文件无法读取
    #[error("failed to read configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON 结构不合法
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// 正则表达式编译失败
    #[error("invalid pattern for {field}: {source}")]
    Pattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    /// 语义校验失败
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
}
