//! Endpoint 模型 - 一组约束规则加上输出行为
//!
//! 默认 endpoint 是所有其他 endpoint 的底层：未设置的字段（空列表 / `None`）
//! 在判定时逐字段回落到默认 endpoint 的值，不做深度合并。

pub mod processor;
pub mod registry;

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::rules::{MatchDefinition, ScheduleDefinition, VideoCapMatchDefinition, WindowMatchDefinition};

pub use processor::{Collaborators, Delivery, Dispatched, EndpointProcessor, Gate};
pub use registry::EndpointRegistry;

/// 输出渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    /// 写入 announce 日志
    Log,
    /// 语音播报
    Dictation,
    /// 显式丢弃（不回落到默认渠道）
    Void,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Log => write!(f, "LOG"),
            Channel::Dictation => write!(f, "DICTATION"),
            Channel::Void => write!(f, "VOID"),
        }
    }
}

/// Python 风格的 `\1` 反向引用
static PY_BACKREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(\d+)").expect("Invalid backreference regex"));

/// 文本替换模板，对整段文本做全局正则替换
#[derive(Debug, Clone)]
pub struct TemplateReplacement {
    pattern: Regex,
    replacement: String,
}

impl TemplateReplacement {
    /// `replacement` 使用 `$1` / `${name}` 语法，`\1` 也会被改写成 `${1}`
    pub fn new(pattern: &str, replacement: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!("(?sm){pattern}"))?;
        let replacement = PY_BACKREF
            .replace_all(replacement, |caps: &Captures| format!("${{{}}}", &caps[1]))
            .into_owned();
        Ok(Self { pattern, replacement })
    }

    pub fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, self.replacement.as_str())
            .into_owned()
    }
}

/// 播报前的提示音
#[derive(Debug, Clone, PartialEq)]
pub struct SoundEffect {
    pub source: PathBuf,
    /// 提示音开始后等待多久再开始播报
    pub delay: Option<Duration>,
}

impl SoundEffect {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Endpoint 定义
#[derive(Debug, Clone, Default)]
pub struct EndpointDefinition {
    pub name: Option<String>,
    pub max_len: Option<usize>,
    pub channels: Vec<Channel>,
    pub templates: Vec<TemplateReplacement>,
    pub match_definition: Option<MatchDefinition>,
    pub schedule: Vec<ScheduleDefinition>,
    pub window: Vec<WindowMatchDefinition>,
    pub camera: Vec<VideoCapMatchDefinition>,
    pub sound: Option<SoundEffect>,
}

impl EndpointDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    pub fn with_channels(mut self, channels: Vec<Channel>) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_template(mut self, template: TemplateReplacement) -> Self {
        self.templates.push(template);
        self
    }

    pub fn with_match(mut self, match_definition: MatchDefinition) -> Self {
        self.match_definition = Some(match_definition);
        self
    }

    pub fn with_schedule(mut self, rule: ScheduleDefinition) -> Self {
        self.schedule.push(rule);
        self
    }

    pub fn with_window(mut self, rule: WindowMatchDefinition) -> Self {
        self.window.push(rule);
        self
    }

    pub fn with_camera(mut self, rule: VideoCapMatchDefinition) -> Self {
        self.camera.push(rule);
        self
    }

    pub fn with_sound(mut self, sound: SoundEffect) -> Self {
        self.sound = Some(sound);
        self
    }

    /// 日志里使用的名称
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// 生效的内容匹配：自己的优先，否则用默认的；都没有则恒真
    pub fn effective_match<'a>(&'a self, default: &'a EndpointDefinition) -> Option<&'a MatchDefinition> {
        self.match_definition
            .as_ref()
            .or(default.match_definition.as_ref())
    }

    /// 生效的输出渠道：自己的非空时用自己的
    pub fn effective_channels<'a>(&'a self, default: &'a EndpointDefinition) -> &'a [Channel] {
        if self.channels.is_empty() {
            &default.channels
        } else {
            &self.channels
        }
    }
}
