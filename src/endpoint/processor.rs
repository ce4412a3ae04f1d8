//! Endpoint 分发引擎
//!
//! 每条通知按以下顺序处理：
//! 1. 候选：同名 endpoint，然后是匿名 endpoint
//! 2. 内容匹配失败 → 跳过，尝试下一个候选
//! 3. 内容匹配成功后依次检查 schedule / window / camera；任一不通过 →
//!    视为"已处理但静默"，不再尝试其他候选
//! 4. 全部通过 → 生成文本并输出到渠道
//! 5. 没有候选处理时回落到默认 endpoint
//!
//! 单个 endpoint 内部的任何错误都只记录日志并当作"未处理"，不影响后续候选。

use std::path::Path;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use chrono::NaiveDateTime;
use tracing::{debug, error, info, warn};

use super::{Channel, EndpointDefinition, EndpointRegistry, SoundEffect};
use crate::config;
use crate::error::ConfigError;
use crate::event::Event;
use crate::infra::{V4lProbe, XwininfoTree};
use crate::outputs::{
    Announcer, CommandSoundPlayer, FestivalSpeaker, MarkupStripper, SoundPlayer, SpeechBackend,
    TagStripper, TracingAnnouncer,
};
use crate::rules::{cascade, CameraProbe, DeviceAvailability, WindowTree};

/// 分发引擎依赖的外部协作方
#[derive(Clone)]
pub struct Collaborators {
    pub announcer: Arc<dyn Announcer>,
    pub speaker: Arc<dyn SpeechBackend>,
    pub sound: Arc<dyn SoundPlayer>,
    pub stripper: Arc<dyn MarkupStripper>,
    pub windows: Arc<dyn WindowTree>,
    pub cameras: Arc<dyn CameraProbe>,
}

impl Collaborators {
    /// 本机实现：tracing、festival、paplay、xwininfo、/dev/videoN
    pub fn system() -> Self {
        Self {
            announcer: Arc::new(TracingAnnouncer),
            speaker: Arc::new(FestivalSpeaker::new()),
            sound: Arc::new(CommandSoundPlayer::new()),
            stripper: Arc::new(TagStripper),
            windows: Arc::new(XwininfoTree::new()),
            cameras: Arc::new(V4lProbe::new()),
        }
    }
}

/// 导致静默的约束维度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Schedule,
    Window,
    Camera,
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gate::Schedule => write!(f, "schedule"),
            Gate::Window => write!(f, "window"),
            Gate::Camera => write!(f, "camera"),
        }
    }
}

/// 实际输出的内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// 最终文本（去标记、模板替换、截断之后）
    pub text: String,
    /// 原始文本 `<summary> :: <body>`
    pub original: String,
    /// 生效的渠道
    pub channels: Vec<Channel>,
}

/// 一次分发的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// 由 `endpoint` 输出
    Delivered { endpoint: String, delivery: Delivery },
    /// `endpoint` 内容匹配但被某个约束维度拦下
    Suppressed { endpoint: String, gate: Gate },
    /// 包括默认 endpoint 在内都没有处理
    Unhandled,
}

/// 单个 endpoint 的判定结果
enum Outcome {
    NoMatch,
    Suppressed(Gate),
    Delivered(Delivery),
}

const DEFAULT_LABEL: &str = "<default>";

pub struct EndpointProcessor {
    registry: Arc<EndpointRegistry>,
    collaborators: Collaborators,
}

impl EndpointProcessor {
    pub fn new(registry: EndpointRegistry, collaborators: Collaborators) -> Self {
        Self {
            registry: Arc::new(registry),
            collaborators,
        }
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// 整体替换注册表，返回旧的
    pub fn replace_registry(&mut self, registry: EndpointRegistry) -> Arc<EndpointRegistry> {
        std::mem::replace(&mut self.registry, Arc::new(registry))
    }

    /// 重新加载配置；新配置完整校验通过后才替换，失败时保留当前配置
    pub fn reload(&mut self, path: &Path) -> Result<(), ConfigError> {
        let registry = config::load_registry(path)?;
        info!(
            path = %path.display(),
            endpoints = registry.len(),
            "Configurations reloaded successfully"
        );
        self.replace_registry(registry);
        Ok(())
    }

    /// 分发一条通知，永不返回错误
    pub fn dispatch(&self, event: &Event, now: NaiveDateTime) -> Dispatched {
        let registry = Arc::clone(&self.registry);
        let mut devices = DeviceAvailability::new(self.collaborators.cameras.as_ref());

        let mut result = registry
            .candidates(&event.name)
            .find_map(|endpoint| self.try_endpoint(&registry, endpoint, endpoint.label(), event, now, &mut devices));

        if result.is_none() {
            let default = registry.default_endpoint();
            result = self.try_endpoint(&registry, default, DEFAULT_LABEL, event, now, &mut devices);
        }

        devices.clear();
        result.unwrap_or(Dispatched::Unhandled)
    }

    /// `None` 表示未处理（内容不匹配或内部出错）
    fn try_endpoint(
        &self,
        registry: &EndpointRegistry,
        endpoint: &EndpointDefinition,
        label: &str,
        event: &Event,
        now: NaiveDateTime,
        devices: &mut DeviceAvailability<'_>,
    ) -> Option<Dispatched> {
        match self.endpoint_dispatch(registry, endpoint, event, now, devices) {
            Ok(Outcome::NoMatch) => None,
            Ok(Outcome::Suppressed(gate)) => {
                debug!(endpoint = label, app = %event.name, gate = %gate, "Notification suppressed");
                Some(Dispatched::Suppressed {
                    endpoint: label.to_string(),
                    gate,
                })
            }
            Ok(Outcome::Delivered(delivery)) => Some(Dispatched::Delivered {
                endpoint: label.to_string(),
                delivery,
            }),
            Err(e) => {
                error!(
                    endpoint = label,
                    app = %event.name,
                    error = %format!("{e:#}"),
                    "Exception processing endpoint definition"
                );
                None
            }
        }
    }

    fn endpoint_dispatch(
        &self,
        registry: &EndpointRegistry,
        endpoint: &EndpointDefinition,
        event: &Event,
        now: NaiveDateTime,
        devices: &mut DeviceAvailability<'_>,
    ) -> Result<Outcome> {
        let default = registry.default_endpoint();

        if !Self::matches(endpoint, default, event) {
            return Ok(Outcome::NoMatch);
        }

        if !Self::scheduled(endpoint, default, &now)? {
            return Ok(Outcome::Suppressed(Gate::Schedule));
        }
        if !self.displayed(endpoint, default)? {
            return Ok(Outcome::Suppressed(Gate::Window));
        }
        if !Self::cams(endpoint, default, devices)? {
            return Ok(Outcome::Suppressed(Gate::Camera));
        }

        let delivery = self.deliver(endpoint, default, event)?;
        Ok(Outcome::Delivered(delivery))
    }

    fn matches(endpoint: &EndpointDefinition, default: &EndpointDefinition, event: &Event) -> bool {
        endpoint
            .effective_match(default)
            .map_or(true, |m| m.matches(event))
    }

    fn scheduled(endpoint: &EndpointDefinition, default: &EndpointDefinition, now: &NaiveDateTime) -> Result<bool> {
        cascade(&endpoint.schedule, &default.schedule, |rule| Ok(rule.matches(now)))
    }

    fn displayed(&self, endpoint: &EndpointDefinition, default: &EndpointDefinition) -> Result<bool> {
        let tree = self.collaborators.windows.as_ref();
        cascade(&endpoint.window, &default.window, |rule| rule.is_displayed(tree))
    }

    fn cams(
        endpoint: &EndpointDefinition,
        default: &EndpointDefinition,
        devices: &mut DeviceAvailability<'_>,
    ) -> Result<bool> {
        cascade(&endpoint.camera, &default.camera, |rule| rule.matches(devices))
    }

    /// 默认 endpoint 的模板先执行，然后是 endpoint 自己的（默认 endpoint 自己处理时两份都执行）
    fn apply_templates(endpoint: &EndpointDefinition, default: &EndpointDefinition, text: String) -> String {
        default
            .templates
            .iter()
            .chain(&endpoint.templates)
            .fold(text, |text, template| template.apply(&text))
    }

    fn deliver(&self, endpoint: &EndpointDefinition, default: &EndpointDefinition, event: &Event) -> Result<Delivery> {
        let original = event.original_text();
        let plain = self.collaborators.stripper.strip(&original)?;
        let mut text = Self::apply_templates(endpoint, default, plain);
        if let Some(max_len) = endpoint.max_len {
            text = truncate_chars(&text, max_len);
        }
        let channels = endpoint.effective_channels(default).to_vec();

        if channels.contains(&Channel::Log) {
            let line = if text == original {
                format!("Received notification via '{}' - {}", event.name, text)
            } else {
                format!(
                    "Received and transformed notification via '{}' - {} (was '{}')",
                    event.name, text, original
                )
            };
            self.collaborators.announcer.announce(&line);
        }

        if channels.contains(&Channel::Dictation) {
            self.dictate(endpoint.sound.as_ref(), &text)?;
        }

        Ok(Delivery {
            text,
            original,
            channels,
        })
    }

    fn dictate(&self, sound: Option<&SoundEffect>, text: &str) -> Result<()> {
        let Some(sound) = sound else {
            return self.collaborators.speaker.speak(text);
        };

        self.collaborators.sound.play(sound)?;

        match sound.delay.filter(|d| !d.is_zero()) {
            Some(delay) => {
                // 等提示音播一会儿再开口，不阻塞分发
                let speaker = Arc::clone(&self.collaborators.speaker);
                let text = text.to_string();
                thread::spawn(move || {
                    thread::sleep(delay);
                    if let Err(e) = speaker.speak(&text) {
                        warn!(backend = speaker.name(), error = %e, "Delayed speech failed");
                    }
                });
                Ok(())
            }
            None => self.collaborators.speaker.speak(text),
        }
    }
}

/// 按字符截断
fn truncate_chars(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect()
}
