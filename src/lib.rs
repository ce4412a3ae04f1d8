//! Notify Herald - 桌面通知的匹配、静默与播报
//!
//! 通知按 endpoint 匹配，再经过 schedule / window / camera 三个维度的启用/否决规则，
//! 通过后输出到日志或语音。

pub mod config;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod infra;
pub mod logging;
pub mod outputs;
pub mod rules;

pub use config::{default_config_path, load_registry, parse_registry};
pub use endpoint::{
    Channel, Collaborators, Delivery, Dispatched, EndpointDefinition, EndpointProcessor,
    EndpointRegistry, Gate, SoundEffect, TemplateReplacement,
};
pub use error::{ConfigError, ValidationError};
pub use event::Event;
pub use infra::{NotificationMonitor, NotifyCallParser, V4lProbe, WindowSnapshot, XwininfoTree};
pub use outputs::{
    Announcer, CommandSoundPlayer, FestivalSpeaker, MarkupStripper, SoundPlayer, SpeechBackend,
    TagStripper, TracingAnnouncer,
};
pub use rules::{
    cascade, CameraProbe, DeviceAvailability, MatchDefinition, MatchSet, Month, Pattern, RangeSet,
    ScheduleDefinition, Status, StatusRule, TimeOfDay, VideoCapMatchDefinition, Weekday, WindowId,
    WindowMatchDefinition, WindowTree,
};
