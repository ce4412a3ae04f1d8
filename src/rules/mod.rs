//! 规则模型 - 对内容、时间、窗口、摄像头的谓词定义
//!
//! 每种约束规则都带一个 [`Status`]：`ENABLED` 表示"命中才放行"，
//! `DISABLED` 表示"命中即否决"。多条规则如何组合见 [`cascade`]。

pub mod camera;
pub mod cascade;
pub mod content;
pub mod pattern;
pub mod range;
pub mod schedule;
pub mod window;

use serde::{Deserialize, Serialize};

pub use camera::{CameraProbe, DeviceAvailability, VideoCapMatchDefinition};
pub use cascade::{cascade, MatchSet};
pub use content::MatchDefinition;
pub use pattern::Pattern;
pub use range::{Ordinal, RangeSet};
pub use schedule::{Month, ScheduleDefinition, TimeOfDay, Weekday};
pub use window::{WindowId, WindowMatchDefinition, WindowTree};

/// 规则状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Disabled,
    Enabled,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Disabled => write!(f, "DISABLED"),
            Status::Enabled => write!(f, "ENABLED"),
        }
    }
}

/// 带状态的约束规则（schedule / window / camera 共用）
pub trait StatusRule {
    fn status(&self) -> Status;
}
