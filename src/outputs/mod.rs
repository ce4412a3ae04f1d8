//! 输出协作方 - announce 日志、语音、提示音、纯文本提取
//!
//! 分发引擎只依赖这里的 trait；具体实现都是 fire-and-forget，不等待播放结束。

pub mod festival;
pub mod markup;
pub mod sound;

use anyhow::Result;
use tracing::info;

use crate::endpoint::SoundEffect;

pub use festival::FestivalSpeaker;
pub use markup::TagStripper;
pub use sound::CommandSoundPlayer;

/// LOG 渠道的落点
pub trait Announcer: Send + Sync {
    fn announce(&self, line: &str);
}

/// DICTATION 渠道的语音后端
pub trait SpeechBackend: Send + Sync {
    /// 后端名称（用于日志）
    fn name(&self) -> &str;

    /// 提交文本后立即返回
    fn speak(&self, text: &str) -> Result<()>;
}

/// 提示音播放
pub trait SoundPlayer: Send + Sync {
    fn play(&self, effect: &SoundEffect) -> Result<()>;
}

/// 把带标记的通知文本转换成纯文本
pub trait MarkupStripper: Send + Sync {
    fn strip(&self, text: &str) -> Result<String>;
}

/// 通过 `announce` target 输出，可用 `RUST_LOG=announce=off` 关闭
pub struct TracingAnnouncer;

impl Announcer for TracingAnnouncer {
    fn announce(&self, line: &str) {
        info!(target: "announce", "{}", line);
    }
}
