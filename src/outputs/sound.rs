//! 提示音播放 - spawn 外部播放器后立即返回

use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::debug;

use super::SoundPlayer;
use crate::endpoint::SoundEffect;

pub struct CommandSoundPlayer {
    player_cmd: String,
}

impl CommandSoundPlayer {
    /// 依次尝试 paplay、aplay，都找不到时保留 paplay
    pub fn new() -> Self {
        let player_cmd = ["paplay", "aplay"]
            .into_iter()
            .find_map(|cmd| which::which(cmd).ok())
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| "paplay".to_string());
        Self { player_cmd }
    }

    pub fn with_command(cmd: impl Into<String>) -> Self {
        Self {
            player_cmd: cmd.into(),
        }
    }
}

impl Default for CommandSoundPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundPlayer for CommandSoundPlayer {
    fn play(&self, effect: &SoundEffect) -> Result<()> {
        debug!(player = %self.player_cmd, source = %effect.source.display(), "Playing sound effect");

        Command::new(&self.player_cmd)
            .arg(&effect.source)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start {}", self.player_cmd))?;

        Ok(())
    }
}
