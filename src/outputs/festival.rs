//! Festival 语音后端 - `festival --tts` 从 stdin 读取文本

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::SpeechBackend;

pub struct FestivalSpeaker {
    festival_cmd: String,
}

impl FestivalSpeaker {
    pub fn new() -> Self {
        Self {
            festival_cmd: Self::find_festival_path(),
        }
    }

    pub fn with_command(cmd: impl Into<String>) -> Self {
        Self {
            festival_cmd: cmd.into(),
        }
    }

    /// 优先使用 PATH 中的 festival，找不到时交给 spawn 报错
    fn find_festival_path() -> String {
        which::which("festival")
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| "festival".to_string())
    }
}

impl Default for FestivalSpeaker {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechBackend for FestivalSpeaker {
    fn name(&self) -> &str {
        "festival"
    }

    fn speak(&self, text: &str) -> Result<()> {
        let mut child = Command::new(&self.festival_cmd)
            .arg("--tts")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start {}", self.festival_cmd))?;

        let mut stdin = child.stdin.take().context("festival stdin unavailable")?;
        let text = text.to_string();

        // 写入和回收都放到后台线程，调用方不等待播报结束
        thread::spawn(move || {
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                warn!(error = %e, "Failed to write text to festival");
            }
            drop(stdin);
            match child.wait() {
                Ok(status) if !status.success() => {
                    warn!(status = %status, "festival exited with failure")
                }
                Ok(_) => debug!("festival finished"),
                Err(e) => warn!(error = %e, "Failed to wait for festival"),
            }
        });

        Ok(())
    }
}
