//! 视频设备探测 - 向 `/dev/videoN` 申请一个采集缓冲区
//!
//! 只打开设备节点判断不了占用：V4L2 允许多个进程同时 open。真正独占的是缓冲区，
//! 所以发一次 `VIDIOC_REQBUFS`，设备被别的进程采集时驱动返回 EBUSY。
//! 打开设备可能无限期阻塞（驱动异常、USB 掉线），所以在辅助线程里执行并限定等待时间。

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use tracing::{debug, warn};

use crate::rules::CameraProbe;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// V4L2_BUF_TYPE_VIDEO_CAPTURE
const BUF_TYPE_VIDEO_CAPTURE: u32 = 1;
/// V4L2_MEMORY_MMAP
const MEMORY_MMAP: u32 = 1;

/// struct v4l2_requestbuffers
#[repr(C)]
#[derive(Debug, Default)]
struct RequestBuffers {
    count: u32,
    buf_type: u32,
    memory: u32,
    capabilities: u32,
    flags: u8,
    reserved: [u8; 3],
}

nix::ioctl_readwrite!(vidioc_reqbufs, b'V', 8, RequestBuffers);

pub struct V4lProbe {
    device_dir: PathBuf,
    timeout: Duration,
}

impl V4lProbe {
    pub fn new() -> Self {
        Self {
            device_dir: PathBuf::from("/dev"),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// 设备目录（测试用）
    pub fn with_device_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.device_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn device_path(&self, device: u32) -> PathBuf {
        self.device_dir.join(format!("video{device}"))
    }
}

impl Default for V4lProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn reqbufs(file: &File, count: u32) -> io::Result<()> {
    let mut request = RequestBuffers {
        count,
        buf_type: BUF_TYPE_VIDEO_CAPTURE,
        memory: MEMORY_MMAP,
        ..Default::default()
    };
    // SAFETY: fd 在 file 存活期间有效，request 与内核的 v4l2_requestbuffers 布局一致
    unsafe { vidioc_reqbufs(file.as_raw_fd(), &mut request) }
        .map(drop)
        .map_err(io::Error::from)
}

/// 申请一个缓冲区再立即释放；成功说明当前没有其他进程在采集
fn try_capture(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(OFlag::O_NONBLOCK.bits())
        .open(path)?;
    reqbufs(&file, 1)?;
    // 释放失败不影响结论，关闭 fd 时内核也会回收
    let _ = reqbufs(&file, 0);
    Ok(())
}

fn is_busy(err: &io::Error) -> bool {
    err.raw_os_error() == Some(Errno::EBUSY as i32)
}

impl CameraProbe for V4lProbe {
    fn is_available(&self, device: u32) -> Result<bool> {
        let path = self.device_path(device);
        let (tx, rx) = mpsc::channel();

        let capture_path = path.clone();
        thread::spawn(move || {
            let _ = tx.send(try_capture(&capture_path));
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) if is_busy(&e) => {
                debug!(device = %path.display(), "Video device busy");
                Ok(false)
            }
            Ok(Err(e)) => {
                // 不存在、不是采集设备（ENOTTY/EINVAL）、无权限都算不可用
                debug!(device = %path.display(), error = %e, "Video device not usable");
                Ok(false)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    device = %path.display(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Timed out opening video device, treating as unavailable"
                );
                Ok(false)
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("capture thread for {} exited unexpectedly", path.display()))
            }
        }
    }
}
