//! 基础设施层 - 窗口树、视频设备、通知总线

pub mod dbus_monitor;
pub mod v4l;
pub mod x11;

pub use dbus_monitor::{NotificationMonitor, NotifyCallParser};
pub use v4l::V4lProbe;
pub use x11::{WindowSnapshot, XwininfoTree};
