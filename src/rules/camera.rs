//! 摄像头规则 - 按视频设备是否可打开进行筛选

use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use super::{Status, StatusRule};

/// 摄像头探测接口：设备 N 当前能否被打开
pub trait CameraProbe: Send + Sync {
    fn is_available(&self, device: u32) -> Result<bool>;
}

/// 单次分发内的设备可用性缓存，同一设备只探测一次
pub struct DeviceAvailability<'a> {
    probe: &'a dyn CameraProbe,
    cache: HashMap<u32, bool>,
}

impl<'a> DeviceAvailability<'a> {
    pub fn new(probe: &'a dyn CameraProbe) -> Self {
        Self {
            probe,
            cache: HashMap::new(),
        }
    }

    pub fn get(&mut self, device: u32) -> Result<bool> {
        if let Some(available) = self.cache.get(&device) {
            return Ok(*available);
        }

        let available = self.probe.is_available(device)?;
        debug!(device, available, "Probed video device");
        self.cache.insert(device, available);
        Ok(available)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// 摄像头规则：设备 `device` 的可用性等于 `available` 时命中
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCapMatchDefinition {
    pub status: Status,
    pub device: u32,
    pub available: bool,
}

impl VideoCapMatchDefinition {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            device: 0,
            available: false,
        }
    }

    pub fn with_device(mut self, device: u32) -> Self {
        self.device = device;
        self
    }

    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn matches(&self, devices: &mut DeviceAvailability<'_>) -> Result<bool> {
        Ok(devices.get(self.device)? == self.available)
    }
}

impl StatusRule for VideoCapMatchDefinition {
    fn status(&self) -> Status {
        self.status
    }
}
