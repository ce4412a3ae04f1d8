//! 通知事件 - 从通知总线提取出的 (name, summary, body) 三元组

use serde::{Deserialize, Serialize};

/// 一条待分发的通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 发送方应用名（org.freedesktop.Notifications 的 app_name）
    pub name: String,
    /// 标题
    pub summary: String,
    /// 正文（可能含标记）
    pub body: String,
}

impl Event {
    pub fn new(name: impl Into<String>, summary: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            body: body.into(),
        }
    }

    /// 输出管线的原始文本：`<summary> :: <body>`
    pub fn original_text(&self) -> String {
        format!("{} :: {}", self.summary, self.body)
    }
}
