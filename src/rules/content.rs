//! 内容匹配 - 按应用名 / 标题 / 正文筛选通知

use super::pattern::{matches_optional, Pattern};
use crate::event::Event;

/// 最多三个互相独立的匹配器，缺省的视为恒真
#[derive(Debug, Clone, Default)]
pub struct MatchDefinition {
    pub name: Option<Pattern>,
    pub summary: Option<Pattern>,
    pub body: Option<Pattern>,
}

impl MatchDefinition {
    pub fn new(
        name: Option<&str>,
        summary: Option<&str>,
        body: Option<&str>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.map(Pattern::new).transpose()?,
            summary: summary.map(Pattern::multiline).transpose()?,
            body: body.map(Pattern::multiline).transpose()?,
        })
    }

    pub fn matches(&self, event: &Event) -> bool {
        matches_optional(self.name.as_ref(), &event.name)
            && matches_optional(self.summary.as_ref(), &event.summary)
            && matches_optional(self.body.as_ref(), &event.body)
    }
}
