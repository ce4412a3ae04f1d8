//! 正则匹配器 - 构造时编译一次，匹配从文本开头锚定

use regex::Regex;

/// 已编译的正则
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// 单行匹配（应用名、窗口名、窗口 class）
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Self::compile(source, "")
    }

    /// 多行匹配（summary / body），`.` 可匹配换行，`^`/`$` 按行
    pub fn multiline(source: &str) -> Result<Self, regex::Error> {
        Self::compile(source, "(?sm)")
    }

    fn compile(source: &str, flags: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!(r"{flags}\A(?:{source})"))?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub(crate) fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// 未设置的匹配器视为无约束
pub fn matches_optional(pattern: Option<&Pattern>, text: &str) -> bool {
    pattern.map_or(true, |p| p.is_match(text))
}
