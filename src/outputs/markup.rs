//! 纯文本提取 - 去掉通知正文里的标签并还原常见实体

use std::sync::LazyLock;

use anyhow::Result;
use regex::{Captures, Regex};

use super::MarkupStripper;

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|</?[A-Za-z][^>]*>").expect("Invalid tag regex"));

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9A-Fa-f]+|[A-Za-z]+);").expect("Invalid entity regex")
});

pub struct TagStripper;

impl TagStripper {
    fn decode_entity(caps: &Captures) -> String {
        let entity = &caps[1];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        decoded.map_or_else(|| caps[0].to_string(), String::from)
    }
}

impl MarkupStripper for TagStripper {
    fn strip(&self, text: &str) -> Result<String> {
        let without_tags = TAG.replace_all(text, "");
        Ok(ENTITY
            .replace_all(&without_tags, Self::decode_entity)
            .into_owned())
    }
}
