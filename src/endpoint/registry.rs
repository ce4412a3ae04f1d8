//! Endpoint 注册表 - 按名称分组，另有匿名列表和唯一的默认 endpoint

use std::collections::HashMap;

use super::EndpointDefinition;
use crate::error::ValidationError;

/// 一次完整加载得到的 endpoint 集合
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    default: EndpointDefinition,
    default_configured: bool,
    by_name: HashMap<String, Vec<EndpointDefinition>>,
    unnamed: Vec<EndpointDefinition>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册 endpoint；同名的按注册顺序排在一起
    pub fn add_endpoint(&mut self, endpoint: EndpointDefinition) {
        match &endpoint.name {
            Some(name) => self
                .by_name
                .entry(name.clone())
                .or_default()
                .push(endpoint),
            None => self.unnamed.push(endpoint),
        }
    }

    /// 设置默认 endpoint，只允许一次
    pub fn set_default(&mut self, endpoint: EndpointDefinition) -> Result<(), ValidationError> {
        if self.default_configured {
            return Err(ValidationError::new("Default endpoint already configured"));
        }
        self.default = endpoint;
        self.default_configured = true;
        Ok(())
    }

    pub fn default_endpoint(&self) -> &EndpointDefinition {
        &self.default
    }

    pub fn has_default(&self) -> bool {
        self.default_configured
    }

    /// 候选顺序：同名 endpoint（注册顺序），然后是匿名 endpoint（注册顺序）
    pub fn candidates<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a EndpointDefinition> + 'a {
        let named = self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[]);
        named.iter().chain(self.unnamed.iter())
    }

    /// 默认 endpoint 之外的数量
    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum::<usize>() + self.unnamed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 已注册的名称（排序后）
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn unnamed_count(&self) -> usize {
        self.unnamed.len()
    }
}
