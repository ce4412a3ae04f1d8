//! 启用/禁用级联判定
//!
//! schedule、window、camera 三个维度共用同一套规则：
//!
//! 1. `chosen`：endpoint 自己的规则非空时用自己的，否则用默认 endpoint 的
//! 2. `all`：默认规则 + endpoint 规则，只用于否决
//! 3. 通过条件：`chosen` 中有 `ENABLED` 规则命中，或 `chosen` 根本没有 `ENABLED` 规则；
//!    并且 `all` 中没有任何 `DISABLED` 规则命中

use anyhow::Result;

use super::{Status, StatusRule};

/// 一组参与判定的规则
pub struct MatchSet<'a, R> {
    rules: Vec<&'a R>,
}

impl<'a, R: StatusRule> MatchSet<'a, R> {
    pub fn new(rules: impl IntoIterator<Item = &'a R>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    fn any_with_status(
        &self,
        status: Status,
        mut test: impl FnMut(&R) -> Result<bool>,
    ) -> Result<bool> {
        for rule in self.rules.iter().filter(|r| r.status() == status) {
            if test(*rule)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// 是否有 `ENABLED` 规则命中
    pub fn enabled_in(&self, test: impl FnMut(&R) -> Result<bool>) -> Result<bool> {
        self.any_with_status(Status::Enabled, test)
    }

    /// 是否有 `DISABLED` 规则命中
    pub fn disabled_in(&self, test: impl FnMut(&R) -> Result<bool>) -> Result<bool> {
        self.any_with_status(Status::Disabled, test)
    }

    /// 没有任何 `ENABLED` 规则时视为隐式启用
    pub fn implicitly_enabled(&self) -> bool {
        self.rules.iter().all(|r| r.status() != Status::Enabled)
    }
}

/// 对某一维度执行级联判定；`test` 出错时直接向上返回
pub fn cascade<R: StatusRule>(
    own: &[R],
    default: &[R],
    mut test: impl FnMut(&R) -> Result<bool>,
) -> Result<bool> {
    let chosen = MatchSet::new(if own.is_empty() { default } else { own });
    let all = MatchSet::new(default.iter().chain(own.iter()));

    if !chosen.implicitly_enabled() && !chosen.enabled_in(&mut test)? {
        return Ok(false);
    }

    Ok(!all.disabled_in(&mut test)?)
}
