//! 窗口规则 - 判断屏幕上是否存在名称 / class 匹配的窗口

use anyhow::Result;
use tracing::error;

use super::pattern::Pattern;
use super::{Status, StatusRule};

/// 窗口句柄（X11 window id）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// 窗口树查询接口，每个查询都可能因窗口已销毁等原因失败
pub trait WindowTree: Send + Sync {
    /// 根窗口
    fn root(&self) -> Result<WindowId>;

    /// 窗口标题
    fn name(&self, window: WindowId) -> Result<Option<String>>;

    /// WM_CLASS 的 (instance, class) 两部分
    fn class(&self, window: WindowId) -> Result<(Option<String>, Option<String>)>;

    /// 直接子窗口
    fn children(&self, window: WindowId) -> Result<Vec<WindowId>>;
}

/// 窗口规则
#[derive(Debug, Clone)]
pub struct WindowMatchDefinition {
    pub status: Status,
    pub name: Option<Pattern>,
    pub class: Option<Pattern>,
}

impl WindowMatchDefinition {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            name: None,
            class: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Result<Self, regex::Error> {
        self.name = Some(Pattern::new(name)?);
        Ok(self)
    }

    pub fn with_class(mut self, class: &str) -> Result<Self, regex::Error> {
        self.class = Some(Pattern::new(class)?);
        Ok(self)
    }

    /// 单个窗口是否满足名称和 class 约束（class 两部分任一命中即可）
    pub fn matches(&self, tree: &dyn WindowTree, window: WindowId) -> Result<bool> {
        if let Some(pattern) = &self.name {
            let name = tree.name(window)?;
            if !name.map_or(false, |n| pattern.is_match(&n)) {
                return Ok(false);
            }
        }

        if let Some(pattern) = &self.class {
            let (instance, class) = tree.class(window)?;
            let hit = [instance, class]
                .iter()
                .flatten()
                .any(|c| pattern.is_match(c));
            return Ok(hit);
        }

        Ok(true)
    }

    /// 从 `start` 开始深度优先查找，查询失败的节点当作不匹配且不再向下展开
    pub fn window_present(&self, tree: &dyn WindowTree, start: WindowId) -> bool {
        let mut stack = vec![start];

        while let Some(window) = stack.pop() {
            let children = match self.matches(tree, window) {
                Ok(true) => return true,
                Ok(false) => tree.children(window),
                Err(e) => Err(e),
            };

            match children {
                Ok(children) => stack.extend(children.into_iter().rev()),
                Err(e) => {
                    error!(
                        window = %window,
                        name = ?self.name.as_ref().map(Pattern::as_str),
                        class = ?self.class.as_ref().map(Pattern::as_str),
                        error = %e,
                        "Bad window encountered for window definition"
                    );
                }
            }
        }

        false
    }

    /// 在整棵窗口树里查找；拿不到根窗口属于运行期错误，交由调用方处理
    pub fn is_displayed(&self, tree: &dyn WindowTree) -> Result<bool> {
        let root = tree.root()?;
        Ok(self.window_present(tree, root))
    }
}

impl StatusRule for WindowMatchDefinition {
    fn status(&self) -> Status {
        self.status
    }
}
