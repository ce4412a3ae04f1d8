//! X11 窗口树 - 解析 `xwininfo -root -tree` 的输出
//!
//! 每次查询根窗口时重新执行一次 xwininfo 并缓存整棵树；
//! 之后的名称 / class / 子窗口查询都在这份快照上进行。

use std::collections::HashMap;
use std::process::Command;
use std::sync::{LazyLock, Mutex};

use anyhow::{anyhow, Result};
use regex::Regex;
use tracing::debug;

use crate::rules::{WindowId, WindowTree};

/// `xwininfo: Window id: 0x1e3 (the root window) ...`
static ROOT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Window id: (0x[0-9a-fA-F]+)").expect("Invalid root window regex"));

/// `     0x1400006 "Firefox": ("Navigator" "firefox")  1920x1080+0+0  +0+0`
static WINDOW_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\s*)(0x[0-9a-fA-F]+) (?:\(has no name\)|"(.*)"):\s*\(([^)]*)\)"#)
        .expect("Invalid window line regex")
});

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)""#).expect("Invalid quoted string regex"));

#[derive(Debug, Clone, Default, PartialEq)]
struct WindowNode {
    name: Option<String>,
    class: (Option<String>, Option<String>),
    children: Vec<WindowId>,
}

/// 一次 xwininfo 调用得到的窗口树
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSnapshot {
    root: Option<WindowId>,
    nodes: HashMap<WindowId, WindowNode>,
}

impl WindowSnapshot {
    /// 解析 `xwininfo -root -tree` 的文本输出，按缩进还原父子关系
    pub fn parse(output: &str) -> Result<Self> {
        let root = output
            .lines()
            .find_map(|line| ROOT_LINE.captures(line))
            .map(|caps| parse_window_id(&caps[1]))
            .transpose()?
            .ok_or_else(|| anyhow!("xwininfo output has no root window"))?;

        let mut snapshot = Self {
            root: Some(root),
            nodes: HashMap::new(),
        };
        snapshot.nodes.insert(root, WindowNode::default());

        // (缩进, 窗口) 栈，栈顶是最近一个可能的父窗口
        let mut parents: Vec<(usize, WindowId)> = vec![(0, root)];

        for line in output.lines() {
            let Some(caps) = WINDOW_LINE.captures(line) else {
                continue;
            };

            let indent = caps[1].len();
            let id = parse_window_id(&caps[2])?;
            let name = caps.get(3).map(|m| m.as_str().to_string());
            let mut classes = QUOTED
                .captures_iter(&caps[4])
                .map(|c| c[1].to_string());
            let class = (classes.next(), classes.next());

            while parents.len() > 1 && parents.last().map_or(false, |(i, _)| *i >= indent) {
                parents.pop();
            }
            let parent = parents.last().map_or(root, |(_, p)| *p);

            if let Some(node) = snapshot.nodes.get_mut(&parent) {
                node.children.push(id);
            }
            snapshot.nodes.insert(
                id,
                WindowNode {
                    name,
                    class,
                    children: Vec::new(),
                },
            );
            parents.push((indent, id));
        }

        Ok(snapshot)
    }

    fn node(&self, window: WindowId) -> Result<&WindowNode> {
        self.nodes
            .get(&window)
            .ok_or_else(|| anyhow!("BadWindow: {} not in window tree", window))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn parse_window_id(hex: &str) -> Result<WindowId> {
    let digits = hex.trim_start_matches("0x").trim_start_matches("0X");
    Ok(WindowId(u64::from_str_radix(digits, 16)?))
}

/// 基于 xwininfo 的窗口树
pub struct XwininfoTree {
    xwininfo_cmd: String,
    snapshot: Mutex<WindowSnapshot>,
}

impl XwininfoTree {
    pub fn new() -> Self {
        Self::with_command("xwininfo")
    }

    pub fn with_command(cmd: impl Into<String>) -> Self {
        Self {
            xwininfo_cmd: cmd.into(),
            snapshot: Mutex::new(WindowSnapshot::default()),
        }
    }

    fn refresh(&self) -> Result<WindowId> {
        let output = Command::new(&self.xwininfo_cmd)
            .args(["-root", "-tree"])
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("xwininfo failed: {}", stderr.trim()));
        }

        let snapshot = WindowSnapshot::parse(&String::from_utf8_lossy(&output.stdout))?;
        debug!(windows = snapshot.len(), "Window tree refreshed");

        let root = snapshot.root.ok_or_else(|| anyhow!("xwininfo output has no root window"))?;
        *self.lock()? = snapshot;
        Ok(root)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, WindowSnapshot>> {
        self.snapshot
            .lock()
            .map_err(|_| anyhow!("window snapshot lock poisoned"))
    }
}

impl Default for XwininfoTree {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowTree for XwininfoTree {
    fn root(&self) -> Result<WindowId> {
        self.refresh()
    }

    fn name(&self, window: WindowId) -> Result<Option<String>> {
        Ok(self.lock()?.node(window)?.name.clone())
    }

    fn class(&self, window: WindowId) -> Result<(Option<String>, Option<String>)> {
        Ok(self.lock()?.node(window)?.class.clone())
    }

    fn children(&self, window: WindowId) -> Result<Vec<WindowId>> {
        Ok(self.lock()?.node(window)?.children.clone())
    }
}
