//! 通知来源 - 通过 `dbus-monitor` 监听 org.freedesktop.Notifications.Notify 调用
//!
//! dbus-monitor 的输出格式：
//! ```text
//! method call time=1700000000.1 sender=:1.42 -> destination=:1.7 serial=9 path=/org/freedesktop/Notifications; interface=org.freedesktop.Notifications; member=Notify
//!    string "notify-send"
//!    uint32 0
//!    string ""
//!    string "summary"
//!    string "body"
//!    array [
//!    ]
//!    array [
//!       dict entry(
//!          string "urgency"
//!          variant             byte 1
//!       )
//!    ]
//!    int32 -1
//! ```
//! 8 个参数依次为 app_name, replaces_id, app_icon, summary, body, actions, hints, expire_timeout。

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::Event;

/// dbus-monitor 的匹配规则
pub const NOTIFY_MATCH_RULE: &str =
    "type='method_call',interface='org.freedesktop.Notifications',member='Notify',eavesdrop=true";

const NOTIFY_ARG_COUNT: usize = 8;

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Str(String),
    Other,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Call {
        args: Vec<Arg>,
        /// 容器嵌套深度，只有深度 0 的值才是顶层参数
        depth: usize,
        /// 尚未结束的多行字符串
        pending: Option<String>,
    },
}

/// 逐行解析 dbus-monitor 输出，拼出完整的 Notify 调用
#[derive(Debug, Default)]
pub struct NotifyCallParser {
    state: State,
}

impl NotifyCallParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 输入一行，凑齐一个 Notify 调用时返回事件
    pub fn feed(&mut self, line: &str) -> Option<Event> {
        if let State::Call { depth, pending, .. } = &mut self.state {
            if let Some(text) = pending.as_mut() {
                text.push('\n');
                match line.strip_suffix('"') {
                    Some(rest) => text.push_str(rest),
                    None => {
                        text.push_str(line);
                        return None;
                    }
                }
                let text = pending.take().unwrap_or_default();
                // 容器内部的字符串不是顶层参数
                if *depth > 0 {
                    return None;
                }
                return self.push_arg(Arg::Str(text));
            }
        }

        if is_message_header(line) {
            self.state = if is_notify_call(line) {
                State::Call {
                    args: Vec::new(),
                    depth: 0,
                    pending: None,
                }
            } else {
                State::Idle
            };
            return None;
        }

        let State::Call { depth, pending, .. } = &mut self.state else {
            return None;
        };

        let value = line.trim();
        if value.is_empty() {
            return None;
        }

        // 先认字符串：多行字符串的首行可能以 ( [ { 结尾，不能当成容器开头
        // 用未 trim 尾部的行判断结尾，保留字符串末尾空白
        if let Some(rest) = line.trim_start().strip_prefix("string \"") {
            return match rest.strip_suffix('"') {
                Some(complete) if *depth == 0 => self.push_arg(Arg::Str(complete.to_string())),
                Some(_) => None,
                None => {
                    *pending = Some(rest.to_string());
                    None
                }
            };
        }

        let opens = value.ends_with('[') || value.ends_with('(') || value.ends_with('{');
        let closes = matches!(value, "]" | ")" | "}");

        if *depth > 0 {
            if opens {
                *depth += 1;
            } else if closes {
                *depth -= 1;
            }
            return None;
        }

        if opens {
            *depth = 1;
            return self.push_arg(Arg::Other);
        }
        if closes {
            return None;
        }

        self.push_arg(Arg::Other)
    }

    fn push_arg(&mut self, arg: Arg) -> Option<Event> {
        let State::Call { args, pending, .. } = &mut self.state else {
            return None;
        };
        *pending = None;
        args.push(arg);

        if args.len() < NOTIFY_ARG_COUNT {
            return None;
        }

        let args = std::mem::take(args);
        self.state = State::Idle;

        match (&args[0], &args[3], &args[4]) {
            (Arg::Str(name), Arg::Str(summary), Arg::Str(body)) => {
                Some(Event::new(name.clone(), summary.clone(), body.clone()))
            }
            _ => {
                debug!("Ignoring Notify call with unexpected argument types");
                None
            }
        }
    }
}

fn is_message_header(line: &str) -> bool {
    ["method call ", "method return ", "signal ", "error "]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

fn is_notify_call(line: &str) -> bool {
    line.starts_with("method call ")
        && line.contains("interface=org.freedesktop.Notifications")
        && line.contains("member=Notify")
}

/// 启动 dbus-monitor 并把解析出的事件送入 channel
pub struct NotificationMonitor {
    monitor_cmd: String,
}

impl NotificationMonitor {
    pub fn new() -> Self {
        Self::with_command("dbus-monitor")
    }

    pub fn with_command(cmd: impl Into<String>) -> Self {
        Self {
            monitor_cmd: cmd.into(),
        }
    }

    /// 返回子进程句柄（drop 时结束进程）和事件接收端
    pub fn spawn(&self) -> Result<(Child, mpsc::Receiver<Event>)> {
        let mut child = Command::new(&self.monitor_cmd)
            .args(["--session", NOTIFY_MATCH_RULE])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start {}", self.monitor_cmd))?;

        let stdout = child.stdout.take().context("dbus-monitor stdout unavailable")?;
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut parser = NotifyCallParser::new();
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        warn!("dbus-monitor closed its output");
                        break;
                    }
                    Ok(_) => {
                        let Some(event) = parser.feed(line.trim_end_matches('\n')) else {
                            continue;
                        };
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read dbus-monitor output");
                        break;
                    }
                }
            }
        });

        Ok((child, rx))
    }
}

impl Default for NotificationMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "method call time=1700000000.1 sender=:1.42 -> destination=:1.7 serial=9 path=/org/freedesktop/Notifications; interface=org.freedesktop.Notifications; member=Notify";

    fn feed_all(parser: &mut NotifyCallParser, text: &str) -> Vec<Event> {
        text.lines().filter_map(|l| parser.feed(l)).collect()
    }

    #[test]
    fn test_parses_simple_notify_call() {
        let text = format!(
            "{HEADER}\n   string \"notify-send\"\n   uint32 0\n   string \"\"\n   string \"Hello\"\n   string \"World\"\n   array [\n   ]\n   array [\n      dict entry(\n         string \"urgency\"\n         variant             byte 1\n      )\n   ]\n   int32 -1\n"
        );
        let mut parser = NotifyCallParser::new();
        let events = feed_all(&mut parser, &text);
        assert_eq!(events, vec![Event::new("notify-send", "Hello", "World")]);
    }

    #[test]
    fn test_parses_multiline_body() {
        let text = format!(
            "{HEADER}\n   string \"Thunderbird\"\n   uint32 0\n   string \"mail\"\n   string \"New mail\"\n   string \"line one\nline two\"\n   array [\n   ]\n   array [\n   ]\n   int32 5000\n"
        );
        let mut parser = NotifyCallParser::new();
        let events = feed_all(&mut parser, &text);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].body, "line one\nline two");
    }

    #[test]
    fn test_multiline_string_opening_with_bracket_is_not_a_container() {
        let text = format!(
            "{HEADER}\n   string \"calendar\"\n   uint32 0\n   string \"\"\n   string \"Meeting\"\n   string \"Agenda (\nitem one)\"\n   array [\n   ]\n   array [\n   ]\n   int32 -1\n"
        );
        let mut parser = NotifyCallParser::new();
        let events = feed_all(&mut parser, &text);
        assert_eq!(events, vec![Event::new("calendar", "Meeting", "Agenda (\nitem one)")]);
    }

    #[test]
    fn test_multiline_string_inside_hints_is_skipped() {
        let text = format!(
            "{HEADER}\n   string \"app\"\n   uint32 0\n   string \"\"\n   string \"s\"\n   string \"b\"\n   array [\n   ]\n   array [\n      dict entry(\n         string \"note [\nmore\"\n         variant             byte 1\n      )\n   ]\n   int32 -1\n"
        );
        let mut parser = NotifyCallParser::new();
        let events = feed_all(&mut parser, &text);
        assert_eq!(events, vec![Event::new("app", "s", "b")]);
    }

    #[test]
    fn test_ignores_other_messages() {
        let text = "signal time=1.0 sender=org.freedesktop.DBus -> destination=:1.1 serial=2 path=/org/freedesktop/DBus; interface=org.freedesktop.DBus; member=NameAcquired\n   string \":1.1\"\nmethod return time=1.1 sender=:1.7 -> destination=:1.42 serial=10 reply_serial=9\n   uint32 12\n";
        let mut parser = NotifyCallParser::new();
        assert!(feed_all(&mut parser, text).is_empty());
    }

    #[test]
    fn test_truncated_call_is_dropped_at_next_header() {
        let text = format!(
            "{HEADER}\n   string \"a\"\n   uint32 0\n{HEADER}\n   string \"b\"\n   uint32 0\n   string \"\"\n   string \"s\"\n   string \"x\"\n   array [\n   ]\n   array [\n   ]\n   int32 -1\n"
        );
        let mut parser = NotifyCallParser::new();
        let events = feed_all(&mut parser, &text);
        assert_eq!(events, vec![Event::new("b", "s", "x")]);
    }
}
