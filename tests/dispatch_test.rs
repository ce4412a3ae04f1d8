//! 分发引擎集成测试
//!
//! 配置从 JSON 文本加载，协作方全部替换为可计数 / 可记录的 mock。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, NaiveDateTime};
use notify_herald::{
    parse_registry, Announcer, CameraProbe, Channel, Collaborators, Dispatched, EndpointProcessor,
    Event, Gate, SoundEffect, SoundPlayer, SpeechBackend, TagStripper, WindowId, WindowTree,
};

// ============================================================================
// Mock 协作方
// ============================================================================

#[derive(Default)]
struct RecordingAnnouncer {
    lines: Mutex<Vec<String>>,
}

impl RecordingAnnouncer {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

#[derive(Default)]
struct RecordingSpeaker {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeaker {
    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl SpeechBackend for RecordingSpeaker {
    fn name(&self) -> &str {
        "recording"
    }

    fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct CountingSound {
    play_count: AtomicUsize,
}

impl SoundPlayer for CountingSound {
    fn play(&self, _effect: &SoundEffect) -> Result<()> {
        self.play_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 设备 0..busy 不可用，其余可用
struct CountingProbe {
    busy: u32,
    call_count: AtomicUsize,
}

impl CountingProbe {
    fn new(busy: u32) -> Self {
        Self {
            busy,
            call_count: AtomicUsize::new(0),
        }
    }

    fn get_call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl CameraProbe for CountingProbe {
    fn is_available(&self, device: u32) -> Result<bool> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(device >= self.busy)
    }
}

/// 根窗口下一层平铺的窗口，`(名称, class)`
struct FlatTree {
    windows: Vec<(&'static str, &'static str)>,
    broken: bool,
}

impl FlatTree {
    fn new(windows: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            windows,
            broken: false,
        }
    }

    fn broken() -> Self {
        Self {
            windows: Vec::new(),
            broken: true,
        }
    }

    fn window(&self, window: WindowId) -> Result<(&'static str, &'static str)> {
        let index = window.0.checked_sub(2).ok_or_else(|| anyhow!("BadWindow {}", window))?;
        self.windows
            .get(index as usize)
            .copied()
            .ok_or_else(|| anyhow!("BadWindow {}", window))
    }
}

impl WindowTree for FlatTree {
    fn root(&self) -> Result<WindowId> {
        if self.broken {
            return Err(anyhow!("cannot open display"));
        }
        Ok(WindowId(1))
    }

    fn name(&self, window: WindowId) -> Result<Option<String>> {
        if window == WindowId(1) {
            return Ok(None);
        }
        Ok(Some(self.window(window)?.0.to_string()))
    }

    fn class(&self, window: WindowId) -> Result<(Option<String>, Option<String>)> {
        if window == WindowId(1) {
            return Ok((None, None));
        }
        let class = self.window(window)?.1;
        Ok((Some(class.to_string()), Some(class.to_string())))
    }

    fn children(&self, window: WindowId) -> Result<Vec<WindowId>> {
        if window == WindowId(1) {
            return Ok((0..self.windows.len() as u64).map(|i| WindowId(i + 2)).collect());
        }
        self.window(window)?;
        Ok(Vec::new())
    }
}

struct Harness {
    announcer: Arc<RecordingAnnouncer>,
    speaker: Arc<RecordingSpeaker>,
    sound: Arc<CountingSound>,
    probe: Arc<CountingProbe>,
    tree: Arc<FlatTree>,
}

impl Harness {
    fn new() -> Self {
        Self {
            announcer: Arc::new(RecordingAnnouncer::default()),
            speaker: Arc::new(RecordingSpeaker::default()),
            sound: Arc::new(CountingSound::default()),
            probe: Arc::new(CountingProbe::new(0)),
            tree: Arc::new(FlatTree::new(Vec::new())),
        }
    }

    fn with_probe(mut self, probe: CountingProbe) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    fn with_tree(mut self, tree: FlatTree) -> Self {
        self.tree = Arc::new(tree);
        self
    }

    fn processor(&self, config: &str) -> EndpointProcessor {
        let collaborators = Collaborators {
            announcer: self.announcer.clone(),
            speaker: self.speaker.clone(),
            sound: self.sound.clone(),
            stripper: Arc::new(TagStripper),
            windows: self.tree.clone(),
            cameras: self.probe.clone(),
        };
        EndpointProcessor::new(parse_registry(config).unwrap(), collaborators)
    }
}

/// 2026-10-19 是周一
fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn delivered_text(outcome: &Dispatched) -> &str {
    match outcome {
        Dispatched::Delivered { delivery, .. } => &delivery.text,
        other => panic!("expected delivery, got {other:?}"),
    }
}

// ============================================================================
// 候选顺序与静默
// ============================================================================

#[test]
fn test_matched_but_out_of_schedule_is_suppressed() {
    let harness = Harness::new();
    let processor = harness.processor(
        r#"[
            { "channels": ["LOG"] },
            {
                "name": "app",
                "match": { "name": "^app$" },
                "schedule": [{ "status": "ENABLED", "time": { "from": "9:00", "to": "17:00" } }]
            },
            { "match": {}, "channels": ["LOG"] }
        ]"#,
    );
    let event = Event::new("app", "Build", "finished");

    let outcome = processor.dispatch(&event, at(20, 0));
    assert_eq!(
        outcome,
        Dispatched::Suppressed {
            endpoint: "app".to_string(),
            gate: Gate::Schedule
        }
    );
    // 不再尝试匿名 endpoint，也不回落到默认
    assert!(harness.announcer.lines().is_empty());

    let outcome = processor.dispatch(&event, at(10, 30));
    assert!(matches!(outcome, Dispatched::Delivered { ref endpoint, .. } if endpoint == "app"));
    assert_eq!(harness.announcer.lines().len(), 1);
}

#[test]
fn test_content_mismatch_falls_back_to_default() {
    let harness = Harness::new();
    let processor = harness.processor(
        r#"[
            { "channels": ["LOG"], "templates": [{ "match": "a", "replace": "aa" }] },
            { "name": "mail", "match": { "summary": "invoice" }, "channels": ["DICTATION"] }
        ]"#,
    );

    let outcome = processor.dispatch(&Event::new("mail", "a", "b"), at(12, 0));
    match &outcome {
        Dispatched::Delivered { endpoint, delivery } => {
            assert_eq!(endpoint, "<default>");
            // 默认 endpoint 既是底层又是胜出者，模板链为 默认 + 自身，各执行一遍
            assert_eq!(delivery.text, "aaaa :: b");
            assert_eq!(delivery.channels, vec![Channel::Log]);
        }
        other => panic!("expected delivery, got {other:?}"),
    }
    assert!(harness.speaker.spoken().is_empty());
}

#[test]
fn test_named_endpoints_come_before_unnamed() {
    let harness = Harness::new();
    let processor = harness.processor(
        r#"[
            { "match": {}, "channels": ["VOID"] },
            { "name": "chat", "channels": ["LOG"] }
        ]"#,
    );

    let outcome = processor.dispatch(&Event::new("chat", "hi", "there"), at(12, 0));
    assert!(matches!(outcome, Dispatched::Delivered { ref endpoint, .. } if endpoint == "chat"));

    let outcome = processor.dispatch(&Event::new("other", "hi", "there"), at(12, 0));
    assert!(matches!(outcome, Dispatched::Delivered { ref endpoint, .. } if endpoint == "<unnamed>"));
}

#[test]
fn test_unconfigured_default_is_silent() {
    let harness = Harness::new();
    let processor = harness.processor(r#"[{ "name": "mail", "match": { "summary": "invoice" } }]"#);

    // 没有配置默认 endpoint 时，空的默认 endpoint 依旧恒真匹配，但没有渠道
    let outcome = processor.dispatch(&Event::new("mail", "hello", ""), at(12, 0));
    match outcome {
        Dispatched::Delivered { endpoint, delivery } => {
            assert_eq!(endpoint, "<default>");
            assert!(delivery.channels.is_empty());
        }
        other => panic!("expected silent default delivery, got {other:?}"),
    }
    assert!(harness.announcer.lines().is_empty());
}

// ============================================================================
// 文本处理
// ============================================================================

#[test]
fn test_truncation_applies_after_templates() {
    let harness = Harness::new();
    let processor = harness.processor(
        r#"[
            { "channels": ["LOG"], "max-length": 3 },
            { "name": "app", "max-length": 5, "templates": [{ "match": " :: $", "replace": "" }] },
            { "name": "long" }
        ]"#,
    );

    let outcome = processor.dispatch(&Event::new("app", "hello world", ""), at(12, 0));
    assert_eq!(delivered_text(&outcome), "hello");

    // max-length 不从默认 endpoint 继承
    let outcome = processor.dispatch(&Event::new("long", "hello world", ""), at(12, 0));
    assert_eq!(delivered_text(&outcome), "hello world :: ");
}

#[test]
fn test_default_templates_run_before_endpoint_templates() {
    let harness = Harness::new();
    let processor = harness.processor(
        r#"[
            { "channels": ["LOG"], "templates": [{ "match": "foo", "replace": "bar" }] },
            { "name": "app", "templates": [{ "match": "bar", "replace": "baz" }, { "match": " :: $", "replace": "" }] }
        ]"#,
    );

    let outcome = processor.dispatch(&Event::new("app", "foo", ""), at(12, 0));
    assert_eq!(delivered_text(&outcome), "baz");
    assert_eq!(
        harness.announcer.lines(),
        vec!["Received and transformed notification via 'app' - baz (was 'foo :: ')".to_string()]
    );
}

#[test]
fn test_untransformed_log_line() {
    let harness = Harness::new();
    let processor = harness.processor(r#"[{ "channels": ["LOG"] }]"#);

    processor.dispatch(&Event::new("app", "hi", "there"), at(12, 0));
    assert_eq!(
        harness.announcer.lines(),
        vec!["Received notification via 'app' - hi :: there".to_string()]
    );
}

#[test]
fn test_markup_is_stripped_before_templates() {
    let harness = Harness::new();
    let processor = harness.processor(r#"[{ "channels": ["LOG"] }]"#);

    let outcome = processor.dispatch(&Event::new("app", "New", "<b>bold</b> &amp; plain"), at(12, 0));
    match outcome {
        Dispatched::Delivered { delivery, .. } => {
            assert_eq!(delivery.text, "New :: bold & plain");
            assert_eq!(delivery.original, "New :: <b>bold</b> &amp; plain");
        }
        other => panic!("expected delivery, got {other:?}"),
    }
}

#[test]
fn test_dispatch_is_idempotent() {
    let harness = Harness::new();
    let processor = harness.processor(
        r#"[
            { "channels": ["LOG", "DICTATION"], "templates": [{ "match": "(\\w+)@(\\w+)", "replace": "\\2 at \\1" }] },
            { "name": "mail", "max-length": 40 }
        ]"#,
    );
    let event = Event::new("mail", "alice@example", "hello");

    let first = processor.dispatch(&event, at(12, 0));
    let second = processor.dispatch(&event, at(12, 0));

    assert_eq!(first, second);
    assert_eq!(delivered_text(&first), "example at alice :: hello");
    let lines = harness.announcer.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], lines[1]);
    assert_eq!(harness.speaker.spoken(), vec!["example at alice :: hello"; 2]);
}

// ============================================================================
// 渠道
// ============================================================================

#[test]
fn test_dictation_plays_sound_then_speaks() {
    let harness = Harness::new();
    let processor = harness.processor(
        r#"[
            { "channels": ["LOG"] },
            { "name": "alarm", "channels": ["DICTATION"], "sound": { "source": "/tmp/ding.ogg" } }
        ]"#,
    );

    processor.dispatch(&Event::new("alarm", "Wake", "up"), at(7, 0));
    assert_eq!(harness.sound.play_count.load(Ordering::SeqCst), 1);
    assert_eq!(harness.speaker.spoken(), vec!["Wake :: up".to_string()]);
    assert!(harness.announcer.lines().is_empty());
}

#[test]
fn test_void_channel_produces_no_output() {
    let harness = Harness::new();
    let processor = harness.processor(
        r#"[
            { "channels": ["LOG", "DICTATION"] },
            { "name": "spam", "channels": ["VOID"] }
        ]"#,
    );

    let outcome = processor.dispatch(&Event::new("spam", "Buy", "now"), at(12, 0));
    assert!(matches!(outcome, Dispatched::Delivered { ref endpoint, .. } if endpoint == "spam"));
    assert!(harness.announcer.lines().is_empty());
    assert!(harness.speaker.spoken().is_empty());
}

// ============================================================================
// window / camera 维度
// ============================================================================

#[test]
fn test_default_disabled_window_vetoes_endpoint() {
    let config = r#"[
        { "channels": ["LOG"], "window": [{ "status": "DISABLED", "class": "zoom" }] },
        { "name": "chat", "window": [{ "status": "ENABLED", "class": "slack" }] }
    ]"#;
    let event = Event::new("chat", "ping", "");

    let harness = Harness::new().with_tree(FlatTree::new(vec![("Slack", "slack"), ("Meeting", "zoom")]));
    let outcome = harness.processor(config).dispatch(&event, at(12, 0));
    assert_eq!(
        outcome,
        Dispatched::Suppressed {
            endpoint: "chat".to_string(),
            gate: Gate::Window
        }
    );

    let harness = Harness::new().with_tree(FlatTree::new(vec![("Slack", "slack")]));
    let outcome = harness.processor(config).dispatch(&event, at(12, 0));
    assert!(matches!(outcome, Dispatched::Delivered { .. }));

    // 自己的 ENABLED 规则必须自己满足
    let harness = Harness::new().with_tree(FlatTree::new(vec![("Terminal", "xterm")]));
    let outcome = harness.processor(config).dispatch(&event, at(12, 0));
    assert!(matches!(outcome, Dispatched::Suppressed { gate: Gate::Window, .. }));
}

#[test]
fn test_camera_probe_is_memoized_per_dispatch() {
    let harness = Harness::new().with_probe(CountingProbe::new(1));
    let processor = harness.processor(
        r#"[
            { "channels": ["LOG"] },
            {
                "name": "call",
                "camera": [
                    { "status": "ENABLED", "device": 0, "available": false },
                    { "status": "DISABLED", "device": 0, "available": true }
                ]
            }
        ]"#,
    );
    let event = Event::new("call", "Incoming", "call");

    let outcome = processor.dispatch(&event, at(12, 0));
    assert!(matches!(outcome, Dispatched::Delivered { .. }));
    assert_eq!(harness.probe.get_call_count(), 1);

    // 下一次分发重新探测
    processor.dispatch(&event, at(12, 0));
    assert_eq!(harness.probe.get_call_count(), 2);
}

#[test]
fn test_camera_in_use_suppresses() {
    let harness = Harness::new().with_probe(CountingProbe::new(1));
    let processor = harness.processor(
        r#"[
            { "channels": ["LOG"], "camera": [{ "status": "DISABLED", "device": 0, "available": false }] },
            { "name": "chat" }
        ]"#,
    );

    let outcome = processor.dispatch(&Event::new("chat", "hi", ""), at(12, 0));
    assert!(matches!(outcome, Dispatched::Suppressed { gate: Gate::Camera, .. }));
}

// ============================================================================
// 错误隔离
// ============================================================================

#[test]
fn test_endpoint_error_moves_on_to_next_candidate() {
    let harness = Harness::new().with_tree(FlatTree::broken());
    let processor = harness.processor(
        r#"[
            { "channels": ["LOG"] },
            { "name": "chat", "window": [{ "status": "ENABLED", "class": "slack" }] },
            { "match": { "summary": "hi" }, "max-length": 2 }
        ]"#,
    );

    let outcome = processor.dispatch(&Event::new("chat", "hi", "there"), at(12, 0));
    match outcome {
        Dispatched::Delivered { endpoint, delivery } => {
            assert_eq!(endpoint, "<unnamed>");
            assert_eq!(delivery.text, "hi");
        }
        other => panic!("expected unnamed delivery, got {other:?}"),
    }
}

#[test]
fn test_default_error_is_unhandled() {
    let harness = Harness::new().with_tree(FlatTree::broken());
    let processor = harness.processor(
        r#"[{ "channels": ["LOG"], "window": [{ "status": "ENABLED", "class": "slack" }] }]"#,
    );

    let outcome = processor.dispatch(&Event::new("chat", "hi", "there"), at(12, 0));
    assert_eq!(outcome, Dispatched::Unhandled);
    assert!(harness.announcer.lines().is_empty());
}
