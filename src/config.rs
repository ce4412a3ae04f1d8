//! 配置加载 - JSON 文档 → [`EndpointRegistry`]
//!
//! 文档是一个 endpoint 对象数组：
//! ```json
//! [
//!   { "channels": ["LOG"], "schedule": [{ "status": "DISABLED", "time": { "from": "22:00", "to": "23:59" } }] },
//!   { "name": "Slack", "max-length": 80, "channels": ["LOG", "DICTATION"] }
//! ]
//! ```
//! 带 `name` 或 `match` 的对象是普通 endpoint，其余的是默认 endpoint（最多一个）。
//! 整个文档校验通过后才返回注册表，任何错误都不会留下半成品。

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::endpoint::{Channel, EndpointDefinition, EndpointRegistry, SoundEffect, TemplateReplacement};
use crate::error::{ConfigError, ValidationError};
use crate::rules::{
    MatchDefinition, Month, Ordinal, Pattern, RangeSet, ScheduleDefinition, Status, TimeOfDay,
    VideoCapMatchDefinition, Weekday, WindowMatchDefinition,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct EndpointDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    templates: Vec<TemplateDocument>,
    #[serde(default, rename = "match")]
    matching: Option<MatchDocument>,
    #[serde(default)]
    schedule: Vec<ScheduleDocument>,
    #[serde(default)]
    window: Vec<WindowDocument>,
    #[serde(default)]
    camera: Vec<CameraDocument>,
    #[serde(default)]
    sound: Option<SoundDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateDocument {
    #[serde(rename = "match")]
    pattern: String,
    replace: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatchDocument {
    name: Option<String>,
    summary: Option<String>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScheduleDocument {
    status: Status,
    time: Option<ScheduleElement>,
    day: Option<ScheduleElement>,
    month: Option<ScheduleElement>,
    date: Option<ScheduleElement>,
}

/// schedule 字段的三种写法：`{from, to}`、列表、单个值
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScheduleElement {
    Range { from: Value, to: Value },
    Many(Vec<Value>),
    One(Value),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WindowDocument {
    status: Status,
    name: Option<String>,
    class: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CameraDocument {
    status: Status,
    device: Option<u32>,
    available: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SoundDocument {
    source: PathBuf,
    /// 秒
    delay: Option<f64>,
}

/// 默认配置路径 `~/.config/notify-herald/endpoints.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("notify-herald").join("endpoints.json"))
}

/// 从文件加载
pub fn load_registry(path: &Path) -> Result<EndpointRegistry, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_registry(&text)
}

/// 解析完整的配置文档
pub fn parse_registry(text: &str) -> Result<EndpointRegistry, ConfigError> {
    let documents: Vec<EndpointDocument> = serde_json::from_str(text)?;
    let mut registry = EndpointRegistry::new();

    for document in documents {
        let is_endpoint = document.name.is_some() || document.matching.is_some();
        let endpoint = build_endpoint(document)?;
        if is_endpoint {
            registry.add_endpoint(endpoint);
        } else {
            registry.set_default(endpoint)?;
        }
    }

    Ok(registry)
}

fn build_endpoint(document: EndpointDocument) -> Result<EndpointDefinition, ConfigError> {
    let label = document.name.clone().unwrap_or_else(|| {
        if document.matching.is_some() { "<unnamed>" } else { "<default>" }.to_string()
    });

    let mut endpoint = EndpointDefinition {
        name: document.name.clone(),
        max_len: document.max_length,
        channels: document.channels,
        ..EndpointDefinition::default()
    };

    for (i, template) in document.templates.iter().enumerate() {
        let compiled = TemplateReplacement::new(&template.pattern, &template.replace)
            .map_err(|source| pattern_error(&label, &format!("templates[{i}]"), source))?;
        endpoint.templates.push(compiled);
    }

    if let Some(mut matching) = document.matching {
        // 具名 endpoint 没写 name 匹配时，隐含精确匹配自己的名字
        if matching.name.is_none() {
            if let Some(name) = &document.name {
                matching.name = Some(format!("^{}$", regex::escape(name)));
            }
        }
        endpoint.match_definition = Some(build_match(&label, &matching)?);
    }

    for rule in &document.schedule {
        endpoint.schedule.push(build_schedule(&label, rule)?);
    }

    for (i, rule) in document.window.iter().enumerate() {
        let mut definition = WindowMatchDefinition::new(rule.status);
        if let Some(name) = &rule.name {
            definition = definition
                .with_name(name)
                .map_err(|source| pattern_error(&label, &format!("window[{i}].name"), source))?;
        }
        if let Some(class) = &rule.class {
            definition = definition
                .with_class(class)
                .map_err(|source| pattern_error(&label, &format!("window[{i}].class"), source))?;
        }
        endpoint.window.push(definition);
    }

    for rule in &document.camera {
        let mut definition = VideoCapMatchDefinition::new(rule.status);
        if let Some(device) = rule.device {
            definition = definition.with_device(device);
        }
        if let Some(available) = rule.available {
            definition = definition.with_available(available);
        }
        endpoint.camera.push(definition);
    }

    if let Some(sound) = document.sound {
        let mut effect = SoundEffect::new(sound.source);
        if let Some(seconds) = sound.delay {
            let delay = Duration::try_from_secs_f64(seconds).map_err(|_| {
                ValidationError::new(format!("Sound delay in '{label}' must be a non-negative number of seconds: {seconds}"))
            })?;
            effect = effect.with_delay(delay);
        }
        endpoint.sound = Some(effect);
    }

    Ok(endpoint)
}

fn build_match(label: &str, matching: &MatchDocument) -> Result<MatchDefinition, ConfigError> {
    // 逐个编译以便报告具体字段
    let compile = |field: &str, source: Option<&String>, build: fn(&str) -> Result<Pattern, regex::Error>| {
        source
            .map(|s| build(s))
            .transpose()
            .map_err(|e| pattern_error(label, &format!("match.{field}"), e))
    };

    Ok(MatchDefinition {
        name: compile("name", matching.name.as_ref(), Pattern::new)?,
        summary: compile("summary", matching.summary.as_ref(), Pattern::multiline)?,
        body: compile("body", matching.body.as_ref(), Pattern::multiline)?,
    })
}

fn pattern_error(label: &str, field: &str, source: regex::Error) -> ConfigError {
    ConfigError::Pattern {
        field: format!("{label}.{field}"),
        source,
    }
}

fn build_schedule(label: &str, rule: &ScheduleDocument) -> Result<ScheduleDefinition, ValidationError> {
    Ok(ScheduleDefinition::new(rule.status)
        .with_times(range_set(label, "time", rule.time.as_ref(), parse_time)?)
        .with_days(range_set(label, "day", rule.day.as_ref(), parse_day)?)
        .with_months(range_set(label, "month", rule.month.as_ref(), parse_month)?)
        .with_dates(range_set(label, "date", rule.date.as_ref(), parse_date)?))
}

fn invalid_syntax(label: &str, kind: &str, value: &Value) -> ValidationError {
    ValidationError::new(format!("Schedule in '{label}' uses invalid {kind} syntax: {value}"))
}

/// 把一个 schedule 字段转换成 [`RangeSet`]；区间不允许跨越（from 必须不大于 to）
fn range_set<T: Ordinal>(
    label: &str,
    kind: &str,
    element: Option<&ScheduleElement>,
    scalar: impl Fn(&Value) -> Option<Result<T, ValidationError>>,
) -> Result<RangeSet<T>, ValidationError> {
    let convert = |value: &Value| scalar(value).unwrap_or_else(|| Err(invalid_syntax(label, kind, value)));

    match element {
        None => Ok(RangeSet::Any),
        Some(ScheduleElement::One(value)) => Ok(RangeSet::listed(vec![convert(value)?])),
        Some(ScheduleElement::Many(values)) => {
            let values = values.iter().map(convert).collect::<Result<Vec<_>, _>>()?;
            Ok(RangeSet::listed(values))
        }
        Some(ScheduleElement::Range { from, to }) => {
            let start = convert(from)?;
            let end = convert(to)?;
            if start.ordinal() > end.ordinal() {
                return Err(ValidationError::new(format!(
                    "Schedule in '{label}' has a {kind} range that ends before it starts: {from} to {to}"
                )));
            }
            Ok(RangeSet::ranged(start, end))
        }
    }
}

fn parse_time(value: &Value) -> Option<Result<TimeOfDay, ValidationError>> {
    value.as_str().map(TimeOfDay::from_str)
}

fn parse_day(value: &Value) -> Option<Result<Weekday, ValidationError>> {
    value.as_str().map(Weekday::from_str)
}

fn parse_month(value: &Value) -> Option<Result<Month, ValidationError>> {
    match value {
        Value::String(name) => Some(Month::from_str(name)),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .and_then(Month::from_number)
            .map(Ok),
        _ => None,
    }
}

fn parse_date(value: &Value) -> Option<Result<u32, ValidationError>> {
    value
        .as_u64()
        .filter(|d| (1..=31).contains(d))
        .map(|d| Ok(d as u32))
}
