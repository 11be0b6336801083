//! Literal command grammars
//!
//! Recognises explicit commands (SET, PROGRESSION, COPY, COMPARE, RESET,
//! QUERY) and extracts the engines / groups / logics / fields they address.
//! All patterns are case-insensitive and run on preprocessed text so text
//! values keep the case the trader typed.

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value as JsonValue;
use tradecfg_model::fields::{all_fields, field_aliases};
use tradecfg_model::{EngineId, FieldName, GroupId, IdError, LogicRef};

use crate::command::{Command, CommandKind, ParseNotice, Target};

/// Logic vocabulary → canonical logic name
const LOGIC_ALIASES: &[(&str, &str)] = &[
    ("repower", "REPOWER"),
    ("power", "POWER"),
    ("scalper", "SCALPER"),
    ("scalp", "SCALPER"),
    ("stopper", "STOPPER"),
    ("sto", "STO"),
    ("sca", "SCA"),
    ("rpo", "RPO"),
];

/// Progression shapes
pub const PROGRESSION_KINDS: &[&str] = &["linear", "fibonacci", "exponential"];

fn re(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("grammar pattern is valid")
}

const NUM: &str = r"-?\d+(?:\.\d+)?";

static FIELD_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    let mut phrases: Vec<(String, &'static str)> = Vec::new();
    for spec in all_fields() {
        phrases.push((spec.name.to_string(), spec.name));
        if spec.name.contains('_') {
            phrases.push((spec.name.replace('_', " "), spec.name));
        }
    }
    for (alias, name) in field_aliases() {
        phrases.push(((*alias).to_string(), *name));
    }
    phrases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    phrases.dedup_by(|a, b| a.0 == b.0);
    phrases
        .into_iter()
        .map(|(phrase, name)| (re(&format!(r"\b{}\b", regex::escape(&phrase))), name))
        .collect()
});

static ENGINES: Lazy<Regex> =
    Lazy::new(|| re(r"\bengines?\s+([a-z](?:\s*(?:,|and|&|/)\s*[a-z])*)\b"));
static ALL_ENGINES: Lazy<Regex> = Lazy::new(|| re(r"\ball\s+engines\b"));
static LETTER: Lazy<Regex> = Lazy::new(|| re(r"\b[a-z]\b"));
static FROM: Lazy<Regex> = Lazy::new(|| re(r"\bfrom\s+"));
static GROUP_RANGE: Lazy<Regex> = Lazy::new(|| {
    re(r"\b(?:groups?\s*|g)(\d+)\s*(?:(?:-|through|thru)\s*(?:g(?:roup)?\s*)?|to\s+(?:g|group\s*))(\d+)\b")
});
static GROUP_LIST: Lazy<Regex> =
    Lazy::new(|| re(r"\bgroups?\s*(\d+(?:\s*(?:,|and|&)\s*g?\d+)*)"));
static GROUP_SINGLE: Lazy<Regex> = Lazy::new(|| re(r"\bg(\d+)\b"));
static DIGITS: Lazy<Regex> = Lazy::new(|| re(r"\d+"));
static LOGIC_QUALIFIED: Lazy<Regex> = Lazy::new(|| {
    let names: Vec<&str> = LOGIC_ALIASES.iter().map(|(alias, _)| *alias).collect();
    re(&format!(r"\b(?:([a-z])\s*:\s*)?({})\b", names.join("|")))
});
static LOGIC_EXPLICIT: Lazy<Regex> = Lazy::new(|| re(r"\blogic\s+(?:([a-z])\s*:\s*)?([a-z][a-z0-9_]*)\b"));

static COMPARE: Lazy<Regex> = Lazy::new(|| {
    re(r"^(?:compare|diff)\s+(.+?)\s+(?:and|with|vs\.?|versus|against)\s+(.+?)(?:\s+(?:for|on)\s+(.+))?$")
});
static COPY: Lazy<Regex> =
    Lazy::new(|| re(r"^(?:copy|clone|duplicate)\s+(.+?)\s+to\s+(.+)$"));
static PROGRESSION: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r"\b(?:(linear|fibonacci|fib|exponential|geometric)\s+)?progression\b(?:\s+(?:for|on|of)\s+([a-z_ ]+?))?\s+(?:from\s+)?({NUM})\s*(?:to|-)\s*({NUM})"
    ))
});
static RESET: Lazy<Regex> = Lazy::new(|| re(r"^(?:reset|restore|revert)\b(.*)$"));
static FIND: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r"^(?:find|search|which)\s+(?:groups?\s+|logics?\s+)?(?:with|where|having)\s+(.+?)\s*(>=|<=|!=|==|=|>|<)\s*({NUM})"
    ))
});
static SHOW: Lazy<Regex> =
    Lazy::new(|| re(r"^(?:show|list|get|display|query|what(?:'s|\s+is|\s+are)?)\b(.*)$"));
static TOGGLE: Lazy<Regex> =
    Lazy::new(|| re(r"^(enable|disable|turn\s+on|turn\s+off|activate|deactivate)\s+(.+)$"));
static CHANGE_BY: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r"^(increase|decrease|raise|lower|reduce)\s+(?:the\s+)?(.+?)\s+by\s+({NUM})\s*(%|percent)?"
    ))
});
static ADD_TO: Lazy<Regex> = Lazy::new(|| {
    re(&format!(r"^(?:add|plus)\s+({NUM})\s*(%|percent)?\s+(?:to|on)\s+(?:the\s+)?(.+)$"))
});
static SUBTRACT_FROM: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r"^(?:subtract|remove|minus|take)\s+({NUM})\s*(%|percent)?\s+(?:from|off)\s+(?:the\s+)?(.+)$"
    ))
});
static MULTIPLY: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"^multiply\s+(?:the\s+)?(.+?)\s+by\s+({NUM})")));
static SET_TO: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r"^(?:set|change|update|make|modify|adjust)\s+(?:the\s+)?(.+?)\s*(?:\bto\b|=|:)\s*({NUM}|[a-z_][a-z0-9_]*)"
    ))
});

/// Fields mentioned in text, longest phrase first, in order of appearance
#[must_use]
pub fn fields_in(text: &str) -> IndexSet<FieldName> {
    let mut remaining = text.to_string();
    let mut found: Vec<(usize, &'static str)> = Vec::new();
    for (pattern, name) in FIELD_PATTERNS.iter() {
        let spans: Vec<(usize, usize)> = pattern
            .find_iter(&remaining)
            .map(|m| (m.start(), m.end()))
            .collect();
        for (start, end) in spans {
            found.push((start, *name));
            remaining.replace_range(start..end, &" ".repeat(end - start));
        }
    }
    found.sort_by_key(|(position, _)| *position);
    found.into_iter().map(|(_, name)| FieldName::new(name)).collect()
}

/// Engines, groups, logics and fields mentioned in text
///
/// # Errors
/// Returns error if an explicit group number is out of range
pub fn extract_target(text: &str) -> Result<Target, IdError> {
    let mut target = Target::new();

    if !ALL_ENGINES.is_match(text) {
        let engines: IndexSet<EngineId> = ENGINES
            .captures_iter(text)
            .flat_map(|caps| {
                let letters = caps.get(1).map_or("", |m| m.as_str());
                LETTER
                    .find_iter(letters)
                    .map(|m| m.as_str().to_string())
                    .collect::<Vec<_>>()
            })
            .filter_map(|letter| EngineId::new(letter).ok())
            .collect();
        if !engines.is_empty() {
            target.engines = Some(engines);
        }
    }

    let groups = extract_groups(text)?;
    if !groups.is_empty() {
        target.groups = Some(groups);
    }

    let logics = extract_logics(text)?;
    if !logics.is_empty() {
        target.logics = Some(logics);
    }

    let fields = fields_in(text);
    if !fields.is_empty() {
        target.fields = Some(fields);
    }
    Ok(target)
}

fn group(number: &str) -> Result<GroupId, IdError> {
    number.parse()
}

fn extract_groups(text: &str) -> Result<IndexSet<GroupId>, IdError> {
    let mut groups = IndexSet::new();
    if text.to_lowercase().contains("all groups") {
        return Ok(groups);
    }
    for caps in GROUP_RANGE.captures_iter(text) {
        let (start, end) = (group(&caps[1])?, group(&caps[2])?);
        let (low, high) = if start <= end { (start, end) } else { (end, start) };
        for n in low.get()..=high.get() {
            groups.insert(GroupId::new(n)?);
        }
    }
    for caps in GROUP_LIST.captures_iter(text) {
        for number in DIGITS.find_iter(&caps[1]) {
            groups.insert(group(number.as_str())?);
        }
    }
    for caps in GROUP_SINGLE.captures_iter(text) {
        groups.insert(group(&caps[1])?);
    }
    Ok(groups)
}

fn extract_logics(text: &str) -> Result<IndexSet<LogicRef>, IdError> {
    let mut logics = IndexSet::new();
    for caps in LOGIC_QUALIFIED.captures_iter(text) {
        let alias = caps[2].to_lowercase();
        let name = LOGIC_ALIASES
            .iter()
            .find(|(candidate, _)| *candidate == alias)
            .map_or(alias.as_str(), |(_, name)| *name);
        logics.insert(logic_ref(caps.get(1).map(|m| m.as_str()), name)?);
    }
    for caps in LOGIC_EXPLICIT.captures_iter(text) {
        logics.insert(logic_ref(caps.get(1).map(|m| m.as_str()), &caps[2])?);
    }
    Ok(logics)
}

fn logic_ref(engine: Option<&str>, name: &str) -> Result<LogicRef, IdError> {
    match engine {
        Some(engine) => LogicRef::qualified(EngineId::new(engine)?, name),
        None => LogicRef::named(name),
    }
}

/// One side of a COPY or COMPARE
#[derive(Debug, Clone, PartialEq, Eq)]
enum Side {
    Group(GroupId),
    Engine(EngineId),
}

fn parse_side(text: &str) -> Option<Side> {
    let trimmed = text.trim();
    if trimmed.len() == 1 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return EngineId::new(trimmed).ok().map(Side::Engine);
    }
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return group(trimmed).ok().map(Side::Group);
    }
    let target = extract_target(trimmed).ok()?;
    if let Some(groups) = target.groups.filter(|g| g.len() == 1) {
        return groups.first().copied().map(Side::Group);
    }
    target
        .engines
        .filter(|e| e.len() == 1)
        .and_then(|e| e.first().cloned())
        .map(Side::Engine)
}

fn number(caps: &Captures<'_>, index: usize) -> Option<f64> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

/// Parse a scalar typed by the trader
#[must_use]
pub fn parse_value(text: &str) -> JsonValue {
    let text = text.trim();
    if let Ok(n) = text.parse::<f64>() {
        return JsonValue::from(n);
    }
    match text.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "enabled" => JsonValue::Bool(true),
        "false" | "off" | "no" | "disabled" => JsonValue::Bool(false),
        _ => JsonValue::String(text.to_string()),
    }
}

/// Try every literal grammar; `None` when nothing matches
///
/// A grammar that matches but names an invalid target yields an `Unknown`
/// command whose hint explains the problem.
#[must_use]
pub fn parse_literal(raw: &str, text: &str) -> Option<Command> {
    let text = text.trim();
    let parsers: [fn(&str, &str) -> Option<Result<Command, IdError>>; 6] =
        [compare, copy, progression, reset, query, set];
    parsers.iter().find_map(|parse| parse(raw, text)).map(|result| {
        result.unwrap_or_else(|err| {
            Command::new(CommandKind::Unknown, raw).with_notice(ParseNotice::FormatHint {
                message: err.to_string(),
            })
        })
    })
}

fn compare(raw: &str, text: &str) -> Option<Result<Command, IdError>> {
    let caps = COMPARE.captures(text)?;
    let (left, right) = (parse_side(&caps[1])?, parse_side(&caps[2])?);
    let rest = caps.get(3).map_or("", |m| m.as_str());
    Some(extract_target(rest).map(|mut target| {
        let command = Command::new(CommandKind::Compare, raw);
        match (left, right) {
            (Side::Group(a), Side::Group(b)) => {
                target.groups = Some([a, b].into_iter().collect());
                command
                    .with_param("dimension", "group")
                    .with_param("left", a.to_string())
                    .with_param("right", b.to_string())
                    .with_target(target)
            }
            (Side::Engine(a), Side::Engine(b)) => {
                target.engines = Some([a.clone(), b.clone()].into_iter().collect());
                command
                    .with_param("dimension", "engine")
                    .with_param("left", a.to_string())
                    .with_param("right", b.to_string())
                    .with_target(target)
            }
            _ => Command::new(CommandKind::Unknown, raw).with_notice(ParseNotice::FormatHint {
                message: "Compare two groups ('compare G1 and G2') or two engines ('compare engine A with engine B')".to_string(),
            }),
        }
    }))
}

fn copy(raw: &str, text: &str) -> Option<Result<Command, IdError>> {
    let caps = COPY.captures(text)?;
    let (source_part, dest_part) = (&caps[1], &caps[2]);
    let (field_part, source_text) = match FROM.find(source_part) {
        Some(m) => (&source_part[..m.start()], &source_part[m.end()..]),
        None => ("", source_part),
    };
    let source = parse_side(source_text).or_else(|| {
        // "copy grid g1 to g2": the source is the group/engine mention
        let target = extract_target(source_text).ok()?;
        target
            .groups
            .and_then(|g| g.first().copied())
            .map(Side::Group)
    })?;
    Some(extract_target(dest_part).map(|mut target| {
        let mut fields = fields_in(field_part);
        fields.extend(fields_in(source_text));
        fields.extend(target.fields.take().unwrap_or_default());
        if !fields.is_empty() {
            target.fields = Some(fields);
        }
        let command = Command::new(CommandKind::Copy, raw);
        match source {
            Side::Group(source) if target.groups.is_some() => {
                if let Some(groups) = target.groups.as_mut() {
                    groups.shift_remove(&source);
                }
                command
                    .with_param("source_group", source.to_string())
                    .with_target(target)
            }
            Side::Engine(source) if target.engines.is_some() => {
                if let Some(engines) = target.engines.as_mut() {
                    engines.shift_remove(&source);
                }
                command
                    .with_param("source_engine", source.to_string())
                    .with_target(target)
            }
            _ => Command::new(CommandKind::Unknown, raw).with_notice(ParseNotice::FormatHint {
                message: "Copy needs a source and destination of the same kind: 'copy G1 to G2,G3' or 'copy engine A to engine B'".to_string(),
            }),
        }
    }))
}

fn progression(raw: &str, text: &str) -> Option<Result<Command, IdError>> {
    let caps = PROGRESSION.captures(text)?;
    let kind = match caps.get(1).map(|m| m.as_str().to_lowercase()).as_deref() {
        Some("fibonacci" | "fib") => "fibonacci",
        Some("exponential" | "geometric") => "exponential",
        _ => "linear",
    };
    let start = number(&caps, 3)?;
    let end = number(&caps, 4)?;
    let field_hint = caps.get(2).map_or_else(IndexSet::new, |m| fields_in(m.as_str()));
    let rest = &text[caps.get(0).map_or(0, |m| m.end())..];
    Some(extract_target(rest).map(|mut target| {
        let mut fields = field_hint;
        fields.extend(target.fields.take().unwrap_or_default());
        if fields.is_empty() {
            fields.insert(FieldName::new("grid"));
        }
        target.fields = Some(fields);
        Command::new(CommandKind::Progression, raw)
            .with_param("progression", kind)
            .with_param("start", start)
            .with_param("end", end)
            .with_target(target)
    }))
}

fn reset(raw: &str, text: &str) -> Option<Result<Command, IdError>> {
    let caps = RESET.captures(text)?;
    Some(extract_target(&caps[1]).map(|target| {
        Command::new(CommandKind::Reset, raw).with_target(target)
    }))
}

fn query(raw: &str, text: &str) -> Option<Result<Command, IdError>> {
    if let Some(caps) = FIND.captures(text) {
        let fields = fields_in(&caps[1]);
        let value = number(&caps, 3)?;
        let op = match &caps[2] {
            "==" => "=",
            other => other,
        }
        .to_string();
        let rest = &text[caps.get(0).map_or(0, |m| m.end())..];
        return Some(extract_target(rest).map(|target| {
            let target = if fields.is_empty() {
                target
            } else {
                target.with_fields(fields)
            };
            Command::new(CommandKind::Query, raw)
                .with_param("filter_op", op)
                .with_param("filter_value", value)
                .with_target(target)
        }));
    }
    let caps = SHOW.captures(text)?;
    Some(extract_target(&caps[1]).map(|target| Command::new(CommandKind::Query, raw).with_target(target)))
}

fn set(raw: &str, text: &str) -> Option<Result<Command, IdError>> {
    if let Some(caps) = TOGGLE.captures(text) {
        let verb = caps[1].to_lowercase();
        let on = !(verb == "disable" || verb == "deactivate" || verb.ends_with("off"));
        return field_command(raw, &caps[2], &caps[2]).map(|result| {
            result.map(|command| command.with_param("op", "set").with_param("value", on))
        });
    }

    if let Some(caps) = CHANGE_BY.captures(text) {
        let up = matches!(caps[1].to_lowercase().as_str(), "increase" | "raise");
        let amount = number(&caps, 3)?;
        let percent = caps.get(4).is_some();
        return field_command(raw, &caps[2], text).map(|result| {
            result.map(|command| match (percent, up) {
                (true, true) => scale(command, 1.0 + amount / 100.0),
                (true, false) => scale(command, 1.0 - amount / 100.0),
                (false, true) => command.with_param("op", "add").with_param("value", amount),
                (false, false) => command.with_param("op", "subtract").with_param("value", amount),
            })
        });
    }

    if let Some(caps) = ADD_TO.captures(text) {
        let amount = number(&caps, 1)?;
        let percent = caps.get(2).is_some();
        return field_command(raw, &caps[3], &caps[3]).map(|result| {
            result.map(|command| {
                if percent {
                    scale(command, 1.0 + amount / 100.0)
                } else {
                    command.with_param("op", "add").with_param("value", amount)
                }
            })
        });
    }

    if let Some(caps) = SUBTRACT_FROM.captures(text) {
        let amount = number(&caps, 1)?;
        let percent = caps.get(2).is_some();
        return field_command(raw, &caps[3], &caps[3]).map(|result| {
            result.map(|command| {
                if percent {
                    scale(command, 1.0 - amount / 100.0)
                } else {
                    command.with_param("op", "subtract").with_param("value", amount)
                }
            })
        });
    }

    if let Some(caps) = MULTIPLY.captures(text) {
        let factor = number(&caps, 2)?;
        return field_command(raw, &caps[1], text)
            .map(|result| result.map(|command| scale(command, factor)));
    }

    let caps = SET_TO.captures(text)?;
    let value = parse_value(&caps[2]);
    field_command(raw, &caps[1], text).map(|result| {
        result.map(|command| command.with_param("op", "set").with_param("value", value))
    })
}

fn scale(command: Command, factor: f64) -> Command {
    command.with_param("op", "scale").with_param("factor", factor)
}

/// SET skeleton: fields from `field_text`, target from `target_text`
fn field_command(raw: &str, field_text: &str, target_text: &str) -> Option<Result<Command, IdError>> {
    let fields = fields_in(field_text);
    if fields.is_empty() {
        return None;
    }
    Some(extract_target(target_text).map(|target| {
        Command::new(CommandKind::Set, raw).with_target(target.with_fields(fields))
    }))
}
