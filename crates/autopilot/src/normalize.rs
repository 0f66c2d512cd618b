//! Command normalizer and validator.
//!
//! Turns one line of model output into at most one [`Command`]. Nothing in
//! here fails the stream: malformed lines are reported as [`MalformedLine`]
//! for logging and dropped, and out-of-vocabulary values silently fall back
//! to the field's default.

use marionette_core::{
    ArmGesture, BodyMotion, Command, Cue, FaceExpression, FullAnimation, FullOverride, Goto,
    HoldSeconds, Pose,
};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::vocabulary::{Vocabulary, resolve};

/// At most this many entries are kept from a `missing` list.
pub const MAX_MISSING_ITEMS: usize = 20;

/// Keys that make an object a pose or full-body override.
const POSE_KEYS: &[&str] = &["full", "body", "arms", "face", "note", "say", "duration"];

/// Why a line produced no command.
#[derive(Debug, Error, PartialEq)]
pub enum MalformedLine {
    #[error("line is blank")]
    Blank,

    #[error("line does not start with '{{'")]
    NotAnObjectStart,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("JSON value is not an object")]
    NotAnObject,
}

/// Decode one line into a JSON object, tolerating code-fence wrapping.
pub fn decode_line(line: &str) -> Result<Map<String, Value>, MalformedLine> {
    let trimmed = line.trim().trim_matches('`').trim();
    if trimmed.is_empty() {
        return Err(MalformedLine::Blank);
    }
    if !trimmed.starts_with('{') {
        return Err(MalformedLine::NotAnObjectStart);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(MalformedLine::NotAnObject),
        Err(e) => Err(MalformedLine::InvalidJson(e.to_string())),
    }
}

/// Decode and normalize one line. `Ok(None)` is a well-formed object that
/// carries nothing the renderer understands.
pub fn parse_line(line: &str) -> Result<Option<Command>, MalformedLine> {
    decode_line(line).map(|object| normalize(&object))
}

/// Map a decoded object onto a command.
///
/// Checked in order: `missing`, truthy `comeback`, `goto` object, then
/// pose / full-body override.
pub fn normalize(object: &Map<String, Value>) -> Option<Command> {
    if let Some(Value::Array(items)) = object.get("missing") {
        let items = items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(MAX_MISSING_ITEMS)
            .map(str::to_owned)
            .collect();
        return Some(Command::Missing(items));
    }

    if object.get("comeback").is_some_and(truthy) {
        return Some(Command::Comeback);
    }

    if let Some(Value::Object(target)) = object.get("goto") {
        let goto = Goto::new(coordinate(target, "x"), coordinate(target, "z"));
        return Some(Command::Goto(goto));
    }

    if !POSE_KEYS.iter().any(|key| object.contains_key(*key)) {
        return None;
    }

    let cue = cue(object);

    let full = field::<FullAnimation>(object, "full")
        .or_else(|| object.get("body").and_then(Value::as_str).and_then(resolve));
    if let Some(full) = full {
        return Some(Command::Full(FullOverride { full, cue }));
    }

    Some(Command::Pose(Pose {
        body: field_or_default(object, "body"),
        arms: field_or_default(object, "arms"),
        face: field_or_default(object, "face"),
        cue,
    }))
}

fn field<V: Vocabulary>(object: &Map<String, Value>, name: &str) -> Option<V> {
    object.get(name).and_then(Value::as_str).and_then(resolve)
}

fn field_or_default<V: Vocabulary + Default>(object: &Map<String, Value>, name: &str) -> V {
    match object.get(name) {
        None | Some(Value::Null) => V::default(),
        Some(value) => value.as_str().and_then(resolve).unwrap_or_else(|| {
            let fallback = V::default();
            debug!(field = name, %value, fallback = fallback.key(), "Value outside vocabulary");
            fallback
        }),
    }
}

fn cue(object: &Map<String, Value>) -> Cue {
    let mut cue = Cue::new(duration(object.get("duration")));
    if let Some(note) = object.get("note").and_then(Value::as_str) {
        cue = cue.with_note(note.trim());
    }
    if let Some(say) = object.get("say").and_then(Value::as_str) {
        cue = cue.with_say(say.trim());
    }
    cue
}

/// Integers and integer-like strings clamp into range; anything else,
/// fractional values included, is the default.
fn duration(value: Option<&Value>) -> HoldSeconds {
    let seconds = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(whole_seconds)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_seconds))
        }
        _ => None,
    };

    match seconds {
        Some(seconds) => HoldSeconds::clamped(seconds),
        None => {
            if let Some(value) = value {
                debug!(%value, "Unparseable duration, using default");
            }
            HoldSeconds::default()
        }
    }
}

fn whole_seconds(value: f64) -> Option<i64> {
    // `as` saturates at the i64 bounds
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

/// Coerce a coordinate, defaulting to 0.0 when it is missing or not numeric.
fn coordinate(target: &Map<String, Value>, axis: &str) -> f64 {
    let value = target.get(axis);
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        debug!(axis, value = ?value, "Non-numeric goto coordinate, using 0");
        0.0
    })
}

/// JSON truthiness: `false`, `null`, `0`, and `""` are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
