//! Stage awareness: where the avatar is, and which instructions are plain
//! navigation that never needs the model.

use marionette_core::{Command, Goto};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Distance from center, on either axis, before a side is named.
pub const SIDE_THRESHOLD: f64 = 1.5;

/// Ground-plane position of the avatar. Positive `z` is toward the audience.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StagePosition {
    pub x: f64,
    pub z: f64,
}

impl StagePosition {
    pub fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }
}

/// Which way the avatar is turned, in 90° sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Audience,
    StageLeft,
    Away,
    StageRight,
}

impl Facing {
    /// Classify a yaw in radians.
    pub fn from_rotation(radians: f64) -> Self {
        let radians = if radians.is_finite() { radians } else { 0.0 };
        Self::from_degrees(radians.to_degrees())
    }

    /// Classify a yaw in degrees. Each boundary belongs to the sector it opens.
    pub fn from_degrees(degrees: f64) -> Self {
        let degrees = degrees.rem_euclid(360.0);
        if !(45.0..315.0).contains(&degrees) {
            Facing::Audience
        } else if degrees < 135.0 {
            Facing::StageLeft
        } else if degrees < 225.0 {
            Facing::Away
        } else {
            Facing::StageRight
        }
    }

    pub fn phrase(&self) -> &'static str {
        match self {
            Facing::Audience => "facing the audience",
            Facing::StageLeft => "facing stage left",
            Facing::Away => "facing away from the audience",
            Facing::StageRight => "facing stage right",
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phrase())
    }
}

/// Describe a position, e.g. "on the left side and near the front of the stage".
pub fn position_phrase(position: StagePosition) -> String {
    let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
    let (x, z) = (finite(position.x), finite(position.z));

    let mut parts = Vec::new();
    if x < -SIDE_THRESHOLD {
        parts.push("on the left side");
    }
    if x > SIDE_THRESHOLD {
        parts.push("on the right side");
    }
    if z > SIDE_THRESHOLD {
        parts.push("near the front");
    }
    if z < -SIDE_THRESHOLD {
        parts.push("near the back");
    }

    if parts.is_empty() {
        "at center stage".to_string()
    } else {
        format!("{} of the stage", parts.join(" and "))
    }
}

/// The context block prepended to an instruction.
pub fn describe(position: StagePosition, rotation: f64) -> String {
    format!(
        "[Stage context: you are {}, {} (x={:.1}, z={:.1}).]",
        position_phrase(position),
        Facing::from_rotation(rotation),
        position.x,
        position.z,
    )
}

/// Prefix the instruction with stage context when a position is known.
pub fn augment(instruction: &str, position: Option<StagePosition>, rotation: Option<f64>) -> String {
    match position {
        Some(position) => format!("{}\n{instruction}", describe(position, rotation.unwrap_or(0.0))),
        None => instruction.to_string(),
    }
}

/// What a navigation rule asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavIntent {
    Center,
    Comeback,
}

impl NavIntent {
    pub fn command(&self) -> Command {
        match self {
            NavIntent::Center => Command::Goto(Goto::CENTER),
            NavIntent::Comeback => Command::Comeback,
        }
    }
}

/// Pattern → intent. The first matching rule wins.
const NAV_RULES: &[(&str, NavIntent)] = &[
    (
        r"(?i)\b(?:go|come|move|back|return|get|walk|run)\s+to\s+(?:the\s+)?(?:center|centre|middle|origin)\b",
        NavIntent::Center,
    ),
    (
        r"(?i)^\s*(?:the\s+)?(?:center|centre|middle|origin)\s*[.!]*\s*$",
        NavIntent::Center,
    ),
    // Optional extension: only the center rules above are required. The model
    // can still emit `{"comeback":true}` on its own if this rule is removed.
    (
        r"(?i)\b(?:go\s+back|come\s+back|return)\s+to\s+(?:the\s+|your\s+)?(?:start|starting\s+(?:point|position|spot))\b",
        NavIntent::Comeback,
    ),
];

/// Deterministic matcher for navigation the model must not be trusted with.
#[derive(Debug, Clone)]
pub struct NavDetector {
    rules: Vec<(Regex, NavIntent)>,
}

impl NavDetector {
    pub fn new() -> Self {
        let rules = NAV_RULES
            .iter()
            .filter_map(|(pattern, intent)| match Regex::new(pattern) {
                Ok(re) => Some((re, *intent)),
                Err(e) => {
                    warn!(pattern, error = %e, "Skipping invalid navigation rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn detect(&self, instruction: &str) -> Option<NavIntent> {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(instruction))
            .map(|(_, intent)| *intent)
    }
}

impl Default for NavDetector {
    fn default() -> Self {
        Self::new()
    }
}
