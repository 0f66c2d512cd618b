//! Animation commands: the closed set of instructions the renderer accepts.
//!
//! Every vocabulary is a closed enum, and the free-form parts of a command
//! (`note`, `say`, `duration`, coordinates) are only reachable through
//! constructors that bound them. A value outside the renderer's vocabulary
//! therefore cannot be represented, let alone serialized.
//!
//! Wire format (one JSON object per line):
//!
//! ```text
//! {"body":"idle","arms":"wave","face":"happy","say":"Hi!","duration":3}
//! {"full":"twirl","note":"spin","duration":4}
//! {"goto":{"x":0.0,"z":0.0}}
//! {"comeback":true}
//! {"missing":["backflip"]}
//! {"error":"..."}
//! {"done":true}
//! ```

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Maximum characters kept from a command's `note`.
pub const NOTE_MAX_CHARS: usize = 60;
/// Maximum characters kept from a command's `say`.
pub const SAY_MAX_CHARS: usize = 500;

macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $key:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $key)] $variant),+
        }

        impl $name {
            /// Every member of the vocabulary, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The canonical key sent to the renderer.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $key),+
                }
            }

            /// Exact lookup by canonical key (no alias resolution).
            pub fn from_key(key: &str) -> Option<Self> {
                match key {
                    $($key => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Lower-body / locomotion layer.
    #[derive(Default)]
    BodyMotion {
        #[default]
        Idle => "idle",
        Walk => "walk",
        Sit => "sit",
        Jump => "jump",
        JumpForward => "jump-fwd",
        LieUp => "lie-up",
        LieSide => "lie-side",
        LieDown => "lie-down",
        Crouch => "crouch",
        TurnLeft => "turn-left",
        TurnRight => "turn-right",
        StepFront => "step-front",
        StepBack => "step-back",
        StepLeft => "step-left",
        StepRight => "step-right",
        Dying => "dying",
    }
}

vocabulary! {
    /// Arm gesture layer. `auto` lets the renderer pick.
    #[derive(Default)]
    ArmGesture {
        #[default]
        Auto => "auto",
        Wave => "wave",
        HandsUp => "hands-up",
        ThumbsUp => "thumbs-up",
        Peace => "peace",
        Pointing => "pointing",
        Heart => "heart",
        Talk => "talk",
        Pray => "pray",
        Clap => "clap",
    }
}

vocabulary! {
    /// Facial expression layer. `auto` lets the renderer pick.
    #[derive(Default)]
    FaceExpression {
        #[default]
        Auto => "auto",
        Happy => "happy",
        Angry => "angry",
        Laughing => "laughing",
        Tired => "tired",
        Sleeping => "sleeping",
        Focused => "focused",
        Talking => "talking",
    }
}

vocabulary! {
    /// Single named animations that replace every other layer.
    FullAnimation {
        Twirl => "twirl",
        FrontKick => "front-kick",
        Roundhouse => "roundhouse",
        MrBean => "mr-bean",
        Breakdance => "breakdance",
        Twerk => "twerk",
        JoyfulJump => "joyful-jump",
        Pose => "pose",
    }
}

/// How long a command holds, in whole seconds. Always within `[MIN, MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct HoldSeconds(u8);

impl HoldSeconds {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;
    pub const DEFAULT: u8 = 3;

    /// Clamp any integer into the valid range.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for HoldSeconds {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Timing and speech attached to a pose or full-body animation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cue {
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    say: Option<String>,
    duration: HoldSeconds,
}

impl Cue {
    pub fn new(duration: HoldSeconds) -> Self {
        Self {
            note: None,
            say: None,
            duration,
        }
    }

    /// Attach a short stage note. Empty notes are ignored; long ones are cut.
    pub fn with_note(mut self, note: &str) -> Self {
        self.note = bounded(note, NOTE_MAX_CHARS);
        self
    }

    /// Attach a line to speak. Empty lines are ignored; long ones are cut.
    pub fn with_say(mut self, say: &str) -> Self {
        self.say = bounded(say, SAY_MAX_CHARS);
        self
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn say(&self) -> Option<&str> {
        self.say.as_deref()
    }

    pub fn duration(&self) -> HoldSeconds {
        self.duration
    }
}

fn bounded(text: &str, max_chars: usize) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(max_chars).collect())
}

/// A layered body + arms + face instruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Pose {
    pub body: BodyMotion,
    pub arms: ArmGesture,
    pub face: FaceExpression,
    #[serde(flatten)]
    pub cue: Cue,
}

/// A single named animation; body/arms/face are absent by construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullOverride {
    pub full: FullAnimation,
    #[serde(flatten)]
    pub cue: Cue,
}

/// A stage position to walk to. Coordinates are always finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Goto {
    x: f64,
    z: f64,
}

impl Goto {
    pub const CENTER: Goto = Goto { x: 0.0, z: 0.0 };

    /// Non-finite coordinates collapse to `0.0`.
    pub fn new(x: f64, z: f64) -> Self {
        let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
        Self {
            x: finite(x),
            z: finite(z),
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn z(&self) -> f64 {
        self.z
    }
}

/// One instruction on the autopilot output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Pose(Pose),
    Full(FullOverride),
    Goto(Goto),
    /// Retrace to the starting position.
    Comeback,
    /// Capabilities the model wanted but the vocabulary lacks.
    Missing(Vec<String>),
    /// Terminal: the stream failed.
    Error(String),
    /// Terminal: the stream completed.
    Done,
}

impl Command {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Pose(_) => "pose",
            Command::Full(_) => "full",
            Command::Goto(_) => "goto",
            Command::Comeback => "comeback",
            Command::Missing(_) => "missing",
            Command::Error(_) => "error",
            Command::Done => "done",
        }
    }

    /// Whether this command ends a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Command::Error(_) | Command::Done)
    }

    /// Serialize as a single newline-terminated JSON line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Command::Pose(pose) => pose.serialize(serializer),
            Command::Full(full) => full.serialize(serializer),
            Command::Goto(goto) => single_entry(serializer, "goto", goto),
            Command::Comeback => single_entry(serializer, "comeback", &true),
            Command::Missing(items) => single_entry(serializer, "missing", items),
            Command::Error(message) => single_entry(serializer, "error", message),
            Command::Done => single_entry(serializer, "done", &true),
        }
    }
}

fn single_entry<S: Serializer, V: Serialize + ?Sized>(
    serializer: S,
    key: &str,
    value: &V,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, value)?;
    map.end()
}
