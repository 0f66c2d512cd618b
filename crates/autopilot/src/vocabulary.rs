//! Alias resolution for the four command vocabularies.
//!
//! Models rarely spell keys exactly as the renderer wants them. Every
//! surface form is reduced to a compact key (lowercase, no spaces,
//! underscores or hyphens) and matched first against the canonical keys,
//! then against a per-category alias table.

use marionette_core::{ArmGesture, BodyMotion, FaceExpression, FullAnimation};

/// A closed vocabulary with a table of alternative spellings.
pub trait Vocabulary: Copy + 'static {
    /// Alias table; keys are already compact.
    const ALIASES: &'static [(&'static str, Self)];

    fn members() -> &'static [Self];

    fn key(&self) -> &'static str;
}

/// Lowercase, trim, and drop separators.
pub fn compact_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolve a surface form to a vocabulary member.
pub fn resolve<V: Vocabulary>(raw: &str) -> Option<V> {
    let key = compact_key(raw);
    if key.is_empty() {
        return None;
    }

    V::members()
        .iter()
        .copied()
        .find(|member| compact_key(member.key()) == key)
        .or_else(|| {
            V::ALIASES
                .iter()
                .find(|(alias, _)| *alias == key)
                .map(|(_, member)| *member)
        })
}

impl Vocabulary for BodyMotion {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("stand", BodyMotion::Idle),
        ("standing", BodyMotion::Idle),
        ("rest", BodyMotion::Idle),
        ("neutral", BodyMotion::Idle),
        ("none", BodyMotion::Idle),
        ("walking", BodyMotion::Walk),
        ("stroll", BodyMotion::Walk),
        ("sitting", BodyMotion::Sit),
        ("sitdown", BodyMotion::Sit),
        ("jumping", BodyMotion::Jump),
        ("hop", BodyMotion::Jump),
        ("jumpforward", BodyMotion::JumpForward),
        ("forwardjump", BodyMotion::JumpForward),
        ("leap", BodyMotion::JumpForward),
        ("lieonback", BodyMotion::LieUp),
        ("lyingup", BodyMotion::LieUp),
        ("lyingonback", BodyMotion::LieUp),
        ("lieonside", BodyMotion::LieSide),
        ("lyingside", BodyMotion::LieSide),
        ("lyingonside", BodyMotion::LieSide),
        ("lyingdown", BodyMotion::LieDown),
        ("laydown", BodyMotion::LieDown),
        ("crouching", BodyMotion::Crouch),
        ("squat", BodyMotion::Crouch),
        ("duck", BodyMotion::Crouch),
        ("leftturn", BodyMotion::TurnLeft),
        ("rightturn", BodyMotion::TurnRight),
        ("stepforward", BodyMotion::StepFront),
        ("stepfwd", BodyMotion::StepFront),
        ("forward", BodyMotion::StepFront),
        ("stepbackward", BodyMotion::StepBack),
        ("stepbackwards", BodyMotion::StepBack),
        ("backward", BodyMotion::StepBack),
        ("leftstep", BodyMotion::StepLeft),
        ("strafeleft", BodyMotion::StepLeft),
        ("rightstep", BodyMotion::StepRight),
        ("straferight", BodyMotion::StepRight),
        ("die", BodyMotion::Dying),
        ("death", BodyMotion::Dying),
        ("dead", BodyMotion::Dying),
        ("faint", BodyMotion::Dying),
    ];

    fn members() -> &'static [Self] {
        BodyMotion::ALL
    }

    fn key(&self) -> &'static str {
        self.as_str()
    }
}

impl Vocabulary for ArmGesture {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("none", ArmGesture::Auto),
        ("default", ArmGesture::Auto),
        ("neutral", ArmGesture::Auto),
        ("waving", ArmGesture::Wave),
        ("hello", ArmGesture::Wave),
        ("hi", ArmGesture::Wave),
        ("bye", ArmGesture::Wave),
        ("raisehands", ArmGesture::HandsUp),
        ("raisedhands", ArmGesture::HandsUp),
        ("hooray", ArmGesture::HandsUp),
        ("celebrate", ArmGesture::HandsUp),
        ("thumbup", ArmGesture::ThumbsUp),
        ("thumb", ArmGesture::ThumbsUp),
        ("approve", ArmGesture::ThumbsUp),
        ("peacesign", ArmGesture::Peace),
        ("vsign", ArmGesture::Peace),
        ("point", ArmGesture::Pointing),
        ("pointat", ArmGesture::Pointing),
        ("blowkiss", ArmGesture::Heart),
        ("kiss", ArmGesture::Heart),
        ("love", ArmGesture::Heart),
        ("talking", ArmGesture::Talk),
        ("explain", ArmGesture::Talk),
        ("gesture", ArmGesture::Talk),
        ("praying", ArmGesture::Pray),
        ("please", ArmGesture::Pray),
        ("beg", ArmGesture::Pray),
        ("clapping", ArmGesture::Clap),
        ("applause", ArmGesture::Clap),
        ("applaud", ArmGesture::Clap),
        ("standingclap", ArmGesture::Clap),
    ];

    fn members() -> &'static [Self] {
        ArmGesture::ALL
    }

    fn key(&self) -> &'static str {
        self.as_str()
    }
}

impl Vocabulary for FaceExpression {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("none", FaceExpression::Auto),
        ("default", FaceExpression::Auto),
        ("neutral", FaceExpression::Auto),
        ("smile", FaceExpression::Happy),
        ("smiling", FaceExpression::Happy),
        ("joy", FaceExpression::Happy),
        ("glad", FaceExpression::Happy),
        ("mad", FaceExpression::Angry),
        ("furious", FaceExpression::Angry),
        ("frown", FaceExpression::Angry),
        ("frowning", FaceExpression::Angry),
        ("laugh", FaceExpression::Laughing),
        ("lol", FaceExpression::Laughing),
        ("yawn", FaceExpression::Tired),
        ("yawning", FaceExpression::Tired),
        ("sleepy", FaceExpression::Tired),
        ("exhausted", FaceExpression::Tired),
        ("asleep", FaceExpression::Sleeping),
        ("sleep", FaceExpression::Sleeping),
        ("thinking", FaceExpression::Focused),
        ("think", FaceExpression::Focused),
        ("thoughtful", FaceExpression::Focused),
        ("concentrating", FaceExpression::Focused),
        ("speaking", FaceExpression::Talking),
        ("speak", FaceExpression::Talking),
        ("talk", FaceExpression::Talking),
    ];

    fn members() -> &'static [Self] {
        FaceExpression::ALL
    }

    fn key(&self) -> &'static str {
        self.as_str()
    }
}

impl Vocabulary for FullAnimation {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("spin", FullAnimation::Twirl),
        ("spinning", FullAnimation::Twirl),
        ("twirling", FullAnimation::Twirl),
        ("kick", FullAnimation::FrontKick),
        ("roundhousekick", FullAnimation::Roundhouse),
        ("spinkick", FullAnimation::Roundhouse),
        ("mrbeandance", FullAnimation::MrBean),
        ("sillydance", FullAnimation::MrBean),
        ("sillydancing", FullAnimation::MrBean),
        ("breakdancing", FullAnimation::Breakdance),
        ("uprock", FullAnimation::Breakdance),
        ("twerking", FullAnimation::Twerk),
        ("happyjump", FullAnimation::JoyfulJump),
        ("celebrationjump", FullAnimation::JoyfulJump),
        ("standingpose", FullAnimation::Pose),
        ("strikeapose", FullAnimation::Pose),
        ("posing", FullAnimation::Pose),
    ];

    fn members() -> &'static [Self] {
        FullAnimation::ALL
    }

    fn key(&self) -> &'static str {
        self.as_str()
    }
}
