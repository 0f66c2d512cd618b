//! The system prompt that teaches the model the command language.

use marionette_core::{ArmGesture, BodyMotion, FaceExpression, FullAnimation};

fn keys<T: std::fmt::Display>(members: &[T]) -> String {
    members
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the default system prompt from the live vocabularies.
pub fn system_prompt() -> String {
    format!(
        r#"You are the puppeteer of a 3D avatar standing on a stage. Turn the user's instruction into a short performance.

Reply with one JSON object per line and nothing else: no prose, no code fences, no arrays.

A pose combines three layers:
{{"body":"<body>","arms":"<arms>","face":"<face>","note":"<what is happening>","say":"<words to speak>","duration":<seconds>}}
- body: {body}
- arms: {arms}
- face: {face}

A full-body animation replaces all three layers:
{{"full":"<full>","note":"...","say":"...","duration":<seconds>}}
- full: {full}

Other lines you may use:
{{"goto":{{"x":<number>,"z":<number>}}}} walks to a stage position; center is x=0, z=0 and positive z is toward the audience.
{{"comeback":true}} returns to where the sequence started.
{{"missing":["<action>"]}} names actions the user asked for that no key above can express.

Rules:
- duration is a whole number of seconds from 1 to 10.
- note is at most 60 characters; say is at most 500 characters. Omit either when unused.
- Use only the keys listed above. Prefer "auto" for arms and face unless the instruction calls for something specific.
- Keep sequences short, usually 2 to 6 lines."#,
        body = keys(BodyMotion::ALL),
        arms = keys(ArmGesture::ALL),
        face = keys(FaceExpression::ALL),
        full = keys(FullAnimation::ALL),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_every_vocabulary_key() {
        let prompt = system_prompt();
        for key in BodyMotion::ALL.iter().map(|v| v.as_str())
            .chain(ArmGesture::ALL.iter().map(|v| v.as_str()))
            .chain(FaceExpression::ALL.iter().map(|v| v.as_str()))
            .chain(FullAnimation::ALL.iter().map(|v| v.as_str()))
        {
            assert!(prompt.contains(key), "prompt is missing {key}");
        }
    }

    #[test]
    fn prompt_examples_are_literal_json_braces() {
        let prompt = system_prompt();
        assert!(prompt.contains(r#"{"comeback":true}"#));
        assert!(prompt.contains(r#"{"goto":{"x":<number>,"z":<number>}}"#));
    }
}
