//! Instruction templating with session state.

use std::sync::LazyLock;

use primer_session::{
    KEY_PREFIX_APP, KEY_PREFIX_TEMP, KEY_PREFIX_USER, StateMap,
};
use regex::Regex;
use serde_json::Value;

use crate::RunError;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{+[^{}]*\}+").expect("placeholder pattern is valid")
});

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn is_state_name(name: &str) -> bool {
    let unprefixed = [KEY_PREFIX_APP, KEY_PREFIX_USER, KEY_PREFIX_TEMP]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name);
    is_identifier(unprefixed)
}

/// Replaces `{key}` placeholders with values from `state`.
///
/// String values are inserted verbatim, other values as compact JSON.
/// `{key?}` yields an empty string when the key is missing, a missing
/// `{key}` is an error. Braces around anything that isn't a state key name
/// are left as they are, so JSON examples survive.
pub fn render_instruction(
    template: &str,
    state: &StateMap,
) -> Result<String, RunError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last_end = 0;

    for found in PLACEHOLDER.find_iter(template) {
        rendered.push_str(&template[last_end..found.start()]);
        last_end = found.end();

        let raw = found.as_str();
        let name = raw.trim_matches(|c| c == '{' || c == '}').trim();
        let (name, optional) = match name.strip_suffix('?') {
            Some(name) => (name, true),
            None => (name, false),
        };
        if !is_state_name(name) {
            rendered.push_str(raw);
            continue;
        }

        match state.get(name) {
            Some(Value::String(s)) => rendered.push_str(s),
            Some(value) => rendered.push_str(&value.to_string()),
            None if optional => {}
            None => return Err(RunError::MissingStateVariable(name.to_owned())),
        }
    }

    rendered.push_str(&template[last_end..]);
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn state() -> StateMap {
        StateMap::from([
            ("user_name".to_owned(), json!("Brandon Hancock")),
            (
                "user_preferences".to_owned(),
                json!("I like to play Pickleball, Disc Golf, and Tennis."),
            ),
            ("toppings".to_owned(), json!(["ham", "pineapple"])),
            ("user:tier".to_owned(), json!(2)),
        ])
    }

    #[test]
    fn test_substitution() {
        let rendered = render_instruction(
            "Name: {user_name}\nPreferences: {user_preferences}\n\
             Toppings: {toppings}, tier {user:tier}",
            &state(),
        )
        .unwrap();
        assert_eq!(
            rendered,
            "Name: Brandon Hancock\n\
             Preferences: I like to play Pickleball, Disc Golf, and Tennis.\n\
             Toppings: [\"ham\",\"pineapple\"], tier 2"
        );
    }

    #[test]
    fn test_optional_and_missing() {
        let rendered =
            render_instruction("Hi {nickname?}!", &StateMap::new()).unwrap();
        assert_eq!(rendered, "Hi !");

        let err = render_instruction("Hi {nickname}!", &StateMap::new())
            .err()
            .unwrap();
        assert!(
            matches!(err, RunError::MissingStateVariable(ref name)
                if name == "nickname")
        );
    }

    #[test]
    fn test_non_placeholders_untouched() {
        let template = r#"Reply with {"subject": "...", "body": "..."} or {not valid} or {bad:prefix}."#;
        let rendered = render_instruction(template, &state()).unwrap();
        assert_eq!(rendered, template);
    }
}
