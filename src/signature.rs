//! Typed prompt schemas.
//!
//! A [`Signature`] pairs a request record with a response record and
//! describes their fields for the model. Responses are requested as a single
//! JSON object and decoded straight into [`Signature::Output`], so a reply
//! that does not fit the declared shape is rejected as
//! [`PromptError::Parse`].

use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::{PromptError, Result};

/// Key under which chain-of-thought reasoning is requested.
pub const REASONING_FIELD: &str = "reasoning";

/// Description of one input or output field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub description: &'static str,
    /// Allowed literal values; empty means free-form.
    pub choices: &'static [&'static str],
}

impl Field {
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            choices: &[],
        }
    }

    pub const fn with_choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }
}

/// Statically declared input/output contract for one use case.
pub trait Signature {
    type Input: Serialize + Clone + fmt::Debug;
    type Output: Serialize + DeserializeOwned + Clone + fmt::Debug + PartialEq;

    /// Task description placed at the top of the system instruction.
    fn instruction() -> &'static str;

    fn input_fields() -> &'static [Field];

    fn output_fields() -> &'static [Field];

    /// Extra checks on a decoded output, e.g. numeric ranges.
    fn validate(_output: &Self::Output) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Builds the system instruction for `instruction` and the declared fields.
pub fn render_system_instruction(
    instruction: &str,
    inputs: &[Field],
    outputs: &[Field],
    with_reasoning: bool,
) -> String {
    let mut text = String::new();
    text.push_str(instruction.trim());
    text.push_str("\n\nYour input fields are:\n");
    for (index, field) in inputs.iter().enumerate() {
        push_field_line(&mut text, index + 1, field);
    }

    text.push_str("\nYour output fields are:\n");
    let mut index = 0;
    if with_reasoning {
        index += 1;
        text.push_str(&format!(
            "{index}. `{REASONING_FIELD}`: think step by step before producing the other outputs\n"
        ));
    }
    for field in outputs {
        index += 1;
        push_field_line(&mut text, index, field);
    }

    let mut keys: Vec<&str> = Vec::with_capacity(outputs.len() + 1);
    if with_reasoning {
        keys.push(REASONING_FIELD);
    }
    keys.extend(outputs.iter().map(|field| field.name));
    text.push_str(&format!(
        "\nEach message from the user is a JSON object with the input fields. \
         Reply with a single JSON object with exactly these keys: {}.",
        keys.iter()
            .map(|key| format!("`{key}`"))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    text
}

fn push_field_line(text: &mut String, index: usize, field: &Field) {
    text.push_str(&format!("{index}. `{}`", field.name));
    if !field.description.is_empty() {
        text.push_str(&format!(": {}", field.description));
    }
    if !field.choices.is_empty() {
        let choices = field
            .choices
            .iter()
            .map(|choice| format!("\"{choice}\""))
            .collect::<Vec<_>>()
            .join(", ");
        text.push_str(&format!(" (one of: {choices})"));
    }
    text.push('\n');
}

/// Serializes an input record as the user message.
pub fn render_input<I: Serialize>(input: &I) -> Result<String> {
    serde_json::to_string_pretty(input)
        .map_err(|err| PromptError::Parse(format!("input is not serializable: {err}")))
}

/// Decodes a model reply into `S::Output` plus the optional reasoning text.
pub fn parse_output<S: Signature>(
    text: &str,
    with_reasoning: bool,
) -> Result<(S::Output, Option<String>)> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body)
        .map_err(|err| PromptError::Parse(format!("reply is not JSON: {err}; reply: {text}")))?;
    let Value::Object(mut object) = value else {
        return Err(PromptError::Parse(format!(
            "reply is not a JSON object: {text}"
        )));
    };

    let reasoning = if with_reasoning {
        object
            .remove(REASONING_FIELD)
            .and_then(|value| value.as_str().map(str::to_owned))
    } else {
        None
    };

    check_choices(&object, S::output_fields())?;

    let output: S::Output = serde_json::from_value(Value::Object(object))
        .map_err(|err| PromptError::Parse(format!("reply does not match outputs: {err}")))?;
    S::validate(&output).map_err(PromptError::Parse)?;

    Ok((output, reasoning))
}

fn check_choices(object: &Map<String, Value>, outputs: &[Field]) -> Result<()> {
    for field in outputs.iter().filter(|field| !field.choices.is_empty()) {
        let Some(value) = object.get(field.name) else {
            continue;
        };
        let allowed = value
            .as_str()
            .is_some_and(|value| field.choices.contains(&value));
        if !allowed {
            return Err(PromptError::Parse(format!(
                "`{}` must be one of {:?}, got {value}",
                field.name, field.choices
            )));
        }
    }
    Ok(())
}

/// Removes a surrounding Markdown code fence, with or without a language tag.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    match rest.find('\n') {
        Some(newline) if !rest[..newline].trim_start().starts_with('{') => rest[newline + 1..].trim(),
        _ => rest.trim(),
    }
}
