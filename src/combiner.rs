//! Promotes a free-text prompt into the structured condition language and
//! (de)serializes condition sets for the `conditions` request parameter.

use crate::condition::{Condition, ConditionSet, Operator, Sign};
use crate::error::{QueryError, QueryResult};

/// Reserved pseudo-attribute carrying free-text search intent.
pub const AI_SEARCH_ATTRIBUTE: &str = "ai.search";

/// Append the prompt as a synthetic `ai.search` condition.
///
/// An empty or whitespace-only prompt returns the set unchanged. Existing
/// conditions are never modified.
pub fn combine(conditions: &ConditionSet, prompt: &str) -> ConditionSet {
    let mut combined = conditions.clone();
    if let Some(synthetic) = prompt_condition(prompt) {
        combined.push(synthetic);
    }
    combined
}

/// The synthetic condition for `prompt`, if it carries any text.
pub fn prompt_condition(prompt: &str) -> Option<Condition> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return None;
    }
    Condition::new(AI_SEARCH_ATTRIBUTE, Operator::Or, Sign::Equals, [prompt])
}

/// Separate `ai.search` conditions from the structured ones.
///
/// Prompts from several synthetic conditions are joined with a space.
pub fn split_prompt(conditions: &ConditionSet) -> (ConditionSet, Option<String>) {
    let mut structured = ConditionSet::new();
    let mut prompts = Vec::new();
    for condition in conditions {
        if condition.attribute == AI_SEARCH_ATTRIBUTE {
            prompts.extend(condition.values.iter().cloned());
        } else {
            structured.push(condition.clone());
        }
    }
    let prompt = if prompts.is_empty() { None } else { Some(prompts.join(" ")) };
    (structured, prompt)
}

/// Serialize a condition set into its JSON array transport form.
pub fn to_param(conditions: &ConditionSet) -> QueryResult<String> {
    Ok(serde_json::to_string(conditions)?)
}

/// Parse the `conditions` request parameter.
///
/// Void conditions inside the array are dropped; a top level that is not an
/// array is an error.
pub fn from_param(param: &str) -> QueryResult<ConditionSet> {
    let value: serde_json::Value = serde_json::from_str(param)?;
    if !value.is_array() {
        return Err(QueryError::MalformedConditions(format!(
            "expected a JSON array, found {}",
            json_kind(&value)
        )));
    }
    let conditions: Vec<Condition> = serde_json::from_value(value)?;
    Ok(conditions.into_iter().collect())
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
