//! Deterministic visibility evaluator for form fields.
//!
//! All visibility logic is evaluated in code, never by the LLM. A field
//! with no `visible_if` rule is always visible; otherwise every condition
//! in the rule's `all` list must pass.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use formpilot_types::form::{ConditionOperator, FormField, VisibilityCondition};
use serde_json::Value;

use crate::dates::parse_lenient_date;

/// Whether a field should currently be shown, given the answers so far.
pub fn is_field_visible(
    field: &FormField,
    answers: &BTreeMap<String, Value>,
    today: NaiveDate,
) -> bool {
    match &field.visible_if {
        None => true,
        Some(rule) => rule
            .all
            .iter()
            .all(|condition| evaluate_condition(condition, answers, today)),
    }
}

fn evaluate_condition(
    condition: &VisibilityCondition,
    answers: &BTreeMap<String, Value>,
    today: NaiveDate,
) -> bool {
    let field_value = answers.get(&condition.field);

    match condition.operator {
        ConditionOperator::Exists => field_value.is_some(),

        ConditionOperator::Equals => match (field_value, compare_value(condition, answers)) {
            (Some(actual), Some(expected)) => value_as_string(actual) == expected,
            _ => false,
        },

        ConditionOperator::NotEquals => match (field_value, compare_value(condition, answers)) {
            (Some(actual), Some(expected)) => value_as_string(actual) != expected,
            _ => false,
        },

        ConditionOperator::After => compare_dates(field_value, condition, answers, today, |a, b| a > b),
        ConditionOperator::Before => compare_dates(field_value, condition, answers, today, |a, b| a < b),
        ConditionOperator::OnOrAfter => {
            compare_dates(field_value, condition, answers, today, |a, b| a >= b)
        }
        ConditionOperator::OnOrBefore => {
            compare_dates(field_value, condition, answers, today, |a, b| a <= b)
        }
    }
}

/// Resolve the comparison operand: static `value` or another field's answer.
fn compare_value(
    condition: &VisibilityCondition,
    answers: &BTreeMap<String, Value>,
) -> Option<String> {
    if let Some(value) = &condition.value {
        return Some(value.clone());
    }
    condition
        .value_field
        .as_ref()
        .and_then(|id| answers.get(id))
        .map(value_as_string)
}

fn compare_dates(
    field_value: Option<&Value>,
    condition: &VisibilityCondition,
    answers: &BTreeMap<String, Value>,
    today: NaiveDate,
    cmp: fn(NaiveDate, NaiveDate) -> bool,
) -> bool {
    let Some(actual) = field_value
        .map(value_as_string)
        .and_then(|s| parse_lenient_date(&s, today))
    else {
        return false;
    };
    let Some(expected) = compare_value(condition, answers)
        .and_then(|s| parse_lenient_date(&s, today))
    else {
        return false;
    };
    cmp(actual, expected)
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
