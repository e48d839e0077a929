//! Metadata filter AST, JSON wire parsing, and evaluation.
//!
//! A filter maps metadata keys to conditions; all conditions on all keys
//! are AND-ed. The wire form is a JSON object where each value is either a
//! scalar (exact equality) or an operator object with any subset of
//! `$eq, $ne, $gt, $gte, $lt, $lte, $in, $nin, $exists`. Unknown `$ops`
//! are rejected with [`FilterError::UnknownOperator`].
//!
//! Filters operate on raw metadata and therefore see reserved keys
//! (`_tenant_id`, `_ttl_expires`, …).

use crate::document::{Metadata, MetadataValue};
use crate::error::FilterError;
use std::collections::HashMap;

/// A single condition on one metadata field.
///
/// Evaluation is an exhaustive match — there is no string-keyed operator
/// dispatch. A field absent from the metadata fails every condition except
/// `Exists(false)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Exact equality (Int/Float coerce for comparison).
    Eq(MetadataValue),
    /// Negated equality.
    Ne(MetadataValue),
    /// Strictly greater than. Numeric and string operands order; others fail.
    Gt(MetadataValue),
    /// Greater than or equal.
    Gte(MetadataValue),
    /// Strictly less than.
    Lt(MetadataValue),
    /// Less than or equal.
    Lte(MetadataValue),
    /// Field equals any listed value, or a list-valued field contains one.
    In(Vec<MetadataValue>),
    /// Negation of `In`.
    Nin(Vec<MetadataValue>),
    /// Field presence check; the only condition an absent field can pass.
    Exists(bool),
}

/// A conjunction of per-field conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Conditions per metadata key; every condition on every key must hold.
    pub fields: HashMap<String, Vec<Condition>>,
}

impl Filter {
    /// Creates an empty filter, which matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: add a condition on `field`.
    pub fn field(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.fields.entry(field.into()).or_default().push(condition);
        self
    }

    /// Replace all conditions on `field` with a single one.
    ///
    /// Used by the tenant wrapper to make its tenant predicate win over any
    /// caller-supplied condition on the same key.
    pub fn set_field(&mut self, field: impl Into<String>, condition: Condition) {
        self.fields.insert(field.into(), vec![condition]);
    }

    /// Whether the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Evaluate the filter against a document's metadata.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.fields.iter().all(|(field, conditions)| {
            let value = metadata.get(field);
            conditions.iter().all(|cond| evaluate(cond, value))
        })
    }

    /// Parse the JSON wire form.
    ///
    /// `{"tag": "fire"}` is shorthand for `{"tag": {"$eq": "fire"}}`.
    /// Returns [`FilterError::UnknownOperator`] for unrecognized `$ops` and
    /// [`FilterError::InvalidOperand`] for operands of the wrong shape.
    pub fn from_json(value: &serde_json::Value) -> Result<Filter, FilterError> {
        let Some(object) = value.as_object() else {
            return Err(FilterError::InvalidOperand {
                op: "filter".into(),
                reason: "filter must be a JSON object".into(),
            });
        };

        let mut filter = Filter::new();
        for (field, spec) in object {
            let conditions = match spec {
                serde_json::Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
                    parse_operator_object(ops)?
                }
                scalar => vec![Condition::Eq(MetadataValue::from_json(scalar))],
            };
            filter.fields.insert(field.clone(), conditions);
        }
        Ok(filter)
    }
}

fn parse_operator_object(
    ops: &serde_json::Map<String, serde_json::Value>,
) -> Result<Vec<Condition>, FilterError> {
    let mut conditions = Vec::with_capacity(ops.len());
    for (op, operand) in ops {
        let condition = match op.as_str() {
            "$eq" => Condition::Eq(MetadataValue::from_json(operand)),
            "$ne" => Condition::Ne(MetadataValue::from_json(operand)),
            "$gt" => Condition::Gt(MetadataValue::from_json(operand)),
            "$gte" => Condition::Gte(MetadataValue::from_json(operand)),
            "$lt" => Condition::Lt(MetadataValue::from_json(operand)),
            "$lte" => Condition::Lte(MetadataValue::from_json(operand)),
            "$in" => Condition::In(parse_value_list(op, operand)?),
            "$nin" => Condition::Nin(parse_value_list(op, operand)?),
            "$exists" => {
                let flag = operand.as_bool().ok_or_else(|| FilterError::InvalidOperand {
                    op: op.clone(),
                    reason: "expected a boolean".into(),
                })?;
                Condition::Exists(flag)
            }
            other => return Err(FilterError::UnknownOperator(other.to_string())),
        };
        conditions.push(condition);
    }
    Ok(conditions)
}

fn parse_value_list(
    op: &str,
    operand: &serde_json::Value,
) -> Result<Vec<MetadataValue>, FilterError> {
    let items = operand.as_array().ok_or_else(|| FilterError::InvalidOperand {
        op: op.to_string(),
        reason: "expected a list".into(),
    })?;
    Ok(items.iter().map(MetadataValue::from_json).collect())
}

fn evaluate(condition: &Condition, value: Option<&MetadataValue>) -> bool {
    let Some(value) = value else {
        // Absent field: only $exists:false can pass.
        return matches!(condition, Condition::Exists(false));
    };

    match condition {
        Condition::Eq(operand) => value_eq(value, operand),
        Condition::Ne(operand) => !value_eq(value, operand),
        Condition::Gt(operand) => {
            value_cmp(value, operand).is_some_and(|o| o == std::cmp::Ordering::Greater)
        }
        Condition::Gte(operand) => {
            value_cmp(value, operand).is_some_and(|o| o != std::cmp::Ordering::Less)
        }
        Condition::Lt(operand) => {
            value_cmp(value, operand).is_some_and(|o| o == std::cmp::Ordering::Less)
        }
        Condition::Lte(operand) => {
            value_cmp(value, operand).is_some_and(|o| o != std::cmp::Ordering::Greater)
        }
        Condition::In(operands) => contains(value, operands),
        Condition::Nin(operands) => !contains(value, operands),
        Condition::Exists(flag) => *flag,
    }
}

/// `$in` membership: direct equality, or element equality for list fields.
fn contains(value: &MetadataValue, operands: &[MetadataValue]) -> bool {
    if operands.iter().any(|op| value_eq(value, op)) {
        return true;
    }
    match value {
        MetadataValue::List(items) => items
            .iter()
            .any(|item| operands.iter().any(|op| value_eq(item, op))),
        _ => false,
    }
}

/// Equality with Int/Float coercion; lists and maps compare structurally.
fn value_eq(a: &MetadataValue, b: &MetadataValue) -> bool {
    match (a, b) {
        (MetadataValue::Int(x), MetadataValue::Float(y))
        | (MetadataValue::Float(y), MetadataValue::Int(x)) => (*x as f64 - y).abs() < f64::EPSILON,
        (MetadataValue::List(xs), MetadataValue::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| value_eq(x, y))
        }
        _ => a == b,
    }
}

/// Ordering for numbers (with coercion) and strings. `None` elsewhere.
fn value_cmp(a: &MetadataValue, b: &MetadataValue) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (MetadataValue::Str(x), MetadataValue::Str(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
