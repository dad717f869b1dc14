use crate::store::{Condition, Update};

use aws_sdk_dynamodb::types;
use indexmap::IndexMap;
use std::collections;

/// Keep placeholders within the characters DynamoDB accepts.
///
/// Any other character becomes `_<hex code>_`, so distinct names never share
/// a placeholder.
fn sanitize(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c);
        } else {
            sanitized.push_str(&format!("_{:x}_", u32::from(c)));
        }
    }
    sanitized
}

fn name_placeholder(name: &str) -> String {
    format!("#{}", sanitize(name))
}

fn value_placeholder(name: &str, operator: &str, index: &mut usize) -> String {
    let placeholder = format!(":{}_{operator}{index}", sanitize(name));
    *index += 1;
    placeholder
}

fn get_expression(left: String, operator: &str, right: String) -> String {
    if left.is_empty() {
        right
    } else if right.is_empty() {
        left
    } else {
        format!("{left}{operator}{right}")
    }
}

/// expression fragment with its placeholders
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ExpressionInput {
    pub(crate) expression: String,
    pub(crate) expression_attribute_names: collections::HashMap<String, String>,
    pub(crate) expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
}

impl ExpressionInput {
    fn name(name: String, expression: impl FnOnce(&str) -> String) -> Self {
        let placeholder = name_placeholder(&name);
        Self {
            expression: expression(&placeholder),
            expression_attribute_names: collections::HashMap::from([(placeholder, name)]),
            ..Default::default()
        }
    }

    fn name_and_value(
        name: String,
        value_placeholder: String,
        value: types::AttributeValue,
        expression: impl FnOnce(&str, &str) -> String,
    ) -> Self {
        let placeholder = name_placeholder(&name);
        Self {
            expression: expression(&placeholder, &value_placeholder),
            expression_attribute_names: collections::HashMap::from([(placeholder, name)]),
            expression_attribute_values: collections::HashMap::from([(value_placeholder, value)]),
        }
    }

    pub(crate) fn merge(operator: &str, items: Vec<Self>) -> Self {
        let mut operation = Self::default();
        for item in items {
            operation
                .expression_attribute_names
                .extend(item.expression_attribute_names);
            operation
                .expression_attribute_values
                .extend(item.expression_attribute_values);
            operation.expression = get_expression(operation.expression, operator, item.expression);
        }
        operation
    }
}

/// Build a condition (or filter) expression.
pub(crate) fn condition(condition: Condition, index: &mut usize) -> ExpressionInput {
    match condition {
        Condition::AttributeExists(name) => {
            ExpressionInput::name(name, |path| format!("attribute_exists({path})"))
        }
        Condition::AttributeNotExists(name) => {
            ExpressionInput::name(name, |path| format!("attribute_not_exists({path})"))
        }
        Condition::Equals(name, value) => {
            let placeholder = value_placeholder(&name, "eq", index);
            ExpressionInput::name_and_value(name, placeholder, value.into(), |path, value| {
                format!("{path} = {value}")
            })
        }
        Condition::And(conditions) => {
            let operations = conditions
                .into_iter()
                .map(|nested| {
                    let is_composite = matches!(&nested, Condition::And(inner) if inner.len() > 1);
                    let mut operation = self::condition(nested, index);
                    if is_composite {
                        operation.expression = format!("({})", operation.expression);
                    }
                    operation
                })
                .collect();
            ExpressionInput::merge(" AND ", operations)
        }
    }
}

/// Build an update expression, one clause per action in order of first use.
pub(crate) fn update(updates: Vec<Update>, index: &mut usize) -> ExpressionInput {
    let mut clauses: IndexMap<&'static str, Vec<ExpressionInput>> = IndexMap::new();
    for update in updates {
        let (action, operation) = match update {
            Update::Set(name, value) => {
                let placeholder = value_placeholder(&name, "set", index);
                let operation =
                    ExpressionInput::name_and_value(name, placeholder, value.into(), |path, value| {
                        format!("{path} = {value}")
                    });
                ("SET", operation)
            }
            Update::Add(name, value) => {
                let placeholder = value_placeholder(&name, "add", index);
                let operation =
                    ExpressionInput::name_and_value(name, placeholder, value.into(), |path, value| {
                        format!("{path} {value}")
                    });
                ("ADD", operation)
            }
            Update::Delete(name, value) => {
                let placeholder = value_placeholder(&name, "delete", index);
                let operation =
                    ExpressionInput::name_and_value(name, placeholder, value.into(), |path, value| {
                        format!("{path} {value}")
                    });
                ("DELETE", operation)
            }
            Update::Remove(name) => ("REMOVE", ExpressionInput::name(name, str::to_string)),
        };
        clauses.entry(action).or_default().push(operation);
    }
    let operations = clauses
        .into_iter()
        .map(|(action, operations)| {
            let mut operation = ExpressionInput::merge(", ", operations);
            operation.expression = format!("{action} {}", operation.expression);
            operation
        })
        .collect();
    ExpressionInput::merge(" ", operations)
}

/// Build a projection expression.
pub(crate) fn projection(attributes: Vec<String>) -> ExpressionInput {
    let operations = attributes
        .into_iter()
        .map(|attribute| ExpressionInput::name(attribute, str::to_string))
        .collect();
    ExpressionInput::merge(", ", operations)
}

/// Placeholders shared by every expression of one request.
///
/// DynamoDB rejects empty placeholder maps, so an unused map stays `None`.
#[derive(Debug, Default)]
pub(crate) struct RequestExpressions {
    names: collections::HashMap<String, String>,
    values: collections::HashMap<String, types::AttributeValue>,
    index: usize,
}

impl RequestExpressions {
    pub(crate) fn condition(&mut self, condition: Condition) -> String {
        let operation = self::condition(condition, &mut self.index);
        self.absorb(operation)
    }

    pub(crate) fn update(&mut self, updates: Vec<Update>) -> String {
        let operation = self::update(updates, &mut self.index);
        self.absorb(operation)
    }

    pub(crate) fn projection(&mut self, attributes: Vec<String>) -> String {
        self.absorb(self::projection(attributes))
    }

    fn absorb(&mut self, operation: ExpressionInput) -> String {
        self.names.extend(operation.expression_attribute_names);
        self.values.extend(operation.expression_attribute_values);
        operation.expression
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Option<collections::HashMap<String, String>>,
        Option<collections::HashMap<String, types::AttributeValue>>,
    ) {
        let names = (!self.names.is_empty()).then_some(self.names);
        let values = (!self.values.is_empty()).then_some(self.values);
        (names, values)
    }
}
