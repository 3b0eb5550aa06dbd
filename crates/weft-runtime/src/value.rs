//! Runtime value model.
//!
//! Values flow between scope slots, compiled expressions and the two
//! renderers. The model is deliberately small: JSON-like data plus the
//! handles the runtime itself mints (DOM nodes, scopes, body renderers).

use indexmap::IndexMap;

use crate::dom::NodeIx;
use crate::scope::ScopeId;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    /// A conditional prop group with no live arm: writes of `Unset` are
    /// skipped, leaving the previous value in place.
    Unset,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// Attr-tag sequence: the first instance plus overflow, in source
    /// order.
    Seq {
        first: Box<Value>,
        rest: Vec<Value>,
    },
    /// Live DOM node handle.
    Node(NodeIx),
    /// Live scope handle (child template instances, loop items).
    Scope(ScopeId),
    /// Deferred body content: a compiled section plus the scope whose
    /// bindings it closes over.
    Renderer {
        template: String,
        section: u32,
        scope: ScopeId,
    },
}

impl Value {
    pub fn object(fields: impl IntoIterator<Item = (String, Value)>) -> Value {
        Value::Object(fields.into_iter().collect())
    }

    pub fn str(value: impl Into<String>) -> Value {
        Value::Str(value.into())
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null | Value::Unset | Value::Bool(false) => false,
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Text rendered for this value in HTML bodies and attributes.
    pub fn display(&self) -> String {
        match self {
            Value::Null | Value::Unset => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::display)
                .collect::<Vec<_>>()
                .join(","),
            _ => String::new(),
        }
    }

    pub fn get(&self, prop: &str) -> Value {
        match self {
            Value::Object(fields) => fields.get(prop).cloned().unwrap_or(Value::Null),
            Value::List(items) => match prop {
                "length" => Value::Int(items.len() as i64),
                _ => prop
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Value::Null),
            },
            Value::Str(s) => match prop {
                "length" => Value::Int(s.chars().count() as i64),
                _ => Value::Null,
            },
            Value::Seq { first, rest } => match prop {
                "length" => Value::Int(1 + rest.len() as i64),
                _ => first.get(prop),
            },
            _ => Value::Null,
        }
    }

    /// Iterate an attr-tag sequence (a lone object counts as one item).
    pub fn seq_items(&self) -> Vec<Value> {
        match self {
            Value::Seq { first, rest } => {
                let mut items = Vec::with_capacity(1 + rest.len());
                items.push((**first).clone());
                items.extend(rest.iter().cloned());
                items
            }
            Value::Null | Value::Unset => Vec::new(),
            other => vec![other.clone()],
        }
    }

    /// Merge `other`'s fields over this object, skipping `Unset`.
    pub fn merge(&mut self, other: &Value) {
        let Value::Object(fields) = self else {
            *self = other.clone();
            return;
        };
        match other {
            Value::Object(incoming) => {
                for (key, value) in incoming {
                    if !matches!(value, Value::Unset) {
                        fields.insert(key.clone(), value.clone());
                    }
                }
            }
            Value::Null | Value::Unset => {}
            other => *self = other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_display_semantics() {
        assert!(!Value::Null.truthy());
        assert!(!Value::str("").truthy());
        assert!(!Value::Int(0).truthy());
        assert!(Value::str("x").truthy());
        assert!(Value::List(vec![]).truthy());
    }

    #[test]
    fn member_access_on_lists_and_objects() {
        let v = Value::object([("name".to_string(), Value::str("ada"))]);
        assert_eq!(v.get("name"), Value::str("ada"));
        assert_eq!(v.get("missing"), Value::Null);

        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(list.get("length"), Value::Int(2));
        assert_eq!(list.get("1"), Value::Int(2));
    }

    #[test]
    fn merge_skips_unset() {
        let mut base = Value::object([("a".to_string(), Value::Int(1))]);
        let patch = Value::object([
            ("a".to_string(), Value::Unset),
            ("b".to_string(), Value::Int(2)),
        ]);
        base.merge(&patch);
        assert_eq!(base.get("a"), Value::Int(1));
        assert_eq!(base.get("b"), Value::Int(2));
    }

    #[test]
    fn seq_items_flatten_first_and_rest() {
        let seq = Value::Seq {
            first: Box::new(Value::Int(1)),
            rest: vec![Value::Int(2), Value::Int(3)],
        };
        assert_eq!(
            seq.seq_items(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
        assert_eq!(Value::Int(7).seq_items(), vec![Value::Int(7)]);
    }
}
