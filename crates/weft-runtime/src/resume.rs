//! Resume payload codec and client reattachment.
//!
//! The server serializes a subset of its scope tree as JSON keyed by
//! scope id. Each entry holds `"$": [template, section, parent]` plus the
//! scope's recorded slots; loop and branch reconciliation state rides
//! along under its control accessor (`…!` / `…(`). Hydration recreates
//! those scopes with the exact server ids, then reruns each section's
//! program against the restored values.

use serde_json::{Map, Value as Json, json};

use crate::engine::DomEngine;
use crate::scope::{BranchState, LoopState, ScopeId};
use crate::value::Value;

/// Serialize a runtime value for the payload. Returns `None` for values
/// that cannot cross the wire (live DOM nodes, unset slots).
pub fn value_to_json(value: &Value) -> Option<Json> {
    match value {
        Value::Null => Some(Json::Null),
        Value::Unset | Value::Node(_) => None,
        Value::Bool(b) => Some(json!(b)),
        Value::Int(i) => Some(json!(i)),
        Value::Str(s) => Some(json!(s)),
        Value::List(items) => Some(Json::Array(
            items
                .iter()
                .map(|v| value_to_json(v).unwrap_or(Json::Null))
                .collect(),
        )),
        Value::Object(fields) => {
            let mut map = Map::new();
            for (key, field) in fields {
                if let Some(encoded) = value_to_json(field) {
                    map.insert(key.clone(), encoded);
                }
            }
            Some(Json::Object(map))
        }
        Value::Seq { first, rest } => {
            let mut items = vec![value_to_json(first).unwrap_or(Json::Null)];
            items.extend(rest.iter().map(|v| value_to_json(v).unwrap_or(Json::Null)));
            Some(json!({ "$seq": items }))
        }
        Value::Scope(id) => Some(json!({ "$scope": id.0 })),
        Value::Renderer {
            template,
            section,
            scope,
        } => Some(json!({ "$renderer": [template, section, scope.0] })),
    }
}

pub fn json_to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Int(n.as_i64().unwrap_or(0)),
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        Json::Object(map) => {
            if let Some(Json::Number(id)) = map.get("$scope") {
                return Value::Scope(ScopeId(id.as_u64().unwrap_or(0) as u32));
            }
            if let Some(Json::Array(parts)) = map.get("$renderer") {
                if let (Some(Json::String(template)), Some(section), Some(scope)) =
                    (parts.first(), parts.get(1), parts.get(2))
                {
                    return Value::Renderer {
                        template: template.clone(),
                        section: section.as_u64().unwrap_or(0) as u32,
                        scope: ScopeId(scope.as_u64().unwrap_or(0) as u32),
                    };
                }
            }
            if let Some(Json::Array(items)) = map.get("$seq") {
                let mut values: Vec<Value> = items.iter().map(json_to_value).collect();
                if !values.is_empty() {
                    let first = values.remove(0);
                    return Value::Seq {
                        first: Box::new(first),
                        rest: values,
                    };
                }
            }
            Value::Object(
                map.iter()
                    .map(|(key, field)| (key.clone(), json_to_value(field)))
                    .collect(),
            )
        }
    }
}

/// Restore a serialized scope tree into `engine` and reattach it: the
/// root scope's DOM is rebuilt and every serialized scope resumes with
/// the server's id and values.
pub fn hydrate(engine: &mut DomEngine, payload: &str) -> serde_json::Result<ScopeId> {
    let parsed: Map<String, Json> = serde_json::from_str(payload)?;
    let mut scopes: Vec<(u32, &Map<String, Json>)> = parsed
        .iter()
        .filter_map(|(id, entry)| Some((id.parse::<u32>().ok()?, entry.as_object()?)))
        .collect();
    scopes.sort_by_key(|(id, _)| *id);

    let mut root = None;
    for (id, entry) in &scopes {
        let Some(Json::Array(meta)) = entry.get("$") else {
            continue;
        };
        let template = match meta.first() {
            Some(Json::String(t)) => t.clone(),
            _ => continue,
        };
        let section = meta.get(1).and_then(Json::as_u64).unwrap_or(0) as u32;
        let parent = meta
            .get(2)
            .and_then(Json::as_u64)
            .map(|p| ScopeId(p as u32));
        if parent.is_none() && root.is_none() {
            root = Some(ScopeId(*id));
        }
        engine
            .scopes
            .create_with_id(ScopeId(*id), template, section, parent);
    }

    for (id, entry) in &scopes {
        let scope = ScopeId(*id);
        for (accessor, recorded) in entry.iter() {
            if accessor == "$" {
                continue;
            }
            if accessor.ends_with('!') {
                let entries = recorded
                    .as_array()
                    .map(|pairs| {
                        pairs
                            .iter()
                            .filter_map(|pair| {
                                let pair = pair.as_array()?;
                                let key = json_to_value(pair.first()?);
                                let item = pair.get(1)?.as_u64()? as u32;
                                Some((key, ScopeId(item)))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                engine
                    .scopes
                    .get_mut(scope)
                    .set_loop_state(accessor, LoopState { entries });
            } else if accessor.ends_with('(') {
                let Some(state) = recorded.as_object() else {
                    continue;
                };
                let index = state.get("index").and_then(Json::as_u64).unwrap_or(0) as usize;
                let branch_scope = state
                    .get("scope")
                    .and_then(Json::as_u64)
                    .map(|s| ScopeId(s as u32));
                engine.scopes.get_mut(scope).set_branch_state(
                    accessor,
                    BranchState {
                        index,
                        scope: branch_scope,
                    },
                );
            } else {
                let value = json_to_value(recorded);
                engine.scopes.get_mut(scope).write(accessor, value);
            }
        }
    }

    let root = root.unwrap_or(ScopeId(0));
    engine.hydrate_root(root);
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_handles_round_trip() {
        let value = Value::Scope(ScopeId(7));
        let encoded = value_to_json(&value).unwrap();
        assert_eq!(json_to_value(&encoded), value);
    }

    #[test]
    fn nodes_never_serialize() {
        assert!(value_to_json(&Value::Node(crate::dom::NodeIx(3))).is_none());
        assert!(value_to_json(&Value::Unset).is_none());
    }

    #[test]
    fn plain_objects_survive_encoding() {
        let value = Value::object([
            ("name".to_string(), Value::str("ada")),
            ("count".to_string(), Value::Int(3)),
        ]);
        let encoded = value_to_json(&value).unwrap();
        assert_eq!(json_to_value(&encoded), value);
    }
}
