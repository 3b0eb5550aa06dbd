//! Server-side renderer: interprets the HTML-target op program.
//!
//! Rendering is single-pass and allocation-buffered per scope: a scope's
//! body renders into its own string first, and the scope-start resume
//! marker is prepended only if the scope turned out to need serializing.
//! Static subtrees therefore cost nothing in the payload.

use rustc_hash::FxHashMap;
use serde_json::{Map, Value as Json, json};

use weft::artifact::{Artifact, CondArm, HtmlOp, LoopSource, RExpr, ResumeSource, Target};
use weft::ast::is_event_handler;
use weft::translate::resume::{control_end_marker, scope_start_marker};
use weft::translate::writer::{escape_attr, escape_text};

use crate::eval::{EvalCtx, eval};
use crate::resume::value_to_json;
use crate::scope::{BranchState, LoopState, ScopeId, Scopes};
use crate::value::Value;

pub struct RenderOutput {
    pub html: String,
    /// JSON scope payload for client reattachment; `{}` when the page has
    /// nothing to resume.
    pub payload: String,
}

struct SerializedScope {
    template: String,
    section: u32,
    parent: Option<ScopeId>,
    entries: Vec<(String, Json)>,
}

pub struct HtmlRenderer {
    templates: FxHashMap<String, Artifact>,
    scopes: Scopes,
    serialized: Vec<(ScopeId, SerializedScope)>,
}

impl EvalCtx for HtmlRenderer {
    fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    fn assign(&mut self, scope: ScopeId, accessor: &str, value: Value) {
        // No invalidation on the server; assignment is a plain write.
        self.scopes.get_mut(scope).write(accessor, value);
    }
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self {
            templates: FxHashMap::default(),
            scopes: Scopes::new(),
            serialized: Vec::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, artifact: Artifact) {
        debug_assert_eq!(artifact.target, Target::Html);
        self.templates.insert(name.into(), artifact);
    }

    /// Render a template to HTML plus its resume payload. Scope ids start
    /// fresh each call, matching what a hydrating client will mint.
    pub fn render(&mut self, template: &str, input: Value) -> RenderOutput {
        self.scopes = Scopes::new();
        self.serialized.clear();

        let root = self.scopes.create(template, 0, None);
        self.scopes.get_mut(root).write("0", input);
        let html = self.render_scope(root);

        let mut payload = Map::new();
        for (id, scope) in &self.serialized {
            let mut entry = Map::new();
            entry.insert(
                "$".to_string(),
                json!([scope.template, scope.section, scope.parent.map(|p| p.0)]),
            );
            for (accessor, recorded) in &scope.entries {
                entry.insert(accessor.clone(), recorded.clone());
            }
            payload.insert(id.0.to_string(), Json::Object(entry));
        }
        RenderOutput {
            html,
            payload: Json::Object(payload).to_string(),
        }
    }

    fn render_scope(&mut self, scope: ScopeId) -> String {
        let (template, section_id) = {
            let owner = self.scopes.get(scope);
            (owner.template.clone(), owner.section)
        };
        let Some(artifact) = self.templates.get(&template) else {
            return String::new();
        };
        let section = artifact.section(section_id);
        let ops = section.html.clone();
        let force_resume = section.force_resume;

        let mut out = String::new();
        let mut entries: Vec<(String, Json)> = Vec::new();
        let mut marked = false;
        for op in &ops {
            self.render_op(scope, op, &mut out, &mut entries, &mut marked);
        }

        if !entries.is_empty() || force_resume || marked {
            let parent = self.scopes.get(scope).parent;
            out.insert_str(0, &scope_start_marker(scope.0 as u64));
            self.serialized.push((
                scope,
                SerializedScope {
                    template,
                    section: section_id,
                    parent,
                    entries,
                },
            ));
        }
        out
    }

    fn render_op(
        &mut self,
        scope: ScopeId,
        op: &HtmlOp,
        out: &mut String,
        entries: &mut Vec<(String, Json)>,
        marked: &mut bool,
    ) {
        match op {
            HtmlOp::Static(text) => out.push_str(text),
            HtmlOp::Text(expr) => {
                let value = eval(self, scope, expr);
                escape_text(&value.display(), out);
            }
            HtmlOp::Attr { name, value } => {
                let value = eval(self, scope, value);
                write_attr_html(name, &value, out);
            }
            HtmlOp::Spread { value, skip } => {
                if let Value::Object(fields) = eval(self, scope, value) {
                    for (name, field) in &fields {
                        if !skip.iter().any(|s| s == name) && !is_event_handler(name) {
                            write_attr_html(name, field, out);
                        }
                    }
                }
            }
            HtmlOp::ScopeStart => {
                // Deferred: render_scope prepends the marker once it knows
                // the scope serializes.
            }
            HtmlOp::MarkNode { accessor } => {
                out.push_str(&control_end_marker(scope.0 as u64, accessor));
                *marked = true;
            }
            HtmlOp::Record { accessor, value } => {
                if let Some(recorded) = self.record(scope, accessor, value) {
                    entries.push((accessor.clone(), recorded));
                }
            }
            HtmlOp::Store { accessor, value } => {
                let value = eval(self, scope, value);
                self.scopes.get_mut(scope).write(accessor, value);
            }
            HtmlOp::Loop {
                body_section,
                source,
                by,
                only_child,
                node_accessor,
            } => {
                self.render_loop(scope, *body_section, source, by.as_ref(), node_accessor, out);
                if !only_child {
                    out.push_str(&control_end_marker(scope.0 as u64, node_accessor));
                    *marked = true;
                }
            }
            HtmlOp::If {
                arms,
                branch_accessor,
                node_accessor,
                only_child,
            } => {
                self.render_conditional(scope, arms, branch_accessor, out);
                if !only_child {
                    out.push_str(&control_end_marker(scope.0 as u64, node_accessor));
                    *marked = true;
                }
            }
            HtmlOp::Child {
                template,
                child_accessor,
                input,
                body_section: _,
            } => {
                let input = eval(self, scope, input);
                let child = self.scopes.create(template.clone(), 0, Some(scope));
                self.scopes.get_mut(child).write("0", input);
                self.scopes
                    .get_mut(scope)
                    .write(child_accessor, Value::Scope(child));
                let rendered = self.render_scope(child);
                out.push_str(&rendered);
            }
            HtmlOp::DynamicTag {
                name,
                attrs,
                body_section,
                node_accessor: _,
            } => self.render_dynamic_tag(scope, name, attrs, *body_section, out),
        }
    }

    fn record(&mut self, scope: ScopeId, accessor: &str, source: &ResumeSource) -> Option<Json> {
        match source {
            ResumeSource::Expr(expr) => {
                let value = eval(self, scope, expr);
                value_to_json(&value)
            }
            ResumeSource::ChildScope => {
                let value = self.scopes.get(scope).read(accessor);
                if let Value::Scope(child) = value {
                    self.ensure_serialized(child);
                }
                value_to_json(&value)
            }
            ResumeSource::LoopScopes => {
                let state = self.scopes.get(scope).loop_state(accessor)?.clone();
                for (_, item) in &state.entries {
                    self.ensure_serialized(*item);
                }
                let pairs: Vec<Json> = state
                    .entries
                    .iter()
                    .map(|(key, item)| {
                        json!([value_to_json(key).unwrap_or(Json::Null), item.0])
                    })
                    .collect();
                Some(Json::Array(pairs))
            }
            ResumeSource::Branch => {
                let state = self.scopes.get(scope).branch_state(accessor)?.clone();
                if let Some(branch_scope) = state.scope {
                    self.ensure_serialized(branch_scope);
                }
                Some(json!({
                    "index": state.index,
                    "scope": state.scope.map(|s| s.0),
                }))
            }
        }
    }

    /// A scope named by a control record must exist in the payload even
    /// when its own body had nothing to serialize: hydration recreates
    /// scopes from the payload alone.
    fn ensure_serialized(&mut self, id: ScopeId) {
        if self.serialized.iter().any(|(existing, _)| *existing == id) {
            return;
        }
        let owner = self.scopes.get(id);
        self.serialized.push((
            id,
            SerializedScope {
                template: owner.template.clone(),
                section: owner.section,
                parent: owner.parent,
                entries: Vec::new(),
            },
        ));
    }

    fn loop_items(&mut self, scope: ScopeId, source: &LoopSource) -> Vec<Vec<Value>> {
        match source {
            LoopSource::Of(expr) => match eval(self, scope, expr) {
                Value::List(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| vec![item, Value::Int(i as i64)])
                    .collect(),
                _ => Vec::new(),
            },
            LoopSource::In(expr) => match eval(self, scope, expr) {
                Value::Object(fields) => fields
                    .into_iter()
                    .map(|(key, value)| vec![Value::Str(key), value])
                    .collect(),
                _ => Vec::new(),
            },
            LoopSource::To { to, from, step } => {
                let to = match eval(self, scope, to) {
                    Value::Int(i) => i,
                    _ => return Vec::new(),
                };
                let from = from
                    .as_ref()
                    .map(|e| match eval(self, scope, e) {
                        Value::Int(i) => i,
                        _ => 0,
                    })
                    .unwrap_or(0);
                let step = step
                    .as_ref()
                    .map(|e| match eval(self, scope, e) {
                        Value::Int(i) => i.max(1),
                        _ => 1,
                    })
                    .unwrap_or(1);
                let mut items = Vec::new();
                let mut current = from;
                while current <= to {
                    items.push(vec![Value::Int(current)]);
                    current += step;
                }
                items
            }
        }
    }

    fn render_loop(
        &mut self,
        scope: ScopeId,
        body_section: u32,
        source: &LoopSource,
        by: Option<&RExpr>,
        node_accessor: &str,
        out: &mut String,
    ) {
        let template = self.scopes.get(scope).template.clone();
        let params: Vec<(String, String)> = match self.templates.get(&template) {
            Some(artifact) => artifact.section(body_section).params.clone(),
            None => return,
        };
        let items = self.loop_items(scope, source);

        let mut loop_entries: Vec<(Value, ScopeId)> = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let body = self.scopes.create(&template, body_section, Some(scope));
            for (param, value) in params.iter().zip(item) {
                self.scopes.get_mut(body).write(&param.0, value.clone());
            }
            let key = match by {
                Some(by) => eval(self, body, by),
                None => Value::Int(index as i64),
            };
            let rendered = self.render_scope(body);
            out.push_str(&rendered);
            loop_entries.push((key, body));
        }

        let mut state_key = node_accessor.to_string();
        state_key.push('!');
        self.scopes.get_mut(scope).set_loop_state(
            &state_key,
            LoopState {
                entries: loop_entries,
            },
        );
    }

    fn render_conditional(
        &mut self,
        scope: ScopeId,
        arms: &[CondArm],
        branch_accessor: &str,
        out: &mut String,
    ) {
        let mut live = None;
        for (index, arm) in arms.iter().enumerate() {
            let matches = match &arm.test {
                None => true,
                Some(test) => eval(self, scope, test).truthy(),
            };
            if matches {
                live = Some(index);
                break;
            }
        }

        let mut state_key = branch_accessor.to_string();
        state_key.push('(');
        let Some(index) = live else {
            self.scopes.get_mut(scope).write(branch_accessor, Value::Null);
            return;
        };
        self.scopes
            .get_mut(scope)
            .write(branch_accessor, Value::Int(index as i64));

        let branch_scope = match arms.get(index).and_then(|arm| arm.section) {
            Some(section) => {
                let template = self.scopes.get(scope).template.clone();
                let branch = self.scopes.create(template, section, Some(scope));
                let rendered = self.render_scope(branch);
                out.push_str(&rendered);
                Some(branch)
            }
            None => None,
        };
        self.scopes.get_mut(scope).set_branch_state(
            &state_key,
            BranchState {
                index,
                scope: branch_scope,
            },
        );
    }

    fn render_dynamic_tag(
        &mut self,
        scope: ScopeId,
        name: &RExpr,
        attrs: &[(String, RExpr)],
        body_section: Option<u32>,
        out: &mut String,
    ) {
        let tag = eval(self, scope, name);
        match tag {
            Value::Renderer {
                template,
                section,
                scope: captured,
            } => {
                // Deferred body content renders in the scope chain it
                // closed over, not where the tag sits.
                let body = self
                    .scopes
                    .create(template, section, Some(captured));
                let rendered = self.render_scope(body);
                out.push_str(&rendered);
            }
            Value::Str(tag_name) => {
                out.push('<');
                out.push_str(&tag_name);
                for (attr, value) in attrs {
                    let value = eval(self, scope, value);
                    write_attr_html(attr, &value, out);
                }
                out.push('>');
                self.render_body(scope, body_section, out);
                out.push_str("</");
                out.push_str(&tag_name);
                out.push('>');
            }
            _ => self.render_body(scope, body_section, out),
        }
    }

    fn render_body(&mut self, scope: ScopeId, body_section: Option<u32>, out: &mut String) {
        if let Some(section) = body_section {
            let template = self.scopes.get(scope).template.clone();
            let body = self.scopes.create(template, section, Some(scope));
            let rendered = self.render_scope(body);
            out.push_str(&rendered);
        }
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn write_attr_html(name: &str, value: &Value, out: &mut String) {
    match value {
        Value::Null | Value::Unset | Value::Bool(false) => {}
        Value::Bool(true) => {
            out.push(' ');
            out.push_str(name);
        }
        other => {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_attr(&other.display(), out);
            out.push('"');
        }
    }
}
