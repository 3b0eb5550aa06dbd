//! Client-side engine: instantiates compiled DOM artifacts and drives
//! fine-grained updates.
//!
//! There is no virtual DOM and no diffing of trees: the compiler decided
//! which signal touches which node, and the engine just executes those
//! ops when a stateful slot changes. Invalidation follows the artifact's
//! trigger map; cross-section links fan out to every live descendant
//! scope of the changed one, in creation order.

use rustc_hash::FxHashMap;

use weft::artifact::{Artifact, CondArm, DomOp, LoopSource, RExpr, SignalId, SkelNode, Target};
use weft::walks::{self, WalkStep};

use crate::dom::{Listener, NodeIx, SimDom};
use crate::eval::{EvalCtx, eval};
use crate::scope::{BranchState, LoopState, ScopeId, Scopes};
use crate::value::Value;

/// Private slot suffix for a mount position that was displaced by a
/// resumed value.
const NODE_STASH: char = '#';

pub struct DomEngine {
    templates: FxHashMap<String, Artifact>,
    pub dom: SimDom,
    pub scopes: Scopes,
    root_container: NodeIx,
    /// Resume mode: creation ops reuse restored scopes instead of minting
    /// new ones.
    hydrating: bool,
}

impl EvalCtx for DomEngine {
    fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    fn assign(&mut self, scope: ScopeId, accessor: &str, value: Value) {
        self.set(scope, accessor, value);
    }
}

impl DomEngine {
    pub fn new() -> Self {
        let mut dom = SimDom::new();
        let root_container = dom.create_element("#root");
        Self {
            templates: FxHashMap::default(),
            dom,
            scopes: Scopes::new(),
            root_container,
            hydrating: false,
        }
    }

    /// Register a compiled template under the tag name that invokes it.
    pub fn register(&mut self, name: impl Into<String>, artifact: Artifact) {
        debug_assert_eq!(artifact.target, Target::Dom);
        self.templates.insert(name.into(), artifact);
    }

    pub fn artifact(&self, template: &str) -> &Artifact {
        &self.templates[template]
    }

    pub fn container(&self) -> NodeIx {
        self.root_container
    }

    pub fn html(&self) -> String {
        self.dom.inner_html(self.root_container)
    }

    /// Instantiate a template with the given input and attach it.
    pub fn mount(&mut self, template: &str, input: Value) -> ScopeId {
        let scope = self.scopes.create(template, 0, None);
        self.instantiate_dom(scope);
        let fragment = self.scopes.get(scope).fragment.clone();
        for node in fragment {
            self.dom.append(self.root_container, node);
        }
        self.scopes.get_mut(scope).write("0", input);
        self.run_setup(scope);
        scope
    }

    /// Write a slot and run everything that depends on it.
    pub fn set(&mut self, scope: ScopeId, accessor: &str, value: Value) {
        if self.scopes.get_mut(scope).write(accessor, value) {
            self.cascade(scope, accessor);
        }
    }

    /// Convenience for the common root-input update.
    pub fn set_input(&mut self, root: ScopeId, input: Value) {
        self.set(root, "0", input);
    }

    /// Dispatch an event on an element, running its attached handlers.
    pub fn dispatch(&mut self, node: NodeIx, event: &str) {
        let listeners: Vec<Listener> = self.dom.listeners_for(node, event);
        for listener in listeners {
            eval(self, listener.scope, &listener.handler);
        }
    }

    fn cascade(&mut self, scope: ScopeId, accessor: &str) {
        let owner = self.scopes.get(scope);
        let template = owner.template.clone();
        let section = owner.section;
        let links = self.templates[&template]
            .sections
            .get(section as usize)
            .and_then(|s| {
                s.triggers
                    .iter()
                    .find(|(acc, _)| acc == accessor)
                    .map(|(_, links)| links.clone())
            })
            .unwrap_or_default();
        for link in links {
            if link.section == section {
                self.run_signal(scope, link.signal);
            } else {
                for target in self
                    .scopes
                    .live_in_section(&template, link.section, scope)
                {
                    self.run_signal(target, link.signal);
                }
            }
        }
    }

    /// Run a scope's setup signals: all render phases first, then all
    /// effect phases, in registration order.
    fn run_setup(&mut self, scope: ScopeId) {
        let owner = self.scopes.get(scope);
        let setup: Vec<SignalId> = self.templates[&owner.template]
            .section(owner.section)
            .setup
            .clone();
        for &id in &setup {
            self.run_phase(scope, id, false);
        }
        for &id in &setup {
            self.run_phase(scope, id, true);
        }
    }

    fn run_signal(&mut self, scope: ScopeId, id: SignalId) {
        self.run_phase(scope, id, false);
        self.run_phase(scope, id, true);
    }

    fn run_phase(&mut self, scope: ScopeId, id: SignalId, effect: bool) {
        if !self.scopes.get(scope).alive {
            return;
        }
        let template = self.scopes.get(scope).template.clone();
        let spec = self.templates[&template].signal(id);
        let ops = if effect {
            spec.effect.clone()
        } else {
            spec.render.clone()
        };
        for op in ops {
            self.run_op(scope, &op);
        }
    }

    fn run_op(&mut self, scope: ScopeId, op: &DomOp) {
        match op {
            DomOp::SetText { node, value } => {
                let target = self.node_slot(scope, node);
                let text = eval(self, scope, value).display();
                if let Some(target) = target {
                    self.dom.set_text(target, text);
                }
            }
            DomOp::SetAttr { node, name, value } => {
                let target = self.node_slot(scope, node);
                let value = eval(self, scope, value);
                if let Some(target) = target {
                    self.write_attr(target, name, &value);
                }
            }
            DomOp::ApplySpread { node, value, skip } => {
                let target = self.node_slot(scope, node);
                let value = eval(self, scope, value);
                if let (Some(target), Value::Object(fields)) = (target, value) {
                    for (name, field) in fields {
                        if !skip.iter().any(|s| s == &name) {
                            self.write_attr(target, &name, &field);
                        }
                    }
                }
            }
            DomOp::On {
                node,
                event,
                handler,
            } => {
                if let Some(target) = self.node_slot(scope, node) {
                    self.dom.add_listener(
                        target,
                        Listener {
                            event: event.clone(),
                            scope,
                            handler: handler.clone(),
                        },
                    );
                }
            }
            DomOp::Store { accessor, value } => {
                // A restored slot keeps its serialized value; the initial
                // expression only applies to scopes born on the client.
                if self.hydrating
                    && !matches!(self.scopes.get(scope).read(accessor), Value::Null)
                {
                    return;
                }
                let value = eval(self, scope, value);
                self.set(scope, accessor, value);
            }
            DomOp::MountChild { child, template } => self.mount_child(scope, child, template),
            DomOp::SetChildInput { child, value } => {
                let input = eval(self, scope, value);
                if let Value::Scope(child_scope) = self.scopes.get(scope).read(child) {
                    self.set(child_scope, "0", input);
                }
            }
            DomOp::RunLoop {
                node,
                body_section,
                source,
                by,
                only_child,
            } => self.run_loop(scope, node, *body_section, source, by.as_ref(), *only_child),
            DomOp::RunConditional {
                node,
                branch,
                arms,
                only_child,
            } => self.run_conditional(scope, node, branch, arms, *only_child),
            DomOp::RunDynamicTag {
                node,
                name,
                attrs,
                body_section,
            } => self.run_dynamic_tag(scope, node, name, attrs, *body_section),
        }
    }

    fn write_attr(&mut self, node: NodeIx, name: &str, value: &Value) {
        match value {
            Value::Null | Value::Unset | Value::Bool(false) => {
                self.dom.set_attr(node, name, None)
            }
            Value::Bool(true) => self.dom.set_attr(node, name, Some(String::new())),
            other => self.dom.set_attr(node, name, Some(other.display())),
        }
    }

    /// Resolve a node-reference slot, looking in the stash when a resumed
    /// value displaced the walk binding.
    fn node_slot(&self, scope: ScopeId, accessor: &str) -> Option<NodeIx> {
        match self.scopes.get(scope).read(accessor) {
            Value::Node(node) => Some(node),
            _ => {
                let mut stash = accessor.to_string();
                stash.push(NODE_STASH);
                match self.scopes.get(scope).read(&stash) {
                    Value::Node(node) => Some(node),
                    _ => None,
                }
            }
        }
    }

    // ------------------------------------------------------ instantiation

    /// Build a scope's skeleton DOM and bind its walk references.
    pub fn instantiate_dom(&mut self, scope: ScopeId) {
        let owner = self.scopes.get(scope);
        let artifact = &self.templates[&owner.template];
        let section = artifact.section(owner.section);
        let skeleton = section.skeleton.clone();
        let walk_string = section.walks.clone();
        let walk_refs = section.walk_refs.clone();

        let roots: Vec<NodeIx> = skeleton.iter().map(|n| self.build_skel(n)).collect();
        self.scopes.get_mut(scope).fragment = roots.iter().copied().collect();
        self.replay_walks(scope, &roots, &walk_string, &walk_refs);
    }

    fn build_skel(&mut self, node: &SkelNode) -> NodeIx {
        match node {
            SkelNode::Element {
                name,
                attrs,
                children,
                void: _,
            } => {
                let element = self.dom.create_element(name.clone());
                for (attr, value) in attrs {
                    self.dom.set_attr(element, attr, Some(value.clone()));
                }
                for child in children {
                    let built = self.build_skel(child);
                    self.dom.append(element, built);
                }
                element
            }
            SkelNode::Text(text) => self.dom.create_text(text.clone()),
            SkelNode::Marker => self.dom.create_comment(""),
            SkelNode::Child { .. } => self.dom.create_comment("child"),
        }
    }

    fn replay_walks(&mut self, scope: ScopeId, roots: &[NodeIx], walks: &str, refs: &[String]) {
        let mut path: Vec<usize> = vec![0];
        let mut next_ref = 0usize;
        for step in walks::decode(walks) {
            match step {
                WalkStep::Get | WalkStep::Replace | WalkStep::BeginChild => {
                    let node = self.node_at(roots, &path);
                    self.bind_ref(scope, &refs[next_ref], node);
                    next_ref += 1;
                }
                WalkStep::EndChild => {}
                WalkStep::Next(n) => {
                    if let Some(last) = path.last_mut() {
                        *last += n as usize;
                    }
                }
                WalkStep::Over(n) => path.push(n as usize - 1),
                WalkStep::Out(n) => {
                    path.truncate(path.len().saturating_sub(n as usize));
                    if let Some(last) = path.last_mut() {
                        *last += 1;
                    }
                }
            }
        }
    }

    fn node_at(&self, roots: &[NodeIx], path: &[usize]) -> NodeIx {
        let mut node = roots[path[0]];
        for &index in &path[1..] {
            node = self.dom.children(node)[index];
        }
        node
    }

    fn bind_ref(&mut self, scope: ScopeId, accessor: &str, node: NodeIx) {
        let occupied = !matches!(self.scopes.get(scope).read(accessor), Value::Null);
        if occupied {
            // Resumed payloads own the slot; the DOM position goes to the
            // stash so mount ops can still find it.
            let mut stash = accessor.to_string();
            stash.push(NODE_STASH);
            self.scopes.get_mut(scope).write(&stash, Value::Node(node));
        } else {
            self.scopes.get_mut(scope).write(accessor, Value::Node(node));
        }
    }

    // -------------------------------------------------------- child mount

    fn mount_child(&mut self, scope: ScopeId, child: &str, template: &str) {
        match self.scopes.get(scope).read(child) {
            Value::Node(position) => {
                let child_scope = self.scopes.create(template, 0, Some(scope));
                self.instantiate_dom(child_scope);
                let fragment = self.scopes.get(child_scope).fragment.clone();
                for node in fragment {
                    self.dom.insert_before(position, node);
                }
                self.dom.remove_subtree(position);
                self.scopes
                    .get_mut(scope)
                    .write(child, Value::Scope(child_scope));
                self.run_setup(child_scope);
            }
            Value::Scope(child_scope) if self.hydrating => {
                // Resume: the scope already exists with restored state;
                // give it DOM and rerun its program against that state.
                self.instantiate_dom(child_scope);
                if let Some(position) = self.node_slot(scope, child) {
                    let fragment = self.scopes.get(child_scope).fragment.clone();
                    for node in fragment {
                        self.dom.insert_before(position, node);
                    }
                    self.dom.remove_subtree(position);
                }
                self.run_setup(child_scope);
            }
            _ => {}
        }
    }

    // --------------------------------------------------------------- loop

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

    #[allow(clippy::too_many_arguments)]
    fn run_loop(
        &mut self,
        scope: ScopeId,
        node: &str,
        body_section: u32,
        source: &LoopSource,
        by: Option<&RExpr>,
        only_child: bool,
    ) {
        let Some(anchor) = self.node_slot(scope, node) else {
            return;
        };
        let mut state_key = node.to_string();
        state_key.push('!');

        if self.hydrating {
            self.hydrate_loop(scope, &state_key, anchor, only_child);
            return;
        }

        let template = self.scopes.get(scope).template.clone();
        let params: Vec<(String, String)> = self.templates[&template]
            .section(body_section)
            .params
            .clone();
        let items = self.loop_items(scope, source);
        let old_state = self
            .scopes
            .get(scope)
            .loop_state(&state_key)
            .cloned()
            .unwrap_or_default();

        let mut new_entries: Vec<(Value, ScopeId, bool)> = Vec::new();
        for (index, item) in items.iter().enumerate() {
            // A scratch scope carries the params so the key expression can
            // read them; it becomes the real scope when nothing is reused.
            let scratch = self.scopes.create(&template, body_section, Some(scope));
            for (param, value) in params.iter().zip(item) {
                self.scopes
                    .get_mut(scratch)
                    .write(&param.0, value.clone());
            }
            let key = match by {
                Some(by) => eval(self, scratch, by),
                None => Value::Int(index as i64),
            };

            match old_state.scope_for(&key) {
                Some(existing) if self.scopes.get(existing).alive => {
                    self.scopes.kill(scratch);
                    for (param, value) in params.iter().zip(item) {
                        self.set(existing, &param.0, value.clone());
                    }
                    new_entries.push((key, existing, false));
                }
                _ => {
                    self.instantiate_dom(scratch);
                    new_entries.push((key, scratch, true));
                }
            }
        }

        // Scopes whose keys vanished tear down with their DOM.
        for (key, old_scope) in &old_state.entries {
            if !new_entries.iter().any(|(k, ..)| k == key) {
                let fragment = self.scopes.get(*old_scope).fragment.clone();
                for node in fragment {
                    self.dom.remove_subtree(node);
                }
                self.scopes.kill(*old_scope);
            }
        }

        // One pass re-inserts every fragment in item order; moving a node
        // that is already attached reuses it in place.
        for (_, item_scope, _) in &new_entries {
            let fragment = self.scopes.get(*item_scope).fragment.clone();
            for node in fragment {
                if only_child {
                    self.dom.append(anchor, node);
                } else {
                    self.dom.insert_before(anchor, node);
                }
            }
        }

        let created: Vec<ScopeId> = new_entries
            .iter()
            .filter(|(.., is_new)| *is_new)
            .map(|(_, s, _)| *s)
            .collect();
        self.scopes.get_mut(scope).set_loop_state(
            &state_key,
            LoopState {
                entries: new_entries
                    .into_iter()
                    .map(|(key, item_scope, _)| (key, item_scope))
                    .collect(),
            },
        );
        for item_scope in created {
            self.run_setup(item_scope);
        }
    }

    fn hydrate_loop(&mut self, scope: ScopeId, state_key: &str, anchor: NodeIx, only_child: bool) {
        let entries = self
            .scopes
            .get(scope)
            .loop_state(state_key)
            .cloned()
            .unwrap_or_default()
            .entries;
        for (_, item_scope) in &entries {
            self.instantiate_dom(*item_scope);
            let fragment = self.scopes.get(*item_scope).fragment.clone();
            for node in fragment {
                if only_child {
                    self.dom.append(anchor, node);
                } else {
                    self.dom.insert_before(anchor, node);
                }
            }
        }
        for (_, item_scope) in &entries {
            self.run_setup(*item_scope);
        }
    }

    // -------------------------------------------------------- conditional

    fn run_conditional(
        &mut self,
        scope: ScopeId,
        node: &str,
        branch: &str,
        arms: &[CondArm],
        only_child: bool,
    ) {
        let Some(anchor) = self.node_slot(scope, node) else {
            return;
        };
        let mut state_key = branch.to_string();
        state_key.push('(');

        let live = if self.hydrating {
            self.scopes
                .get(scope)
                .branch_state(&state_key)
                .map(|s| s.index)
        } else {
            let mut found = None;
            for (index, arm) in arms.iter().enumerate() {
                let matches = match &arm.test {
                    None => true,
                    Some(test) => eval(self, scope, test).truthy(),
                };
                if matches {
                    found = Some(index);
                    break;
                }
            }
            found
        };

        let previous = self.scopes.get(scope).branch_state(&state_key).cloned();
        if !self.hydrating {
            if let Some(previous) = &previous {
                if Some(previous.index) == live {
                    // Same arm: content inside updates through its own
                    // closures.
                    return;
                }
                if let Some(old_scope) = previous.scope {
                    let fragment = self.scopes.get(old_scope).fragment.clone();
                    for node in fragment {
                        self.dom.remove_subtree(node);
                    }
                    self.scopes.kill(old_scope);
                }
            }
        }

        let Some(index) = live else {
            self.scopes.get_mut(scope).write(branch, Value::Null);
            return;
        };
        self.scopes
            .get_mut(scope)
            .write(branch, Value::Int(index as i64));

        let arm_section = arms.get(index).and_then(|arm| arm.section);
        let branch_scope = match (self.hydrating, previous.as_ref().and_then(|p| p.scope)) {
            (true, Some(restored)) => {
                self.instantiate_dom(restored);
                Some(restored)
            }
            (true, None) => None,
            (false, _) => match arm_section {
                Some(section) => {
                    let template = self.scopes.get(scope).template.clone();
                    let created = self.scopes.create(template, section, Some(scope));
                    self.instantiate_dom(created);
                    Some(created)
                }
                None => None,
            },
        };

        if let Some(branch_scope) = branch_scope {
            let fragment = self.scopes.get(branch_scope).fragment.clone();
            for node in fragment {
                if only_child {
                    self.dom.append(anchor, node);
                } else {
                    self.dom.insert_before(anchor, node);
                }
            }
            self.scopes.get_mut(scope).set_branch_state(
                &state_key,
                BranchState {
                    index,
                    scope: Some(branch_scope),
                },
            );
            self.run_setup(branch_scope);
        } else {
            self.scopes
                .get_mut(scope)
                .set_branch_state(&state_key, BranchState { index, scope: None });
        }
    }

    // -------------------------------------------------------- dynamic tag

    fn run_dynamic_tag(
        &mut self,
        scope: ScopeId,
        node: &str,
        name: &RExpr,
        attrs: &[(String, RExpr)],
        body_section: Option<u32>,
    ) {
        let Some(anchor) = self.node_slot(scope, node) else {
            return;
        };
        let mut element_key = node.to_string();
        element_key.push('@');

        let tag = eval(self, scope, name);
        if let Value::Renderer {
            template,
            section,
            scope: captured,
        } = tag
        {
            // Deferred body content mounts once, in the scope chain it
            // closed over.
            let mut state_key = node.to_string();
            state_key.push('(');
            if self.scopes.get(scope).branch_state(&state_key).is_some() {
                return;
            }
            let body_scope = self.scopes.create(template, section, Some(captured));
            self.instantiate_dom(body_scope);
            let fragment = self.scopes.get(body_scope).fragment.clone();
            for node in fragment {
                self.dom.insert_before(anchor, node);
            }
            self.scopes.get_mut(scope).set_branch_state(
                &state_key,
                BranchState {
                    index: 0,
                    scope: Some(body_scope),
                },
            );
            self.run_setup(body_scope);
            return;
        }
        let previous = match self.scopes.get(scope).read(&element_key) {
            Value::Node(prev) => Some(prev),
            _ => None,
        };
        let mut previous_name = element_key.clone();
        previous_name.push('@');
        let same_tag = previous.is_some()
            && self.scopes.get(scope).read(&previous_name) == Value::Str(tag.display());

        let element = if same_tag {
            match previous {
                Some(prev) => prev,
                None => return,
            }
        } else {
            let created = self.dom.create_element(tag.display());
            match previous {
                Some(old) => {
                    // The body moves wholesale into the replacement tag.
                    let children = self.dom.children(old).to_vec();
                    for child in children {
                        self.dom.append(created, child);
                    }
                    self.dom.insert_before(old, created);
                    self.dom.remove_subtree(old);
                }
                None => {
                    self.dom.insert_before(anchor, created);
                    if let Some(section) = body_section {
                        let template = self.scopes.get(scope).template.clone();
                        let body_scope = self.scopes.create(template, section, Some(scope));
                        self.instantiate_dom(body_scope);
                        let fragment = self.scopes.get(body_scope).fragment.clone();
                        for node in fragment {
                            self.dom.append(created, node);
                        }
                        self.run_setup(body_scope);
                    }
                }
            }
            let scope_ref = self.scopes.get_mut(scope);
            scope_ref.write(&element_key, Value::Node(created));
            scope_ref.write(&previous_name, Value::Str(tag.display()));
            created
        };

        for (attr, value) in attrs {
            let value = eval(self, scope, value);
            self.write_attr(element, attr, &value);
        }
    }

    // ------------------------------------------------------------- resume

    /// Attach a restored root scope: instantiate its DOM and rerun its
    /// program against the restored state, reusing every serialized scope.
    pub(crate) fn hydrate_root(&mut self, root: ScopeId) {
        self.hydrating = true;
        self.instantiate_dom(root);
        let fragment = self.scopes.get(root).fragment.clone();
        for node in fragment {
            self.dom.append(self.root_container, node);
        }
        self.run_setup(root);
        self.hydrating = false;
    }
}

impl Default for DomEngine {
    fn default() -> Self {
        Self::new()
    }
}
