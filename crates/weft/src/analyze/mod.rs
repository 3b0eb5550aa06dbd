//! Analyze pass: builds the binding/section graph and per-node analysis
//! records. No code is emitted here; the translate pass consumes the
//! finished graph. The two passes never interleave.

pub mod references;
pub mod sections;

use crate::ast::{Attr, ForSource, IfArm, NodeId, NodeKind, is_event_handler};
use crate::context::Compilation;
use crate::error::CompileError;
use crate::graph::{BindingKind, RefSet, SectionId};
use references::{all_tag_reference_exprs, const_eval, dedupe_attrs, merge_into_node, track_expr};
use sections::{marker_binding, only_child_parent_ref, start_section};

/// Run the analyze pass over the whole template. Errors accumulate on the
/// context; the caller aborts before translate when any exist.
pub fn analyze(cx: &mut Compilation) {
    let root = cx.graph.create_section("program", None);
    debug_assert_eq!(root, SectionId::ROOT);
    let input = cx.graph.create_binding("input", BindingKind::Input, root);
    cx.input_binding = Some(input);
    cx.scope.push("input", input);

    let mark = cx.scope.mark();
    for &node in &cx.arena.roots().to_vec() {
        analyze_node(cx, node, root);
    }
    cx.scope.truncate(mark);

    cx.graph.finalize();
}

fn analyze_body(cx: &mut Compilation, body: &[NodeId], section: SectionId) {
    let mark = cx.scope.mark();
    for &child in body {
        analyze_node(cx, child, section);
    }
    cx.scope.truncate(mark);
}

fn analyze_node(cx: &mut Compilation, node: NodeId, section: SectionId) {
    cx.set_section(node, section);
    let kind = cx.arena.node(node).kind.clone();
    match kind {
        NodeKind::Text(_) => {}
        NodeKind::Placeholder { value } => {
            let refs = track_expr(cx, section, value);
            // Anything that cannot fold into the static skeleton owns a
            // live text node, even when it can never change again.
            if !refs.is_empty() || const_eval(cx.arena, value).is_none() {
                let binding = cx.graph.create_binding("text", BindingKind::Dom, section);
                cx.analysis_mut(node).node_ref = Some(binding);
                cx.analysis_mut(node).refs = refs;
            }
        }
        NodeKind::Let { name, value } => {
            let refs = track_expr(cx, section, value);
            let binding = cx
                .graph
                .create_binding(name.clone(), BindingKind::Derived, section);
            cx.graph.binding_mut(binding).deps = refs.clone();
            let analysis = cx.analysis_mut(node);
            analysis.refs = refs;
            analysis.var_binding = Some(binding);
            cx.scope.push(name, binding);
        }
        NodeKind::Element {
            name,
            var,
            attrs,
            body,
        } => {
            analyze_element(cx, node, section, &name, var.as_deref(), &attrs);
            analyze_body(cx, &body, section);
        }
        NodeKind::For {
            source,
            by,
            params,
            attrs,
            body,
        } => {
            analyze_for(cx, node, section, &source, by, &params, &attrs, &body);
        }
        NodeKind::If { arms } => {
            analyze_if(cx, node, section, &arms);
        }
        NodeKind::CustomTag {
            name,
            var,
            args,
            attrs,
            attr_tags,
            body,
        } => {
            analyze_custom_tag(cx, node, section, &name, var.as_deref(), &args, &attrs, &attr_tags, &body);
        }
        NodeKind::AttrTag { .. } => {
            // Attr tags are traversed through their owning custom tag; one
            // arriving through a plain body is misplaced.
            cx.error(CompileError::structural(
                cx.arena.node(node).span,
                "@tags must be nested within another tag",
            ));
        }
        NodeKind::DynamicTag { name, attrs, body } => {
            let mut refs = track_expr(cx, section, name);
            let (kept, _) = dedupe_attrs(&attrs);
            for &i in &kept {
                refs.union(&track_expr(cx, section, attrs[i].value()));
            }
            let binding = marker_binding(cx, section);
            let analysis = cx.analysis_mut(node);
            analysis.node_ref = Some(binding);
            analysis.refs = refs;
            analysis.kept_attrs = kept;
            if !body.is_empty() {
                let body_section = start_section(cx, "dynBody", section, body[0]);
                cx.analysis_mut(node).body_section = Some(body_section);
                analyze_body(cx, &body, body_section);
            }
        }
    }
}

fn analyze_element(
    cx: &mut Compilation,
    node: NodeId,
    section: SectionId,
    name: &str,
    var: Option<&str>,
    attrs: &[Attr],
) {
    let (kept, dropped) = dedupe_attrs(attrs);
    let mut has_events = false;
    let mut has_dynamic = false;
    let mut spread_refs = RefSet::new();

    // Track everything first, then unhook the losers of duplicate-name
    // resolution so no signal is ever synthesized for them.
    for attr in attrs {
        track_expr(cx, section, attr.value());
    }
    for &i in &dropped {
        cx.drop_references(attrs[i].value());
    }

    for &i in &kept {
        match &attrs[i] {
            Attr::Named {
                name: attr_name,
                value,
                ..
            } => {
                if is_event_handler(attr_name) {
                    has_events = true;
                } else if const_eval(cx.arena, *value).is_none() {
                    has_dynamic = true;
                }
            }
            Attr::Spread { value, .. } => {
                spread_refs.union(&cx.expr_refs(*value));
                has_dynamic = true;
            }
        }
    }

    if var.is_some() || has_events || has_dynamic {
        let binding = cx
            .graph
            .create_binding(name.to_string(), BindingKind::Dom, section);
        let analysis = cx.analysis_mut(node);
        analysis.node_ref = Some(binding);
        analysis.serialize_marker = has_events || var.is_some();
        if let Some(var_name) = var {
            cx.scope.push(var_name.to_string(), binding);
        }
    }
    let analysis = cx.analysis_mut(node);
    analysis.refs.union(&spread_refs);
    analysis.kept_attrs = kept;
}

fn analyze_for(
    cx: &mut Compilation,
    node: NodeId,
    section: SectionId,
    source: &ForSource,
    by: Option<crate::ast::ExprId>,
    params: &[String],
    attrs: &[Attr],
    body: &[NodeId],
) {
    let span = cx.arena.node(node).span;
    // The parser routes recognized attributes into the source/by fields;
    // whatever is left is disallowed for this loop kind.
    for attr in attrs {
        let what = match attr {
            Attr::Named { name, .. } => name.clone(),
            Attr::Spread { .. } => "...spread".into(),
        };
        cx.error(CompileError::structural(
            attr.span(),
            format!("`{what}` is not allowed on a `for` tag"),
        ));
    }
    if body.is_empty() {
        cx.error(CompileError::structural(span, "`for` tag requires a body"));
        return;
    }

    let mut source_refs = RefSet::new();
    match source {
        ForSource::Of(expr) | ForSource::In(expr) => {
            source_refs.union(&track_expr(cx, section, *expr));
        }
        ForSource::To { to, from, step } => {
            source_refs.union(&track_expr(cx, section, *to));
            for expr in [from, step].into_iter().flatten() {
                source_refs.union(&track_expr(cx, section, *expr));
            }
        }
    }

    let body_section = start_section(cx, "forBody", section, body[0]);
    cx.graph.section_mut(body_section).upstream = Some(source_refs.clone());

    let node_ref = match only_child_parent_ref(cx, node) {
        Some(parent_ref) => {
            cx.analysis_mut(node).only_child_in_parent = true;
            parent_ref
        }
        None => marker_binding(cx, section),
    };

    let mark = cx.scope.mark();
    for param in params {
        let binding = cx
            .graph
            .create_binding(param.clone(), BindingKind::Param, body_section);
        cx.graph.binding_mut(binding).deps = source_refs.clone();
        cx.scope.push(param.clone(), binding);
    }
    // The key expression reads the loop params, so it tracks inside the
    // body section after they are bound.
    if let Some(by) = by {
        track_expr(cx, body_section, by);
    }
    analyze_body(cx, body, body_section);
    cx.scope.truncate(mark);

    let analysis = cx.analysis_mut(node);
    analysis.node_ref = Some(node_ref);
    analysis.refs = source_refs;
    analysis.body_section = Some(body_section);
}

fn analyze_if(cx: &mut Compilation, node: NodeId, section: SectionId, arms: &[IfArm]) {
    let mut test_refs = RefSet::new();
    for arm in arms {
        if let Some(test) = arm.test {
            test_refs.union(&track_expr(cx, section, test));
        }
    }

    let node_ref = match only_child_parent_ref(cx, node) {
        Some(parent_ref) => {
            cx.analysis_mut(node).only_child_in_parent = true;
            parent_ref
        }
        None => marker_binding(cx, section),
    };
    // Branch slot: which arm is live. Mutually exclusive arms synthesize a
    // single conditional signal keyed on this.
    let branch = cx
        .graph
        .create_binding("branch", BindingKind::ControlFlow, section);
    cx.graph.binding_mut(branch).deps = test_refs.clone();

    let mut arm_sections = Vec::with_capacity(arms.len());
    for arm in arms {
        if arm.body.is_empty() {
            arm_sections.push(None);
            continue;
        }
        let arm_section = start_section(cx, "ifBody", section, arm.body[0]);
        analyze_body(cx, &arm.body, arm_section);
        arm_sections.push(Some(arm_section));
    }

    let analysis = cx.analysis_mut(node);
    analysis.node_ref = Some(node_ref);
    analysis.refs = test_refs;
    analysis.branch_slot = Some(branch);
    analysis.arm_sections = arm_sections;
}

#[allow(clippy::too_many_arguments)]
fn analyze_custom_tag(
    cx: &mut Compilation,
    node: NodeId,
    section: SectionId,
    name: &str,
    var: Option<&str>,
    args: &[crate::ast::ExprId],
    attrs: &[Attr],
    attr_tags: &[NodeId],
    body: &[NodeId],
) {
    let span = cx.arena.node(node).span;
    let Some(shape) = cx.resolver.resolve_custom(name) else {
        cx.error(CompileError::resolution(
            span,
            format!("unable to find entry point for custom tag `{name}`"),
        ));
        // Nothing below has a consumer; track the whole invocation surface
        // and drop it so the graph stays free of dangling edges.
        let mut exprs = Vec::new();
        all_tag_reference_exprs(cx.arena, node, &mut exprs);
        for expr in exprs {
            track_expr(cx, section, expr);
            cx.drop_references(expr);
        }
        return;
    };
    let shape = shape.clone();

    let child_scope = cx
        .graph
        .create_binding("childScope", BindingKind::Dom, section);
    cx.analysis_mut(node).node_ref = Some(child_scope);

    let mut tracked = Vec::new();
    for &arg in args {
        track_expr(cx, section, arg);
        tracked.push(arg);
    }

    let (kept, dropped) = dedupe_attrs(attrs);
    for attr in attrs {
        track_expr(cx, section, attr.value());
    }
    for &i in &dropped {
        cx.drop_references(attrs[i].value());
    }
    let mut pruned = Vec::new();
    for &i in &kept {
        match &attrs[i] {
            Attr::Named {
                name: attr_name,
                value,
                ..
            } => {
                // Props the child never consumes are pruned along with
                // their references, so no signals form downstream.
                if shape.accepts_prop(attr_name) {
                    tracked.push(*value);
                    pruned.push(i);
                } else {
                    cx.drop_references(*value);
                }
            }
            Attr::Spread { value, .. } => {
                tracked.push(*value);
                pruned.push(i);
            }
        }
    }
    cx.analysis_mut(node).kept_attrs = pruned;

    for &child in attr_tags {
        analyze_attr_tag_entry(cx, child, section, &shape, &mut tracked);
    }

    if !body.is_empty() {
        if shape.takes_body {
            let body_section = start_section(cx, "tagBody", section, body[0]);
            cx.analysis_mut(node).body_section = Some(body_section);
            analyze_body(cx, body, body_section);
        }
        // A body the child never renders is pruned like an unused prop.
    }

    merge_into_node(cx, node, &tracked);

    if let Some(var_name) = var {
        let refs = cx.analysis_mut(node).refs.clone();
        let binding = cx
            .graph
            .create_binding(var_name.to_string(), BindingKind::Derived, section);
        cx.graph.binding_mut(binding).deps = refs;
        cx.analysis_mut(node).var_binding = Some(binding);
        cx.scope.push(var_name.to_string(), binding);
    }
}

/// One entry of a custom tag's attr-tag list: either an attr tag itself or
/// a conditional whose arms carry attr tags (mutually exclusive variants of
/// the same prop).
fn analyze_attr_tag_entry(
    cx: &mut Compilation,
    node: NodeId,
    section: SectionId,
    shape: &crate::tags::TagShape,
    tracked: &mut Vec<crate::ast::ExprId>,
) {
    cx.set_section(node, section);
    match cx.arena.node(node).kind.clone() {
        NodeKind::AttrTag {
            name,
            attrs,
            body,
        } => {
            if shape.attr_tag(&name).is_none() {
                return;
            }
            for attr in &attrs {
                // Attr-tag inputs evaluate in the parent's scope.
                track_expr(cx, section, attr.value());
                tracked.push(attr.value());
            }
            if !body.is_empty() {
                let body_section = start_section(cx, "attrTagBody", section, body[0]);
                cx.analysis_mut(node).body_section = Some(body_section);
                analyze_body(cx, &body, body_section);
            }
        }
        NodeKind::If { arms } => {
            let mut test_refs = RefSet::new();
            for arm in &arms {
                if let Some(test) = arm.test {
                    test_refs.union(&track_expr(cx, section, test));
                    tracked.push(test);
                }
                for &inner in &arm.body {
                    analyze_attr_tag_entry(cx, inner, section, shape, tracked);
                }
            }
            cx.analysis_mut(node).refs = test_refs;
        }
        _ => cx.error(CompileError::structural(
            cx.arena.node(node).span,
            "only @tags and `if` chains around them may appear here",
        )),
    }
}
