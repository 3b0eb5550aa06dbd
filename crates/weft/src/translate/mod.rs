//! Translate pass: lowers the analyzed template into an [`Artifact`] for
//! one target.
//!
//! The target is chosen once per compilation and never branches per
//! expression: every node kind carries a pair of handler functions, one
//! per backend, and dispatch picks the whole column up front. Sections are
//! translated under a strict stack; a section's artifact is sealed before
//! its parent resumes.

pub mod resume;
pub mod signals;
pub mod writer;

use crate::artifact::{
    Artifact, CondArm, DomOp, HtmlOp, LoopSource, RExpr, ResumeSource, SectionArtifact, SkelNode,
    Target,
};
use crate::ast::{
    Attr, ExprId, ExprKind, ForSource, InterpPart, Lit, NodeId, NodeKind, event_name,
    is_event_handler,
};
use crate::context::{Compilation, NodeAnalysis};
use crate::graph::{
    ACCESSOR_COND_BRANCH, ACCESSOR_LOOP_SCOPES, BindingId, BindingKind, RefSet, SectionId,
};
use crate::walks::VisitKind;
use crate::analyze::references::const_eval;
use signals::{Phase, SignalTable};
use writer::{SectionWriter, escape_attr};

/// Lower the analyzed compilation for `target`. Must only run when the
/// analyze pass finished without errors.
pub fn translate(cx: &Compilation, target: Target) -> Artifact {
    let section_count = cx.graph.section_count();
    let mut translator = Translator {
        cx,
        target,
        signals: SignalTable::new(),
        out: (0..section_count)
            .map(|_| SectionArtifact::default())
            .collect(),
        stack: Vec::new(),
    };

    translator.enter_section(SectionId::ROOT);
    for &node in cx.arena.roots() {
        translator.translate_node(node);
    }
    translator.finish_section();
    translator.finish()
}

struct Translator<'a, 'cx> {
    cx: &'a Compilation<'cx>,
    target: Target,
    signals: SignalTable,
    out: Vec<SectionArtifact>,
    stack: Vec<SectionWriter>,
}

struct Handlers {
    html: fn(&mut Translator, NodeId),
    dom: fn(&mut Translator, NodeId),
}

fn handlers(kind: &NodeKind) -> Handlers {
    match kind {
        NodeKind::Text(_) => Handlers {
            html: text_html,
            dom: text_dom,
        },
        NodeKind::Placeholder { .. } => Handlers {
            html: placeholder_html,
            dom: placeholder_dom,
        },
        NodeKind::Let { .. } => Handlers {
            html: let_html,
            dom: let_dom,
        },
        NodeKind::Element { .. } => Handlers {
            html: element_html,
            dom: element_dom,
        },
        NodeKind::For { .. } => Handlers {
            html: for_html,
            dom: for_dom,
        },
        NodeKind::If { .. } => Handlers {
            html: if_html,
            dom: if_dom,
        },
        NodeKind::CustomTag { .. } => Handlers {
            html: custom_tag_html,
            dom: custom_tag_dom,
        },
        // Misplaced attr tags were rejected during analysis.
        NodeKind::AttrTag { .. } => Handlers {
            html: |_, _| {},
            dom: |_, _| {},
        },
        NodeKind::DynamicTag { .. } => Handlers {
            html: dynamic_tag_html,
            dom: dynamic_tag_dom,
        },
    }
}

impl<'a, 'cx> Translator<'a, 'cx> {
    fn translate_node(&mut self, node: NodeId) {
        let table = handlers(&self.cx.arena.node(node).kind);
        match self.target {
            Target::Html => (table.html)(self, node),
            Target::Dom => (table.dom)(self, node),
        }
    }

    fn writer(&mut self) -> &mut SectionWriter {
        match self.stack.last_mut() {
            Some(writer) => writer,
            None => unreachable!("section stack is never empty mid-translate"),
        }
    }

    fn section(&self) -> SectionId {
        match self.stack.last() {
            Some(writer) => SectionId(writer.section),
            None => unreachable!("section stack is never empty mid-translate"),
        }
    }

    fn enter_section(&mut self, id: SectionId) {
        self.stack.push(SectionWriter::new(id.0));
        if self.target == Target::Html {
            self.writer().push_op(HtmlOp::ScopeStart);
        }
    }

    fn finish_section(&mut self) {
        let Some(mut writer) = self.stack.pop() else {
            unreachable!("unbalanced section stack");
        };
        let id = SectionId(writer.section);
        if self.target == Target::Html {
            writer.html.extend(resume::value_records(&self.cx.graph, id));
        }
        writer.finish(&mut self.out[id.0 as usize]);
    }

    fn translate_section(&mut self, id: SectionId, body: &[NodeId]) {
        self.enter_section(id);
        for &node in body {
            self.translate_node(node);
        }
        self.finish_section();
    }

    fn analysis(&self, node: NodeId) -> NodeAnalysis {
        self.cx.analysis(node).cloned().unwrap_or_default()
    }

    fn accessor_of(&self, binding: BindingId) -> String {
        self.cx.graph.binding(binding).accessor().key()
    }

    /// Compile a template expression for evaluation in `section`'s scope.
    fn compile_expr(&self, section: SectionId, expr: ExprId) -> RExpr {
        match &self.cx.arena.expr(expr).kind {
            ExprKind::Lit(lit) => RExpr::Lit(lit.clone()),
            ExprKind::Var(_) => match self.cx.resolved(expr) {
                Some(binding) => self.read_of(section, binding),
                // Unresolved names were reported during analysis.
                None => RExpr::Lit(Lit::Null),
            },
            ExprKind::Member { object, prop } => RExpr::Member {
                object: Box::new(self.compile_expr(section, *object)),
                prop: prop.clone(),
            },
            ExprKind::Interp(parts) => RExpr::Concat(
                parts
                    .iter()
                    .map(|part| match part {
                        InterpPart::Text(text) => RExpr::Lit(Lit::Str(text.clone())),
                        InterpPart::Expr(inner) => self.compile_expr(section, *inner),
                    })
                    .collect(),
            ),
            ExprKind::Unary { op, operand } => RExpr::Unary {
                op: *op,
                operand: Box::new(self.compile_expr(section, *operand)),
            },
            ExprKind::Binary { op, lhs, rhs } => RExpr::Binary {
                op: *op,
                lhs: Box::new(self.compile_expr(section, *lhs)),
                rhs: Box::new(self.compile_expr(section, *rhs)),
            },
            ExprKind::Assign { value, .. } => {
                let value = Box::new(self.compile_expr(section, *value));
                match self.cx.resolved(expr) {
                    Some(binding) => {
                        let target = self.cx.graph.binding(binding);
                        RExpr::Assign {
                            hops: self
                                .cx
                                .graph
                                .hops_between(section, target.section)
                                .unwrap_or(0),
                            accessor: target.accessor().key(),
                            value,
                        }
                    }
                    None => *value,
                }
            }
        }
    }

    fn read_of(&self, from: SectionId, binding: BindingId) -> RExpr {
        let target = self.cx.graph.binding(binding);
        RExpr::Read {
            hops: self
                .cx
                .graph
                .hops_between(from, target.section)
                .unwrap_or(0),
            accessor: target.accessor().key(),
        }
    }

    fn refs_of(&self, expr: ExprId) -> RefSet {
        self.cx.expr_refs(expr)
    }

    /// Seal the artifact: section metadata, signal table, invalidation map.
    fn finish(self) -> Artifact {
        let graph = &self.cx.graph;
        let mut out = self.out;

        for (id, section) in graph.sections() {
            let slot = &mut out[id.0 as usize];
            slot.name = section.name.clone();
            slot.parent = section.parent.map(|p| p.0);
            slot.force_resume = section.force_resume;
            slot.params = section
                .bindings
                .iter()
                .map(|&b| graph.binding(b))
                .filter(|b| b.kind == BindingKind::Param)
                .map(|b| (b.accessor().key(), b.name.clone()))
                .collect();
        }

        let mut specs = Vec::new();
        if self.target == Target::Dom {
            let signal_out = self.signals.finish(graph);
            specs = signal_out.specs;
            for (i, slot) in out.iter_mut().enumerate() {
                slot.setup = signal_out.setup[i].clone();
                slot.triggers = signal_out.triggers[i].clone();
            }
        }

        Artifact {
            source_name: self.cx.arena.source_name.clone(),
            target: self.target,
            sections: out,
            signals: specs,
        }
    }
}

fn lit_to_string(lit: &Lit) -> String {
    match lit {
        Lit::Str(s) => s.clone(),
        Lit::Int(i) => i.to_string(),
        Lit::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Lit::Null => String::new(),
    }
}

// ---------------------------------------------------------------- text

fn text_dom(t: &mut Translator, node: NodeId) {
    if let NodeKind::Text(content) = &t.cx.arena.node(node).kind {
        let content = content.clone();
        t.writer().append(SkelNode::Text(content));
    }
}

fn text_html(t: &mut Translator, node: NodeId) {
    if let NodeKind::Text(content) = &t.cx.arena.node(node).kind {
        let content = content.clone();
        t.writer().push_static(&content);
    }
}

// --------------------------------------------------------- placeholder

fn placeholder_dom(t: &mut Translator, node: NodeId) {
    let NodeKind::Placeholder { value } = t.cx.arena.node(node).kind else {
        return;
    };
    let analysis = t.analysis(node);
    let section = t.section();
    match analysis.node_ref {
        None => {
            // Constant content folds straight into the skeleton.
            if let Some(lit) = const_eval(t.cx.arena, value) {
                t.writer().append(SkelNode::Text(lit_to_string(&lit)));
            }
        }
        Some(node_ref) => {
            let accessor = t.accessor_of(node_ref);
            t.writer().visit(VisitKind::Replace, accessor.clone());
            t.writer().append(SkelNode::Marker);
            let compiled = t.compile_expr(section, value);
            t.signals.add_value(
                section,
                &analysis.refs,
                "text",
                DomOp::SetText {
                    node: accessor,
                    value: compiled,
                },
            );
        }
    }
}

fn placeholder_html(t: &mut Translator, node: NodeId) {
    let NodeKind::Placeholder { value } = t.cx.arena.node(node).kind else {
        return;
    };
    if t.analysis(node).node_ref.is_none() {
        if let Some(lit) = const_eval(t.cx.arena, value) {
            let text = lit_to_string(&lit);
            t.writer().push_static(&text);
        }
        return;
    }
    let section = t.section();
    let compiled = t.compile_expr(section, value);
    t.writer().push_op(HtmlOp::Text(compiled));
}

// ----------------------------------------------------------------- let

fn let_dom(t: &mut Translator, node: NodeId) {
    let NodeKind::Let { name, value } = &t.cx.arena.node(node).kind else {
        return;
    };
    let name = name.clone();
    let value = *value;
    let section = t.section();
    let refs = t.refs_of(value);
    let accessor = match t.analysis(node).var_binding {
        Some(binding) => t.accessor_of(binding),
        None => return,
    };
    let compiled = t.compile_expr(section, value);
    t.signals.add_value(
        section,
        &refs,
        &name,
        DomOp::Store {
            accessor,
            value: compiled,
        },
    );
}

fn let_html(t: &mut Translator, node: NodeId) {
    let NodeKind::Let { value, .. } = &t.cx.arena.node(node).kind else {
        return;
    };
    let value = *value;
    let section = t.section();
    let accessor = match t.analysis(node).var_binding {
        Some(binding) => t.accessor_of(binding),
        None => return,
    };
    let compiled = t.compile_expr(section, value);
    t.writer().push_op(HtmlOp::Store {
        accessor,
        value: compiled,
    });
}

// ------------------------------------------------------------- element

struct SplitAttrs {
    stat: Vec<(String, String)>,
    dynamic: Vec<(String, ExprId)>,
    events: Vec<(String, ExprId)>,
    /// Spread value with the names later static/dynamic attrs own.
    spreads: Vec<(ExprId, Vec<String>)>,
}

fn split_attrs(t: &Translator, attrs: &[Attr], kept: &[usize]) -> SplitAttrs {
    let mut split = SplitAttrs {
        stat: Vec::new(),
        dynamic: Vec::new(),
        events: Vec::new(),
        spreads: Vec::new(),
    };
    for (pos, &i) in kept.iter().enumerate() {
        match &attrs[i] {
            Attr::Named { name, value, .. } => {
                if is_event_handler(name) {
                    split.events.push((event_name(name), *value));
                } else if let Some(lit) = const_eval(t.cx.arena, *value) {
                    match lit {
                        Lit::Bool(false) | Lit::Null => {}
                        Lit::Bool(true) => split.stat.push((name.clone(), String::new())),
                        other => split.stat.push((name.clone(), lit_to_string(&other))),
                    }
                } else {
                    split.dynamic.push((name.clone(), *value));
                }
            }
            Attr::Spread { value, .. } => {
                let skip = kept[pos + 1..]
                    .iter()
                    .filter_map(|&j| match &attrs[j] {
                        Attr::Named { name, .. } if !is_event_handler(name) => Some(name.clone()),
                        _ => None,
                    })
                    .collect();
                split.spreads.push((*value, skip));
            }
        }
    }
    split
}

fn element_dom(t: &mut Translator, node: NodeId) {
    let NodeKind::Element {
        name, attrs, body, ..
    } = t.cx.arena.node(node).kind.clone()
    else {
        return;
    };
    let analysis = t.analysis(node);
    let section = t.section();
    let split = split_attrs(t, &attrs, &analysis.kept_attrs);

    if let Some(node_ref) = analysis.node_ref {
        let accessor = t.accessor_of(node_ref);
        t.writer().visit(VisitKind::Get, accessor.clone());

        for (attr_name, value) in &split.dynamic {
            let refs = t.refs_of(*value);
            let compiled = t.compile_expr(section, *value);
            t.signals.add_value(
                section,
                &refs,
                attr_name,
                DomOp::SetAttr {
                    node: accessor.clone(),
                    name: attr_name.clone(),
                    value: compiled,
                },
            );
        }
        for (value, skip) in &split.spreads {
            let refs = t.refs_of(*value);
            let compiled = t.compile_expr(section, *value);
            t.signals.add_value(
                section,
                &refs,
                &name,
                DomOp::ApplySpread {
                    node: accessor.clone(),
                    value: compiled,
                    skip: skip.clone(),
                },
            );
        }
        for (event, handler) in &split.events {
            let refs = t.refs_of(*handler);
            let compiled = t.compile_expr(section, *handler);
            t.signals.add_statement(
                Phase::Effect,
                section,
                &refs,
                event,
                DomOp::On {
                    node: accessor.clone(),
                    event: event.clone(),
                    handler: compiled,
                },
            );
        }
    }

    let void = t.cx.resolver.is_void(&name);
    t.writer().open_element(name, split.stat, void);
    if !void {
        for &child in &body {
            t.translate_node(child);
        }
    }
    t.writer().close_element();
}

fn element_html(t: &mut Translator, node: NodeId) {
    let NodeKind::Element {
        name, attrs, body, ..
    } = t.cx.arena.node(node).kind.clone()
    else {
        return;
    };
    let analysis = t.analysis(node);
    let section = t.section();
    let split = split_attrs(t, &attrs, &analysis.kept_attrs);

    t.writer().push_static(&format!("<{name}"));
    for (attr_name, value) in &split.stat {
        let mut escaped = String::new();
        escape_attr(value, &mut escaped);
        if escaped.is_empty() {
            t.writer().push_static(&format!(" {attr_name}"));
        } else {
            t.writer().push_static(&format!(" {attr_name}=\"{escaped}\""));
        }
    }
    for (attr_name, value) in &split.dynamic {
        let compiled = t.compile_expr(section, *value);
        t.writer().push_op(HtmlOp::Attr {
            name: attr_name.clone(),
            value: compiled,
        });
    }
    for (value, skip) in &split.spreads {
        let compiled = t.compile_expr(section, *value);
        t.writer().push_op(HtmlOp::Spread {
            value: compiled,
            skip: skip.clone(),
        });
    }
    t.writer().push_static(">");

    let void = t.cx.resolver.is_void(&name);
    if !void {
        for &child in &body {
            t.translate_node(child);
        }
        t.writer().push_static(&format!("</{name}>"));
    }

    // Elements the client must locate (event targets, tag variables) leave
    // a marker naming their scope slot.
    if analysis.serialize_marker {
        if let Some(node_ref) = analysis.node_ref {
            let accessor = t.accessor_of(node_ref);
            t.writer().push_op(HtmlOp::MarkNode { accessor });
        }
    }
}

// ----------------------------------------------------------------- for

fn compile_loop_source(t: &Translator, section: SectionId, source: &ForSource) -> LoopSource {
    match source {
        ForSource::Of(expr) => LoopSource::Of(t.compile_expr(section, *expr)),
        ForSource::In(expr) => LoopSource::In(t.compile_expr(section, *expr)),
        ForSource::To { to, from, step } => LoopSource::To {
            to: t.compile_expr(section, *to),
            from: from.map(|e| t.compile_expr(section, e)),
            step: step.map(|e| t.compile_expr(section, e)),
        },
    }
}

fn for_dom(t: &mut Translator, node: NodeId) {
    let NodeKind::For {
        source, by, body, ..
    } = t.cx.arena.node(node).kind.clone()
    else {
        return;
    };
    let analysis = t.analysis(node);
    let (Some(node_ref), Some(body_section)) = (analysis.node_ref, analysis.body_section) else {
        return;
    };
    let section = t.section();
    let accessor = t.accessor_of(node_ref);

    if !analysis.only_child_in_parent {
        t.writer().visit(VisitKind::Replace, accessor.clone());
        t.writer().append(SkelNode::Marker);
    }

    let compiled_source = compile_loop_source(t, section, &source);
    // The key expression reads loop params; it evaluates in the body scope.
    let compiled_by = by.map(|e| t.compile_expr(body_section, e));
    t.signals.node_signal(
        section,
        node_ref,
        "loop",
        &analysis.refs,
        DomOp::RunLoop {
            node: accessor,
            body_section: body_section.0,
            source: compiled_source,
            by: compiled_by,
            only_child: analysis.only_child_in_parent,
        },
    );

    t.translate_section(body_section, &body);
}

fn for_html(t: &mut Translator, node: NodeId) {
    let NodeKind::For {
        source, by, body, ..
    } = t.cx.arena.node(node).kind.clone()
    else {
        return;
    };
    let analysis = t.analysis(node);
    let (Some(node_ref), Some(body_section)) = (analysis.node_ref, analysis.body_section) else {
        return;
    };
    let section = t.section();
    let accessor = t.accessor_of(node_ref);

    let compiled_source = compile_loop_source(t, section, &source);
    let compiled_by = by.map(|e| t.compile_expr(body_section, e));
    t.writer().push_op(HtmlOp::Loop {
        body_section: body_section.0,
        source: compiled_source,
        by: compiled_by,
        only_child: analysis.only_child_in_parent,
        node_accessor: accessor.clone(),
    });
    let mut scopes_accessor = accessor;
    scopes_accessor.push(ACCESSOR_LOOP_SCOPES);
    t.writer().push_op(HtmlOp::Record {
        accessor: scopes_accessor,
        value: ResumeSource::LoopScopes,
    });

    t.translate_section(body_section, &body);
}

// ------------------------------------------------------------------ if

fn compile_arms(t: &Translator, section: SectionId, node: NodeId) -> Vec<CondArm> {
    let NodeKind::If { arms } = &t.cx.arena.node(node).kind else {
        return Vec::new();
    };
    let analysis = t.analysis(node);
    arms.iter()
        .enumerate()
        .map(|(i, arm)| CondArm {
            test: arm.test.map(|e| t.compile_expr(section, e)),
            section: analysis.arm_sections.get(i).copied().flatten().map(|s| s.0),
        })
        .collect()
}

fn if_dom(t: &mut Translator, node: NodeId) {
    let analysis = t.analysis(node);
    let (Some(node_ref), Some(branch_slot)) = (analysis.node_ref, analysis.branch_slot) else {
        return;
    };
    let section = t.section();
    let accessor = t.accessor_of(node_ref);
    let branch = t.accessor_of(branch_slot);

    if !analysis.only_child_in_parent {
        t.writer().visit(VisitKind::Replace, accessor.clone());
        t.writer().append(SkelNode::Marker);
    }

    let arms = compile_arms(t, section, node);
    t.signals.node_signal(
        section,
        node_ref,
        "if",
        &analysis.refs,
        DomOp::RunConditional {
            node: accessor,
            branch,
            arms,
            only_child: analysis.only_child_in_parent,
        },
    );

    let NodeKind::If { arms } = t.cx.arena.node(node).kind.clone() else {
        return;
    };
    for (i, arm) in arms.iter().enumerate() {
        if let Some(Some(arm_section)) = analysis.arm_sections.get(i) {
            t.translate_section(*arm_section, &arm.body);
        }
    }
}

fn if_html(t: &mut Translator, node: NodeId) {
    let analysis = t.analysis(node);
    let (Some(node_ref), Some(branch_slot)) = (analysis.node_ref, analysis.branch_slot) else {
        return;
    };
    let section = t.section();
    let accessor = t.accessor_of(node_ref);
    let branch = t.accessor_of(branch_slot);

    let arms = compile_arms(t, section, node);
    t.writer().push_op(HtmlOp::If {
        arms,
        branch_accessor: branch.clone(),
        node_accessor: accessor,
        only_child: analysis.only_child_in_parent,
    });
    let mut branch_record = branch;
    branch_record.push(ACCESSOR_COND_BRANCH);
    t.writer().push_op(HtmlOp::Record {
        accessor: branch_record,
        value: ResumeSource::Branch,
    });

    let NodeKind::If { arms } = t.cx.arena.node(node).kind.clone() else {
        return;
    };
    for (i, arm) in arms.iter().enumerate() {
        if let Some(Some(arm_section)) = analysis.arm_sections.get(i) {
            t.translate_section(*arm_section, &arm.body);
        }
    }
}

// ---------------------------------------------------------- custom tag

/// Build the input value a custom tag passes to its child: positional
/// argument, or named props merged with spreads, attr-tag groups, filled
/// missing props and the body renderer.
fn build_tag_input(t: &mut Translator, node: NodeId, section: SectionId) -> RExpr {
    let NodeKind::CustomTag {
        name,
        args,
        attrs,
        attr_tags,
        ..
    } = t.cx.arena.node(node).kind.clone()
    else {
        return RExpr::Lit(Lit::Null);
    };
    if let Some(&first) = args.first() {
        return t.compile_expr(section, first);
    }

    let analysis = t.analysis(node);
    let shape = t
        .cx
        .resolver
        .resolve_custom(&name)
        .cloned()
        .unwrap_or_default();

    let mut parts: Vec<RExpr> = Vec::new();
    let mut named: Vec<(String, RExpr)> = Vec::new();
    for &i in &analysis.kept_attrs {
        match &attrs[i] {
            Attr::Named {
                name: prop, value, ..
            } => {
                named.push((prop.clone(), t.compile_expr(section, *value)));
            }
            Attr::Spread { value, .. } => {
                if !named.is_empty() {
                    parts.push(RExpr::Object(std::mem::take(&mut named)));
                }
                parts.push(t.compile_expr(section, *value));
            }
        }
    }

    // Attr tags group into props: repeated tags accumulate a sequence,
    // conditional groups collapse into one conditional value.
    let mut groups: Vec<(String, Vec<RExpr>)> = Vec::new();
    for &child in &attr_tags {
        if let Some((prop, value)) = attr_tag_value(t, child, section, &shape) {
            match groups.iter_mut().find(|(n, _)| *n == prop) {
                Some((_, values)) => values.push(value),
                None => groups.push((prop, vec![value])),
            }
        }
    }
    for (prop, mut values) in groups {
        let repeated = shape.attr_tag(&prop).is_some_and(|d| d.repeated);
        let value = if repeated {
            RExpr::AttrSeq(values)
        } else {
            match values.pop() {
                Some(last) => last,
                None => continue,
            }
        };
        named.push((prop, value));
    }

    if shape.takes_body {
        if let Some(body_section) = analysis.body_section {
            named.push((
                "body".to_string(),
                RExpr::Renderer {
                    section: body_section.0,
                },
            ));
        }
    }

    // Declared props the caller never passed are present but null, so the
    // child's reads stay shape-stable.
    for prop in &shape.props {
        let provided = named.iter().any(|(n, _)| n == prop)
            || !parts.is_empty()
            || attrs.iter().any(|a| matches!(a, Attr::Spread { .. }));
        if !provided {
            named.push((prop.clone(), RExpr::Lit(Lit::Null)));
        }
    }

    if parts.is_empty() {
        RExpr::Object(named)
    } else {
        if !named.is_empty() {
            parts.push(RExpr::Object(named));
        }
        RExpr::Merge(parts)
    }
}

/// Value contributed by one attr-tag entry: `@row` becomes an object of
/// its attributes plus a body renderer; an `if` chain over attr tags
/// becomes a conditional value that is unset when no arm matches.
fn attr_tag_value(
    t: &mut Translator,
    node: NodeId,
    section: SectionId,
    shape: &crate::tags::TagShape,
) -> Option<(String, RExpr)> {
    match t.cx.arena.node(node).kind.clone() {
        NodeKind::AttrTag { name, attrs, body } => {
            shape.attr_tag(&name)?;
            let analysis = t.analysis(node);
            let mut fields: Vec<(String, RExpr)> = attrs
                .iter()
                .filter_map(|attr| match attr {
                    Attr::Named {
                        name: prop, value, ..
                    } => Some((prop.clone(), t.compile_expr(section, *value))),
                    Attr::Spread { .. } => None,
                })
                .collect();
            if let Some(body_section) = analysis.body_section {
                fields.push((
                    "body".to_string(),
                    RExpr::Renderer {
                        section: body_section.0,
                    },
                ));
                t.translate_section(body_section, &body);
            }
            Some((name, RExpr::Object(fields)))
        }
        NodeKind::If { arms } => {
            let mut prop = None;
            let mut compiled = Vec::new();
            for arm in &arms {
                let test = arm.test.map(|e| t.compile_expr(section, e));
                let mut value = RExpr::Lit(Lit::Null);
                for &inner in &arm.body {
                    if let Some((name, inner_value)) = attr_tag_value(t, inner, section, shape) {
                        prop.get_or_insert(name);
                        value = inner_value;
                    }
                }
                compiled.push((test, value));
            }
            Some((prop?, RExpr::Cond(compiled)))
        }
        _ => None,
    }
}

fn custom_tag_dom(t: &mut Translator, node: NodeId) {
    let NodeKind::CustomTag { name, body, .. } = t.cx.arena.node(node).kind.clone() else {
        return;
    };
    let analysis = t.analysis(node);
    let Some(child_scope) = analysis.node_ref else {
        // Unresolved tag: analysis reported it, nothing renders.
        return;
    };
    let section = t.section();
    let child = t.accessor_of(child_scope);

    t.writer().visit(VisitKind::Child, child.clone());
    t.writer().append(SkelNode::Child {
        template: name.clone(),
    });

    // Mount first, then feed input: registration order is setup order.
    t.signals.node_signal(
        section,
        child_scope,
        "mount",
        &RefSet::new(),
        DomOp::MountChild {
            child: child.clone(),
            template: name.clone(),
        },
    );

    let input = build_tag_input(t, node, section);
    t.signals.add_value(
        section,
        &analysis.refs,
        &name,
        DomOp::SetChildInput {
            child,
            value: input,
        },
    );

    if let Some(var_binding) = analysis.var_binding {
        let accessor = t.accessor_of(var_binding);
        t.signals.add_value(
            section,
            &analysis.refs,
            &name,
            DomOp::Store {
                accessor,
                value: RExpr::Lit(Lit::Null),
            },
        );
    }

    if let Some(body_section) = analysis.body_section {
        t.translate_section(body_section, &body);
    }
}

fn custom_tag_html(t: &mut Translator, node: NodeId) {
    let NodeKind::CustomTag { name, body, .. } = t.cx.arena.node(node).kind.clone() else {
        return;
    };
    let analysis = t.analysis(node);
    let Some(child_scope) = analysis.node_ref else {
        return;
    };
    let section = t.section();
    let child = t.accessor_of(child_scope);

    let input = build_tag_input(t, node, section);
    t.writer().push_op(HtmlOp::Child {
        template: name,
        child_accessor: child.clone(),
        input,
        body_section: analysis.body_section.map(|s| s.0),
    });
    t.writer().push_op(HtmlOp::Record {
        accessor: child,
        value: ResumeSource::ChildScope,
    });

    if let Some(body_section) = analysis.body_section {
        t.translate_section(body_section, &body);
    }
}

// --------------------------------------------------------- dynamic tag

fn dynamic_tag_attrs(t: &Translator, node: NodeId, section: SectionId) -> Vec<(String, RExpr)> {
    let NodeKind::DynamicTag { attrs, .. } = &t.cx.arena.node(node).kind else {
        return Vec::new();
    };
    let analysis = t.analysis(node);
    analysis
        .kept_attrs
        .iter()
        .filter_map(|&i| match &attrs[i] {
            Attr::Named { name, value, .. } => {
                Some((name.clone(), t.compile_expr(section, *value)))
            }
            Attr::Spread { .. } => None,
        })
        .collect()
}

fn dynamic_tag_dom(t: &mut Translator, node: NodeId) {
    let NodeKind::DynamicTag { name, body, .. } = t.cx.arena.node(node).kind.clone() else {
        return;
    };
    let analysis = t.analysis(node);
    let Some(node_ref) = analysis.node_ref else {
        return;
    };
    let section = t.section();
    let accessor = t.accessor_of(node_ref);

    t.writer().visit(VisitKind::Replace, accessor.clone());
    t.writer().append(SkelNode::Marker);

    let compiled_name = t.compile_expr(section, name);
    let attrs = dynamic_tag_attrs(t, node, section);
    t.signals.node_signal(
        section,
        node_ref,
        "dyntag",
        &analysis.refs,
        DomOp::RunDynamicTag {
            node: accessor,
            name: compiled_name,
            attrs,
            body_section: analysis.body_section.map(|s| s.0),
        },
    );

    if let Some(body_section) = analysis.body_section {
        t.translate_section(body_section, &body);
    }
}

fn dynamic_tag_html(t: &mut Translator, node: NodeId) {
    let NodeKind::DynamicTag { name, body, .. } = t.cx.arena.node(node).kind.clone() else {
        return;
    };
    let analysis = t.analysis(node);
    let Some(node_ref) = analysis.node_ref else {
        return;
    };
    let section = t.section();
    let accessor = t.accessor_of(node_ref);

    let compiled_name = t.compile_expr(section, name);
    let attrs = dynamic_tag_attrs(t, node, section);
    t.writer().push_op(HtmlOp::DynamicTag {
        name: compiled_name,
        attrs,
        body_section: analysis.body_section.map(|s| s.0),
        node_accessor: accessor.clone(),
    });
    t.writer().push_op(HtmlOp::MarkNode { accessor });

    if let Some(body_section) = analysis.body_section {
        t.translate_section(body_section, &body);
    }
}
