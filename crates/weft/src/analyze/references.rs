//! Reference tracking: records which bindings each expression reads and
//! propagates that into the dependency graph.

use crate::ast::{Attr, ExprId, ExprKind, InterpPart, Lit, NodeId, NodeKind, TemplateArena, UnaryOp};
use crate::context::Compilation;
use crate::error::CompileError;
use crate::graph::{RefSet, SectionId};

/// Walk `expr` and record every binding it reads. The resulting set is
/// stored on the expression; each referenced binding gains `expr` in its
/// downstream list, and a closure edge when the read crosses sections.
/// Assignments count as constant violations on their target.
pub fn track_expr(cx: &mut Compilation, section: SectionId, expr: ExprId) -> RefSet {
    let mut refs = RefSet::new();
    collect(cx, section, expr, expr, &mut refs);
    cx.set_expr_refs(expr, refs.clone());
    refs
}

fn collect(
    cx: &mut Compilation,
    section: SectionId,
    root: ExprId,
    expr: ExprId,
    refs: &mut RefSet,
) {
    let node = cx.arena.expr(expr).clone();
    match node.kind {
        ExprKind::Lit(_) => {}
        ExprKind::Var(name) => match cx.scope.lookup(&name) {
            Some(binding) => {
                cx.resolve(expr, binding);
                refs.add(binding);
                cx.graph.binding_mut(binding).downstream.push(root);
                if cx.graph.binding(binding).section != section {
                    cx.graph.add_closure(binding, section);
                }
            }
            None => cx.error(CompileError::structural(
                node.span,
                format!("cannot find `{name}` in scope"),
            )),
        },
        ExprKind::Member { object, .. } => collect(cx, section, root, object, refs),
        ExprKind::Interp(parts) => {
            for part in parts {
                if let InterpPart::Expr(inner) = part {
                    collect(cx, section, root, inner, refs);
                }
            }
        }
        ExprKind::Unary { operand, .. } => collect(cx, section, root, operand, refs),
        ExprKind::Binary { lhs, rhs, .. } => {
            collect(cx, section, root, lhs, refs);
            collect(cx, section, root, rhs, refs);
        }
        ExprKind::Assign { target, value } => {
            match cx.scope.lookup(&target) {
                Some(binding) => {
                    cx.resolve(expr, binding);
                    cx.graph.binding_mut(binding).constant_violations += 1;
                }
                None => cx.error(CompileError::structural(
                    node.span,
                    format!("cannot assign to unknown `{target}`"),
                )),
            }
            collect(cx, section, root, value, refs);
        }
    }
}

/// Union several tracked expressions' sets onto one owner node, so the tag
/// as a whole knows everything its inputs depend on.
pub fn merge_into_node(cx: &mut Compilation, node: NodeId, exprs: &[ExprId]) {
    let mut merged = RefSet::new();
    for &expr in exprs {
        merged.union(&cx.expr_refs(expr));
    }
    cx.analysis_mut(node).refs.union(&merged);
}

/// Every leaf expression a tag invocation feeds into its child: arguments,
/// attribute values, and the attributes of nested attr-tag bodies. Tracking
/// (or dropping) must be applied to all of them so unused inputs can be
/// pruned without leaving dangling downstream edges.
pub fn all_tag_reference_exprs(arena: &TemplateArena, node: NodeId, out: &mut Vec<ExprId>) {
    if let NodeKind::CustomTag {
        args,
        attrs,
        attr_tags,
        ..
    } = &arena.node(node).kind
    {
        out.extend(args.iter().copied());
        for attr in attrs {
            out.push(attr.value());
        }
        for &child in attr_tags {
            if let NodeKind::AttrTag { attrs, .. } = &arena.node(child).kind {
                for attr in attrs {
                    out.push(attr.value());
                }
            }
        }
    }
}

/// Compile-time constant value, used to inline attribute and text content
/// that can never change into the static skeleton.
pub fn const_eval(arena: &TemplateArena, expr: ExprId) -> Option<Lit> {
    match &arena.expr(expr).kind {
        ExprKind::Lit(lit) => Some(lit.clone()),
        ExprKind::Interp(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    InterpPart::Text(text) => out.push_str(text),
                    InterpPart::Expr(inner) => match const_eval(arena, *inner)? {
                        Lit::Str(s) => out.push_str(&s),
                        Lit::Int(i) => out.push_str(&i.to_string()),
                        Lit::Bool(b) => out.push_str(if b { "true" } else { "false" }),
                        Lit::Null => {}
                    },
                }
            }
            Some(Lit::Str(out))
        }
        ExprKind::Unary { op, operand } => match (op, const_eval(arena, *operand)?) {
            (UnaryOp::Not, Lit::Bool(b)) => Some(Lit::Bool(!b)),
            (UnaryOp::Neg, Lit::Int(i)) => Some(Lit::Int(-i)),
            _ => None,
        },
        _ => None,
    }
}

/// Deduplicate a native tag's attributes: the last occurrence of each name
/// wins; everything after a spread stays (spreads merge at runtime).
/// Returns surviving indices in source order; dropped values must have
/// their references removed by the caller.
pub fn dedupe_attrs(attrs: &[Attr]) -> (Vec<usize>, Vec<usize>) {
    let mut seen: Vec<&str> = Vec::new();
    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    for (i, attr) in attrs.iter().enumerate().rev() {
        match attr {
            Attr::Named { name, .. } => {
                if seen.iter().any(|s| s == name) {
                    dropped.push(i);
                } else {
                    seen.push(name);
                    kept.push(i);
                }
            }
            Attr::Spread { .. } => kept.push(i),
        }
    }
    kept.reverse();
    dropped.reverse();
    (kept, dropped)
}
