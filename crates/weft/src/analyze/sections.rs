//! Section partitioning: scoping units bounded by control flow, custom-tag
//! bodies and the program root, each with its own update boundary.

use crate::ast::{NodeId, NodeKind};
use crate::context::Compilation;
use crate::graph::{BindingId, BindingKind, SectionId};

/// Open a new section rooted at a structural boundary. Section names are
/// derived from the boundary kind and the section's ordinal, so recompiling
/// unchanged source reproduces them exactly.
pub fn start_section(cx: &mut Compilation, kind: &str, parent: SectionId, root: NodeId) -> SectionId {
    let ordinal = cx.graph.section_count();
    let section = cx
        .graph
        .create_section(format!("{kind}{ordinal}"), Some(parent));
    cx.set_section(root, section);
    section
}

/// Loop/conditional single-child collapsing: when the control-flow tag is
/// the only child of a native element, it reuses the parent element's node
/// reference instead of allocating a synthetic marker. Returns that
/// reference, creating the parent's binding on demand. Addressing is
/// identical either way; this also holds for table hosts (`tbody`, `tr`,
/// `option` parents), which are plain native elements here.
pub fn only_child_parent_ref(cx: &mut Compilation, node: NodeId) -> Option<BindingId> {
    let parent = cx.arena.parent(node)?;
    let NodeKind::Element { name, body, .. } = &cx.arena.node(parent).kind else {
        return None;
    };
    if body.len() != 1 {
        return None;
    }
    let tag_name = name.clone();
    if let Some(existing) = cx.analysis(parent).and_then(|a| a.node_ref) {
        return Some(existing);
    }
    let section = cx.section_of(parent);
    let binding = cx.graph.create_binding(tag_name, BindingKind::Dom, section);
    cx.analysis_mut(parent).node_ref = Some(binding);
    Some(binding)
}

/// Synthetic marker binding for a control-flow tag that could not collapse
/// onto its parent.
pub fn marker_binding(cx: &mut Compilation, section: SectionId) -> BindingId {
    cx.graph.create_binding("text", BindingKind::Dom, section)
}
