//! Resume plan emission for the HTML target.
//!
//! Server output carries two things the client needs to reattach without
//! reanalyzing the template: comment markers locating scopes in the
//! rendered HTML, and a serialized payload of scope properties. Only
//! scopes with stateful content (or forced by a stateful closure) are
//! written; purely static subtrees resume for free.

use crate::artifact::{HtmlOp, RExpr, ResumeSource};
use crate::graph::{BindingKind, Graph, SectionId};

/// Comment marker opening a resumable scope: `<!--[12-->`.
pub fn scope_start_marker(scope: u64) -> String {
    format!("<!--[{scope}-->")
}

/// Comment marker closing a control-flow region and naming the scope slot
/// its host node resumes into: `<!--]12 #div/0-->`.
pub fn control_end_marker(scope: u64, accessor: &str) -> String {
    format!("<!--]{scope} {accessor}-->")
}

/// Record ops for a section's value slots, appended after its body has
/// rendered. Every value slot is recorded because a reattached client
/// reruns the section's render program against the restored scope; which
/// SCOPES serialize at all is gated separately. Control-flow entries
/// (loop scope maps, branch records, child scope links) are recorded at
/// their op sites instead so they land next to the content they describe.
pub fn value_records(graph: &Graph, section: SectionId) -> Vec<HtmlOp> {
    let mut ops = Vec::new();
    for &binding_id in &graph.section(section).bindings {
        let binding = graph.binding(binding_id);
        if matches!(binding.kind, BindingKind::Dom | BindingKind::ControlFlow) {
            continue;
        }
        let accessor = binding.accessor().key();
        ops.push(HtmlOp::Record {
            accessor: accessor.clone(),
            value: ResumeSource::Expr(RExpr::Read { hops: 0, accessor }),
        });
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn markers_are_paired_by_scope_id() {
        assert_eq!(scope_start_marker(3), "<!--[3-->");
        assert_eq!(control_end_marker(3, "#div/0"), "<!--]3 #div/0-->");
    }

    #[test]
    fn node_slots_are_never_recorded() {
        let mut graph = Graph::new();
        let root = graph.create_section("program", None);
        graph.create_binding("input", BindingKind::Input, root);
        graph.create_binding("title", BindingKind::Derived, root);
        graph.create_binding("div", BindingKind::Dom, root);
        graph.finalize();

        let accessors: Vec<String> = value_records(&graph, root)
            .into_iter()
            .map(|op| match op {
                HtmlOp::Record { accessor, .. } => accessor,
                _ => panic!("expected record op"),
            })
            .collect();
        assert_eq!(accessors, ["0", "1"]);
    }
}
