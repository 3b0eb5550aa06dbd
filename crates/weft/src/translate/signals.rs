//! Signal synthesis for the DOM target.
//!
//! Signals are deduplicated by key: value signals merge on (section,
//! reference set), control-flow signals on (section, node reference, role).
//! Ops appended under the same key keep source order, so identical input
//! always yields an identical signal table.

use rustc_hash::FxHashMap;

use crate::artifact::{DomOp, SignalId, SignalSpec, TriggerLink};
use crate::graph::{BindingId, BindingKind, Graph, RefSet, SectionId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Render,
    Effect,
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum SignalKey {
    Value(SectionId, RefSet),
    Node(SectionId, BindingId, &'static str),
}

struct SignalBuild {
    section: SectionId,
    name: String,
    refs: RefSet,
    render: Vec<DomOp>,
    effect: Vec<DomOp>,
}

#[derive(Default)]
pub struct SignalTable {
    signals: Vec<SignalBuild>,
    by_key: FxHashMap<SignalKey, SignalId>,
}

impl SignalTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&mut self, key: SignalKey, section: SectionId, name: &str, refs: &RefSet) -> SignalId {
        if let Some(&id) = self.by_key.get(&key) {
            self.signals[id.0 as usize].refs.union(refs);
            return id;
        }
        let id = SignalId(self.signals.len() as u32);
        self.signals.push(SignalBuild {
            section,
            name: name.to_string(),
            refs: refs.clone(),
            render: Vec::new(),
            effect: Vec::new(),
        });
        self.by_key.insert(key, id);
        id
    }

    /// Append a render-phase op to the value signal for `refs`.
    pub fn add_value(&mut self, section: SectionId, refs: &RefSet, name: &str, op: DomOp) -> SignalId {
        self.add_statement(Phase::Render, section, refs, name, op)
    }

    /// Append an op to the value signal for `refs` in the given phase.
    /// Effects run after every render op of the section has settled.
    pub fn add_statement(
        &mut self,
        phase: Phase,
        section: SectionId,
        refs: &RefSet,
        name: &str,
        op: DomOp,
    ) -> SignalId {
        let key = SignalKey::Value(section, refs.clone());
        let id = self.get_or_create(key, section, name, refs);
        match phase {
            Phase::Render => self.signals[id.0 as usize].render.push(op),
            Phase::Effect => self.signals[id.0 as usize].effect.push(op),
        }
        id
    }

    /// Signal owned by a node reference (loop, conditional, dynamic tag,
    /// child mount). At most one exists per (section, node, role).
    pub fn node_signal(
        &mut self,
        section: SectionId,
        node: BindingId,
        role: &'static str,
        refs: &RefSet,
        op: DomOp,
    ) -> SignalId {
        let key = SignalKey::Node(section, node, role);
        let id = self.get_or_create(key, section, role, refs);
        self.signals[id.0 as usize].render.push(op);
        id
    }

    /// Close the table: compute exposure, per-section setup lists, and the
    /// invalidation map. A signal is exposed exactly when it reads a
    /// binding declared in an enclosing section; only exposed signals ever
    /// appear in another section's trigger links.
    pub fn finish(self, graph: &Graph) -> SignalOutput {
        let section_count = graph.section_count();
        let mut specs = Vec::with_capacity(self.signals.len());
        let mut setup: Vec<Vec<SignalId>> = vec![Vec::new(); section_count];
        let mut triggers: Vec<Vec<(String, Vec<TriggerLink>)>> = vec![Vec::new(); section_count];

        for (i, signal) in self.signals.iter().enumerate() {
            let id = SignalId(i as u32);
            let exposed = signal
                .refs
                .iter()
                .any(|binding| graph.binding(binding).section != signal.section);
            setup[signal.section.0 as usize].push(id);
            specs.push(SignalSpec {
                id,
                section: signal.section.0,
                name: signal.name.clone(),
                exposed,
                render: signal.render.clone(),
                effect: signal.effect.clone(),
            });
        }

        for (section_id, section) in graph.sections() {
            for &binding_id in &section.bindings {
                let binding = graph.binding(binding_id);
                if !binding.is_stateful() {
                    continue;
                }
                if matches!(binding.kind, BindingKind::Dom | BindingKind::ControlFlow) {
                    continue;
                }
                let links: Vec<TriggerLink> = self
                    .signals
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.refs.contains(binding_id))
                    .map(|(i, s)| TriggerLink {
                        signal: SignalId(i as u32),
                        section: s.section.0,
                    })
                    .collect();
                if !links.is_empty() {
                    triggers[section_id.0 as usize]
                        .push((binding.accessor().key(), links));
                }
            }
        }

        SignalOutput {
            specs,
            setup,
            triggers,
        }
    }
}

pub struct SignalOutput {
    pub specs: Vec<SignalSpec>,
    /// Per section: signals to run at scope creation, in creation order.
    pub setup: Vec<Vec<SignalId>>,
    /// Per section: stateful slot accessor -> invalidation links.
    pub triggers: Vec<Vec<(String, Vec<TriggerLink>)>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::RExpr;
    use crate::ast::Lit;

    fn noop(accessor: &str) -> DomOp {
        DomOp::Store {
            accessor: accessor.into(),
            value: RExpr::Lit(Lit::Null),
        }
    }

    #[test]
    fn value_signals_merge_on_refs() {
        let mut graph = Graph::new();
        let root = graph.create_section("program", None);
        let input = graph.create_binding("input", BindingKind::Input, root);
        graph.finalize();

        let refs = RefSet::of(input);
        let mut table = SignalTable::new();
        let a = table.add_value(root, &refs, "text", noop("0"));
        let b = table.add_value(root, &refs, "text", noop("1"));
        assert_eq!(a, b);

        let out = table.finish(&graph);
        assert_eq!(out.specs.len(), 1);
        assert_eq!(out.specs[0].render.len(), 2);
    }

    #[test]
    fn stateful_bindings_get_trigger_links() {
        let mut graph = Graph::new();
        let root = graph.create_section("program", None);
        let input = graph.create_binding("input", BindingKind::Input, root);
        let body = graph.create_section("forBody1", Some(root));
        graph.finalize();

        let mut table = SignalTable::new();
        table.add_value(body, &RefSet::of(input), "text", noop("0"));
        let out = table.finish(&graph);

        // The reading signal lives in the loop body, so it is exposed and
        // the root's input slot links across sections.
        assert!(out.specs[0].exposed);
        let (accessor, links) = &out.triggers[0][0];
        assert_eq!(accessor, "0");
        assert_eq!(links[0].section, body.0);
    }

    #[test]
    fn local_reads_are_not_exposed() {
        let mut graph = Graph::new();
        let root = graph.create_section("program", None);
        let input = graph.create_binding("input", BindingKind::Input, root);
        graph.finalize();

        let mut table = SignalTable::new();
        table.add_value(root, &RefSet::of(input), "text", noop("0"));
        let out = table.finish(&graph);
        assert!(!out.specs[0].exposed);
    }
}
