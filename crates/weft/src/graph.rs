//! Arena of bindings and sections.
//!
//! Bindings and sections are addressed by integer ids with edges stored as
//! id lists, so the dependency graph stays cycle-safe and serializes
//! cleanly. One [`Graph`] exists per compilation; ids are never reused.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::ast::ExprId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionId(pub u32);

impl SectionId {
    pub const ROOT: Self = Self(0);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingKind {
    /// The template's input parameter.
    Input,
    /// Loop/body parameter.
    Param,
    /// Derived value (`Let`, tag variables on custom tags).
    Derived,
    /// Reference to a live DOM node or child scope.
    Dom,
    /// Control-flow marker (conditional branch slot).
    ControlFlow,
}

impl BindingKind {
    /// DOM references get string accessors; everything else gets ordinals.
    pub fn is_dom(self) -> bool {
        matches!(self, BindingKind::Dom)
    }
}

/// Sorted, deduplicated set of binding ids: the canonical "what does this
/// expression depend on" value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefSet(SmallVec<[BindingId; 4]>);

impl RefSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(binding: BindingId) -> Self {
        let mut set = Self::new();
        set.add(binding);
        set
    }

    pub fn add(&mut self, binding: BindingId) {
        if let Err(pos) = self.0.binary_search(&binding) {
            self.0.insert(pos, binding);
        }
    }

    pub fn remove(&mut self, binding: BindingId) {
        if let Ok(pos) = self.0.binary_search(&binding) {
            self.0.remove(pos);
        }
    }

    pub fn union(&mut self, other: &RefSet) {
        for &binding in &other.0 {
            self.add(binding);
        }
    }

    pub fn contains(&self, binding: BindingId) -> bool {
        self.0.binary_search(&binding).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = BindingId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<BindingId> for RefSet {
    fn from_iter<T: IntoIterator<Item = BindingId>>(iter: T) -> Self {
        let mut set = Self::new();
        for binding in iter {
            set.add(binding);
        }
        set
    }
}

/// Compile-time key for a position inside a section's runtime scope.
///
/// Value bindings use their declaration ordinal within the owning section,
/// DOM references use `#name/N`. Both are unique per section and stable
/// under unrelated edits (declaration order, not tree position).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Accessor {
    Index(u32),
    Named(String),
}

/// Suffix marking a loop's serialized scope-key map (or, for single-child
/// loops, the ordered scope-id list).
pub const ACCESSOR_LOOP_SCOPES: char = '!';
/// Suffix marking a conditional's active-branch slot.
pub const ACCESSOR_COND_BRANCH: char = '(';

impl Accessor {
    pub fn key(&self) -> String {
        match self {
            Accessor::Index(i) => i.to_string(),
            Accessor::Named(name) => name.clone(),
        }
    }

    pub fn suffixed(&self, suffix: char) -> String {
        let mut key = self.key();
        key.push(suffix);
        key
    }
}

#[derive(Clone, Debug)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    pub section: SectionId,
    /// Expressions that read this binding, in tracking order.
    pub downstream: Vec<ExprId>,
    /// Sections that capture this binding from an enclosing scope.
    pub closures: Vec<SectionId>,
    /// Bindings this binding's own value reads (derived values, params).
    pub deps: RefSet,
    pub constant_violations: u32,
    accessor: Option<Accessor>,
    stateful: bool,
}

impl Binding {
    /// Only valid after [`Graph::finalize`].
    pub fn accessor(&self) -> &Accessor {
        match &self.accessor {
            Some(accessor) => accessor,
            None => unreachable!("accessor read before graph finalize"),
        }
    }

    pub fn is_stateful(&self) -> bool {
        self.stateful
    }
}

#[derive(Clone, Debug)]
pub struct Section {
    pub name: String,
    pub parent: Option<SectionId>,
    /// Bindings declared inside this section, in declaration order.
    pub bindings: Vec<BindingId>,
    /// Serialize this section's scope even with no local dynamic content.
    pub force_resume: bool,
    /// Set when the section is parameterized (loop body params): the
    /// references of the expression that feeds it.
    pub upstream: Option<RefSet>,
}

#[derive(Clone, Debug, Default)]
pub struct Graph {
    bindings: Vec<Binding>,
    sections: Vec<Section>,
    finalized: bool,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_section(&mut self, name: impl Into<String>, parent: Option<SectionId>) -> SectionId {
        debug_assert!(!self.finalized, "section created after finalize");
        let id = SectionId(self.sections.len() as u32);
        self.sections.push(Section {
            name: name.into(),
            parent,
            bindings: Vec::new(),
            force_resume: false,
            upstream: None,
        });
        id
    }

    pub fn create_binding(
        &mut self,
        name: impl Into<String>,
        kind: BindingKind,
        section: SectionId,
    ) -> BindingId {
        debug_assert!(!self.finalized, "binding created after finalize");
        let id = BindingId(self.bindings.len() as u32);
        self.bindings.push(Binding {
            name: name.into(),
            kind,
            section,
            downstream: Vec::new(),
            closures: Vec::new(),
            deps: RefSet::new(),
            constant_violations: 0,
            accessor: None,
            stateful: false,
        });
        self.sections[section.0 as usize].bindings.push(id);
        id
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0 as usize]
    }

    pub fn binding_mut(&mut self, id: BindingId) -> &mut Binding {
        debug_assert!(!self.finalized, "binding mutated after finalize");
        &mut self.bindings[id.0 as usize]
    }

    pub fn section(&self, id: SectionId) -> &Section {
        &self.sections[id.0 as usize]
    }

    pub fn section_mut(&mut self, id: SectionId) -> &mut Section {
        &mut self.sections[id.0 as usize]
    }

    pub fn sections(&self) -> impl Iterator<Item = (SectionId, &Section)> {
        self.sections
            .iter()
            .enumerate()
            .map(|(i, s)| (SectionId(i as u32), s))
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Record that `section` captures `binding` from an enclosing scope.
    pub fn add_closure(&mut self, binding: BindingId, section: SectionId) {
        let b = &mut self.bindings[binding.0 as usize];
        if !b.closures.contains(&section) {
            b.closures.push(section);
        }
    }

    /// Number of parent hops from `from` up to `to`. `None` when `to` does
    /// not enclose `from`.
    pub fn hops_between(&self, from: SectionId, to: SectionId) -> Option<u16> {
        let mut hops = 0u16;
        let mut cursor = Some(from);
        while let Some(current) = cursor {
            if current == to {
                return Some(hops);
            }
            hops += 1;
            cursor = self.section(current).parent;
        }
        None
    }

    /// Assign accessors and compute stateful classification. Idempotent
    /// inputs produce byte-identical results: everything is derived from
    /// declaration order.
    pub fn finalize(&mut self) {
        for section in 0..self.sections.len() {
            let mut value_ordinal = 0u32;
            let mut dom_ordinal = 0u32;
            for binding_id in self.sections[section].bindings.clone() {
                let binding = &mut self.bindings[binding_id.0 as usize];
                debug_assert!(binding.accessor.is_none(), "duplicate accessor assignment");
                binding.accessor = Some(if binding.kind.is_dom() {
                    let accessor = Accessor::Named(format!("#{}/{}", binding.name, dom_ordinal));
                    dom_ordinal += 1;
                    accessor
                } else {
                    let accessor = Accessor::Index(value_ordinal);
                    value_ordinal += 1;
                    accessor
                });
            }
        }
        self.classify_stateful();
        self.mark_forced_resume();
        self.finalized = true;
    }

    /// Both ends of a stateful closure must resume: the owner so the value
    /// is restored, the captors so the subscription reattaches.
    fn mark_forced_resume(&mut self) {
        let mut force = vec![false; self.sections.len()];
        for id in 0..self.sections.len() as u32 {
            force[id as usize] = self.has_stateful_closures(SectionId(id));
        }
        for binding in &self.bindings {
            if binding.stateful {
                for &captor in &binding.closures {
                    force[captor.0 as usize] = true;
                }
            }
        }
        for (section, forced) in self.sections.iter_mut().zip(force) {
            section.force_resume = forced;
        }
    }

    /// A binding is stateful when it can change after initial render:
    /// inputs and mutated bindings are sources; params and derived values
    /// are stateful when reachable from a stateful dependency. Constant
    /// content stays inlined and is never revisited.
    fn classify_stateful(&mut self) {
        for binding in &mut self.bindings {
            binding.stateful = matches!(binding.kind, BindingKind::Input)
                || binding.constant_violations > 0;
        }
        // Dependency edges may skip creation order, so iterate to fixpoint.
        loop {
            let mut changed = false;
            for i in 0..self.bindings.len() {
                if self.bindings[i].stateful {
                    continue;
                }
                if matches!(self.bindings[i].kind, BindingKind::Dom) {
                    continue;
                }
                let reachable = self.bindings[i]
                    .deps
                    .iter()
                    .any(|dep| self.bindings[dep.0 as usize].stateful);
                if reachable {
                    self.bindings[i].stateful = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// True when a descendant section of `section` closes over any
    /// stateful binding declared in it.
    fn has_stateful_closures(&self, section: SectionId) -> bool {
        self.section(section).bindings.iter().any(|&id| {
            let binding = self.binding(id);
            binding.is_stateful() && !binding.closures.is_empty()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refset_is_sorted_and_unique() {
        let mut set = RefSet::new();
        set.add(BindingId(3));
        set.add(BindingId(1));
        set.add(BindingId(3));
        set.add(BindingId(2));
        let ids: Vec<_> = set.iter().collect();
        assert_eq!(ids, vec![BindingId(1), BindingId(2), BindingId(3)]);
    }

    #[test]
    fn accessors_unique_within_section() {
        let mut graph = Graph::new();
        let root = graph.create_section("program", None);
        let a = graph.create_binding("x", BindingKind::Derived, root);
        let b = graph.create_binding("y", BindingKind::Derived, root);
        let c = graph.create_binding("div", BindingKind::Dom, root);
        let d = graph.create_binding("div", BindingKind::Dom, root);
        graph.finalize();

        let keys: Vec<_> = [a, b, c, d]
            .iter()
            .map(|&id| graph.binding(id).accessor().key())
            .collect();
        assert_eq!(keys, vec!["0", "1", "#div/0", "#div/1"]);
    }

    #[test]
    fn stateful_reaches_through_derived() {
        let mut graph = Graph::new();
        let root = graph.create_section("program", None);
        let input = graph.create_binding("input", BindingKind::Input, root);
        let derived = graph.create_binding("greeting", BindingKind::Derived, root);
        let constant = graph.create_binding("title", BindingKind::Derived, root);
        graph.binding_mut(derived).deps = RefSet::of(input);
        graph.finalize();

        assert!(graph.binding(input).is_stateful());
        assert!(graph.binding(derived).is_stateful());
        assert!(!graph.binding(constant).is_stateful());
    }

    #[test]
    fn stateful_closures_force_both_scopes_to_resume() {
        let mut graph = Graph::new();
        let root = graph.create_section("program", None);
        let body = graph.create_section("forBody1", Some(root));
        let quiet = graph.create_section("ifBody2", Some(root));
        let input = graph.create_binding("input", BindingKind::Input, root);
        let count = graph.create_binding("count", BindingKind::Derived, root);
        graph.binding_mut(count).deps = RefSet::of(input);
        graph.add_closure(count, body);
        graph.finalize();

        assert!(graph.section(root).force_resume);
        assert!(graph.section(body).force_resume);
        assert!(!graph.section(quiet).force_resume);
    }

    #[test]
    fn hops_between_sections() {
        let mut graph = Graph::new();
        let root = graph.create_section("program", None);
        let body = graph.create_section("forBody1", Some(root));
        let inner = graph.create_section("ifBody2", Some(body));
        assert_eq!(graph.hops_between(inner, root), Some(2));
        assert_eq!(graph.hops_between(inner, body), Some(1));
        assert_eq!(graph.hops_between(root, inner), None);
    }
}
