//! Compilation context: owns the graph and all per-node analysis state for
//! one file. Threaded explicitly through every analyze/translate call so
//! files compile independently; there is no process-wide compiler state.

use rustc_hash::FxHashMap;

use crate::ast::{ExprId, NodeId, TemplateArena};
use crate::error::CompileError;
use crate::graph::{BindingId, Graph, RefSet, SectionId};
use crate::tags::TagResolver;

/// Analysis metadata attached to a template node. Replaces the original
/// design's hidden per-node fields with an explicit side table owned by the
/// compilation and discarded with it.
#[derive(Clone, Debug, Default)]
pub struct NodeAnalysis {
    /// Binding for the live DOM node this template node owns (native tag
    /// reference, loop/conditional marker, or child scope).
    pub node_ref: Option<BindingId>,
    /// Merged references for the whole tag (inputs, spreads, attr tags).
    pub refs: RefSet,
    /// Indices into the node's attribute list that survive duplicate
    /// dropping, in source order (last occurrence of a name wins).
    pub kept_attrs: Vec<usize>,
    /// Section created for this node's body, when the node is a boundary.
    pub body_section: Option<SectionId>,
    /// The node must keep a marker in server output so the client can
    /// locate it during resume.
    pub serialize_marker: bool,
    /// Loop/conditional is the only child of a native element and reuses
    /// the parent's node reference instead of a synthetic marker.
    pub only_child_in_parent: bool,
    /// Conditional branch slot (active arm index at runtime).
    pub branch_slot: Option<BindingId>,
    /// Section per conditional arm, parallel to the arm list; `None` for
    /// empty arms.
    pub arm_sections: Vec<Option<SectionId>>,
    /// Binding declared by the node itself: a `let` value or a custom
    /// tag's variable (`<counter/c>`).
    pub var_binding: Option<BindingId>,
}

/// Lexical environment mapping in-scope names to bindings, with shadowing.
#[derive(Debug, Default)]
pub struct ScopeEnv {
    entries: Vec<(String, BindingId)>,
}

impl ScopeEnv {
    pub fn push(&mut self, name: impl Into<String>, binding: BindingId) {
        self.entries.push((name.into(), binding));
    }

    pub fn lookup(&self, name: &str) -> Option<BindingId> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, b)| *b)
    }

    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    pub fn truncate(&mut self, mark: usize) {
        self.entries.truncate(mark);
    }
}

pub struct Compilation<'a> {
    pub arena: &'a TemplateArena,
    pub resolver: &'a dyn TagResolver,
    pub graph: Graph,
    pub scope: ScopeEnv,
    pub errors: Vec<CompileError>,
    /// References recorded per tracked (root) expression.
    expr_refs: FxHashMap<ExprId, RefSet>,
    /// Name resolution memo: which binding each `Var` (or assignment
    /// target) resolved to. The lexical environment is torn down as the
    /// tree unwinds, so translate reads resolutions from here.
    resolved: FxHashMap<ExprId, BindingId>,
    analysis: FxHashMap<NodeId, NodeAnalysis>,
    section_of: FxHashMap<NodeId, SectionId>,
    /// The template input binding, present when the input is read at all.
    pub input_binding: Option<BindingId>,
}

impl<'a> Compilation<'a> {
    pub fn new(arena: &'a TemplateArena, resolver: &'a dyn TagResolver) -> Self {
        Self {
            arena,
            resolver,
            graph: Graph::new(),
            scope: ScopeEnv::default(),
            errors: Vec::new(),
            expr_refs: FxHashMap::default(),
            resolved: FxHashMap::default(),
            analysis: FxHashMap::default(),
            section_of: FxHashMap::default(),
            input_binding: None,
        }
    }

    pub fn analysis(&self, node: NodeId) -> Option<&NodeAnalysis> {
        self.analysis.get(&node)
    }

    pub fn analysis_mut(&mut self, node: NodeId) -> &mut NodeAnalysis {
        self.analysis.entry(node).or_default()
    }

    pub fn set_section(&mut self, node: NodeId, section: SectionId) {
        self.section_of.insert(node, section);
    }

    /// Nearest enclosing section for a node.
    pub fn section_of(&self, node: NodeId) -> SectionId {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if let Some(&section) = self.section_of.get(&current) {
                return section;
            }
            cursor = self.arena.parent(current);
        }
        SectionId::ROOT
    }

    pub fn set_expr_refs(&mut self, expr: ExprId, refs: RefSet) {
        self.expr_refs.insert(expr, refs);
    }

    pub fn expr_refs(&self, expr: ExprId) -> RefSet {
        self.expr_refs.get(&expr).cloned().unwrap_or_default()
    }

    pub fn resolve(&mut self, expr: ExprId, binding: BindingId) {
        self.resolved.insert(expr, binding);
    }

    pub fn resolved(&self, expr: ExprId) -> Option<BindingId> {
        self.resolved.get(&expr).copied()
    }

    /// Remove a tracked expression's contribution to the graph: its refs
    /// are cleared and it disappears from every binding's downstream list.
    /// Used for duplicate attributes and props the child never consumes.
    pub fn drop_references(&mut self, expr: ExprId) {
        if let Some(refs) = self.expr_refs.remove(&expr) {
            for binding in refs.iter() {
                self.graph
                    .binding_mut(binding)
                    .downstream
                    .retain(|&e| e != expr);
            }
        }
    }

    pub fn error(&mut self, error: CompileError) {
        self.errors.push(error);
    }
}
