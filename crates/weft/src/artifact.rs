//! Compiled output shared by the two backends.
//!
//! The translate pass lowers the analyzed template into one [`Artifact`]
//! per (file, target): a static skeleton, a walk string and signal table
//! for the DOM target, or a linear op program for the HTML target. Section
//! names and accessor keys are identical across targets for the same
//! source, which is what lets the serialized HTML resume payload drive the
//! DOM target's setup without re-analysis.

use serde::{Deserialize, Serialize};

use crate::ast::{BinaryOp, Lit, UnaryOp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Dom,
    Html,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(pub u32);

/// Runtime expression: the compiled form of a template expression, with
/// every binding reference resolved to a scope read or inlined.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RExpr {
    Lit(Lit),
    /// Read a scope slot `hops` levels up from the evaluating scope.
    Read { hops: u16, accessor: String },
    Member { object: Box<RExpr>, prop: String },
    Concat(Vec<RExpr>),
    Unary { op: UnaryOp, operand: Box<RExpr> },
    Binary { op: BinaryOp, lhs: Box<RExpr>, rhs: Box<RExpr> },
    /// Write a scope slot and cascade its triggers, then yield the value.
    Assign { hops: u16, accessor: String, value: Box<RExpr> },
    Object(Vec<(String, RExpr)>),
    /// Merge objects left to right; later keys win. Used when spreads mix
    /// with named props.
    Merge(Vec<RExpr>),
    /// Attr-tag sequence: first value plus overflow, in source order.
    AttrSeq(Vec<RExpr>),
    /// First matching arm's value; evaluates to Unset when no arm matches
    /// (a conditional group without `else` leaves prior state untouched).
    Cond(Vec<(Option<RExpr>, RExpr)>),
    /// Reference to a compiled section usable as a renderer value.
    Renderer { section: u32 },
}

/// One node of the static template skeleton. Rendered to text for the
/// HTML target and instantiated directly by the DOM target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SkelNode {
    Element {
        name: String,
        /// Compile-time-constant attributes, inlined and never revisited.
        attrs: Vec<(String, String)>,
        children: Vec<SkelNode>,
        void: bool,
    },
    Text(String),
    /// Dynamic position; renders as `<!>` in skeleton text.
    Marker,
    /// Nested child template mount point.
    Child { template: String },
}

/// DOM-target update operation, interpreted inside a signal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DomOp {
    SetText {
        node: String,
        value: RExpr,
    },
    SetAttr {
        node: String,
        name: String,
        value: RExpr,
    },
    /// Apply a spread object to the node, skipping names owned by later
    /// static attributes.
    ApplySpread {
        node: String,
        value: RExpr,
        skip: Vec<String>,
    },
    /// Attach an event listener (effect phase).
    On {
        node: String,
        event: String,
        handler: RExpr,
    },
    /// Store a computed value into the local scope.
    Store {
        accessor: String,
        value: RExpr,
    },
    /// Create and set up a child template instance at the stored child
    /// scope slot.
    MountChild {
        child: String,
        template: String,
    },
    /// Write a child template's input and rerun its input signal.
    SetChildInput {
        child: String,
        value: RExpr,
    },
    /// Reconcile a keyed/positional loop under `node`.
    RunLoop {
        node: String,
        body_section: u32,
        source: LoopSource,
        by: Option<RExpr>,
        /// `node` is the host element itself rather than a marker.
        only_child: bool,
    },
    /// Re-evaluate a conditional chain; recreates the branch fragment only
    /// when the live arm changes.
    RunConditional {
        node: String,
        branch: String,
        arms: Vec<CondArm>,
        only_child: bool,
    },
    /// Swap the element a dynamic tag renders, preserving its body.
    RunDynamicTag {
        node: String,
        name: RExpr,
        attrs: Vec<(String, RExpr)>,
        body_section: Option<u32>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LoopSource {
    Of(RExpr),
    In(RExpr),
    To {
        to: RExpr,
        from: Option<RExpr>,
        step: Option<RExpr>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CondArm {
    pub test: Option<RExpr>,
    pub section: Option<u32>,
}

/// One reactive update unit. Render ops run before effect ops within a
/// section; ops appended under the same key keep source order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignalSpec {
    pub id: SignalId,
    pub section: u32,
    /// Debug name derived from what the signal owns.
    pub name: String,
    /// True when this signal's changes must be observable outside its own
    /// closure; only exposed signals get cross-scope trigger links.
    pub exposed: bool,
    pub render: Vec<DomOp>,
    pub effect: Vec<DomOp>,
}

/// Invalidation edge: when the slot at `accessor` changes, run `signal` in
/// every live scope of `section` reachable from the changed scope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TriggerLink {
    pub signal: SignalId,
    pub section: u32,
}

/// HTML-target operation; the program is linear per section.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum HtmlOp {
    Static(String),
    /// Escaped dynamic text.
    Text(RExpr),
    Attr {
        name: String,
        value: RExpr,
    },
    Spread {
        value: RExpr,
        skip: Vec<String>,
    },
    /// Emit a scope-start resume marker for the current scope.
    ScopeStart,
    /// Emit a control-end resume marker tying `accessor` to this scope.
    MarkNode {
        accessor: String,
    },
    /// Record a serialized scope entry for client reattachment.
    Record {
        accessor: String,
        value: ResumeSource,
    },
    Store {
        accessor: String,
        value: RExpr,
    },
    Loop {
        body_section: u32,
        source: LoopSource,
        by: Option<RExpr>,
        only_child: bool,
        node_accessor: String,
    },
    If {
        arms: Vec<CondArm>,
        branch_accessor: String,
        node_accessor: String,
        only_child: bool,
    },
    Child {
        template: String,
        child_accessor: String,
        input: RExpr,
        body_section: Option<u32>,
    },
    DynamicTag {
        name: RExpr,
        attrs: Vec<(String, RExpr)>,
        body_section: Option<u32>,
        node_accessor: String,
    },
}

/// What a serialized scope entry holds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ResumeSource {
    /// Value computed at render time.
    Expr(RExpr),
    /// Reference to the child scope mounted at this accessor.
    ChildScope,
    /// The loop's ordered key-to-scope pair list.
    LoopScopes,
    /// The conditional's live branch index and branch scope.
    Branch,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SectionArtifact {
    pub name: String,
    /// Enclosing section id; `None` for the program root.
    pub parent: Option<u32>,
    /// Static template fragment instantiated once per activation.
    pub skeleton: Vec<SkelNode>,
    /// Skeleton rendered to text, with `<!>` markers.
    pub skeleton_html: String,
    /// Compact traversal instructions attaching node references; replayed
    /// against `skeleton` at runtime.
    pub walks: String,
    /// Accessor keys in the order Get/Replace codes appear in `walks`.
    pub walk_refs: Vec<String>,
    /// Signals to run when a scope is created, in registration order.
    pub setup: Vec<SignalId>,
    /// Invalidation map: slot accessor -> links run when it changes.
    /// Only stateful slots appear here.
    pub triggers: Vec<(String, Vec<TriggerLink>)>,
    /// Parameters bound per activation: (accessor key, name), in order.
    pub params: Vec<(String, String)>,
    /// HTML-target program (empty for DOM-target artifacts).
    pub html: Vec<HtmlOp>,
    /// Serialize this section's scope even with no local dynamic content.
    pub force_resume: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Artifact {
    pub source_name: String,
    pub target: Target,
    /// Indexed by section id; section 0 is the program root.
    pub sections: Vec<SectionArtifact>,
    /// Indexed by signal id.
    pub signals: Vec<SignalSpec>,
}

impl Artifact {
    pub fn root(&self) -> &SectionArtifact {
        &self.sections[0]
    }

    pub fn section(&self, id: u32) -> &SectionArtifact {
        &self.sections[id as usize]
    }

    pub fn signal(&self, id: SignalId) -> &SignalSpec {
        &self.signals[id.0 as usize]
    }
}

/// Render a skeleton subtree to its static HTML text.
pub fn skeleton_to_html(nodes: &[SkelNode], out: &mut String) {
    for node in nodes {
        match node {
            SkelNode::Element {
                name,
                attrs,
                children,
                void,
            } => {
                out.push('<');
                out.push_str(name);
                for (attr, value) in attrs {
                    out.push(' ');
                    out.push_str(attr);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(value);
                        out.push('"');
                    }
                }
                out.push('>');
                if !void {
                    skeleton_to_html(children, out);
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
            }
            SkelNode::Text(text) => out.push_str(text),
            SkelNode::Marker => out.push_str("<!>"),
            SkelNode::Child { .. } => out.push_str("<!>"),
        }
    }
}
