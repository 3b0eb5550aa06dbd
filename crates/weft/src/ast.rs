//! Input model for the compiler: an arena-backed template tree.
//!
//! The template syntax itself is parsed elsewhere; the compiler only needs
//! node identity, parent/child navigation, source positions and typed node
//! kinds. Analysis metadata never lives on the nodes themselves - the
//! compilation context keeps side tables keyed by [`NodeId`] / [`ExprId`].

use serde::{Deserialize, Serialize};

/// Byte range in the original template source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// Index of a template node within its [`TemplateArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Index of an expression within its [`TemplateArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub u32);

#[derive(Clone, Debug)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub span: Span,
    pub kind: NodeKind,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Native element, e.g. `<div class=...>`.
    Element {
        name: String,
        /// Tag variable capturing the live element, e.g. `<div/el>`.
        var: Option<String>,
        attrs: Vec<Attr>,
        body: Vec<NodeId>,
    },
    /// Static text content.
    Text(String),
    /// Dynamic text placeholder `${expr}`.
    Placeholder { value: ExprId },
    /// Derived value declaration, readable by later siblings and descendants.
    Let { name: String, value: ExprId },
    /// `<for>` control-flow tag. The body is its own section.
    For {
        source: ForSource,
        by: Option<ExprId>,
        params: Vec<String>,
        attrs: Vec<Attr>,
        body: Vec<NodeId>,
    },
    /// `<if>` / `<else-if>` / `<else>` chain, normalized into arms.
    If { arms: Vec<IfArm> },
    /// Invocation of another compiled template.
    CustomTag {
        name: String,
        var: Option<String>,
        args: Vec<ExprId>,
        attrs: Vec<Attr>,
        attr_tags: Vec<NodeId>,
        body: Vec<NodeId>,
    },
    /// `@name` attribute tag nested inside a custom tag.
    AttrTag {
        name: String,
        attrs: Vec<Attr>,
        body: Vec<NodeId>,
    },
    /// Element whose tag name is an expression.
    DynamicTag {
        name: ExprId,
        attrs: Vec<Attr>,
        body: Vec<NodeId>,
    },
}

#[derive(Clone, Debug)]
pub enum ForSource {
    /// `of=` - iterate a list.
    Of(ExprId),
    /// `in=` - iterate an object's keys and values.
    In(ExprId),
    /// `to=` - numeric range, with optional `from=` / `step=`.
    To {
        to: ExprId,
        from: Option<ExprId>,
        step: Option<ExprId>,
    },
}

#[derive(Clone, Debug)]
pub struct IfArm {
    /// `None` for the trailing `else`.
    pub test: Option<ExprId>,
    pub body: Vec<NodeId>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Attr {
    Named {
        name: String,
        value: ExprId,
        span: Span,
    },
    Spread {
        value: ExprId,
        span: Span,
    },
}

impl Attr {
    pub fn span(&self) -> Span {
        match self {
            Attr::Named { span, .. } | Attr::Spread { span, .. } => *span,
        }
    }

    pub fn value(&self) -> ExprId {
        match self {
            Attr::Named { value, .. } | Attr::Spread { value, .. } => *value,
        }
    }
}

/// Attribute names starting with `on` followed by an uppercase letter or a
/// dash are event handlers and compile into the effect phase.
pub fn is_event_handler(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('o')
        && chars.next() == Some('n')
        && chars.next().is_some_and(|c| c.is_ascii_uppercase() || c == '-')
}

/// `onClick` -> `click`, `on-custom-event` -> `custom-event`.
pub fn event_name(attr_name: &str) -> String {
    let rest = &attr_name[2..];
    if let Some(stripped) = rest.strip_prefix('-') {
        stripped.to_string()
    } else {
        let mut chars = rest.chars();
        match chars.next() {
            Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExprNode {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Lit(Lit),
    /// Reference to an in-scope name: the template input, a loop/body
    /// parameter, a `Let` value or a tag variable.
    Var(String),
    Member { object: ExprId, prop: String },
    /// String interpolation: literal parts and embedded expressions.
    Interp(Vec<InterpPart>),
    Unary { op: UnaryOp, operand: ExprId },
    Binary { op: BinaryOp, lhs: ExprId, rhs: ExprId },
    /// Assignment to an in-scope name; records a constant violation on the
    /// target binding during analysis.
    Assign { target: String, value: ExprId },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Lit {
    Str(String),
    Int(i64),
    Bool(bool),
    Null,
}

#[derive(Clone, Debug)]
pub enum InterpPart {
    Text(String),
    Expr(ExprId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

/// Arena holding one template's nodes and expressions.
///
/// Ids are indices and never reused; a fresh arena is built per file.
#[derive(Clone, Debug, Default)]
pub struct TemplateArena {
    pub source_name: String,
    nodes: Vec<Node>,
    exprs: Vec<ExprNode>,
    roots: Vec<NodeId>,
}

impl TemplateArena {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            ..Self::default()
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn expr(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id.0 as usize]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0 as usize].parent
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Child body of a node, empty for leaves.
    pub fn body(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Element { body, .. }
            | NodeKind::For { body, .. }
            | NodeKind::CustomTag { body, .. }
            | NodeKind::AttrTag { body, .. }
            | NodeKind::DynamicTag { body, .. } => body,
            _ => &[],
        }
    }

    pub fn push_expr(&mut self, span: Span, kind: ExprKind) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(ExprNode { span, kind });
        id
    }

    pub fn push_node(&mut self, span: Span, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent: None,
            span,
            kind,
        });
        for child in self.body(id).to_vec() {
            self.nodes[child.0 as usize].parent = Some(id);
        }
        if let NodeKind::CustomTag { attr_tags, .. } = &self.node(id).kind {
            for child in attr_tags.clone() {
                self.nodes[child.0 as usize].parent = Some(id);
            }
        }
        id
    }

    /// Attach top-level nodes, in document order.
    pub fn set_roots(&mut self, roots: Vec<NodeId>) {
        self.roots = roots;
    }

    // Expression shorthands, mostly for tests and tooling.

    pub fn lit_str(&mut self, value: impl Into<String>) -> ExprId {
        self.push_expr(Span::default(), ExprKind::Lit(Lit::Str(value.into())))
    }

    pub fn lit_int(&mut self, value: i64) -> ExprId {
        self.push_expr(Span::default(), ExprKind::Lit(Lit::Int(value)))
    }

    pub fn lit_bool(&mut self, value: bool) -> ExprId {
        self.push_expr(Span::default(), ExprKind::Lit(Lit::Bool(value)))
    }

    pub fn var(&mut self, name: impl Into<String>) -> ExprId {
        self.push_expr(Span::default(), ExprKind::Var(name.into()))
    }

    pub fn input(&mut self) -> ExprId {
        self.var("input")
    }

    pub fn member(&mut self, object: ExprId, prop: impl Into<String>) -> ExprId {
        self.push_expr(
            Span::default(),
            ExprKind::Member {
                object,
                prop: prop.into(),
            },
        )
    }

    pub fn input_prop(&mut self, prop: impl Into<String>) -> ExprId {
        let input = self.input();
        self.member(input, prop)
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.push_expr(Span::default(), ExprKind::Binary { op, lhs, rhs })
    }

    // Node shorthands.

    pub fn text(&mut self, content: impl Into<String>) -> NodeId {
        self.push_node(Span::default(), NodeKind::Text(content.into()))
    }

    pub fn placeholder(&mut self, value: ExprId) -> NodeId {
        self.push_node(Span::default(), NodeKind::Placeholder { value })
    }

    pub fn element(&mut self, name: impl Into<String>, attrs: Vec<Attr>, body: Vec<NodeId>) -> NodeId {
        self.push_node(
            Span::default(),
            NodeKind::Element {
                name: name.into(),
                var: None,
                attrs,
                body,
            },
        )
    }

    pub fn attr(&mut self, name: impl Into<String>, value: ExprId) -> Attr {
        Attr::Named {
            name: name.into(),
            value,
            span: Span::default(),
        }
    }

    pub fn str_attr(&mut self, name: impl Into<String>, value: impl Into<String>) -> Attr {
        let value = self.lit_str(value);
        self.attr(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_links_set_on_push() {
        let mut t = TemplateArena::new("test.weft");
        let text = t.text("hi");
        let el = t.element("div", vec![], vec![text]);
        assert_eq!(t.parent(text), Some(el));
        assert_eq!(t.parent(el), None);
    }

    #[test]
    fn event_handler_names() {
        assert!(is_event_handler("onClick"));
        assert!(is_event_handler("on-custom"));
        assert!(!is_event_handler("once"));
        assert!(!is_event_handler("href"));
        assert_eq!(event_name("onClick"), "click");
        assert_eq!(event_name("on-my-event"), "my-event");
    }
}
