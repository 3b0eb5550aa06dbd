//! Arena-backed DOM for the client renderer.
//!
//! Nodes live in a flat arena and are addressed by [`NodeIx`]; identity is
//! the index, so tests can assert that reconciliation reused a node
//! rather than recreating it. Rendering to text exists purely for
//! assertions and diagnostics.

use indexmap::IndexMap;

use weft::artifact::RExpr;

use crate::scope::ScopeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIx(pub u32);

#[derive(Clone, Debug)]
pub struct Listener {
    pub event: String,
    pub scope: ScopeId,
    pub handler: RExpr,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Element {
        name: String,
        attrs: IndexMap<String, String>,
        listeners: Vec<Listener>,
    },
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug)]
pub struct DomNode {
    pub kind: NodeKind,
    pub parent: Option<NodeIx>,
    pub children: Vec<NodeIx>,
}

#[derive(Debug, Default)]
pub struct SimDom {
    nodes: Vec<DomNode>,
}

impl SimDom {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: NodeKind) -> NodeIx {
        let ix = NodeIx(self.nodes.len() as u32);
        self.nodes.push(DomNode {
            kind,
            parent: None,
            children: Vec::new(),
        });
        ix
    }

    pub fn create_element(&mut self, name: impl Into<String>) -> NodeIx {
        self.push(NodeKind::Element {
            name: name.into(),
            attrs: IndexMap::new(),
            listeners: Vec::new(),
        })
    }

    pub fn create_text(&mut self, content: impl Into<String>) -> NodeIx {
        self.push(NodeKind::Text(content.into()))
    }

    pub fn create_comment(&mut self, content: impl Into<String>) -> NodeIx {
        self.push(NodeKind::Comment(content.into()))
    }

    pub fn node(&self, ix: NodeIx) -> &DomNode {
        &self.nodes[ix.0 as usize]
    }

    pub fn node_mut(&mut self, ix: NodeIx) -> &mut DomNode {
        &mut self.nodes[ix.0 as usize]
    }

    pub fn append(&mut self, parent: NodeIx, child: NodeIx) {
        self.detach(child);
        self.nodes[child.0 as usize].parent = Some(parent);
        self.nodes[parent.0 as usize].children.push(child);
    }

    /// Insert `child` immediately before `anchor` under the anchor's
    /// parent.
    pub fn insert_before(&mut self, anchor: NodeIx, child: NodeIx) {
        let Some(parent) = self.nodes[anchor.0 as usize].parent else {
            return;
        };
        self.detach(child);
        self.nodes[child.0 as usize].parent = Some(parent);
        let siblings = &mut self.nodes[parent.0 as usize].children;
        let at = siblings
            .iter()
            .position(|&c| c == anchor)
            .unwrap_or(siblings.len());
        siblings.insert(at, child);
    }

    pub fn detach(&mut self, child: NodeIx) {
        if let Some(parent) = self.nodes[child.0 as usize].parent.take() {
            self.nodes[parent.0 as usize]
                .children
                .retain(|&c| c != child);
        }
    }

    pub fn remove_subtree(&mut self, ix: NodeIx) {
        self.detach(ix);
    }

    pub fn clear_children(&mut self, parent: NodeIx) {
        let children = std::mem::take(&mut self.nodes[parent.0 as usize].children);
        for child in children {
            self.nodes[child.0 as usize].parent = None;
        }
    }

    pub fn set_text(&mut self, ix: NodeIx, content: impl Into<String>) {
        // Dynamic text markers become text nodes on first write.
        self.nodes[ix.0 as usize].kind = NodeKind::Text(content.into());
    }

    pub fn set_attr(&mut self, ix: NodeIx, name: &str, value: Option<String>) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[ix.0 as usize].kind {
            match value {
                Some(value) => {
                    attrs.insert(name.to_string(), value);
                }
                None => {
                    attrs.shift_remove(name);
                }
            }
        }
    }

    pub fn attr(&self, ix: NodeIx, name: &str) -> Option<&str> {
        match &self.nodes[ix.0 as usize].kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            _ => None,
        }
    }

    pub fn add_listener(&mut self, ix: NodeIx, listener: Listener) {
        if let NodeKind::Element { listeners, .. } = &mut self.nodes[ix.0 as usize].kind {
            // Re-running an effect replaces the previous handler for the
            // same event instead of stacking another one.
            listeners.retain(|l| l.event != listener.event);
            listeners.push(listener);
        }
    }

    pub fn listeners_for(&self, ix: NodeIx, event: &str) -> Vec<Listener> {
        match &self.nodes[ix.0 as usize].kind {
            NodeKind::Element { listeners, .. } => listeners
                .iter()
                .filter(|l| l.event == event)
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn children(&self, ix: NodeIx) -> &[NodeIx] {
        &self.nodes[ix.0 as usize].children
    }

    pub fn to_html(&self, ix: NodeIx) -> String {
        let mut out = String::new();
        self.write_html(ix, &mut out);
        out
    }

    pub fn fragment_html(&self, nodes: &[NodeIx]) -> String {
        let mut out = String::new();
        for &ix in nodes {
            self.write_html(ix, &mut out);
        }
        out
    }

    /// HTML of a node's children only.
    pub fn inner_html(&self, ix: NodeIx) -> String {
        self.fragment_html(&self.nodes[ix.0 as usize].children.clone())
    }

    fn write_html(&self, ix: NodeIx, out: &mut String) {
        match &self.nodes[ix.0 as usize].kind {
            NodeKind::Element { name, attrs, .. } => {
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
                let children = self.nodes[ix.0 as usize].children.clone();
                if !children.is_empty() || !is_void(name) {
                    for child in children {
                        self.write_html(child, out);
                    }
                    if !is_void(name) {
                        out.push_str("</");
                        out.push_str(name);
                        out.push('>');
                    }
                }
            }
            NodeKind::Text(content) => out.push_str(content),
            NodeKind::Comment(content) => {
                out.push_str("<!--");
                out.push_str(content);
                out.push_str("-->");
            }
        }
    }
}

fn is_void(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_preserves_order() {
        let mut dom = SimDom::new();
        let parent = dom.create_element("ul");
        let a = dom.create_element("li");
        let c = dom.create_element("li");
        dom.append(parent, a);
        dom.append(parent, c);
        let b = dom.create_element("li");
        dom.insert_before(c, b);
        assert_eq!(dom.children(parent), &[a, b, c]);
    }

    #[test]
    fn reinserting_moves_instead_of_duplicating() {
        let mut dom = SimDom::new();
        let parent = dom.create_element("ul");
        let a = dom.create_element("li");
        let b = dom.create_element("li");
        dom.append(parent, a);
        dom.append(parent, b);
        dom.append(parent, a);
        assert_eq!(dom.children(parent), &[b, a]);
    }

    #[test]
    fn renders_html_text() {
        let mut dom = SimDom::new();
        let div = dom.create_element("div");
        dom.set_attr(div, "class", Some("box".into()));
        let text = dom.create_text("hi");
        dom.append(div, text);
        assert_eq!(dom.to_html(div), "<div class=\"box\">hi</div>");
    }
}
