//! Test harness: compiles a template for both targets and wires the
//! server renderer and client engine together.
//!
//! Integration tests drive one [`Harness`] per scenario: render on the
//! server, mount fresh on the client, or hydrate the server payload and
//! assert the two engines behave identically afterwards.

use weft::ast::TemplateArena;
use weft::{CompileError, TagResolver, Target, compile};

use crate::dom::{NodeIx, NodeKind};
use crate::engine::DomEngine;
use crate::html::{HtmlRenderer, RenderOutput};
use crate::resume;
use crate::scope::ScopeId;
use crate::value::Value;

pub struct Harness {
    pub client: DomEngine,
    pub server: HtmlRenderer,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            client: DomEngine::new(),
            server: HtmlRenderer::new(),
        }
    }

    /// Compile `arena` for both targets and register the artifacts under
    /// `name`.
    pub fn add_template(
        &mut self,
        name: &str,
        arena: &TemplateArena,
        resolver: &dyn TagResolver,
    ) -> Result<(), Vec<CompileError>> {
        let dom = compile(arena, resolver, Target::Dom)?;
        let html = compile(arena, resolver, Target::Html)?;
        self.client.register(name, dom);
        self.server.register(name, html);
        Ok(())
    }

    pub fn render_html(&mut self, name: &str, input: Value) -> RenderOutput {
        self.server.render(name, input)
    }

    pub fn mount(&mut self, name: &str, input: Value) -> ScopeId {
        self.client.mount(name, input)
    }

    /// Reattach a server payload into a fresh client engine, replacing the
    /// current one. Registered templates carry over.
    pub fn resume(&mut self, payload: &str) -> serde_json::Result<ScopeId> {
        resume::hydrate(&mut self.client, payload)
    }

    pub fn html(&self) -> String {
        self.client.html()
    }

    /// First element with the given tag name, in document order.
    pub fn find_element(&self, tag: &str) -> Option<NodeIx> {
        self.find_in(self.client.container(), tag)
    }

    fn find_in(&self, node: NodeIx, tag: &str) -> Option<NodeIx> {
        if let NodeKind::Element { name, .. } = &self.client.dom.node(node).kind {
            if name == tag {
                return Some(node);
            }
        }
        for &child in self.client.dom.children(node).to_vec().iter() {
            if let Some(found) = self.find_in(child, tag) {
                return Some(found);
            }
        }
        None
    }

    pub fn dispatch(&mut self, node: NodeIx, event: &str) {
        self.client.dispatch(node, event);
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
