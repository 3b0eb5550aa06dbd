//! Template compiler for the weft declarative UI language.
//!
//! The compiler takes an already-parsed template tree and produces a
//! compiled [`Artifact`] for one of two backends: a fine-grained DOM
//! program (skeleton, walk string, signal table) or a streaming HTML
//! program with resume markers and a serialized scope payload. Both come
//! from the same analysis, so accessors and section names line up across
//! targets and server-rendered pages reattach on the client without
//! reanalysis.
//!
//! Compilation is two strict passes per file:
//!
//! 1. **analyze** - reference tracking, section partitioning and the
//!    binding graph. Nothing is emitted.
//! 2. **translate** - lowering into the target's artifact, synthesizing
//!    signals (DOM) or a linear op program (HTML).
//!
//! All state lives on a per-file [`Compilation`]; there is no global
//! compiler state and compiling the same input twice yields identical
//! artifacts.

pub mod analyze;
pub mod artifact;
pub mod ast;
pub mod context;
pub mod error;
pub mod graph;
pub mod tags;
pub mod translate;
pub mod walks;

pub use artifact::{Artifact, Target};
pub use context::Compilation;
pub use error::{CompileError, Result};
pub use tags::{TagRegistry, TagResolver, TagShape};

use ast::TemplateArena;

/// Compile one template for `target`.
///
/// Errors accumulate across the whole analyze pass before aborting, so a
/// broken template reports everything wrong with it at once.
pub fn compile(
    arena: &TemplateArena,
    resolver: &dyn TagResolver,
    target: Target,
) -> Result<Artifact> {
    let mut cx = Compilation::new(arena, resolver);
    analyze::analyze(&mut cx);
    if !cx.errors.is_empty() {
        return Err(cx.errors);
    }
    Ok(translate::translate(&cx, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast::NodeKind;

    #[test]
    fn compile_reports_unresolved_names() {
        let mut arena = TemplateArena::new("broken.weft");
        let value = arena.var("missing");
        let placeholder = arena.placeholder(value);
        arena.set_roots(vec![placeholder]);

        let registry = TagRegistry::new();
        let errors = compile(&arena, &registry, Target::Dom).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("missing"));
    }

    #[test]
    fn compile_is_deterministic() {
        let mut arena = TemplateArena::new("hello.weft");
        let name = arena.input_prop("name");
        let placeholder = arena.placeholder(name);
        let root = arena.element("h1", vec![], vec![placeholder]);
        arena.set_roots(vec![root]);

        let registry = TagRegistry::new();
        let a = compile(&arena, &registry, Target::Dom).unwrap();
        let b = compile(&arena, &registry, Target::Dom).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn static_content_compiles_to_skeleton_only() {
        let mut arena = TemplateArena::new("static.weft");
        let text = arena.text("hello");
        let root = arena.element("p", vec![], vec![text]);
        arena.set_roots(vec![root]);

        let registry = TagRegistry::new();
        let artifact = compile(&arena, &registry, Target::Dom).unwrap();
        assert_eq!(artifact.root().skeleton_html, "<p>hello</p>");
        assert!(artifact.signals.is_empty());
        assert!(artifact.root().walks.is_empty());
    }

    #[test]
    fn body_helper_covers_leaf_kinds() {
        let mut arena = TemplateArena::new("t");
        let text = arena.text("x");
        assert!(matches!(arena.node(text).kind, NodeKind::Text(_)));
        assert!(arena.body(text).is_empty());
    }
}
