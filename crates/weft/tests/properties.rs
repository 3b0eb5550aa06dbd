//! Cross-cutting guarantees of the compiled artifacts: accessor
//! uniqueness, closure exposure, single-child collapsing and target
//! parity.

use weft::artifact::{DomOp, SkelNode};
use weft::ast::{ForSource, NodeKind, Span, TemplateArena};
use weft::{TagRegistry, Target, compile};

fn keyed_list(parent_tag: &str) -> TemplateArena {
    let mut t = TemplateArena::new("list.weft");
    let item_var = t.var("item");
    let name = t.member(item_var, "name");
    let ph = t.placeholder(name);
    let row = t.element("li", vec![], vec![ph]);
    let by_item = t.var("item");
    let by = t.member(by_item, "id");
    let items = t.input_prop("items");
    let for_node = t.push_node(
        Span::default(),
        NodeKind::For {
            source: ForSource::Of(items),
            by: Some(by),
            params: vec!["item".into()],
            attrs: vec![],
            body: vec![row],
        },
    );
    let host = t.element(parent_tag, vec![], vec![for_node]);
    t.set_roots(vec![host]);
    t
}

/// A loop body reading a value declared outside it.
fn closing_loop() -> TemplateArena {
    let mut t = TemplateArena::new("closure.weft");
    let n = t.input_prop("n");
    let let_count = t.push_node(
        Span::default(),
        NodeKind::Let {
            name: "count".into(),
            value: n,
        },
    );
    let count = t.var("count");
    let ph = t.placeholder(count);
    let li = t.element("li", vec![], vec![ph]);
    let items = t.input_prop("items");
    let for_node = t.push_node(
        Span::default(),
        NodeKind::For {
            source: ForSource::Of(items),
            by: None,
            params: vec!["item".into()],
            attrs: vec![],
            body: vec![li],
        },
    );
    t.set_roots(vec![let_count, for_node]);
    t
}

#[test]
fn walk_refs_are_unique_per_section() {
    let artifact = compile(&keyed_list("ul"), &TagRegistry::new(), Target::Dom).unwrap();
    for section in &artifact.sections {
        let mut seen = std::collections::HashSet::new();
        for accessor in &section.walk_refs {
            assert!(seen.insert(accessor), "duplicate walk ref {accessor}");
        }
        let mut triggers = std::collections::HashSet::new();
        for (accessor, _) in &section.triggers {
            assert!(triggers.insert(accessor), "duplicate trigger {accessor}");
        }
    }
}

#[test]
fn cross_section_reads_expose_their_signal() {
    let artifact = compile(&closing_loop(), &TagRegistry::new(), Target::Dom).unwrap();

    // The loop body's text signal reads `count` from the root section.
    let exposed: Vec<_> = artifact.signals.iter().filter(|s| s.exposed).collect();
    assert!(exposed.iter().any(|s| s.section != 0));

    // Changing `count` (root slot 1) must reach that signal in body scopes.
    let count_links = artifact
        .root()
        .triggers
        .iter()
        .find(|(accessor, _)| accessor == "1")
        .map(|(_, links)| links)
        .expect("count slot has triggers");
    assert!(count_links.iter().any(|link| link.section != 0));

    // A signal whose reads stay local is not exposed.
    assert!(artifact.signals.iter().any(|s| !s.exposed));
}

#[test]
fn only_child_loops_collapse_onto_their_host() {
    let artifact = compile(&keyed_list("ul"), &TagRegistry::new(), Target::Dom).unwrap();
    let run_loop = artifact
        .signals
        .iter()
        .flat_map(|s| &s.render)
        .find_map(|op| match op {
            DomOp::RunLoop {
                only_child, node, ..
            } => Some((*only_child, node.clone())),
            _ => None,
        })
        .expect("loop op present");
    assert!(run_loop.0);
    assert!(run_loop.1.starts_with("#ul/"));

    // No synthetic marker inside the host element.
    let SkelNode::Element { children, .. } = &artifact.root().skeleton[0] else {
        panic!("host element expected");
    };
    assert!(children.is_empty());
}

#[test]
fn collapses_inside_table_host() {
    // Table-section hosts are plain elements to the collapser.
    let artifact = compile(&keyed_list("tbody"), &TagRegistry::new(), Target::Dom).unwrap();
    let collapsed = artifact.signals.iter().flat_map(|s| &s.render).any(|op| {
        matches!(
            op,
            DomOp::RunLoop {
                only_child: true,
                ..
            }
        )
    });
    assert!(collapsed);
}

#[test]
fn targets_agree_on_sections_and_accessors() {
    let template = keyed_list("ul");
    let registry = TagRegistry::new();
    let dom = compile(&template, &registry, Target::Dom).unwrap();
    let html = compile(&template, &registry, Target::Html).unwrap();

    assert_eq!(dom.sections.len(), html.sections.len());
    for (d, h) in dom.sections.iter().zip(&html.sections) {
        assert_eq!(d.name, h.name);
        assert_eq!(d.parent, h.parent);
        assert_eq!(d.params, h.params);
    }
}
