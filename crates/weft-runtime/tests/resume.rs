//! Resume round trip: server-rendered state hydrates into a client engine
//! that behaves identically to one mounted from scratch.

use weft::ast::{BinaryOp, ExprKind, ForSource, IfArm, NodeKind, Span, TemplateArena};
use weft::TagRegistry;
use weft_runtime::{Harness, Value};

fn counter_template() -> TemplateArena {
    let mut t = TemplateArena::new("counter.weft");
    let zero = t.lit_int(0);
    let let_count = t.push_node(
        Span::default(),
        NodeKind::Let {
            name: "count".into(),
            value: zero,
        },
    );
    let count = t.var("count");
    let ph = t.placeholder(count);
    let h1 = t.element("h1", vec![], vec![ph]);
    let count_read = t.var("count");
    let one = t.lit_int(1);
    let sum = t.binary(BinaryOp::Add, count_read, one);
    let assign = t.push_expr(
        Span::default(),
        ExprKind::Assign {
            target: "count".into(),
            value: sum,
        },
    );
    let on_click = t.attr("onClick", assign);
    let label = t.text("+");
    let button = t.element("button", vec![on_click], vec![label]);
    t.set_roots(vec![let_count, h1, button]);
    t
}

fn keyed_list_template() -> TemplateArena {
    let mut t = TemplateArena::new("list.weft");
    let item_var = t.var("item");
    let name = t.member(item_var, "name");
    let ph = t.placeholder(name);
    let li = t.element("li", vec![], vec![ph]);
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
            body: vec![li],
        },
    );
    let ul = t.element("ul", vec![], vec![for_node]);
    t.set_roots(vec![ul]);
    t
}

/// A conditional whose arms are fully static, so the branch scope itself
/// has nothing to serialize.
fn toggle_template() -> TemplateArena {
    let mut t = TemplateArena::new("toggle.weft");
    let yes_text = t.text("yes");
    let p_yes = t.element("p", vec![], vec![yes_text]);
    let no_text = t.text("no");
    let p_no = t.element("p", vec![], vec![no_text]);
    let show = t.input_prop("show");
    let if_node = t.push_node(
        Span::default(),
        NodeKind::If {
            arms: vec![
                IfArm {
                    test: Some(show),
                    body: vec![p_yes],
                    span: Span::default(),
                },
                IfArm {
                    test: None,
                    body: vec![p_no],
                    span: Span::default(),
                },
            ],
        },
    );
    let tail = t.text("!");
    let div = t.element("div", vec![], vec![if_node, tail]);
    t.set_roots(vec![div]);
    t
}

/// A paramless numeric loop with a static body; item scopes carry no
/// recorded values.
fn repeat_template() -> TemplateArena {
    let mut t = TemplateArena::new("rep.weft");
    let x = t.text("x");
    let li = t.element("li", vec![], vec![x]);
    let n = t.input_prop("n");
    let for_node = t.push_node(
        Span::default(),
        NodeKind::For {
            source: ForSource::To {
                to: n,
                from: None,
                step: None,
            },
            by: None,
            params: vec![],
            attrs: vec![],
            body: vec![li],
        },
    );
    let ul = t.element("ul", vec![], vec![for_node]);
    t.set_roots(vec![ul]);
    t
}

fn item(id: i64, name: &str) -> Value {
    Value::object([
        ("id".to_string(), Value::Int(id)),
        ("name".to_string(), Value::str(name)),
    ])
}

fn items_input(items: Vec<Value>) -> Value {
    Value::object([("items".to_string(), Value::List(items))])
}

#[test]
fn hydrated_counter_matches_fresh_mount() {
    let registry = TagRegistry::new();
    let template = counter_template();

    let mut server = Harness::new();
    server.add_template("counter", &template, &registry).unwrap();
    let out = server.render_html("counter", Value::Null);

    let mut hydrated = Harness::new();
    hydrated.add_template("counter", &template, &registry).unwrap();
    hydrated.resume(&out.payload).unwrap();

    let mut fresh = Harness::new();
    fresh.add_template("counter", &template, &registry).unwrap();
    fresh.mount("counter", Value::Null);

    assert_eq!(hydrated.html(), fresh.html());

    // Both clients take the same event and stay in lockstep.
    let hb = hydrated.find_element("button").unwrap();
    let fb = fresh.find_element("button").unwrap();
    hydrated.dispatch(hb, "click");
    fresh.dispatch(fb, "click");
    assert_eq!(hydrated.html(), fresh.html());
    assert!(hydrated.html().contains("<h1>1</h1>"));
}

#[test]
fn hydrated_loop_reuses_serialized_scopes_on_reorder() {
    let registry = TagRegistry::new();
    let template = keyed_list_template();
    let input = items_input(vec![item(1, "a"), item(2, "b"), item(3, "c")]);

    let mut server = Harness::new();
    server.add_template("list", &template, &registry).unwrap();
    let out = server.render_html("list", input.clone());

    let mut h = Harness::new();
    h.add_template("list", &template, &registry).unwrap();
    let root = h.resume(&out.payload).unwrap();
    assert_eq!(h.html(), "<ul><li>a</li><li>b</li><li>c</li></ul>");
    // One scope per serialized item plus the root.
    assert_eq!(h.client.scopes.live_count(), 4);

    let ul = h.find_element("ul").unwrap();
    let before = h.client.dom.children(ul).to_vec();

    h.client.set_input(
        root,
        items_input(vec![item(3, "c"), item(1, "a"), item(2, "b")]),
    );
    assert_eq!(h.html(), "<ul><li>c</li><li>a</li><li>b</li></ul>");
    // The rows restored from the payload moved; none were recreated.
    let after = h.client.dom.children(ul).to_vec();
    assert_eq!(after, vec![before[2], before[0], before[1]]);
}

#[test]
fn hydrated_conditional_restores_its_static_branch() {
    let registry = TagRegistry::new();
    let template = toggle_template();
    let show = |b| Value::object([("show".to_string(), Value::Bool(b))]);

    let mut server = Harness::new();
    server.add_template("toggle", &template, &registry).unwrap();
    let out = server.render_html("toggle", show(true));
    // The branch record names its scope, so that scope is in the payload
    // even though its body is static.
    assert!(out.payload.contains("\"1\""));

    let mut h = Harness::new();
    h.add_template("toggle", &template, &registry).unwrap();
    let root = h.resume(&out.payload).unwrap();

    let mut fresh = Harness::new();
    fresh.add_template("toggle", &template, &registry).unwrap();
    fresh.mount("toggle", show(true));
    assert_eq!(h.html(), fresh.html());
    assert!(h.html().contains("<p>yes</p>"));

    // The live arm still swaps after reattachment.
    h.client.set_input(root, show(false));
    assert!(h.html().contains("<p>no</p>"));
    assert!(!h.html().contains("yes"));
}

#[test]
fn hydrated_loop_recreates_static_item_scopes() {
    let registry = TagRegistry::new();
    let template = repeat_template();
    let input = |n| Value::object([("n".to_string(), Value::Int(n))]);

    let mut server = Harness::new();
    server.add_template("rep", &template, &registry).unwrap();
    let out = server.render_html("rep", input(2));

    let mut h = Harness::new();
    h.add_template("rep", &template, &registry).unwrap();
    let root = h.resume(&out.payload).unwrap();
    assert_eq!(h.html(), "<ul><li>x</li><li>x</li><li>x</li></ul>");
    // Root plus one scope per serialized row.
    assert_eq!(h.client.scopes.live_count(), 4);

    // Shrinking the range tears restored rows down.
    h.client.set_input(root, input(0));
    assert_eq!(h.html(), "<ul><li>x</li></ul>");
}

#[test]
fn hydration_preserves_server_side_state() {
    let registry = TagRegistry::new();
    let template = counter_template();

    // Simulate the server having advanced past the initial value.
    let mut server = Harness::new();
    server.add_template("counter", &template, &registry).unwrap();
    let out = server.render_html("counter", Value::Null);
    let advanced = out.payload.replace("\"1\":0", "\"1\":41");

    let mut h = Harness::new();
    h.add_template("counter", &template, &registry).unwrap();
    h.resume(&advanced).unwrap();
    assert!(h.html().contains("<h1>41</h1>"));

    let button = h.find_element("button").unwrap();
    h.dispatch(button, "click");
    assert!(h.html().contains("<h1>42</h1>"));
}
