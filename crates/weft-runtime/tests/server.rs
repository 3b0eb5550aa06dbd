//! Server renderer output: escaping, resume markers and payload shape.

use serde_json::Value as Json;
use weft::ast::{BinaryOp, ExprKind, NodeKind, Span, TemplateArena};
use weft::TagRegistry;
use weft_runtime::{Harness, Value};

#[test]
fn dynamic_text_is_escaped() {
    let mut t = TemplateArena::new("greet.weft");
    let name = t.input_prop("name");
    let ph = t.placeholder(name);
    let h1 = t.element("h1", vec![], vec![ph]);
    t.set_roots(vec![h1]);

    let mut h = Harness::new();
    h.add_template("greet", &t, &TagRegistry::new()).unwrap();
    let out = h.render_html(
        "greet",
        Value::object([("name".to_string(), Value::str("<b>&co"))]),
    );
    assert!(out.html.contains("&lt;b&gt;&amp;co"));
    assert!(!out.html.contains("<b>"));
}

#[test]
fn static_pages_carry_no_resume_state() {
    let mut t = TemplateArena::new("static.weft");
    let text = t.text("hello");
    let p = t.element("p", vec![], vec![text]);
    t.set_roots(vec![p]);

    let mut h = Harness::new();
    h.add_template("static", &t, &TagRegistry::new()).unwrap();
    let out = h.render_html("static", Value::Null);
    assert_eq!(out.html, "<p>hello</p>");
    assert_eq!(out.payload, "{}");
}

#[test]
fn stateful_pages_mark_scopes_and_record_slots() {
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
    let button = t.element("button", vec![on_click], vec![]);
    t.set_roots(vec![let_count, h1, button]);

    let mut h = Harness::new();
    h.add_template("counter", &t, &TagRegistry::new()).unwrap();
    let out = h.render_html("counter", Value::Null);

    // Scope-start marker opens the serialized root scope; the event target
    // leaves a control-end marker naming its node slot.
    assert!(out.html.starts_with("<!--[0-->"));
    assert!(out.html.contains("<!--]0 #button/"));
    assert!(out.html.contains("<h1>0</h1>"));

    let payload: Json = serde_json::from_str(&out.payload).unwrap();
    let root = payload.get("0").and_then(Json::as_object).unwrap();
    assert_eq!(root.get("$").unwrap(), &serde_json::json!(["counter", 0, null]));
    // The derived count slot rides along so the client reruns against it.
    assert_eq!(root.get("1").unwrap(), &serde_json::json!(0));
}

#[test]
fn duplicate_attributes_render_last_occurrence() {
    let mut t = TemplateArena::new("attrs.weft");
    let first = t.str_attr("class", "a");
    let second = t.str_attr("class", "c");
    let div = t.element("div", vec![first, second], vec![]);
    t.set_roots(vec![div]);

    let mut h = Harness::new();
    h.add_template("attrs", &t, &TagRegistry::new()).unwrap();
    let out = h.render_html("attrs", Value::Null);
    assert_eq!(out.html, "<div class=\"c\"></div>");
}

#[test]
fn loop_items_serialize_their_scopes() {
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
            source: weft::ast::ForSource::Of(items),
            by: Some(by),
            params: vec!["item".into()],
            attrs: vec![],
            body: vec![li],
        },
    );
    let ul = t.element("ul", vec![], vec![for_node]);
    t.set_roots(vec![ul]);

    let mut h = Harness::new();
    h.add_template("list", &t, &TagRegistry::new()).unwrap();
    let input = Value::object([(
        "items".to_string(),
        Value::List(vec![
            Value::object([
                ("id".to_string(), Value::Int(7)),
                ("name".to_string(), Value::str("a")),
            ]),
            Value::object([
                ("id".to_string(), Value::Int(9)),
                ("name".to_string(), Value::str("b")),
            ]),
        ]),
    )]);
    let out = h.render_html("list", input);
    // Item scopes serialize, so their start markers interleave the rows.
    assert!(out.html.contains("<li>a</li>"));
    assert!(out.html.contains("<!--[2--><li>b</li>"));

    let payload: Json = serde_json::from_str(&out.payload).unwrap();
    let root = payload.get("0").and_then(Json::as_object).unwrap();
    // Keyed scope map: item key paired with the body scope id.
    let pairs = root
        .iter()
        .find(|(accessor, _)| accessor.ends_with('!'))
        .map(|(_, v)| v.as_array().unwrap().clone())
        .unwrap();
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0], serde_json::json!([7, 1]));
    assert_eq!(pairs[1], serde_json::json!([9, 2]));
    // Each item scope restored its param slot.
    assert!(payload.get("1").is_some());
    assert!(payload.get("2").is_some());
}
