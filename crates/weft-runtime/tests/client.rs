//! Client engine behavior: fine-grained updates, event dispatch, keyed
//! loop reconciliation and conditional branch swaps on the arena DOM.

use weft::ast::{BinaryOp, ExprKind, ForSource, IfArm, NodeKind, Span, TemplateArena};
use weft::{TagRegistry, TagShape};
use weft_runtime::{Harness, Value};

fn item(id: i64, name: &str) -> Value {
    Value::object([
        ("id".to_string(), Value::Int(id)),
        ("name".to_string(), Value::str(name)),
    ])
}

fn items_input(items: Vec<Value>) -> Value {
    Value::object([("items".to_string(), Value::List(items))])
}

/// `let count = 0`, `<h1>${count}</h1>`, `<button onClick=count = count + 1>+</button>`
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

#[test]
fn events_drive_fine_grained_text_updates() {
    let mut h = Harness::new();
    let registry = TagRegistry::new();
    h.add_template("counter", &counter_template(), &registry)
        .unwrap();

    h.mount("counter", Value::Null);
    assert_eq!(h.html(), "<h1>0</h1><button>+</button>");

    let button = h.find_element("button").unwrap();
    h.dispatch(button, "click");
    assert_eq!(h.html(), "<h1>1</h1><button>+</button>");
    h.dispatch(button, "click");
    assert_eq!(h.html(), "<h1>2</h1><button>+</button>");
}

#[test]
fn input_changes_only_touch_dependent_text() {
    let mut t = TemplateArena::new("greet.weft");
    let name = t.input_prop("name");
    let ph = t.placeholder(name);
    let h1 = t.element("h1", vec![], vec![ph]);
    t.set_roots(vec![h1]);

    let mut h = Harness::new();
    h.add_template("greet", &t, &TagRegistry::new()).unwrap();
    let root = h.mount("greet", Value::object([("name".to_string(), Value::str("ada"))]));
    assert_eq!(h.html(), "<h1>ada</h1>");

    let h1 = h.find_element("h1").unwrap();
    h.client
        .set_input(root, Value::object([("name".to_string(), Value::str("lin"))]));
    assert_eq!(h.html(), "<h1>lin</h1>");
    // The element was updated in place, not recreated.
    assert_eq!(h.find_element("h1"), Some(h1));
}

#[test]
fn duplicate_attributes_resolve_to_last_occurrence() {
    let mut t = TemplateArena::new("attrs.weft");
    let first = t.str_attr("class", "a");
    let cls = t.input_prop("cls");
    let second = t.attr("class", cls);
    let dynamic_div = t.element("div", vec![first, second], vec![]);

    let third = t.str_attr("class", "a");
    let fourth = t.str_attr("class", "c");
    let static_div = t.element("div", vec![third, fourth], vec![]);
    t.set_roots(vec![dynamic_div, static_div]);

    let mut h = Harness::new();
    h.add_template("attrs", &t, &TagRegistry::new()).unwrap();
    h.mount("attrs", Value::object([("cls".to_string(), Value::str("b"))]));
    assert_eq!(h.html(), "<div class=\"b\"></div><div class=\"c\"></div>");
}

#[test]
fn keyed_loop_reorders_by_moving_nodes() {
    let mut h = Harness::new();
    h.add_template("list", &keyed_list_template(), &TagRegistry::new())
        .unwrap();

    let root = h.mount(
        "list",
        items_input(vec![item(1, "a"), item(2, "b"), item(3, "c")]),
    );
    assert_eq!(h.html(), "<ul><li>a</li><li>b</li><li>c</li></ul>");

    let ul = h.find_element("ul").unwrap();
    let before = h.client.dom.children(ul).to_vec();
    assert_eq!(before.len(), 3);

    h.client.set_input(
        root,
        items_input(vec![item(3, "c!"), item(1, "a"), item(2, "b")]),
    );
    assert_eq!(h.html(), "<ul><li>c!</li><li>a</li><li>b</li></ul>");
    let after = h.client.dom.children(ul).to_vec();
    // Same three <li> nodes, moved rather than recreated.
    assert_eq!(after, vec![before[2], before[0], before[1]]);
}

#[test]
fn emptied_loop_tears_down_item_scopes() {
    let mut h = Harness::new();
    h.add_template("list", &keyed_list_template(), &TagRegistry::new())
        .unwrap();

    let root = h.mount("list", items_input(vec![item(1, "a"), item(2, "b")]));
    assert!(h.client.scopes.live_count() > 1);

    h.client.set_input(root, items_input(vec![]));
    assert_eq!(h.html(), "<ul></ul>");
    assert_eq!(h.client.scopes.live_count(), 1);
}

#[test]
fn conditional_swaps_branch_fragments() {
    let mut t = TemplateArena::new("cond.weft");
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

    let mut h = Harness::new();
    h.add_template("cond", &t, &TagRegistry::new()).unwrap();
    let root = h.mount("cond", Value::object([("show".to_string(), Value::Bool(true))]));
    assert!(h.html().contains("<p>yes</p>"));
    assert!(!h.html().contains("<p>no</p>"));
    let live_with_branch = h.client.scopes.live_count();

    h.client
        .set_input(root, Value::object([("show".to_string(), Value::Bool(false))]));
    assert!(h.html().contains("<p>no</p>"));
    assert!(!h.html().contains("<p>yes</p>"));
    // The old branch scope died, the new one replaced it.
    assert_eq!(h.client.scopes.live_count(), live_with_branch);

    h.client
        .set_input(root, Value::object([("show".to_string(), Value::Bool(true))]));
    assert!(h.html().contains("<p>yes</p>"));
}

#[test]
fn custom_tag_input_flows_through_mount() {
    let mut card = TemplateArena::new("card.weft");
    let title = card.input_prop("title");
    let ph = card.placeholder(title);
    let h2 = card.element("h2", vec![], vec![ph]);
    card.set_roots(vec![h2]);

    let mut app = TemplateArena::new("app.weft");
    let heading = app.input_prop("heading");
    let attr = app.attr("title", heading);
    let tag = app.push_node(
        Span::default(),
        NodeKind::CustomTag {
            name: "card".into(),
            var: None,
            args: vec![],
            attrs: vec![attr],
            attr_tags: vec![],
            body: vec![],
        },
    );
    app.set_roots(vec![tag]);

    let mut registry = TagRegistry::new();
    registry.register("card", TagShape::with_props(["title"]));

    let mut h = Harness::new();
    h.add_template("card", &card, &registry).unwrap();
    h.add_template("app", &app, &registry).unwrap();

    let root = h.mount("app", Value::object([("heading".to_string(), Value::str("Hi"))]));
    assert_eq!(h.html(), "<h2>Hi</h2>");

    h.client
        .set_input(root, Value::object([("heading".to_string(), Value::str("Yo"))]));
    assert_eq!(h.html(), "<h2>Yo</h2>");
}
