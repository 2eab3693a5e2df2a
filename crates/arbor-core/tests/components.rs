use std::cell::RefCell;
use std::rc::Rc;

use arbor_core::{
    attrs, h, Attributes, Child, Component, ComponentClass, ComponentHandle, ComponentType, Context,
    Error, Options, Props, Ref, RefTarget, RenderResult, Renderer, State, VNode, Value,
};
use arbor_macros::component;
use arbor_testing::{EventLog, TestRoot};

fn log_of(props: &Props) -> EventLog {
    props
        .get("log")
        .and_then(|value| value.downcast_ref::<EventLog>())
        .cloned()
        .unwrap_or_default()
}

fn name_of(props: &Props) -> String {
    props.get("name").and_then(Value::to_text).unwrap_or_default()
}

fn shared(log: &EventLog) -> Value {
    Value::Any(Rc::new(log.clone()))
}

type Slot = Rc<RefCell<Option<ComponentHandle>>>;

fn capture(slot: &Slot) -> Ref {
    let slot = slot.clone();
    Ref::new(move |target| {
        if let Some(RefTarget::Component(handle)) = target {
            *slot.borrow_mut() = Some(handle);
        }
    })
}

fn captured(slot: &Slot) -> ComponentHandle {
    slot.borrow().clone().expect("ref attached")
}

/// Renders a `<div id=name>` around its children and records its lifecycle.
struct Recorder {
    log: EventLog,
    handle: ComponentHandle,
}

impl Component for Recorder {
    fn will_mount(&mut self) {
        self.log.push(format!("will_mount:{}", name_of(&self.handle.props())));
    }

    fn did_mount(&mut self) {
        self.log.push(format!("did_mount:{}", name_of(&self.handle.props())));
    }

    fn will_receive_props(&mut self, next_props: &Props, _next_context: &Context) {
        self.log.push(format!("props:{}", name_of(next_props)));
    }

    fn will_unmount(&mut self) {
        self.log.push(format!("will_unmount:{}", name_of(&self.handle.props())));
    }

    fn render(&mut self, props: &Props, _state: &State, _context: &Context) -> RenderResult {
        let name = name_of(props);
        self.log.push(format!("render:{name}"));
        let children: Vec<Child> = props.children().iter().cloned().map(Child::Node).collect();
        Ok(h("div", attrs! { "id" => name }, children))
    }
}

impl ComponentClass for Recorder {
    fn create(props: &Props, _context: &Context, handle: ComponentHandle) -> Self {
        Self {
            log: log_of(props),
            handle,
        }
    }

    fn name() -> &'static str {
        "Recorder"
    }
}

fn recorder_props(log: &EventLog, name: &str) -> Attributes {
    attrs! { "log" => shared(log), "name" => name }
}

fn recorder(log: &EventLog, name: &str) -> VNode {
    h(ComponentType::of::<Recorder>(), recorder_props(log, name), Vec::<Child>::new())
}

fn recorder_with_ref(log: &EventLog, name: &str, slot: &Slot) -> VNode {
    let mut props = recorder_props(log, name);
    props.insert("ref".into(), Value::from(capture(slot)));
    h(ComponentType::of::<Recorder>(), props, Vec::<Child>::new())
}

#[test]
fn children_mount_before_their_parent() {
    let log = EventLog::new();
    let hook_log = log.clone();
    let options = Options::new()
        .after_mount(move |handle| hook_log.push(format!("hook:{}", name_of(&handle.props()))));
    let mut root = TestRoot::with_options(options);

    let tree = h(
        ComponentType::of::<Recorder>(),
        recorder_props(&log, "parent"),
        [recorder(&log, "a"), recorder(&log, "b")],
    );
    root.render(&tree).unwrap();

    assert_eq!(
        log.take(),
        [
            "will_mount:parent",
            "render:parent",
            "will_mount:a",
            "render:a",
            "will_mount:b",
            "render:b",
            "hook:a",
            "did_mount:a",
            "hook:b",
            "did_mount:b",
            "hook:parent",
            "did_mount:parent",
        ]
    );
    assert_eq!(
        root.html(),
        "<div id=\"parent\"><div id=\"a\"></div><div id=\"b\"></div></div>"
    );
}

#[test]
fn queued_renders_flush_newest_first() {
    let log = EventLog::new();
    let (a, b) = (Slot::default(), Slot::default());
    let mut root = TestRoot::new();
    root.render(&h(
        "main",
        None,
        [recorder_with_ref(&log, "a", &a), recorder_with_ref(&log, "b", &b)],
    ))
    .unwrap();
    log.take();

    let (first_log, second_log) = (log.clone(), log.clone());
    captured(&a).set_state_with(attrs! { "n" => 1 }, move || first_log.push("cb:a"));
    captured(&b).set_state_with(attrs! { "n" => 1 }, move || second_log.push("cb:b"));

    assert_eq!(root.flush_requests(), 1);
    assert!(root.vdom().needs_flush());
    assert!(log.is_empty());

    root.flush().unwrap();

    assert_eq!(log.take(), ["render:b", "cb:b", "render:a", "cb:a"]);
    assert!(!root.vdom().needs_flush());
}

#[test]
fn renders_queued_while_flushing_run_in_the_same_flush() {
    let log = EventLog::new();
    let (a, b, c) = (Slot::default(), Slot::default(), Slot::default());
    let mut root = TestRoot::new();
    root.render(&h(
        "main",
        None,
        [
            recorder_with_ref(&log, "a", &a),
            recorder_with_ref(&log, "b", &b),
            recorder_with_ref(&log, "c", &c),
        ],
    ))
    .unwrap();
    log.take();

    let (callback_log, second, third) = (log.clone(), captured(&b), captured(&c));
    captured(&a).set_state_with(attrs! { "n" => 1 }, move || {
        callback_log.push("cb:a");
        second.set_state(attrs! { "n" => 1 });
        third.set_state(attrs! { "n" => 1 });
    });
    assert_eq!(root.flush_requests(), 1);

    root.flush().unwrap();

    assert_eq!(log.take(), ["render:a", "cb:a", "render:c", "render:b"]);
    assert!(!root.vdom().needs_flush());
    assert_eq!(root.vdom().runtime().queued(), 0);
    assert_eq!(root.flush_requests(), 2);
}

#[test]
fn state_callbacks_run_newest_first_after_one_render() {
    let log = EventLog::new();
    let slot = Slot::default();
    let mut root = TestRoot::new();
    root.render(&recorder_with_ref(&log, "a", &slot)).unwrap();
    log.take();

    let handle = captured(&slot);
    let (first_log, second_log) = (log.clone(), log.clone());
    handle.set_state_with(attrs! { "n" => 1 }, move || first_log.push("first"));
    handle.set_state_with(attrs! { "n" => 2 }, move || second_log.push("second"));
    root.flush().unwrap();

    assert_eq!(log.take(), ["render:a", "second", "first"]);
    assert_eq!(handle.state().get("n"), Some(&Value::from(2)));
}

struct Frozen {
    log: EventLog,
}

impl Component for Frozen {
    fn initial_state(&self) -> State {
        attrs! { "count" => 0 }
    }

    fn should_update(&mut self, _next_props: &Props, _next_state: &State, _next_context: &Context) -> bool {
        self.log.push("should_update");
        false
    }

    fn render(&mut self, _props: &Props, state: &State, _context: &Context) -> RenderResult {
        self.log.push("render");
        let count = state.get("count").and_then(Value::as_int).unwrap_or_default();
        Ok(h("p", None, [count]))
    }
}

impl ComponentClass for Frozen {
    fn create(props: &Props, _context: &Context, _handle: ComponentHandle) -> Self {
        Self { log: log_of(props) }
    }
}

#[test]
fn forced_renders_bypass_should_update() {
    let log = EventLog::new();
    let slot = Slot::default();
    let mut root = TestRoot::new();
    root.render(&h(
        ComponentType::of::<Frozen>(),
        attrs! { "log" => shared(&log), "ref" => capture(&slot) },
        Vec::<Child>::new(),
    ))
    .unwrap();
    assert_eq!(log.take(), ["render"]);
    let handle = captured(&slot);

    handle.set_state(attrs! { "count" => 1 });
    root.flush().unwrap();
    assert_eq!(log.take(), ["should_update"]);
    assert_eq!(root.html(), "<p>0</p>");
    assert_eq!(handle.state().get("count"), Some(&Value::from(1)));

    root.vdom_mut().force_update(&handle).unwrap();
    assert_eq!(log.take(), ["render"]);
    assert_eq!(root.html(), "<p>1</p>");

    handle.set_state(attrs! { "count" => 2 });
    handle.force_update();
    root.flush().unwrap();
    assert_eq!(log.take(), ["render"]);
    assert_eq!(root.html(), "<p>2</p>");
}

struct Mirror {
    log: EventLog,
}

fn mirror_value(props: &Props, _state: &State) -> Option<State> {
    Some(attrs! { "mirror" => props.get("value").cloned() })
}

impl Component for Mirror {
    fn will_mount(&mut self) {
        self.log.push("will_mount");
    }

    fn will_receive_props(&mut self, _next_props: &Props, _next_context: &Context) {
        self.log.push("will_receive_props");
    }

    fn render(&mut self, _props: &Props, state: &State, _context: &Context) -> RenderResult {
        Ok(h("p", None, [state.get("mirror").and_then(Value::to_text)]))
    }
}

impl ComponentClass for Mirror {
    fn create(props: &Props, _context: &Context, _handle: ComponentHandle) -> Self {
        Self { log: log_of(props) }
    }

    fn derived_state_from_props() -> Option<arbor_core::DeriveStateFn> {
        Some(mirror_value)
    }
}

#[test]
fn derived_state_replaces_legacy_hooks() {
    let log = EventLog::new();
    let mut root = TestRoot::new();
    let mirror = |value: &str| {
        h(
            ComponentType::of::<Mirror>(),
            attrs! { "log" => shared(&log), "value" => value },
            Vec::<Child>::new(),
        )
    };

    root.render(&mirror("a")).unwrap();
    assert_eq!(root.html(), "<p>a</p>");
    root.render(&mirror("b")).unwrap();
    assert_eq!(root.html(), "<p>b</p>");
    assert!(log.is_empty(), "{:?}", log.entries());
}

fn outer(props: &Props, _context: &Context) -> RenderResult {
    let mut attributes = attrs! {
        "log" => props.get("log").cloned(),
        "name" => props.get("name").cloned(),
    };
    if let Some(key) = props.get("inner_key") {
        attributes.insert("key".into(), key.clone());
    }
    Ok(h(ComponentType::of::<Recorder>(), attributes, Vec::<Child>::new()))
}

#[test]
fn wrapper_reuses_inner_component_until_key_changes() {
    let log = EventLog::new();
    let outer_ty = ComponentType::function("Outer", outer);
    let tree = |name: &str, key: &str| {
        h(
            outer_ty,
            attrs! { "log" => shared(&log), "name" => name, "inner_key" => key },
            Vec::<Child>::new(),
        )
    };
    let mut root = TestRoot::new();

    let first = root.render(&tree("x", "1")).unwrap();
    assert_eq!(log.take(), ["will_mount:x", "render:x", "did_mount:x"]);
    assert_eq!(root.vdom().component_at(first).map(|handle| handle.name()), Some("Outer"));

    let second = root.render(&tree("y", "1")).unwrap();
    assert_eq!(second, first);
    assert_eq!(log.take(), ["props:y", "render:y"]);

    let third = root.render(&tree("z", "2")).unwrap();
    assert_ne!(third, first);
    assert_eq!(
        log.take(),
        ["will_mount:z", "render:z", "will_unmount:y", "did_mount:z"]
    );
    assert_eq!(root.html(), "<div id=\"z\"></div>");
    assert_eq!(root.vdom().pooled_count(), 1);
}

fn switcher(props: &Props, _context: &Context) -> RenderResult {
    let attributes = attrs! {
        "log" => props.get("log").cloned(),
        "name" => props.get("name").cloned(),
    };
    let ty = if props.get("greet").and_then(Value::as_bool) == Some(true) {
        Greeting()
    } else {
        ComponentType::of::<Recorder>()
    };
    Ok(h(ty, attributes, Vec::<Child>::new()))
}

#[test]
fn wrapper_swaps_inner_component_when_its_type_changes() {
    let log = EventLog::new();
    let switcher_ty = ComponentType::function("Switcher", switcher);
    let tree = |name: &str, greet: bool| {
        h(
            switcher_ty,
            attrs! { "log" => shared(&log), "name" => name, "greet" => greet },
            Vec::<Child>::new(),
        )
    };
    let mut root = TestRoot::new();

    let first = root.render(&tree("a", false)).unwrap();
    assert_eq!(log.take(), ["will_mount:a", "render:a", "did_mount:a"]);

    let second = root.render(&tree("b", true)).unwrap();
    assert_ne!(second, first);
    assert_eq!(log.take(), ["will_unmount:a"]);
    assert_eq!(root.html(), "<p>b</p>");
    assert_eq!(root.vdom().pooled_count(), 1);
    assert_eq!(root.vdom().component_at(second).map(|handle| handle.name()), Some("Switcher"));

    let third = root.render(&tree("c", false)).unwrap();
    assert_eq!(third, first);
    assert_eq!(log.take(), ["will_mount:c", "render:c", "did_mount:c"]);
    assert_eq!(root.html(), "<div id=\"c\"></div>");
    assert_eq!(root.vdom().pooled_count(), 1);
}

#[test]
fn retired_instance_lends_its_node_to_the_next_one() {
    let log = EventLog::new();
    let mut root = TestRoot::new();
    let main = root.render(&h("main", None, [recorder(&log, "a")])).unwrap();
    let first = root.renderer().first_child(main).unwrap().unwrap();
    let live = root.vdom().live_count();

    root.render(&h("main", None, Vec::<Child>::new())).unwrap();
    assert_eq!(root.vdom().pooled_count(), 1);
    assert_eq!(root.vdom().live_count(), live - 1);
    assert_eq!(root.html(), "<main></main>");

    root.render(&h("main", None, [recorder(&log, "b")])).unwrap();
    let second = root.renderer().first_child(main).unwrap().unwrap();
    assert_eq!(second, first);
    assert_eq!(root.vdom().pooled_count(), 0);
    assert_eq!(root.html(), "<main><div id=\"b\"></div></main>");
}

fn faulty(props: &Props, _context: &Context) -> RenderResult {
    if props.get("fail").and_then(Value::as_bool) == Some(true) {
        return Err(Error::render("Faulty", "boom"));
    }
    Ok(VNode::from("fine"))
}

#[test]
fn render_failure_propagates_and_skips_pending_mounts() {
    let log = EventLog::new();
    let faulty_ty = ComponentType::function("Faulty", faulty);
    let mut root = TestRoot::new();

    let err = root
        .render(&h(
            "main",
            None,
            [
                recorder(&log, "a"),
                h(faulty_ty, attrs! { "fail" => true }, Vec::<Child>::new()),
            ],
        ))
        .unwrap_err();

    assert_eq!(err, Error::render("Faulty", "boom"));
    assert_eq!(err.to_string(), "render of Faulty failed: boom");
    assert_eq!(root.vdom().live_count(), 1);

    root.render(&h("p", None, ["ok"])).unwrap();
    assert_eq!(root.html(), "<p>ok</p>");
    assert_eq!(log.take(), ["will_mount:a", "render:a"]);
}

struct Themed;

impl Component for Themed {
    fn child_context(&mut self) -> Option<Attributes> {
        Some(attrs! { "theme" => "dark" })
    }

    fn render(&mut self, props: &Props, _state: &State, _context: &Context) -> RenderResult {
        let children: Vec<Child> = props.children().iter().cloned().map(Child::Node).collect();
        Ok(h("section", None, children))
    }
}

impl ComponentClass for Themed {
    fn create(_props: &Props, _context: &Context, _handle: ComponentHandle) -> Self {
        Themed
    }
}

#[component]
fn ThemeLabel(_props: &Props, context: &Context) -> RenderResult {
    Ok(h("em", None, [context.get("theme").and_then(Value::to_text)]))
}

#[component]
fn Greeting(props: &Props, _context: &Context) -> RenderResult {
    Ok(h("p", None, [props.get("name").and_then(Value::to_text)]))
}

#[test]
fn child_context_reaches_descendants() {
    let mut root = TestRoot::new();
    root.render(&h(
        ComponentType::of::<Themed>(),
        None,
        [h(ThemeLabel(), None, Vec::<Child>::new())],
    ))
    .unwrap();
    assert_eq!(root.html(), "<section><em>dark</em></section>");
}

#[test]
fn function_components_fill_default_props() {
    assert_eq!(Greeting(), Greeting());
    assert_ne!(Greeting(), ThemeLabel());
    assert_eq!(Greeting().name(), "Greeting");
    assert!(Greeting().is_function());

    let greeting = Greeting().with_default_props(|| Some(attrs! { "name" => "world" }));
    let mut root = TestRoot::new();
    root.render(&h(greeting, None, Vec::<Child>::new())).unwrap();
    assert_eq!(root.html(), "<p>world</p>");

    root.render(&h(greeting, attrs! { "name" => "Ada" }, Vec::<Child>::new()))
        .unwrap();
    assert_eq!(root.html(), "<p>Ada</p>");
}

#[test]
fn component_refs_attach_and_detach() {
    let log = EventLog::new();
    let events = EventLog::new();
    let seen = events.clone();
    let node_ref = Ref::new(move |target| match target {
        Some(RefTarget::Component(handle)) => seen.push(format!("attach:{}", handle.name())),
        Some(RefTarget::Node(_)) => seen.push("node"),
        None => seen.push("detach"),
    });
    let mut props = recorder_props(&log, "a");
    props.insert("ref".into(), Value::from(node_ref));
    let mut root = TestRoot::new();

    root.render(&h(
        "main",
        None,
        [h(ComponentType::of::<Recorder>(), props, Vec::<Child>::new())],
    ))
    .unwrap();
    assert_eq!(events.take(), ["attach:Recorder"]);

    root.render(&h("main", None, Vec::<Child>::new())).unwrap();
    assert_eq!(events.take(), ["detach"]);
}

#[test]
fn updates_after_unmount_are_ignored() {
    let log = EventLog::new();
    let slot = Slot::default();
    let mut root = TestRoot::new();
    root.render(&h("main", None, [recorder_with_ref(&log, "a", &slot)]))
        .unwrap();
    let handle = captured(&slot);
    assert!(handle.is_mounted());

    root.render(&h("main", None, Vec::<Child>::new())).unwrap();
    assert!(!handle.is_mounted());
    log.take();

    handle.set_state(attrs! { "n" => 1 });
    root.flush().unwrap();
    assert!(log.is_empty(), "{:?}", log.entries());
}

#[test]
fn deferred_child_updates_wait_for_flush() {
    let log = EventLog::new();
    let mut root = TestRoot::with_options(Options::new().sync_component_updates(false));
    root.render(&h("main", None, [recorder(&log, "a")])).unwrap();
    log.take();

    root.render(&h("main", None, [recorder(&log, "b")])).unwrap();
    assert_eq!(log.take(), ["props:b"]);
    assert_eq!(root.html(), "<main><div id=\"a\"></div></main>");
    assert_eq!(root.flush_requests(), 1);

    root.flush().unwrap();
    assert_eq!(log.take(), ["render:b"]);
    assert_eq!(root.html(), "<main><div id=\"b\"></div></main>");
}

struct Tracker {
    log: EventLog,
}

impl Component for Tracker {
    fn snapshot_before_update(&mut self, prev_props: &Props, _prev_state: &State) -> Option<Value> {
        Some(Value::from(format!("was {}", name_of(prev_props))))
    }

    fn did_update(&mut self, _prev_props: &Props, _prev_state: &State, snapshot: Option<&Value>) {
        let snapshot = snapshot.and_then(Value::to_text).unwrap_or_default();
        self.log.push(format!("did_update:{snapshot}"));
    }

    fn render(&mut self, props: &Props, _state: &State, _context: &Context) -> RenderResult {
        Ok(h("p", None, [name_of(props)]))
    }
}

impl ComponentClass for Tracker {
    fn create(props: &Props, _context: &Context, _handle: ComponentHandle) -> Self {
        Self { log: log_of(props) }
    }
}

#[test]
fn did_update_receives_snapshot_of_previous_props() {
    let log = EventLog::new();
    let hook_log = log.clone();
    let options = Options::new()
        .after_update(move |handle| hook_log.push(format!("after_update:{}", name_of(&handle.props()))));
    let mut root = TestRoot::with_options(options);
    let tracker = |name: &str| {
        h(
            ComponentType::of::<Tracker>(),
            attrs! { "log" => shared(&log), "name" => name },
            Vec::<Child>::new(),
        )
    };

    root.render(&tracker("a")).unwrap();
    assert!(log.is_empty());
    root.render(&tracker("b")).unwrap();

    assert_eq!(log.take(), ["did_update:was a", "after_update:b"]);
    assert_eq!(root.html(), "<p>b</p>");
}

#[test]
fn teardown_unmounts_parent_then_children_last_first() {
    let log = EventLog::new();
    let hook_log = log.clone();
    let options = Options::new()
        .before_unmount(move |handle| hook_log.push(format!("before:{}", name_of(&handle.props()))));
    let mut root = TestRoot::with_options(options);
    root.render(&h(
        ComponentType::of::<Recorder>(),
        recorder_props(&log, "parent"),
        [recorder(&log, "a"), recorder(&log, "b")],
    ))
    .unwrap();
    log.take();

    root.unmount().unwrap();

    assert_eq!(
        log.take(),
        [
            "before:parent",
            "will_unmount:parent",
            "before:b",
            "will_unmount:b",
            "before:a",
            "will_unmount:a",
        ]
    );
    assert_eq!(root.html(), "");
    assert_eq!(root.vdom().live_count(), 0);
    assert_eq!(root.vdom().pooled_count(), 3);
}
