use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rstest::{fixture, rstest};
use serial_test::serial;
use tagforge_core::{
    DiagnosticLog, DiagnosticSink, Introspect, Location, PropertyDescriptor, Tag, TagAttribute,
    TagAttributes, TargetType, Value, ValueType,
};
use tagforge_expression_mock::{FnMethod, MockContext, MockExpressionFactory};
use tagforge_runtime::{
    ComponentConfig, ComponentHandler, EngineOptions, MetadataCache, MethodRule, TagConfig,
    TagEnvironment, TagHandler,
};

#[derive(Default)]
struct CommandButton {
    style_class: Option<String>,
    label: Option<String>,
    tab_index: Option<i64>,
    on_click: Option<Value>,
}

impl Introspect for CommandButton {
    fn properties() -> Vec<PropertyDescriptor> {
        vec![
            PropertyDescriptor::new("styleClass", ValueType::String)
                .with_writer(|b: &mut CommandButton, v| b.style_class = v.as_str().map(str::to_owned)),
            PropertyDescriptor::new("label", ValueType::String)
                .with_writer(|b: &mut CommandButton, v| b.label = v.as_str().map(str::to_owned)),
            PropertyDescriptor::new("tabindex", ValueType::Int)
                .with_writer(|b: &mut CommandButton, v| b.tab_index = v.as_int()),
            PropertyDescriptor::new("onClick", ValueType::Method)
                .with_writer(|b: &mut CommandButton, v| b.on_click = Some(v)),
        ]
    }
}

struct Setup {
    environment: Arc<TagEnvironment>,
    log: Arc<DiagnosticLog>,
}

#[fixture]
fn setup() -> Setup {
    let log = Arc::new(DiagnosticLog::new());
    let environment = Arc::new(
        TagEnvironment::new(EngineOptions::default())
            .with_diagnostics(Arc::clone(&log) as Arc<dyn DiagnosticSink>),
    );
    Setup { environment, log }
}

fn button_tag(attributes: &[(&str, &str)]) -> Arc<Tag> {
    let attributes = attributes
        .iter()
        .map(|(name, value)| {
            TagAttribute::new(Location::new("/views/order.xhtml", 12, 9), "", *name, *name, *value)
                .expect("valid attribute")
        })
        .collect();
    Tag::new(
        Location::new("/views/order.xhtml", 12, 1),
        "jakarta.faces.html",
        "commandButton",
        "h:commandButton",
        TagAttributes::new(attributes),
    )
}

fn button_handler(setup: &Setup, attributes: &[(&str, &str)]) -> ComponentHandler {
    ComponentHandler::new(ComponentConfig {
        tag_config: TagConfig::new(button_tag(attributes), "j_id1", Arc::clone(&setup.environment)),
        component_type: "jakarta.faces.HtmlCommandButton".into(),
        renderer_type: Some("jakarta.faces.Button".into()),
    })
    .with_rules(|ruleset| {
        ruleset.add_rule(Arc::new(MethodRule::new("onClick", ValueType::Any, Vec::new())));
    })
}

fn bean_with_action(calls: &Arc<AtomicUsize>) -> Value {
    let calls = Arc::clone(calls);
    let mut bean = BTreeMap::new();
    bean.insert(
        "go".to_owned(),
        FnMethod::value("go", move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::from("done"))
        }),
    );
    Value::from(bean)
}

#[rstest]
fn style_class_and_deferred_callback(setup: Setup) {
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = Arc::new(MockExpressionFactory::new());
    let ctx = MockContext::with_factory(Arc::clone(&factory)).with_variable("bean", bean_with_action(&calls));

    let handler = button_handler(&setup, &[("class", "big"), ("onClick", "#{bean.go}")]);
    let mut button = CommandButton::default();
    handler.apply(&ctx, &mut button).unwrap();

    assert_eq!(button.style_class.as_deref(), Some("big"));
    assert_eq!(factory.method_compilations(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let callback = button.on_click.as_ref().and_then(Value::as_method).expect("compiled callback");
    assert_eq!(callback.invoke(&ctx, &[]).unwrap(), Value::from("done"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(setup.log.is_empty());
}

#[rstest]
fn literal_is_coerced_once_across_instances(setup: Setup) {
    let factory = Arc::new(MockExpressionFactory::new());
    let ctx = MockContext::with_factory(Arc::clone(&factory));
    let handler = button_handler(&setup, &[("tabindex", "3")]);

    let mut first = CommandButton::default();
    let mut second = CommandButton::default();
    handler.apply(&ctx, &mut first).unwrap();
    handler.apply(&ctx, &mut second).unwrap();

    assert_eq!(first.tab_index, Some(3));
    assert_eq!(second.tab_index, Some(3));
    assert_eq!(factory.coercions(), 1);
}

#[rstest]
fn literal_string_skips_coercion(setup: Setup) {
    let factory = Arc::new(MockExpressionFactory::new());
    let ctx = MockContext::with_factory(Arc::clone(&factory));
    let handler = button_handler(&setup, &[("label", "Save")]);

    let mut first = CommandButton::default();
    let mut second = CommandButton::default();
    handler.apply(&ctx, &mut first).unwrap();
    handler.apply(&ctx, &mut second).unwrap();

    assert_eq!(first.label.as_deref(), Some("Save"));
    assert_eq!(second.label.as_deref(), Some("Save"));
    assert_eq!(factory.coercions(), 0);
}

#[rstest]
#[case("A")]
#[case("B")]
fn deferred_label_follows_the_context(setup: Setup, #[case] name: &str) {
    let handler = button_handler(&setup, &[("label", "#{item.name}")]);
    let mut item = BTreeMap::new();
    item.insert("name".to_owned(), Value::from(name));
    let ctx = MockContext::new().with_variable("item", Value::from(item));

    let mut button = CommandButton::default();
    handler.apply(&ctx, &mut button).unwrap();
    assert_eq!(button.label.as_deref(), Some(name));
}

#[rstest]
fn deferred_label_is_live_across_contexts(setup: Setup) {
    let handler = button_handler(&setup, &[("label", "#{item.name}")]);
    let context = |name: &str| {
        let mut item = BTreeMap::new();
        item.insert("name".to_owned(), Value::from(name));
        MockContext::new().with_variable("item", Value::from(item))
    };

    let mut button = CommandButton::default();
    handler.apply(&context("A"), &mut button).unwrap();
    assert_eq!(button.label.as_deref(), Some("A"));
    handler.apply(&context("B"), &mut button).unwrap();
    assert_eq!(button.label.as_deref(), Some("B"));
}

#[rstest]
fn each_unclaimed_attribute_is_one_diagnostic(setup: Setup) {
    let handler = button_handler(&setup, &[("label", "Ok"), ("tooltip", "t"), ("accesskey", "k")]);
    let mut button = CommandButton::default();
    handler.apply(&MockContext::new(), &mut button).unwrap();

    assert_eq!(button.label.as_deref(), Some("Ok"));
    let mut names: Vec<_> = setup.log.entries().into_iter().map(|entry| entry.name).collect();
    names.sort();
    assert_eq!(names, ["accesskey", "tooltip"]);
}

#[rstest]
fn evaluation_failure_names_the_attribute(setup: Setup) {
    let handler = button_handler(&setup, &[("label", "#{item.missing}")]);
    let ctx = MockContext::new().with_variable("item", Value::from(BTreeMap::new()));
    let err = handler.apply(&ctx, &mut CommandButton::default()).unwrap_err();
    assert!(err.to_string().starts_with("/views/order.xhtml @12,9 label=\"#{item.missing}\""));
}

#[test]
#[serial]
fn shared_metadata_cache_introspects_once() {
    let cache = MetadataCache::global();
    cache.evict(&TargetType::of::<CommandButton>());
    let before = cache.introspections();

    let environment = Arc::new(TagEnvironment::shared(EngineOptions::default()));
    for _ in 0..3 {
        let handler = ComponentHandler::new(ComponentConfig {
            tag_config: TagConfig::new(button_tag(&[("label", "x")]), "j_id2", Arc::clone(&environment)),
            component_type: "jakarta.faces.HtmlCommandButton".into(),
            renderer_type: None,
        });
        handler.apply(&MockContext::new(), &mut CommandButton::default()).unwrap();
    }
    assert_eq!(cache.introspections() - before, 1);
}
