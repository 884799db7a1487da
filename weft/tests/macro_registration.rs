//! Behaviors registered at link time with `#[weft::behavior]`.

#![cfg(all(feature = "macros", feature = "inventory"))]

mod common;

use common::task;
use lazy_static::lazy_static;
use std::sync::Mutex;
use weft::{
    BehaviorReference, BehaviorRegistry, BoxError, Capability, Conf, ConfBuilder, Configurable,
    ProxyTask, ResolutionError, SinkFormat, Slot, Value, WeftError,
    serde_json::json,
    testing::{RecordingSink, VecReader},
};

lazy_static! {
    static ref SEEN_OPTIONS: Mutex<Vec<Option<Value>>> = Mutex::new(Vec::new());
}

#[weft::behavior("macro-jobs/double")]
fn double(_conf: &Conf, options: Option<Value>) -> Result<Capability, BoxError> {
    SEEN_OPTIONS.lock().unwrap().push(options);
    Ok(Capability::task(common::Scale { factor: 2 }))
}

#[weft::behavior("#'macro-jobs/scale")]
fn configurable(conf: &Conf, options: Option<Value>) -> Result<Capability, BoxError> {
    common::scale(conf, options)
}

#[weft::behavior]
fn identity(_conf: &Conf, _options: Option<Value>) -> Result<Capability, BoxError> {
    Ok(Capability::task(common::Scale { factor: 1 }))
}

fn run_mapper(conf: Conf) -> Vec<(Value, Value)> {
    let ctx = task(conf.clone(), 0, 0);
    let out = RecordingSink::new("out");
    let mut writer = out.open_writer(&ctx).unwrap();

    let mut mapper = ProxyTask::mapper(BehaviorRegistry::global(), 0);
    mapper.set_conf(conf).unwrap();
    mapper
        .run(&ctx, &mut VecReader::new(vec![(json!("k"), json!(3))]), &mut writer)
        .unwrap();
    out.records()
}

#[test]
fn test_explicitly_named_behavior_resolves() {
    let conf = ConfBuilder::new()
        .behavior(
            &Slot::with_id("mapper", 0),
            &BehaviorReference::new("macro-jobs/double").with_options(json!({"tag": "x"})),
        )
        .build();

    assert_eq!(run_mapper(conf), vec![(json!("k"), json!(6))]);
    assert!(
        SEEN_OPTIONS
            .lock()
            .unwrap()
            .contains(&Some(json!({"tag": "x"})))
    );
}

#[test]
fn test_marker_is_stripped_from_the_registered_name() {
    let conf = ConfBuilder::new()
        .behavior(
            &Slot::with_id("mapper", 0),
            &BehaviorReference::new("macro-jobs/scale").with_options(json!({"factor": 5})),
        )
        .build();

    assert_eq!(run_mapper(conf), vec![(json!("k"), json!(15))]);
}

#[test]
fn test_default_name_uses_module_path_and_function_name() {
    let registry = BehaviorRegistry::global();
    let qualified = format!("{}/identity", module_path!());
    assert!(registry.contains(&qualified));

    let conf = ConfBuilder::new().set("mapper.0.var", &qualified).build();
    assert_eq!(run_mapper(conf), vec![(json!("k"), json!(3))]);
}

#[test]
fn test_global_registry_is_shared() {
    let first = BehaviorRegistry::global();
    let second = BehaviorRegistry::global();
    assert!(std::sync::Arc::ptr_eq(&first, &second));

    let conf = ConfBuilder::new().set("mapper.0.var", "macro-jobs/missing").build();
    let err = ProxyTask::mapper(first, 0).set_conf(conf).unwrap_err();
    assert!(matches!(
        err,
        WeftError::Resolution(ResolutionError::UnknownSymbol { .. })
    ));
}
