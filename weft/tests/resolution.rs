//! Resolving behaviors from the job configuration.

mod common;

use common::{read_all, registry, task};
use std::sync::Arc;
use weft::{
    BehaviorReference, Capability, CapabilityKind, Conf, ConfBuilder, ConfigError, Configurable,
    DecodeError, ProxySinkFormat, ProxyTask, RecordWriter, ResolutionError, SinkFormat, Slot,
    SourceFormat, TaskBody, WeftError,
    serde_json::json,
    testing::{RecordingSink, RecordingSource, VecReader},
};

fn sinks() -> [RecordingSink; 2] {
    [RecordingSink::new("first"), RecordingSink::new("second")]
}

#[test]
fn test_mapper_with_options_from_conf() {
    let (registry, counters) = registry(RecordingSource::new(vec![]), sinks());
    let conf = ConfBuilder::new()
        .behavior(
            &Slot::with_id("mapper", 3),
            &BehaviorReference::new("jobs/scale").with_options(json!({"factor": 10})),
        )
        .build();
    assert_eq!(conf.get("mapper.3.var"), Some("jobs/scale"));
    assert_eq!(conf.get("mapper.3.options"), Some(r#"{"factor":10}"#));

    let ctx = task(conf.clone(), 0, 0);
    let out = RecordingSink::new("out");
    let mut writer = out.open_writer(&ctx).unwrap();

    let mut mapper = ProxyTask::mapper(registry, 3);
    mapper.set_conf(conf).unwrap();
    mapper
        .run(&ctx, &mut VecReader::new(vec![(json!("a"), json!(2))]), &mut writer)
        .unwrap();

    assert_eq!(counters.scale.options(), vec![Some(json!({"factor": 10}))]);
    assert_eq!(out.records(), vec![(json!("a"), json!(20))]);
}

#[test]
fn test_mapper_without_options_receives_conf_only() {
    let (registry, counters) = registry(RecordingSource::new(vec![]), sinks());
    let conf = ConfBuilder::new()
        .behavior(&Slot::with_id("mapper", 0), &BehaviorReference::new("jobs/scale"))
        .build();

    let mut mapper = ProxyTask::mapper(registry, 0);
    mapper.set_conf(conf).unwrap();

    assert_eq!(counters.scale.calls(), 1);
    assert_eq!(counters.scale.options(), vec![None]);
}

#[test]
fn test_legacy_args_key_is_not_spliced() {
    let (registry, counters) = registry(RecordingSource::new(vec![]), sinks());
    let conf = ConfBuilder::new()
        .set("reducer.1.var", "jobs/scale")
        .set("reducer.1.args", "[5]")
        .build();

    let mut reducer = ProxyTask::reducer(registry, 1);
    reducer.set_conf(conf).unwrap();

    assert_eq!(counters.scale.options(), vec![None]);
}

#[test]
fn test_single_key_encoding_with_marker() {
    let (registry, counters) = registry(RecordingSource::new(vec![json!(1)]), sinks());
    let conf = ConfBuilder::new().set("input-format", "#'io/numbers").build();

    let format: Arc<dyn SourceFormat> = registry
        .resolve(&conf, &Slot::single("input-format"))
        .unwrap();
    let splits = format.splits(&common::job(conf.clone())).unwrap();
    let mut reader = format
        .open_reader(splits[0].as_ref(), &task(conf, 0, 0))
        .unwrap();

    assert_eq!(read_all(reader.as_mut()), vec![(json!(1), json!(null))]);
    assert_eq!(counters.numbers.calls(), 1);
}

#[test]
fn test_missing_var_key_names_the_key() {
    let (registry, _counters) = registry(RecordingSource::new(vec![]), sinks());
    let mut mapper = ProxyTask::mapper(registry, 4);

    let err = mapper.set_conf(Conf::empty()).unwrap_err();
    match err {
        WeftError::Config(ConfigError::Missing { key }) => assert_eq!(key, "mapper.4.var"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_malformed_options_name_the_key() {
    let (registry, counters) = registry(RecordingSource::new(vec![]), sinks());
    let conf = ConfBuilder::new()
        .set("mapper.2.var", "jobs/scale")
        .set("mapper.2.options", "{factor: 10")
        .build();

    let err = ProxyTask::mapper(registry, 2).set_conf(conf).unwrap_err();
    assert!(matches!(err, WeftError::Decode(DecodeError::Json { .. })));
    assert_eq!(
        err.to_string(),
        "decode error: invalid structured value in configuration key `mapper.2.options`"
    );
    assert_eq!(counters.scale.calls(), 0);
}

#[test]
fn test_malformed_and_unknown_names() {
    let (registry, _counters) = registry(RecordingSource::new(vec![]), sinks());

    for (name, expect_malformed) in [("no-slash", true), ("/symbol", true), ("jobs/", true), ("nope/scale", false)] {
        let conf = ConfBuilder::new().set("combiner.0.var", name).build();
        let err = registry
            .resolve::<Box<dyn TaskBody>>(&conf, &Slot::with_id("combiner", 0))
            .err()
            .unwrap();
        let malformed = matches!(
            err,
            WeftError::Resolution(ResolutionError::MalformedName { .. })
        );
        assert_eq!(malformed, expect_malformed, "{name}: {err}");
    }
}

#[test]
fn test_wrong_capability_is_reported() {
    let (registry, _counters) = registry(RecordingSource::new(vec![]), sinks());
    let conf = ConfBuilder::new().set("output-format", "jobs/scale").build();

    let mut proxy = ProxySinkFormat::new(registry, Slot::single("output-format"));
    let err = proxy.set_conf(conf).unwrap_err();
    match err {
        WeftError::Resolution(ResolutionError::WrongCapability {
            qualified,
            expected,
            found,
        }) => {
            assert_eq!(qualified, "jobs/scale");
            assert_eq!(expected, CapabilityKind::Sink);
            assert_eq!(found, CapabilityKind::Task);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_explicit_options_override_conf() {
    let (registry, counters) = registry(RecordingSource::new(vec![]), sinks());
    let conf = ConfBuilder::new()
        .set("mapper.0.var", "jobs/scale")
        .set("mapper.0.options", r#"{"factor": 2}"#)
        .build();

    let ctx = task(conf.clone(), 0, 0);
    let out = RecordingSink::new("out");
    let mut writer = out.open_writer(&ctx).unwrap();

    let mut mapper =
        ProxyTask::bind(registry, conf.clone(), Slot::with_id("mapper", 0), Some(json!({"factor": 7})))
            .unwrap();
    mapper.set_conf(conf).unwrap();
    mapper
        .run(&ctx, &mut VecReader::new(vec![(json!("k"), json!(1))]), &mut writer)
        .unwrap();
    writer.close(&ctx).unwrap();

    assert_eq!(counters.scale.options(), vec![Some(json!({"factor": 7}))]);
    assert_eq!(out.records(), vec![(json!("k"), json!(7))]);
}

#[test]
fn test_resolve_reference_outside_conf() {
    let (registry, _counters) = registry(RecordingSource::new(vec![]), sinks());
    let reference = BehaviorReference::new("io/memory").with_options(json!({"records": [1, 2]}));

    let format: Arc<dyn SourceFormat> = registry
        .resolve_reference(&Conf::empty(), &reference)
        .unwrap();
    let splits = format.splits(&common::job(Conf::empty())).unwrap();
    assert_eq!(splits[0].value(), json!({"length": 2, "records": [1, 2]}));

    let capability = registry
        .resolve_capability(
            &ConfBuilder::new().set("input-format", "io/memory").build(),
            &Slot::single("input-format"),
            None,
        )
        .unwrap();
    assert_eq!(capability.0, "io/memory");
    assert!(matches!(capability.1, Capability::Source(_)));
}
