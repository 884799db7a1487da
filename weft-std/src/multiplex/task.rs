use super::{Tag, TaggedReader};
use crate::registry::BehaviorRegistry;
use std::sync::Arc;
use weft_core::{
    DispatchError, RecordReader, RecordWriter, Result, Slot, TaskBody, TaskContext,
};

/// Runs the mapper configured for the sub-source a split came from.
///
/// Each sub-source `i` of the composite recorded under `component` names its
/// own mapper in the slot `<component>.mapper.<i>`. The input must be the
/// [`TaggedReader`] a [`MultiplexSource`](super::MultiplexSource) opened.
/// Mappers are resolved on first use and kept for later tasks run by the
/// same instance.
pub struct MultiplexMapper {
    registry: Arc<BehaviorRegistry>,
    component: String,
    bodies: Vec<Option<Box<dyn TaskBody>>>,
}

impl MultiplexMapper {
    /// A mapper for the composite recorded under `component`.
    pub fn new(registry: Arc<BehaviorRegistry>, component: impl Into<String>) -> Self {
        Self {
            registry,
            component: component.into(),
            bodies: Vec::new(),
        }
    }

    /// The slot holding the mapper of sub-source `tag`.
    pub fn slot(component: &str, tag: Tag) -> Slot {
        Slot::with_id(format!("{component}.mapper"), tag.0)
    }

    fn body(&mut self, task: &TaskContext, tag: Tag) -> Result<&mut Box<dyn TaskBody>> {
        let count = task
            .conf()
            .require_u32(&format!("{}.count", self.component))? as usize;
        let index = tag.check(count)?;
        if self.bodies.len() < count {
            self.bodies.resize_with(count, || None);
        }

        match &mut self.bodies[index] {
            Some(body) => Ok(body),
            empty => {
                let slot = Self::slot(&self.component, tag);
                let body = self.registry.resolve(task.conf(), &slot)?;

                #[cfg(feature = "tracing")]
                tracing::debug!(%tag, %slot, "resolved sub-source mapper");

                Ok(empty.insert(body))
            }
        }
    }
}

impl TaskBody for MultiplexMapper {
    fn run(
        &mut self,
        task: &TaskContext,
        input: &mut dyn RecordReader,
        output: &mut dyn RecordWriter,
    ) -> Result<()> {
        let tag = input
            .as_any()
            .and_then(|reader| reader.downcast_ref::<TaggedReader>())
            .map(TaggedReader::tag)
            .ok_or(DispatchError::Untagged)?;
        self.body(task, tag)?.run(task, input, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSink, VecReader};
    use serde_json::json;
    use weft_core::{
        BehaviorReference, BoxError, Capability, Conf, ConfBuilder, JobContext, SinkFormat,
        TaskAttemptId, Value, WeftError,
    };

    struct Label(&'static str);

    impl TaskBody for Label {
        fn run(
            &mut self,
            _task: &TaskContext,
            input: &mut dyn RecordReader,
            output: &mut dyn RecordWriter,
        ) -> Result<()> {
            while input.advance()? {
                let key = input.current_key().cloned().unwrap_or(Value::Null);
                output.write(key, json!(self.0))?;
            }
            Ok(())
        }
    }

    fn registry() -> Arc<BehaviorRegistry> {
        Arc::new(
            BehaviorRegistry::builder()
                .define("jobs", "left", |_conf: &Conf, _options: Option<Value>| {
                    Ok::<_, BoxError>(Capability::task(Label("left")))
                })
                .define("jobs", "right", |_conf: &Conf, _options: Option<Value>| {
                    Ok::<_, BoxError>(Capability::task(Label("right")))
                })
                .build(),
        )
    }

    fn task() -> TaskContext {
        let conf = ConfBuilder::new()
            .set("in.count", "2")
            .behavior(&MultiplexMapper::slot("in", Tag(0)), &BehaviorReference::new("jobs/left"))
            .behavior(&MultiplexMapper::slot("in", Tag(1)), &BehaviorReference::new("jobs/right"))
            .build();
        TaskContext::new(
            JobContext::new("job", conf),
            TaskAttemptId { task: 0, attempt: 0 },
        )
    }

    fn tagged(tag: u32, key: &str) -> TaggedReader {
        TaggedReader::new(Tag(tag), Box::new(VecReader::new(vec![(json!(key), Value::Null)])))
    }

    #[test]
    fn test_slot_layout() {
        assert_eq!(MultiplexMapper::slot("in", Tag(3)).var_key(), "in.mapper.3.var");
    }

    #[test]
    fn test_runs_the_mapper_of_the_tagged_sub_source() {
        let task = task();
        let out = RecordingSink::new("out");
        let mut writer = out.open_writer(&task).unwrap();
        let mut mapper = MultiplexMapper::new(registry(), "in");

        mapper.run(&task, &mut tagged(1, "r"), &mut writer).unwrap();
        mapper.run(&task, &mut tagged(0, "l"), &mut writer).unwrap();

        assert_eq!(
            out.records(),
            vec![(json!("r"), json!("right")), (json!("l"), json!("left"))]
        );
    }

    #[test]
    fn test_untagged_input_is_rejected() {
        let task = task();
        let out = RecordingSink::new("out");
        let mut writer = out.open_writer(&task).unwrap();
        let mut mapper = MultiplexMapper::new(registry(), "in");

        let mut plain = VecReader::new(vec![(json!("k"), Value::Null)]);
        let err = mapper.run(&task, &mut plain, &mut writer).unwrap_err();
        assert!(matches!(err, WeftError::Dispatch(DispatchError::Untagged)));

        let err = mapper.run(&task, &mut tagged(2, "k"), &mut writer).unwrap_err();
        assert!(matches!(
            err,
            WeftError::Dispatch(DispatchError::TagOutOfRange { tag: 2, len: 2 })
        ));
        assert!(out.records().is_empty());
    }
}
