//! Sequential composition of processors.

use super::metadata::{self, CacheKey, Metadata};
use super::{Input, Output, Processor, ProcessorRef};
use crate::error::Result;

/// Processors chained into one.
///
/// Data flows through the stages in order. Each stage sees the caller's
/// metadata merged with everything earlier stages produced, and the
/// composed result carries only the merged contributions of its stages.
pub struct Composed {
    name: String,
    stages: Vec<ProcessorRef>,
}

/// Chain `stages` into a single processor.
pub fn compose(stages: Vec<ProcessorRef>) -> Composed {
    let name = stages
        .iter()
        .map(|s| s.name())
        .collect::<Vec<_>>()
        .join(" > ");
    Composed { name, stages }
}

impl Composed {
    pub fn stages(&self) -> &[ProcessorRef] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Processor for Composed {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, input: &Input) -> Result<Output> {
        let mut data = input.data.clone();
        let mut produced = Metadata::new();

        for stage in &self.stages {
            let mut seen = input.metadata.clone();
            metadata::merge(&mut seen, produced.clone());

            let (next, contributed) = stage.process(&input.with(data, seen))?.into_parts();
            metadata::validate(stage.name(), &contributed)?;
            metadata::merge(&mut produced, contributed);
            data = next;
        }

        Ok(Output::Record {
            data,
            metadata: produced,
        })
    }

    fn cache_key(&self) -> Option<CacheKey> {
        Some(CacheKey::List(
            self.stages.iter().map(|s| s.cache_key().into()).collect(),
        ))
    }
}
