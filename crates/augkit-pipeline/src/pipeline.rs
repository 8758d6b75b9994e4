//! Ordered, sequential composition of processors.

use std::fmt;

use rand::{rngs::StdRng, RngCore, SeedableRng};

use crate::{
    error::ProcessorResult,
    processor::Processor,
    sample::Sample,
};

/// An ordered list of processors applied one after another.
///
/// The pipeline adds no randomness of its own and never reorders its stages;
/// the first failing stage aborts the run. A pipeline is itself a
/// [`Processor`], so pipelines nest, and concatenation with [`then`](Self::then)
/// behaves exactly like running the two pipelines back to back on the same
/// random source.
#[derive(Default)]
pub struct Pipeline {
    processors: Vec<Box<dyn Processor>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a processor, builder style.
    pub fn add<P: Processor + 'static>(mut self, processor: P) -> Self {
        self.push(processor);
        self
    }

    pub fn push<P: Processor + 'static>(&mut self, processor: P) {
        self.processors.push(Box::new(processor));
    }

    pub fn push_boxed(&mut self, processor: Box<dyn Processor>) {
        self.processors.push(processor);
    }

    /// Concatenates `other` after the stages of `self`.
    pub fn then(mut self, other: Pipeline) -> Self {
        self.processors.extend(other.processors);
        self
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Threads `sample` through every stage in order.
    pub fn run(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let mut sample = sample;
        for (stage, processor) in self.processors.iter().enumerate() {
            tracing::debug!(stage, processor = processor.name(), "running processor");
            sample = processor.process(sample, rng).inspect_err(|error| {
                tracing::warn!(stage, processor = processor.name(), %error, "pipeline aborted");
            })?;
        }
        Ok(sample)
    }

    /// Runs with a fresh `StdRng` seeded from `seed`.
    pub fn run_seeded(&self, sample: Sample, seed: u64) -> ProcessorResult<Sample> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.run(sample, &mut rng)
    }

    /// Runs every sample with its own random source seeded from
    /// `seed + index`, so each result depends only on its position.
    pub fn run_many(&self, samples: Vec<Sample>, seed: u64) -> ProcessorResult<Vec<Sample>> {
        samples
            .into_iter()
            .enumerate()
            .map(|(index, sample)| self.run_seeded(sample, seed.wrapping_add(index as u64)))
            .collect()
    }
}

impl Processor for Pipeline {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        self.run(sample, rng)
    }

    /// A nested pipeline is terminal as soon as one of its stages is.
    fn is_terminal(&self) -> bool {
        self.processors.iter().any(|p| p.is_terminal())
    }
}

impl FromIterator<Box<dyn Processor>> for Pipeline {
    fn from_iter<I: IntoIterator<Item = Box<dyn Processor>>>(iter: I) -> Self {
        Self {
            processors: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("processors", &self.names())
            .finish()
    }
}
