//! The `Processor` capability and its probability gate.
//!
//! A processor is a transform `Sample -> Sample`. Randomness is never drawn
//! from global state: every call receives the random source of the current
//! pipeline run, so a run is reproducible from its seed and independent runs
//! can execute on different threads.

use rand::{Rng, RngCore};

use crate::{
    error::{ProcessorError, ProcessorResult},
    sample::Sample,
};

/// Atomic unit of work in a [`Pipeline`](crate::Pipeline).
pub trait Processor: Send + Sync {
    /// Transforms `sample`, drawing any randomness from `rng`.
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample>;

    /// Short type name used in logs and errors.
    fn name(&self) -> &'static str {
        short_type_name::<Self>()
    }

    /// Terminal processors (writers) perform I/O and must not be gated.
    fn is_terminal(&self) -> bool {
        false
    }
}

impl<P: Processor + ?Sized> Processor for Box<P> {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        (**self).process(sample, rng)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn is_terminal(&self) -> bool {
        (**self).is_terminal()
    }
}

pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Runs `inner` with probability `probability` and passes the sample through
/// unchanged otherwise. The Bernoulli draw is made once per call.
#[derive(Debug, Clone)]
pub struct Probabilistic<P> {
    inner: P,
    probability: f64,
}

impl<P: Processor> Probabilistic<P> {
    pub fn new(inner: P, probability: f64) -> ProcessorResult<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ProcessorError::config(
                inner.name(),
                format!("probability must be in [0, 1] (got {probability})"),
            ));
        }
        if inner.is_terminal() {
            return Err(ProcessorError::config(
                inner.name(),
                "terminal processors cannot be probability-gated",
            ));
        }
        Ok(Self { inner, probability })
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: Processor> Processor for Probabilistic<P> {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        if rng.random_bool(self.probability) {
            self.inner.process(sample, rng)
        } else {
            Ok(sample)
        }
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

/// Builder helpers available on every processor.
pub trait ProcessorExt: Processor + Sized {
    /// Wraps `self` in a [`Probabilistic`] gate.
    fn with_probability(self, probability: f64) -> ProcessorResult<Probabilistic<Self>> {
        Probabilistic::new(self, probability)
    }
}

impl<P: Processor> ProcessorExt for P {}

/// Uniform `f64` draw in `[low, high)`; returns `low` when the range is empty.
pub(crate) fn uniform(rng: &mut dyn RngCore, low: f64, high: f64) -> f64 {
    low + (high - low) * rng.random::<f64>()
}
