use anyhow::{bail, Result};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::governor::{LoadSample, LoadSampler};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Value(f32),
    Unavailable,
    Fail,
    Panic,
}

/// Reading shared between a test and the sampler it scripts.
#[derive(Debug, Clone)]
pub struct SharedReading(Arc<Mutex<Reading>>);

impl SharedReading {
    pub fn new(initial: Reading) -> Self {
        Self(Arc::new(Mutex::new(initial)))
    }

    pub fn value(v: f32) -> Self {
        Self::new(Reading::Value(v))
    }

    pub fn set(&self, reading: Reading) {
        *self.0.lock() = reading;
    }

    pub fn set_value(&self, v: f32) {
        self.set(Reading::Value(v));
    }

    pub fn get(&self) -> Reading {
        *self.0.lock()
    }

    pub fn sampler(&self, name: &str) -> Box<dyn LoadSampler> {
        Box::new(ScriptedSampler {
            name: name.to_string(),
            reading: self.clone(),
        })
    }
}

/// Sampler that reports whatever its [`SharedReading`] currently holds.
pub struct ScriptedSampler {
    name: String,
    reading: SharedReading,
}

impl LoadSampler for ScriptedSampler {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample(&mut self) -> Result<Option<LoadSample>> {
        match self.reading.get() {
            Reading::Value(v) => Ok(Some(LoadSample::new(self.name.clone(), v))),
            Reading::Unavailable => Ok(None),
            Reading::Fail => bail!("{}: counter read failed", self.name),
            Reading::Panic => panic!("{}: counter exploded", self.name),
        }
    }
}
