//! Objective/evaluation function metadata.
//!
//! Functions are registered explicitly, not discovered by reflection: the
//! numeric side evaluates them, the registry only knows their display name,
//! optimum direction and value formatting.

use std::collections::HashMap;

use crate::error::{Result, TrainError};

/// Whether smaller or larger values of a function are better.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    /// Strict improvement of `new` over `current`.
    pub fn improves(self, new: f64, current: f64) -> bool {
        match self {
            Direction::Minimize => new < current,
            Direction::Maximize => new > current,
        }
    }
}

/// Descriptor of a registered function.
#[derive(Clone, Debug)]
pub struct FunctionSpec {
    pub display_name: String,
    pub direction: Direction,
    pub format: fn(f64) -> String,
}

impl FunctionSpec {
    pub fn new(display_name: &str, direction: Direction, format: fn(f64) -> String) -> Self {
        Self { display_name: display_name.to_string(), direction, format }
    }
}

fn plain(value: f64) -> String {
    format!("{value:.5}")
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Name -> descriptor lookup for everything the tracker may evaluate.
#[derive(Clone, Debug, Default)]
pub struct FunctionRegistry {
    specs: HashMap<String, FunctionSpec>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the stock model functions.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("error", FunctionSpec::new("mean data reconstruction error", Direction::Minimize, plain));
        registry.register("accuracy", FunctionSpec::new("mean data reconstruction accuracy", Direction::Maximize, percent));
        registry.register("energy", FunctionSpec::new("mean model energy", Direction::Minimize, plain));
        registry
    }

    pub fn register(&mut self, name: &str, spec: FunctionSpec) {
        self.specs.insert(name.to_string(), spec);
    }

    pub fn describe(&self, name: &str) -> Result<&FunctionSpec> {
        self.specs.get(name).ok_or_else(|| TrainError::UnknownFunction(name.to_string()))
    }
}
