// src/inputs/mod.rs

//! Input references and value collection.
//!
//! - [`resolver`] decides which inputs a task needs, and in what order.
//! - [`collect`] fills values non-interactively from explicit values,
//!   remembered values and declared defaults.

pub mod collect;
pub mod resolver;

use std::collections::BTreeMap;

/// Concrete input values for one invocation, keyed by input name.
pub type InputValues = BTreeMap<String, String>;

pub use collect::{CollectedInputs, MemoryValues, PreviousValues, collect_inputs};
pub use resolver::find_referenced_inputs;
