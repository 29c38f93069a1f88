// SPDX-License-Identifier: MIT OR Apache-2.0

//! Function Contract
//!
//! A [`Function`] maps an input vector of fixed arity to an output vector of
//! fixed arity. Processors own the functions they evaluate and hand them their
//! [`Context`] on every call.
//!
//! Two evaluation modes exist:
//!
//! | Mode | Inputs | Outcome |
//! |------|--------|---------|
//! | `evaluate` | every slot present | `Ok(())` with outputs filled, or an error |
//! | `evaluate_lazy` | slots may be absent | `Ok(true)` when outputs were produced, `Ok(false)` when more input is needed |
//!
//! `evaluate_lazy` may be called repeatedly on the same front as more slots
//! become present, so an implementation must not commit state when it
//! declines.

pub mod builtin;

use std::collections::hash_map::{HashMap, Iter};
use std::fmt::Debug;

use crate::core::error::{CepFlowError, CepFlowResult};
use crate::core::event::EventValue;

pub use builtin::{ClosureFunction, ConstantFunction, Cumulative, FieldGetter, IdentityFunction};

/// Mutable key/value context attached to a processor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    entries: HashMap<String, EventValue>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&EventValue> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<EventValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<EventValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Copy every entry of `other` into this context, overwriting on conflict.
    pub fn merge(&mut self, other: &Context) {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, String, EventValue> {
        self.entries.iter()
    }
}

pub trait Function: Debug + Send {
    fn name(&self) -> &str;

    fn input_arity(&self) -> usize;

    fn output_arity(&self) -> usize;

    /// Eager evaluation: every input slot is present.
    fn evaluate(
        &mut self,
        inputs: &[EventValue],
        outputs: &mut [EventValue],
        context: &Context,
    ) -> CepFlowResult<()>;

    /// Lazy evaluation over a possibly partial front.
    ///
    /// The default declines until every slot is present and then evaluates
    /// eagerly.
    fn evaluate_lazy(
        &mut self,
        inputs: &[Option<EventValue>],
        outputs: &mut [EventValue],
        context: &Context,
    ) -> CepFlowResult<bool> {
        let complete: Option<Vec<EventValue>> = inputs.iter().cloned().collect();
        match complete {
            Some(values) => {
                self.evaluate(&values, outputs, context)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Copy this function. Without state the copy starts from its initial
    /// configuration; with state it also carries any accumulated memory.
    fn duplicate(&self, with_state: bool) -> CepFlowResult<Box<dyn Function>>;

    /// Clear any internal memory.
    fn reset(&mut self) {}
}

/// Fail with an evaluation error unless both slices have the declared arities.
pub(crate) fn check_arity(
    function: &dyn Function,
    inputs: usize,
    outputs: usize,
) -> CepFlowResult<()> {
    if inputs != function.input_arity() || outputs < function.output_arity() {
        return Err(CepFlowError::evaluation(
            function.name(),
            format!(
                "expected {} input(s) and {} output slot(s), got {} and {}",
                function.input_arity(),
                function.output_arity(),
                inputs,
                outputs
            ),
        ));
    }
    Ok(())
}
