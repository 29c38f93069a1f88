// SPDX-License-Identifier: MIT OR Apache-2.0

// General-purpose functions used to wire graphs: identity, constants, field
// access, closures and running folds.

use std::fmt;
use std::sync::Arc;

use super::{check_arity, Context, Function};
use crate::core::error::{CepFlowError, CepFlowResult};
use crate::core::event::EventValue;

/// Copies each input slot to the output slot with the same index.
#[derive(Debug, Clone)]
pub struct IdentityFunction {
    arity: usize,
}

impl IdentityFunction {
    pub fn new(arity: usize) -> Self {
        Self { arity }
    }
}

impl Function for IdentityFunction {
    fn name(&self) -> &str {
        "identity"
    }

    fn input_arity(&self) -> usize {
        self.arity
    }

    fn output_arity(&self) -> usize {
        self.arity
    }

    fn evaluate(
        &mut self,
        inputs: &[EventValue],
        outputs: &mut [EventValue],
        _context: &Context,
    ) -> CepFlowResult<()> {
        check_arity(self, inputs.len(), outputs.len())?;
        outputs[..self.arity].clone_from_slice(inputs);
        Ok(())
    }

    fn duplicate(&self, _with_state: bool) -> CepFlowResult<Box<dyn Function>> {
        Ok(Box::new(self.clone()))
    }
}

/// Ignores its inputs and always yields the same value.
///
/// With `EventValue::ToAllSlices` this is the slicing function of a slicer that
/// broadcasts every event.
#[derive(Debug, Clone)]
pub struct ConstantFunction {
    value: EventValue,
    input_arity: usize,
}

impl ConstantFunction {
    pub fn new(value: impl Into<EventValue>, input_arity: usize) -> Self {
        Self {
            value: value.into(),
            input_arity,
        }
    }
}

impl Function for ConstantFunction {
    fn name(&self) -> &str {
        "constant"
    }

    fn input_arity(&self) -> usize {
        self.input_arity
    }

    fn output_arity(&self) -> usize {
        1
    }

    fn evaluate(
        &mut self,
        inputs: &[EventValue],
        outputs: &mut [EventValue],
        _context: &Context,
    ) -> CepFlowResult<()> {
        check_arity(self, inputs.len(), outputs.len())?;
        outputs[0] = self.value.clone();
        Ok(())
    }

    fn evaluate_lazy(
        &mut self,
        inputs: &[Option<EventValue>],
        outputs: &mut [EventValue],
        _context: &Context,
    ) -> CepFlowResult<bool> {
        check_arity(self, inputs.len(), outputs.len())?;
        // A constant never needs its inputs; it waits for at least one so that
        // a front is still driven by arriving events.
        if inputs.iter().all(Option::is_none) && self.input_arity > 0 {
            return Ok(false);
        }
        outputs[0] = self.value.clone();
        Ok(true)
    }

    fn duplicate(&self, _with_state: bool) -> CepFlowResult<Box<dyn Function>> {
        Ok(Box::new(self.clone()))
    }
}

/// Reads one string-keyed field out of a map event (`event.owner`).
///
/// Non-map inputs and missing fields yield `Null`.
#[derive(Debug, Clone)]
pub struct FieldGetter {
    field: String,
}

impl FieldGetter {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl Function for FieldGetter {
    fn name(&self) -> &str {
        "field"
    }

    fn input_arity(&self) -> usize {
        1
    }

    fn output_arity(&self) -> usize {
        1
    }

    fn evaluate(
        &mut self,
        inputs: &[EventValue],
        outputs: &mut [EventValue],
        _context: &Context,
    ) -> CepFlowResult<()> {
        check_arity(self, inputs.len(), outputs.len())?;
        outputs[0] = inputs[0].get_field(&self.field);
        Ok(())
    }

    fn duplicate(&self, _with_state: bool) -> CepFlowResult<Box<dyn Function>> {
        Ok(Box::new(self.clone()))
    }
}

type EagerFn = Arc<dyn Fn(&[EventValue], &Context) -> CepFlowResult<Vec<EventValue>> + Send + Sync>;
type LazyFn = Arc<
    dyn Fn(&[Option<EventValue>], &Context) -> CepFlowResult<Option<Vec<EventValue>>>
        + Send
        + Sync,
>;

/// Stateless function backed by closures.
///
/// The eager closure must return exactly `output_arity` values. An optional
/// lazy closure decides on partial fronts; it returns `Ok(None)` to ask for
/// more input.
#[derive(Clone)]
pub struct ClosureFunction {
    name: String,
    input_arity: usize,
    output_arity: usize,
    eager: EagerFn,
    lazy: Option<LazyFn>,
}

impl ClosureFunction {
    pub fn new<F>(name: impl Into<String>, input_arity: usize, output_arity: usize, f: F) -> Self
    where
        F: Fn(&[EventValue], &Context) -> CepFlowResult<Vec<EventValue>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            input_arity,
            output_arity,
            eager: Arc::new(f),
            lazy: None,
        }
    }

    /// One input, one output.
    pub fn unary<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&EventValue) -> CepFlowResult<EventValue> + Send + Sync + 'static,
    {
        Self::new(name, 1, 1, move |inputs, _| Ok(vec![f(&inputs[0])?]))
    }

    pub fn with_lazy<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Option<EventValue>], &Context) -> CepFlowResult<Option<Vec<EventValue>>>
            + Send
            + Sync
            + 'static,
    {
        self.lazy = Some(Arc::new(f));
        self
    }

    fn write_outputs(&self, values: Vec<EventValue>, outputs: &mut [EventValue]) -> CepFlowResult<()> {
        if values.len() != self.output_arity {
            return Err(CepFlowError::evaluation(
                &self.name,
                format!(
                    "closure returned {} value(s), expected {}",
                    values.len(),
                    self.output_arity
                ),
            ));
        }
        for (slot, value) in outputs.iter_mut().zip(values) {
            *slot = value;
        }
        Ok(())
    }
}

impl fmt::Debug for ClosureFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureFunction")
            .field("name", &self.name)
            .field("input_arity", &self.input_arity)
            .field("output_arity", &self.output_arity)
            .field("lazy", &self.lazy.is_some())
            .finish()
    }
}

impl Function for ClosureFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_arity(&self) -> usize {
        self.input_arity
    }

    fn output_arity(&self) -> usize {
        self.output_arity
    }

    fn evaluate(
        &mut self,
        inputs: &[EventValue],
        outputs: &mut [EventValue],
        context: &Context,
    ) -> CepFlowResult<()> {
        check_arity(self, inputs.len(), outputs.len())?;
        let values = (self.eager)(inputs, context)?;
        self.write_outputs(values, outputs)
    }

    fn evaluate_lazy(
        &mut self,
        inputs: &[Option<EventValue>],
        outputs: &mut [EventValue],
        context: &Context,
    ) -> CepFlowResult<bool> {
        check_arity(self, inputs.len(), outputs.len())?;
        if let Some(lazy) = &self.lazy {
            return match lazy(inputs, context)? {
                Some(values) => self.write_outputs(values, outputs).map(|_| true),
                None => Ok(false),
            };
        }
        let complete: Option<Vec<EventValue>> = inputs.iter().cloned().collect();
        match complete {
            Some(values) => {
                let produced = (self.eager)(&values, context)?;
                self.write_outputs(produced, outputs)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn duplicate(&self, _with_state: bool) -> CepFlowResult<Box<dyn Function>> {
        Ok(Box::new(self.clone()))
    }
}

type FoldFn = Arc<dyn Fn(&EventValue, &EventValue) -> CepFlowResult<EventValue> + Send + Sync>;

/// Running fold over a single input: outputs the accumulator after each event.
#[derive(Clone)]
pub struct Cumulative {
    name: String,
    start: EventValue,
    accumulator: EventValue,
    fold: FoldFn,
}

impl Cumulative {
    pub fn new<F>(name: impl Into<String>, start: impl Into<EventValue>, fold: F) -> Self
    where
        F: Fn(&EventValue, &EventValue) -> CepFlowResult<EventValue> + Send + Sync + 'static,
    {
        let start = start.into();
        Self {
            name: name.into(),
            accumulator: start.clone(),
            start,
            fold: Arc::new(fold),
        }
    }

    /// Counts events: 1, 2, 3, ...
    pub fn counter() -> Self {
        Self::new("count", 0i64, |acc, _| {
            let n = acc
                .as_i64()
                .ok_or_else(|| CepFlowError::type_mismatch("long", acc.type_name()))?;
            Ok(EventValue::Long(n + 1))
        })
    }

    /// Sums numeric events; stays integral while every input is integral.
    pub fn sum() -> Self {
        Self::new("sum", 0i64, |acc, x| match (acc.as_i64(), x.as_i64()) {
            (Some(a), Some(b)) => Ok(EventValue::Long(a + b)),
            _ => match (acc.as_f64(), x.as_f64()) {
                (Some(a), Some(b)) => Ok(EventValue::Double(a + b)),
                _ => Err(CepFlowError::evaluation(
                    "sum",
                    format!("cannot add {} to {}", x.type_name(), acc.type_name()),
                )),
            },
        })
    }

    pub fn accumulator(&self) -> &EventValue {
        &self.accumulator
    }
}

impl fmt::Debug for Cumulative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cumulative")
            .field("name", &self.name)
            .field("start", &self.start)
            .field("accumulator", &self.accumulator)
            .finish()
    }
}

impl Function for Cumulative {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_arity(&self) -> usize {
        1
    }

    fn output_arity(&self) -> usize {
        1
    }

    fn evaluate(
        &mut self,
        inputs: &[EventValue],
        outputs: &mut [EventValue],
        _context: &Context,
    ) -> CepFlowResult<()> {
        check_arity(self, inputs.len(), outputs.len())?;
        let next = (self.fold)(&self.accumulator, &inputs[0])?;
        self.accumulator = next.clone();
        outputs[0] = next;
        Ok(())
    }

    fn duplicate(&self, with_state: bool) -> CepFlowResult<Box<dyn Function>> {
        let mut copy = self.clone();
        if !with_state {
            copy.accumulator = copy.start.clone();
        }
        Ok(Box::new(copy))
    }

    fn reset(&mut self) {
        self.accumulator = self.start.clone();
    }
}
