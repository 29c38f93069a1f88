// SPDX-License-Identifier: MIT OR Apache-2.0

use std::any::Any;

use crate::core::error::CepFlowResult;
use crate::core::event::EventValue;
use crate::core::function::{check_arity, Context, Function};
use crate::core::query::processor::Processor;
use crate::core::stream::{InputFronts, OutputPorts};

/// Eager processor: evaluates its function once per complete front.
///
/// Ports are consumed in lockstep; a front is evaluated only when every input
/// port has an event queued.
#[derive(Debug)]
pub struct ApplyFunction {
    function: Box<dyn Function>,
    fronts: InputFronts,
    outputs: OutputPorts,
    context: Context,
}

impl ApplyFunction {
    pub fn new<F: Function + 'static>(function: F) -> Self {
        Self::from_boxed(Box::new(function))
    }

    pub fn from_boxed(function: Box<dyn Function>) -> Self {
        let fronts = InputFronts::new(function.input_arity());
        let outputs = OutputPorts::new(function.output_arity());
        Self {
            function,
            fronts,
            outputs,
            context: Context::new(),
        }
    }

    pub fn function(&self) -> &dyn Function {
        self.function.as_ref()
    }

    /// Events waiting on input `index` for the rest of their front.
    pub fn queued(&self, index: usize) -> usize {
        self.fronts.pending(index)
    }
}

impl Processor for ApplyFunction {
    fn name(&self) -> &str {
        self.function.name()
    }

    fn input_arity(&self) -> usize {
        self.function.input_arity()
    }

    fn output_arity(&self) -> usize {
        self.function.output_arity()
    }

    fn push_input(&mut self, index: usize, event: EventValue) -> CepFlowResult<()> {
        self.fronts.push(index, event)?;
        while let Some(front) = self.fronts.next_front() {
            let mut results = vec![EventValue::Null; self.function.output_arity()];
            check_arity(self.function.as_ref(), front.len(), results.len())?;
            self.function.evaluate(&front, &mut results, &self.context)?;
            self.outputs.emit_front(results)?;
        }
        Ok(())
    }

    fn output_ports(&self) -> &OutputPorts {
        &self.outputs
    }

    fn output_ports_mut(&mut self) -> &mut OutputPorts {
        &mut self.outputs
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    fn duplicate(&self, with_state: bool) -> CepFlowResult<Box<dyn Processor>> {
        let mut copy = ApplyFunction::from_boxed(self.function.duplicate(with_state)?);
        if with_state {
            copy.fronts = self.fronts.clone();
        }
        copy.context = self.context.clone();
        Ok(Box::new(copy))
    }

    fn reset(&mut self) -> CepFlowResult<()> {
        self.fronts.clear();
        self.function.reset();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
