// SPDX-License-Identifier: MIT OR Apache-2.0

//! Front-synchronized lazy application of a function.
//!
//! Every input port has its own queue and its own front counter. The
//! processor tracks the index of the front it is currently assembling
//! (`current_front`). A port whose counter equals `current_front` still owes
//! an event to that front; a port whose counter is ahead already contributed
//! one; a port whose counter is behind was left out of a front the function
//! completed without it.
//!
//! On each push:
//!
//! 1. An event for a port that is behind belongs to a front that is already
//!    closed. It is dropped and the port's counter advances.
//! 2. Otherwise the event is queued, and the processor repeatedly
//!    assembles the current front (popping one event from every port that
//!    still owes one) and offers it to [`Function::evaluate_lazy`]. When the
//!    function declines the loop stops and waits for more input. When it
//!    produces, the outputs are emitted, the front buffer is cleared and the
//!    next front is attempted, so a burst of queued events drains in one
//!    call.

use std::any::Any;
use std::collections::VecDeque;

use crate::core::error::{CepFlowError, CepFlowResult};
use crate::core::event::EventValue;
use crate::core::function::{check_arity, Context, Function};
use crate::core::query::processor::Processor;
use crate::core::stream::OutputPorts;

/// Safety valve on the number of fronts one push may evaluate.
pub const DEFAULT_MAX_FRONT_ITERATIONS: usize = 10_000_000;

#[derive(Debug)]
pub struct ApplyFunctionLazy {
    function: Box<dyn Function>,
    queues: Vec<VecDeque<EventValue>>,
    front_numbers: Vec<u64>,
    current_front: u64,
    front_buffer: Vec<Option<EventValue>>,
    max_iterations: usize,
    outputs: OutputPorts,
    context: Context,
}

impl ApplyFunctionLazy {
    pub fn new<F: Function + 'static>(function: F) -> Self {
        Self::from_boxed(Box::new(function))
    }

    pub fn from_boxed(function: Box<dyn Function>) -> Self {
        let arity = function.input_arity();
        let outputs = OutputPorts::new(function.output_arity());
        Self {
            function,
            queues: vec![VecDeque::new(); arity],
            front_numbers: vec![0; arity],
            current_front: 0,
            front_buffer: vec![None; arity],
            max_iterations: DEFAULT_MAX_FRONT_ITERATIONS,
            outputs,
            context: Context::new(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn function(&self) -> &dyn Function {
        self.function.as_ref()
    }

    /// Number of fronts evaluated so far.
    pub fn current_front(&self) -> u64 {
        self.current_front
    }

    /// Number of fronts port `index` has contributed to or skipped.
    pub fn front_number(&self, index: usize) -> Option<u64> {
        self.front_numbers.get(index).copied()
    }

    /// Events queued on port `index` for future fronts.
    pub fn queued(&self, index: usize) -> usize {
        self.queues.get(index).map_or(0, VecDeque::len)
    }

    fn fill_front(&mut self) {
        for i in 0..self.queues.len() {
            if self.front_numbers[i] != self.current_front {
                continue;
            }
            match self.queues[i].pop_front() {
                Some(event) => {
                    self.front_buffer[i] = Some(event);
                    self.front_numbers[i] += 1;
                }
                None => self.front_buffer[i] = None,
            }
        }
    }

    fn evaluate_fronts(&mut self) -> CepFlowResult<()> {
        for _ in 0..self.max_iterations {
            self.fill_front();

            let mut results = vec![EventValue::Null; self.function.output_arity()];
            check_arity(self.function.as_ref(), self.front_buffer.len(), results.len())?;
            let produced =
                self.function
                    .evaluate_lazy(&self.front_buffer, &mut results, &self.context)?;
            if !produced {
                return Ok(());
            }

            self.outputs.emit_front(results)?;
            self.front_buffer.iter_mut().for_each(|slot| *slot = None);
            self.current_front += 1;
        }

        log::error!(
            "{}: front evaluation exhausted after {} iterations at front {}",
            self.function.name(),
            self.max_iterations,
            self.current_front
        );
        Err(CepFlowError::FrontEvaluationExhausted {
            iterations: self.max_iterations,
            front: self.current_front,
        })
    }
}

impl Processor for ApplyFunctionLazy {
    fn name(&self) -> &str {
        self.function.name()
    }

    fn input_arity(&self) -> usize {
        self.queues.len()
    }

    fn output_arity(&self) -> usize {
        self.function.output_arity()
    }

    fn push_input(&mut self, index: usize, event: EventValue) -> CepFlowResult<()> {
        let arity = self.queues.len();
        let front_number = self
            .front_numbers
            .get_mut(index)
            .ok_or_else(|| CepFlowError::input_out_of_range(index, arity))?;

        if *front_number < self.current_front {
            *front_number += 1;
            log::trace!(
                "{}: dropping stale event on input {} (front {} < {})",
                self.function.name(),
                index,
                *front_number - 1,
                self.current_front
            );
            return Ok(());
        }

        self.queues[index].push_back(event);
        self.evaluate_fronts()
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
        let mut copy = ApplyFunctionLazy::from_boxed(self.function.duplicate(with_state)?)
            .with_max_iterations(self.max_iterations);
        if with_state {
            copy.queues = self.queues.clone();
            copy.front_numbers = self.front_numbers.clone();
            copy.current_front = self.current_front;
            copy.front_buffer = self.front_buffer.clone();
        }
        copy.context = self.context.clone();
        Ok(Box::new(copy))
    }

    fn reset(&mut self) -> CepFlowResult<()> {
        self.queues.iter_mut().for_each(VecDeque::clear);
        self.front_numbers.iter_mut().for_each(|n| *n = 0);
        self.front_buffer.iter_mut().for_each(|slot| *slot = None);
        self.current_front = 0;
        self.function.reset();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
