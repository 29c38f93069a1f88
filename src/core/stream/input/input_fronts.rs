// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::VecDeque;

use crate::core::error::{CepFlowError, CepFlowResult};
use crate::core::event::EventValue;

/// Per-port FIFO queues for processors that consume whole fronts.
///
/// A front is released only once every port holds at least one event; it
/// contains the head of each queue, in port order.
#[derive(Debug, Clone)]
pub struct InputFronts {
    queues: Vec<VecDeque<EventValue>>,
}

impl InputFronts {
    pub fn new(arity: usize) -> Self {
        Self {
            queues: vec![VecDeque::new(); arity],
        }
    }

    pub fn arity(&self) -> usize {
        self.queues.len()
    }

    pub fn push(&mut self, index: usize, event: EventValue) -> CepFlowResult<()> {
        let arity = self.queues.len();
        self.queues
            .get_mut(index)
            .ok_or_else(|| CepFlowError::input_out_of_range(index, arity))?
            .push_back(event);
        Ok(())
    }

    /// Number of events waiting on port `index`.
    pub fn pending(&self, index: usize) -> usize {
        self.queues.get(index).map_or(0, VecDeque::len)
    }

    pub fn is_front_ready(&self) -> bool {
        !self.queues.is_empty() && self.queues.iter().all(|q| !q.is_empty())
    }

    /// Pop the next complete front, if any.
    pub fn next_front(&mut self) -> Option<Vec<EventValue>> {
        if !self.is_front_ready() {
            return None;
        }
        self.queues.iter_mut().map(VecDeque::pop_front).collect()
    }

    pub fn clear(&mut self) {
        self.queues.iter_mut().for_each(VecDeque::clear);
    }
}
