// SPDX-License-Identifier: MIT OR Apache-2.0

use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::error::{CepFlowError, CepFlowResult};
use crate::core::event::EventValue;
use crate::core::function::Context;
use crate::core::query::processor::Processor;
use crate::core::stream::{InputFronts, OutputPorts};

/// Shared FIFO of output vectors captured by a [`QueueSink`].
///
/// Cloning the buffer clones the handle, not the contents: the sink keeps
/// writing while a controller drains from another clone.
#[derive(Debug, Clone, Default)]
pub struct SinkBuffer {
    vectors: Arc<Mutex<VecDeque<Vec<EventValue>>>>,
}

impl SinkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> CepFlowResult<MutexGuard<'_, VecDeque<Vec<EventValue>>>> {
        self.vectors
            .lock()
            .map_err(|_| CepFlowError::lock_poisoned("sink buffer"))
    }

    pub fn push(&self, vector: Vec<EventValue>) -> CepFlowResult<()> {
        self.guard()?.push_back(vector);
        Ok(())
    }

    /// Take the oldest buffered vector.
    pub fn remove(&self) -> CepFlowResult<Option<Vec<EventValue>>> {
        Ok(self.guard()?.pop_front())
    }

    pub fn len(&self) -> usize {
        self.guard().map_or(0, |q| q.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> CepFlowResult<()> {
        self.guard()?.clear();
        Ok(())
    }

    /// A new buffer holding a copy of the current contents.
    fn deep_copy(&self) -> CepFlowResult<Self> {
        let contents = self.guard()?.clone();
        Ok(Self {
            vectors: Arc::new(Mutex::new(contents)),
        })
    }
}

/// Terminal processor that stores every complete input front in a
/// [`SinkBuffer`] for later explicit removal.
#[derive(Debug)]
pub struct QueueSink {
    fronts: InputFronts,
    buffer: SinkBuffer,
    outputs: OutputPorts,
    context: Context,
}

impl QueueSink {
    pub fn new(input_arity: usize) -> Self {
        Self::with_buffer(input_arity, SinkBuffer::new())
    }

    pub fn with_buffer(input_arity: usize, buffer: SinkBuffer) -> Self {
        Self {
            fronts: InputFronts::new(input_arity),
            buffer,
            outputs: OutputPorts::new(0),
            context: Context::new(),
        }
    }

    pub fn buffer(&self) -> &SinkBuffer {
        &self.buffer
    }

    pub fn remove(&self) -> CepFlowResult<Option<Vec<EventValue>>> {
        self.buffer.remove()
    }
}

impl Processor for QueueSink {
    fn name(&self) -> &str {
        "QueueSink"
    }

    fn input_arity(&self) -> usize {
        self.fronts.arity()
    }

    fn output_arity(&self) -> usize {
        0
    }

    fn push_input(&mut self, index: usize, event: EventValue) -> CepFlowResult<()> {
        self.fronts.push(index, event)?;
        while let Some(front) = self.fronts.next_front() {
            self.buffer.push(front)?;
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
        let mut copy = if with_state {
            let mut sink = QueueSink::with_buffer(self.fronts.arity(), self.buffer.deep_copy()?);
            sink.fronts = self.fronts.clone();
            sink
        } else {
            QueueSink::new(self.fronts.arity())
        };
        copy.context = self.context.clone();
        Ok(Box::new(copy))
    }

    fn reset(&mut self) -> CepFlowResult<()> {
        self.fronts.clear();
        self.buffer.clear()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
