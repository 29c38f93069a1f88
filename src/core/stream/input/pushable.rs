// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Debug;
use std::sync::{Arc, Mutex, Weak};

use crate::core::error::{CepFlowError, CepFlowResult};
use crate::core::event::EventValue;
use crate::core::query::processor::{Processor, ProcessorId};
use crate::core::stream::PushFuture;
use crate::core::util::ExecutorService;

/// Input endpoint of one processor port.
pub trait Pushable: Debug + Send + Sync {
    /// Deliver one event and run whatever downstream work it triggers before
    /// returning. Returns `self` so pushes can be chained.
    fn push(&self, event: EventValue) -> CepFlowResult<&dyn Pushable>;

    /// Deliver one event, possibly on another thread. Wait on the returned
    /// future before relying on the push's side effects.
    fn push_fast(&self, event: EventValue) -> PushFuture;

    /// Index of the input port this endpoint feeds.
    fn position(&self) -> usize;

    /// The processor this endpoint belongs to.
    fn processor_id(&self) -> ProcessorId;
}

/// Pushable bound to input `index` of a processor behind a handle.
///
/// Holds only a weak reference: the handle owns the processor, the port does
/// not keep it alive.
#[derive(Debug)]
pub struct InputPushable {
    processor: Weak<Mutex<Box<dyn Processor>>>,
    processor_id: ProcessorId,
    index: usize,
    executor: Option<Arc<ExecutorService>>,
}

impl InputPushable {
    pub(crate) fn new(
        processor: Weak<Mutex<Box<dyn Processor>>>,
        processor_id: ProcessorId,
        index: usize,
        executor: Option<Arc<ExecutorService>>,
    ) -> Self {
        Self {
            processor,
            processor_id,
            index,
            executor,
        }
    }
}

fn deliver(
    processor: &Weak<Mutex<Box<dyn Processor>>>,
    processor_id: ProcessorId,
    index: usize,
    event: EventValue,
) -> CepFlowResult<()> {
    let shared = processor.upgrade().ok_or(CepFlowError::ProcessorDropped {
        processor: processor_id,
    })?;
    let mut guard = shared
        .lock()
        .map_err(|_| CepFlowError::lock_poisoned(format!("processor {processor_id}")))?;
    guard.push_input(index, event)
}

impl Pushable for InputPushable {
    fn push(&self, event: EventValue) -> CepFlowResult<&dyn Pushable> {
        deliver(&self.processor, self.processor_id, self.index, event)?;
        Ok(self)
    }

    fn push_fast(&self, event: EventValue) -> PushFuture {
        match &self.executor {
            None => PushFuture::completed(deliver(
                &self.processor,
                self.processor_id,
                self.index,
                event,
            )),
            Some(executor) => {
                let processor = self.processor.clone();
                let processor_id = self.processor_id;
                let index = self.index;
                executor.submit(move || deliver(&processor, processor_id, index, event))
            }
        }
    }

    fn position(&self) -> usize {
        self.index
    }

    fn processor_id(&self) -> ProcessorId {
        self.processor_id
    }
}
