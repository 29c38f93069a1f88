// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::core::error::{CepFlowError, CepFlowResult};
use crate::core::event::EventValue;
use crate::core::query::processor::{Processor, ProcessorId};
use crate::core::stream::{InputPushable, OutputPullable, Pullable, Pushable};
use crate::core::util::ExecutorService;

pub type SharedProcessor = Arc<Mutex<Box<dyn Processor>>>;

pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Runtime options of the endpoints a handle hands out.
#[derive(Debug, Clone)]
pub struct HandleOptions {
    /// Executor used by `push_fast`. `None` pushes synchronously.
    pub executor: Option<Arc<ExecutorService>>,
    pub pull_timeout: Duration,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self {
            executor: None,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
        }
    }
}

impl HandleOptions {
    pub fn with_executor(mut self, executor: Arc<ExecutorService>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }
}

struct HandleInner {
    id: ProcessorId,
    name: String,
    input_arity: usize,
    output_arity: usize,
    processor: SharedProcessor,
    options: HandleOptions,
    inputs: Vec<OnceCell<Arc<dyn Pushable>>>,
    outputs: Vec<OnceCell<Arc<dyn Pullable>>>,
}

/// Shared, cloneable handle over one processor.
///
/// Access to the processor is serialized by a mutex. Port endpoints are
/// created on first request and cached; concurrent first requests observe the
/// same endpoint. Endpoints only hold a weak reference back to the processor,
/// so once every handle clone is dropped the processor goes away and pushes
/// into its endpoints fail with `ProcessorDropped`.
#[derive(Clone)]
pub struct ProcessorHandle {
    inner: Arc<HandleInner>,
}

impl ProcessorHandle {
    pub fn new<P: Processor + 'static>(processor: P) -> Self {
        Self::from_boxed(Box::new(processor), HandleOptions::default())
    }

    pub fn with_options<P: Processor + 'static>(processor: P, options: HandleOptions) -> Self {
        Self::from_boxed(Box::new(processor), options)
    }

    pub fn from_boxed(processor: Box<dyn Processor>, options: HandleOptions) -> Self {
        let name = processor.name().to_string();
        let input_arity = processor.input_arity();
        let output_arity = processor.output_arity();
        Self {
            inner: Arc::new(HandleInner {
                id: ProcessorId::new(),
                name,
                input_arity,
                output_arity,
                processor: Arc::new(Mutex::new(processor)),
                options,
                inputs: (0..input_arity).map(|_| OnceCell::new()).collect(),
                outputs: (0..output_arity).map(|_| OnceCell::new()).collect(),
            }),
        }
    }

    pub fn id(&self) -> ProcessorId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn input_arity(&self) -> usize {
        self.inner.input_arity
    }

    pub fn output_arity(&self) -> usize {
        self.inner.output_arity
    }

    pub fn options(&self) -> &HandleOptions {
        &self.inner.options
    }

    /// Endpoint feeding input port `index`.
    pub fn pushable_input(&self, index: usize) -> CepFlowResult<Arc<dyn Pushable>> {
        let inner = &self.inner;
        let cell = inner
            .inputs
            .get(index)
            .ok_or_else(|| CepFlowError::input_out_of_range(index, inner.input_arity))?;
        let pushable = cell.get_or_init(|| {
            Arc::new(InputPushable::new(
                Arc::downgrade(&inner.processor),
                inner.id,
                index,
                inner.options.executor.clone(),
            )) as Arc<dyn Pushable>
        });
        Ok(Arc::clone(pushable))
    }

    /// Endpoint draining output port `index`.
    ///
    /// Requesting it opens the port's pull channel; values emitted while the
    /// port is connected to a downstream pushable still go downstream.
    pub fn pullable_output(&self, index: usize) -> CepFlowResult<Arc<dyn Pullable>> {
        let inner = &self.inner;
        let cell = inner
            .outputs
            .get(index)
            .ok_or_else(|| CepFlowError::output_out_of_range(index, inner.output_arity))?;
        let pullable = cell.get_or_try_init(|| -> CepFlowResult<Arc<dyn Pullable>> {
            let receiver = self.lock()?.output_ports_mut().attach_pull_channel(index)?;
            Ok(Arc::new(OutputPullable::new(
                receiver,
                index,
                inner.id,
                inner.options.pull_timeout,
            )) as Arc<dyn Pullable>)
        })?;
        Ok(Arc::clone(pullable))
    }

    /// Synchronous push into input port `index`.
    pub fn push(&self, index: usize, event: impl Into<EventValue>) -> CepFlowResult<()> {
        self.pushable_input(index)?.push(event.into())?;
        Ok(())
    }

    pub fn lock(&self) -> CepFlowResult<MutexGuard<'_, Box<dyn Processor>>> {
        self.inner
            .processor
            .lock()
            .map_err(|_| CepFlowError::lock_poisoned(format!("processor {}", self.inner.id)))
    }

    /// Typed read access to the wrapped processor.
    pub fn inspect<T, R, F>(&self, f: F) -> CepFlowResult<R>
    where
        T: Processor + 'static,
        F: FnOnce(&T) -> R,
    {
        let guard = self.lock()?;
        let typed = guard
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| {
                CepFlowError::type_mismatch(std::any::type_name::<T>(), guard.name().to_string())
            })?;
        Ok(f(typed))
    }

    /// Independent copy of the processor behind a new handle with the same
    /// options. Connections are not copied.
    pub fn duplicate(&self, with_state: bool) -> CepFlowResult<ProcessorHandle> {
        let copy = self.lock()?.duplicate(with_state)?;
        Ok(Self::from_boxed(copy, self.inner.options.clone()))
    }

    pub fn reset(&self) -> CepFlowResult<()> {
        self.lock()?.reset()
    }

    pub fn same_processor(&self, other: &ProcessorHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ProcessorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorHandle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("input_arity", &self.inner.input_arity)
            .field("output_arity", &self.inner.output_arity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::IdentityFunction;
    use crate::core::query::processor::ApplyFunction;
    use crate::core::stream::{NextStatus, QueueSink};
    use std::thread;

    #[test]
    fn test_endpoints_are_cached() {
        let handle = ProcessorHandle::new(ApplyFunction::new(IdentityFunction::new(1)));
        let a = handle.pushable_input(0).unwrap();
        let b = handle.pushable_input(0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.position(), 0);
        assert_eq!(a.processor_id(), handle.id());
    }

    #[test]
    fn test_concurrent_first_access_sees_one_endpoint() {
        let handle = ProcessorHandle::new(ApplyFunction::new(IdentityFunction::new(1)));
        let endpoints: Vec<Arc<dyn Pullable>> = (0..8)
            .map(|_| {
                let h = handle.clone();
                thread::spawn(move || h.pullable_output(0).unwrap())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap())
            .collect();
        for e in &endpoints[1..] {
            assert!(Arc::ptr_eq(&endpoints[0], e));
        }
    }

    #[test]
    fn test_out_of_range_ports() {
        let handle = ProcessorHandle::new(QueueSink::new(1));
        assert!(matches!(
            handle.pushable_input(1),
            Err(CepFlowError::PortOutOfRange { direction: "Input", .. })
        ));
        assert!(matches!(
            handle.pullable_output(0),
            Err(CepFlowError::PortOutOfRange { direction: "Output", .. })
        ));
    }

    #[test]
    fn test_pull_mode_output() {
        let handle = ProcessorHandle::new(ApplyFunction::new(IdentityFunction::new(1)));
        let out = handle.pullable_output(0).unwrap();
        assert_eq!(out.has_next_soft(), NextStatus::Maybe);

        handle.push(0, 42).unwrap();
        assert_eq!(out.pull().unwrap(), EventValue::Int(42));
    }

    #[test]
    fn test_push_into_dropped_processor_fails() {
        let handle = ProcessorHandle::new(QueueSink::new(1));
        let id = handle.id();
        let input = handle.pushable_input(0).unwrap();
        drop(handle);

        let err = input.push(EventValue::Int(1)).unwrap_err();
        assert!(matches!(err, CepFlowError::ProcessorDropped { processor } if processor == id));
    }

    #[test]
    fn test_inspect_downcasts() {
        let handle = ProcessorHandle::new(QueueSink::new(1));
        handle.push(0, 1).unwrap();
        let len = handle.inspect::<QueueSink, _, _>(|s| s.buffer().len()).unwrap();
        assert_eq!(len, 1);

        let err = handle
            .inspect::<ApplyFunction, _, _>(|_| ())
            .unwrap_err();
        assert!(matches!(err, CepFlowError::TypeMismatch { .. }));
    }

    #[test]
    fn test_duplicate_gets_new_identity() {
        let handle = ProcessorHandle::new(QueueSink::new(1));
        let copy = handle.duplicate(false).unwrap();
        assert_ne!(handle.id(), copy.id());
        assert!(!handle.same_processor(&copy));
        assert!(handle.same_processor(&handle.clone()));
    }
}
