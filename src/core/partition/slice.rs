// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dynamic keyed partitioning of a stream.
//!
//! A [`Slice`] evaluates a slicing function on every input front to obtain a
//! key and routes the front into a private copy of a template processor for
//! that key. Each copy (a *slice*) is created on the first occurrence of its
//! key and feeds its own [`QueueSink`], from which the slice's output is
//! collected right after dispatch. An optional cleaning function retires a
//! slice once its output satisfies it.
//!
//! The single output of the slice is a snapshot of the last value produced by
//! every key ever seen, including keys whose slice was retired.
//!
//! ## Key selection
//!
//! | Slicing result | Keys dispatched to |
//! |----------------|--------------------|
//! | `Null` or `ToAllSlices` | every live slice (none created) |
//! | concrete value | that key, creating its slice if needed |
//! | `List` with explode mode on | each element in turn, as above |

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::error::{CepFlowError, CepFlowResult};
use crate::core::event::{EventMap, EventValue};
use crate::core::function::{check_arity, Context, Function};
use crate::core::query::processor::{HandleOptions, Processor, ProcessorHandle};
use crate::core::stream::{connect_all, InputFronts, OutputPorts, QueueSink};

/// Seeds the context of a freshly created slice from its key.
pub type ContextHook = Arc<dyn Fn(&mut dyn Processor, &EventValue) + Send + Sync>;

/// Running counters of a [`Slice`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceStats {
    pub events_processed: u64,
    pub slices_created: u64,
    pub slices_cleaned: u64,
}

pub struct Slice {
    slicing_function: Box<dyn Function>,
    cleaning_function: Option<Box<dyn Function>>,
    template: Box<dyn Processor>,
    explode_collections: bool,
    context_hook: Option<ContextHook>,
    handle_options: HandleOptions,

    fronts: InputFronts,
    slices: HashMap<EventValue, ProcessorHandle>,
    sinks: HashMap<EventValue, ProcessorHandle>,
    // Shared with every snapshot handed downstream; written copy-on-write.
    last_values: Arc<EventMap>,
    stats: SliceStats,

    outputs: OutputPorts,
    context: Context,
}

impl Slice {
    /// Slice over `template`, keyed by `slicing_function`.
    ///
    /// The slicing function must take the template's inputs and produce one
    /// value; the template must have at least one output.
    pub fn new<F, P>(slicing_function: F, template: P) -> CepFlowResult<Self>
    where
        F: Function + 'static,
        P: Processor + 'static,
    {
        Self::from_boxed(Box::new(slicing_function), Box::new(template))
    }

    pub fn from_boxed(
        slicing_function: Box<dyn Function>,
        template: Box<dyn Processor>,
    ) -> CepFlowResult<Self> {
        if slicing_function.input_arity() != template.input_arity() {
            return Err(CepFlowError::configuration(format!(
                "slicing function {} takes {} input(s) but template {} has {}",
                slicing_function.name(),
                slicing_function.input_arity(),
                template.name(),
                template.input_arity()
            )));
        }
        if slicing_function.output_arity() != 1 {
            return Err(CepFlowError::configuration(format!(
                "slicing function {} must produce exactly one key, produces {}",
                slicing_function.name(),
                slicing_function.output_arity()
            )));
        }
        if template.output_arity() == 0 {
            return Err(CepFlowError::configuration(format!(
                "template {} has no output to collect",
                template.name()
            )));
        }

        let input_arity = template.input_arity();
        Ok(Self {
            slicing_function,
            cleaning_function: None,
            template,
            explode_collections: false,
            context_hook: None,
            handle_options: HandleOptions::default(),
            fronts: InputFronts::new(input_arity),
            slices: HashMap::new(),
            sinks: HashMap::new(),
            last_values: Arc::new(EventMap::new()),
            stats: SliceStats::default(),
            outputs: OutputPorts::new(1),
            context: Context::new(),
        })
    }

    /// Retire a slice when this function returns `true` on its output.
    pub fn with_cleaning_function<F: Function + 'static>(mut self, function: F) -> Self {
        self.cleaning_function = Some(Box::new(function));
        self
    }

    /// Treat a `List` key as a set of keys.
    pub fn explode_collections(mut self, explode: bool) -> Self {
        self.explode_collections = explode;
        self
    }

    pub fn with_context_hook<H>(mut self, hook: H) -> Self
    where
        H: Fn(&mut dyn Processor, &EventValue) + Send + Sync + 'static,
    {
        self.context_hook = Some(Arc::new(hook));
        self
    }

    /// Options of the handles wrapping each slice. An executor here makes the
    /// per-key dispatch asynchronous.
    pub fn with_handle_options(mut self, options: HandleOptions) -> Self {
        self.handle_options = options;
        self
    }

    pub fn explodes_collections(&self) -> bool {
        self.explode_collections
    }

    pub fn active_slice_count(&self) -> usize {
        self.slices.len()
    }

    pub fn has_slice(&self, key: &EventValue) -> bool {
        self.slices.contains_key(key)
    }

    pub fn has_sink(&self, key: &EventValue) -> bool {
        self.sinks.contains_key(key)
    }

    pub fn slice_keys(&self) -> Vec<EventValue> {
        self.slices.keys().cloned().collect()
    }

    /// Handle of the live slice for `key`.
    pub fn slice(&self, key: &EventValue) -> Option<ProcessorHandle> {
        self.slices.get(key).cloned()
    }

    pub fn last_values(&self) -> Arc<EventMap> {
        Arc::clone(&self.last_values)
    }

    pub fn last_value(&self, key: &EventValue) -> Option<&EventValue> {
        self.last_values.get(key)
    }

    pub fn stats(&self) -> SliceStats {
        self.stats
    }

    fn compute(&mut self, front: Vec<EventValue>) -> CepFlowResult<()> {
        self.stats.events_processed += 1;

        let mut key = [EventValue::Null];
        check_arity(self.slicing_function.as_ref(), front.len(), key.len())?;
        self.slicing_function
            .evaluate(&front, &mut key, &self.context)?;
        let [key] = key;

        let elements = match key {
            EventValue::List(items) if self.explode_collections => items.as_ref().clone(),
            other => vec![other],
        };
        // Each element is dispatched and cleaned before the next is read.
        for element in elements {
            for target in self.select_targets(element)? {
                self.process_key(&target, &front)?;
            }
        }

        self.outputs
            .emit(0, EventValue::Map(Arc::clone(&self.last_values)))
    }

    /// Keys one slicing value is dispatched to, creating its slice if needed.
    fn select_targets(&mut self, key: EventValue) -> CepFlowResult<Vec<EventValue>> {
        if matches!(key, EventValue::Null | EventValue::ToAllSlices) {
            return Ok(self.slices.keys().cloned().collect());
        }
        if !self.slices.contains_key(&key) {
            self.create_slice(&key)?;
        }
        Ok(vec![key])
    }

    fn create_slice(&mut self, key: &EventValue) -> CepFlowResult<()> {
        let mut processor = self.template.duplicate(false)?;
        if let Some(hook) = &self.context_hook {
            hook(processor.as_mut(), key);
        }
        let handle = ProcessorHandle::from_boxed(processor, self.handle_options.clone());
        let sink = ProcessorHandle::new(QueueSink::new(handle.output_arity()));
        connect_all(&handle, &sink)?;

        self.slices.insert(key.clone(), handle);
        self.sinks.insert(key.clone(), sink);
        Arc::make_mut(&mut self.last_values).insert(key.clone(), EventValue::Null);
        self.stats.slices_created += 1;
        log::debug!("Created slice {} ({} live)", key, self.slices.len());
        Ok(())
    }

    fn process_key(&mut self, key: &EventValue, front: &[EventValue]) -> CepFlowResult<()> {
        let (handle, sink) = match (self.slices.get(key), self.sinks.get(key)) {
            (Some(handle), Some(sink)) => (handle.clone(), sink.clone()),
            // Retired earlier in this event.
            _ => return Ok(()),
        };

        dispatch(key, &handle, front)?;

        let output = match sink.inspect::<QueueSink, _, _>(|s| s.remove())?? {
            Some(output) => output,
            None => {
                log::debug!("Slice {} produced no output for this event", key);
                return Ok(());
            }
        };

        if self.should_clean(&output)? {
            self.slices.remove(key);
            self.sinks.remove(key);
            self.stats.slices_cleaned += 1;
            log::debug!("Cleaned slice {} ({} live)", key, self.slices.len());
        }

        let value = output.into_iter().next().unwrap_or_default();
        Arc::make_mut(&mut self.last_values).insert(key.clone(), value);
        Ok(())
    }

    fn should_clean(&mut self, output: &[EventValue]) -> CepFlowResult<bool> {
        let Some(cleaning) = self.cleaning_function.as_mut() else {
            return Ok(false);
        };
        let mut verdict = [EventValue::Null];
        check_arity(cleaning.as_ref(), output.len(), verdict.len())?;
        cleaning.evaluate(output, &mut verdict, &self.context)?;
        Ok(verdict[0].as_bool() == Some(true))
    }
}

/// Push `front` into every input of `handle` and wait for all of them.
///
/// The first failure wins; the remaining futures are still awaited so no push
/// is left running behind the caller.
fn dispatch(key: &EventValue, handle: &ProcessorHandle, front: &[EventValue]) -> CepFlowResult<()> {
    let mut futures = Vec::with_capacity(front.len());
    for (index, event) in front.iter().enumerate() {
        futures.push(handle.pushable_input(index)?.push_fast(event.clone()));
    }

    let mut failure = None;
    for future in futures {
        if let Err(e) = future.wait() {
            failure.get_or_insert(e);
        }
    }

    match failure {
        None => Ok(()),
        Some(e) => {
            log::error!("Dispatch into slice {} failed: {}", key, e);
            Err(CepFlowError::dispatch_with_source(
                format!("push into slice {key} failed"),
                e,
            ))
        }
    }
}

impl Processor for Slice {
    fn name(&self) -> &str {
        "Slice"
    }

    fn input_arity(&self) -> usize {
        self.fronts.arity()
    }

    fn output_arity(&self) -> usize {
        1
    }

    fn push_input(&mut self, index: usize, event: EventValue) -> CepFlowResult<()> {
        self.fronts.push(index, event)?;
        while let Some(front) = self.fronts.next_front() {
            self.compute(front)?;
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
        if with_state {
            return Err(CepFlowError::unsupported_duplication("Slice"));
        }
        let mut copy = Slice::from_boxed(
            self.slicing_function.duplicate(false)?,
            self.template.duplicate(false)?,
        )?
        .explode_collections(self.explode_collections)
        .with_handle_options(self.handle_options.clone());
        copy.cleaning_function = self
            .cleaning_function
            .as_ref()
            .map(|f| f.duplicate(false))
            .transpose()?;
        copy.context_hook = self.context_hook.clone();
        copy.context = self.context.clone();
        Ok(Box::new(copy))
    }

    /// Retires every slice and resets both functions. The last-value history
    /// is kept.
    fn reset(&mut self) -> CepFlowResult<()> {
        let retired = self.slices.len();
        self.slices.clear();
        self.sinks.clear();
        self.fronts.clear();
        self.slicing_function.reset();
        if let Some(cleaning) = self.cleaning_function.as_mut() {
            cleaning.reset();
        }
        log::debug!("Slice reset, {} slice(s) retired", retired);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slice")
            .field("slicing_function", &self.slicing_function)
            .field("cleaning_function", &self.cleaning_function)
            .field("template", &self.template)
            .field("explode_collections", &self.explode_collections)
            .field("slices", &self.slices.len())
            .field("last_values", &self.last_values.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::{ClosureFunction, Cumulative, FieldGetter};
    use crate::core::query::processor::ApplyFunction;

    fn owner_count_slice() -> Slice {
        Slice::new(FieldGetter::new("owner"), ApplyFunction::new(Cumulative::counter())).unwrap()
    }

    fn event(owner: &str) -> EventValue {
        EventValue::record([("owner", owner)])
    }

    #[test]
    fn test_first_key_creates_slice() {
        let mut slice = owner_count_slice();
        slice.push_input(0, event("A")).unwrap();
        assert!(slice.has_slice(&"A".into()));
        assert!(slice.has_sink(&"A".into()));
        assert_eq!(slice.last_value(&"A".into()), Some(&EventValue::Long(1)));
        assert_eq!(slice.stats().slices_created, 1);
    }

    #[test]
    fn test_null_key_with_no_slices_is_noop() {
        let mut slice = owner_count_slice();
        let rx = slice.output_ports_mut().attach_pull_channel(0).unwrap();
        slice.push_input(0, EventValue::record([("other", 1)])).unwrap();
        assert_eq!(slice.active_slice_count(), 0);
        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot.as_map().map(|m| m.len()), Some(0));
    }

    #[test]
    fn test_snapshot_handed_downstream_is_not_mutated() {
        let mut slice = owner_count_slice();
        let rx = slice.output_ports_mut().attach_pull_channel(0).unwrap();
        slice.push_input(0, event("A")).unwrap();
        let first = rx.try_recv().unwrap();
        slice.push_input(0, event("A")).unwrap();

        assert_eq!(first.get_field("A"), EventValue::Long(1));
        assert_eq!(rx.try_recv().unwrap().get_field("A"), EventValue::Long(2));
    }

    #[test]
    fn test_arity_checks() {
        let two_inputs = ClosureFunction::new("two-in", 2, 1, |_, _| Ok(vec![EventValue::Null]));
        let err = Slice::new(two_inputs, ApplyFunction::new(Cumulative::counter())).unwrap_err();
        assert!(matches!(err, CepFlowError::Configuration { .. }));

        let err = Slice::new(FieldGetter::new("owner"), QueueSink::new(1)).unwrap_err();
        assert!(matches!(err, CepFlowError::Configuration { .. }));
    }

    #[test]
    fn test_stateful_duplicate_fails_fast() {
        let slice = owner_count_slice();
        let err = slice.duplicate(true).unwrap_err();
        assert!(matches!(err, CepFlowError::UnsupportedDuplication { .. }));
    }
}
