// SPDX-License-Identifier: MIT OR Apache-2.0

//! Processor abstraction
//!
//! A processor owns `input_arity` input ports and `output_arity` output ports.
//! Upstream components deliver events one port at a time through
//! [`Processor::push_input`]; results leave through the processor's
//! [`OutputPorts`], either pushed straight into a connected downstream
//! processor or buffered for a pull-mode consumer.
//!
//! Processors are never shared directly: they are wrapped in a
//! [`ProcessorHandle`] which serializes access and hands out cached port
//! endpoints.

pub mod apply_function;
pub mod apply_function_lazy;
pub mod handle;

use std::any::Any;
use std::fmt::{self, Debug};

use uuid::Uuid;

use crate::core::error::CepFlowResult;
use crate::core::event::EventValue;
use crate::core::function::Context;
use crate::core::stream::OutputPorts;

pub use apply_function::ApplyFunction;
pub use apply_function_lazy::{ApplyFunctionLazy, DEFAULT_MAX_FRONT_ITERATIONS};
pub use handle::{HandleOptions, ProcessorHandle, SharedProcessor};

/// Stable identity of one processor instance.
///
/// Ports refer back to their processor through this id rather than through an
/// owning pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessorId(Uuid);

impl ProcessorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProcessorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait Processor: Debug + Send {
    fn name(&self) -> &str;

    fn input_arity(&self) -> usize;

    fn output_arity(&self) -> usize;

    /// Accept one event on input port `index`.
    ///
    /// May emit zero, one or many events through the output ports before
    /// returning. An error aborts the current push; outputs already emitted
    /// during the call stay emitted.
    fn push_input(&mut self, index: usize, event: EventValue) -> CepFlowResult<()>;

    fn output_ports(&self) -> &OutputPorts;

    fn output_ports_mut(&mut self) -> &mut OutputPorts;

    fn context(&self) -> &Context;

    fn context_mut(&mut self) -> &mut Context;

    /// Copy this processor.
    ///
    /// Without state the copy shares only configuration (functions, template,
    /// context) and starts with empty buffers. With state it also carries
    /// in-flight buffers and counters; processors that cannot do that must
    /// return `CepFlowError::UnsupportedDuplication`, never a stateless copy.
    /// Output connections are never copied.
    fn duplicate(&self, with_state: bool) -> CepFlowResult<Box<dyn Processor>>;

    /// Drop runtime state and go back to the initial configuration.
    fn reset(&mut self) -> CepFlowResult<()>;

    fn as_any(&self) -> &dyn Any;
}
