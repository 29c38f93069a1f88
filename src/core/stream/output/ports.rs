// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::core::error::{CepFlowError, CepFlowResult};
use crate::core::event::EventValue;
use crate::core::stream::Pushable;

#[derive(Debug, Default)]
struct OutputPort {
    downstream: Option<Arc<dyn Pushable>>,
    pull_tx: Option<Sender<EventValue>>,
    emitted: u64,
}

/// Output side of a processor.
///
/// Routing of an emitted value, in order of preference:
/// 1. the connected downstream pushable (synchronous push),
/// 2. the port's pull channel, when a pullable was requested for it,
/// 3. nowhere: the value is dropped.
#[derive(Debug)]
pub struct OutputPorts {
    ports: Vec<OutputPort>,
}

impl OutputPorts {
    pub fn new(arity: usize) -> Self {
        Self {
            ports: (0..arity).map(|_| OutputPort::default()).collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.ports.len()
    }

    fn port_mut(&mut self, index: usize) -> CepFlowResult<&mut OutputPort> {
        let arity = self.ports.len();
        self.ports
            .get_mut(index)
            .ok_or_else(|| CepFlowError::output_out_of_range(index, arity))
    }

    /// Route output `index` into `pushable`, replacing any previous connection.
    pub fn connect(&mut self, index: usize, pushable: Arc<dyn Pushable>) -> CepFlowResult<()> {
        self.port_mut(index)?.downstream = Some(pushable);
        Ok(())
    }

    pub fn disconnect(&mut self, index: usize) -> CepFlowResult<Option<Arc<dyn Pushable>>> {
        Ok(self.port_mut(index)?.downstream.take())
    }

    pub fn is_connected(&self, index: usize) -> bool {
        self.ports
            .get(index)
            .is_some_and(|p| p.downstream.is_some())
    }

    pub fn downstream(&self, index: usize) -> Option<&Arc<dyn Pushable>> {
        self.ports.get(index).and_then(|p| p.downstream.as_ref())
    }

    /// Open the pull channel of output `index` and return its receiving end.
    pub fn attach_pull_channel(&mut self, index: usize) -> CepFlowResult<Receiver<EventValue>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.port_mut(index)?.pull_tx = Some(tx);
        Ok(rx)
    }

    /// Count of values emitted on output `index` since creation.
    pub fn emitted(&self, index: usize) -> u64 {
        self.ports.get(index).map_or(0, |p| p.emitted)
    }

    pub fn emit(&mut self, index: usize, value: EventValue) -> CepFlowResult<()> {
        let port = self.port_mut(index)?;
        port.emitted += 1;

        if let Some(downstream) = &port.downstream {
            downstream.push(value)?;
            return Ok(());
        }

        let closed = match &port.pull_tx {
            Some(tx) => tx.send(value).is_err(),
            None => {
                log::trace!("Output {} is not connected, dropping value", index);
                return Ok(());
            }
        };
        if closed {
            // The pullable is gone; stop feeding its channel.
            log::trace!("Pull channel of output {} closed, dropping value", index);
            port.pull_tx = None;
        }
        Ok(())
    }

    /// Emit one value per output port, in port order.
    pub fn emit_front(&mut self, values: Vec<EventValue>) -> CepFlowResult<()> {
        for (index, value) in values.into_iter().enumerate() {
            self.emit(index, value)?;
        }
        Ok(())
    }
}
