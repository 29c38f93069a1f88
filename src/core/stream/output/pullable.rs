// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::core::error::{CepFlowError, CepFlowResult};
use crate::core::event::EventValue;
use crate::core::query::processor::ProcessorId;

/// Answer of a non-blocking availability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStatus {
    /// An event is ready to be pulled.
    Yes,
    /// No event will ever come (stopped, disposed, or producer gone).
    No,
    /// Nothing yet; one may arrive later.
    Maybe,
}

/// Output endpoint of one processor port, for consumers that pull.
pub trait Pullable: Debug + Send + Sync {
    fn has_next_soft(&self) -> NextStatus;

    /// Wait up to the pull timeout for an event, without consuming it.
    fn has_next(&self) -> CepFlowResult<bool>;

    fn pull_soft(&self) -> Option<EventValue>;

    /// Consume one event, waiting up to the pull timeout.
    fn pull(&self) -> CepFlowResult<EventValue>;

    fn next(&self) -> CepFlowResult<EventValue> {
        self.pull()
    }

    fn start(&self);

    fn stop(&self);

    fn dispose(&self);

    /// Index of the output port this endpoint drains.
    fn position(&self) -> usize;

    /// The processor this endpoint belongs to.
    fn processor_id(&self) -> ProcessorId;
}

/// Pullable over the pull channel of one output port.
#[derive(Debug)]
pub struct OutputPullable {
    receiver: Receiver<EventValue>,
    // Event observed by a `has_next*` probe but not yet pulled.
    lookahead: Mutex<Option<EventValue>>,
    active: AtomicBool,
    disposed: AtomicBool,
    position: usize,
    processor_id: ProcessorId,
    timeout: Duration,
}

impl OutputPullable {
    pub(crate) fn new(
        receiver: Receiver<EventValue>,
        position: usize,
        processor_id: ProcessorId,
        timeout: Duration,
    ) -> Self {
        Self {
            receiver,
            lookahead: Mutex::new(None),
            active: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
            position,
            processor_id,
            timeout,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn lookahead(&self) -> MutexGuard<'_, Option<EventValue>> {
        // The slot holds plain data; a panic elsewhere cannot leave it torn.
        self.lookahead
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_active(&self) -> CepFlowResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CepFlowError::PullableStopped {
                position: self.position,
            })
        }
    }
}

impl Pullable for OutputPullable {
    fn has_next_soft(&self) -> NextStatus {
        if !self.is_active() {
            return NextStatus::No;
        }
        let mut slot = self.lookahead();
        if slot.is_some() {
            return NextStatus::Yes;
        }
        match self.receiver.try_recv() {
            Ok(event) => {
                *slot = Some(event);
                NextStatus::Yes
            }
            Err(TryRecvError::Empty) => NextStatus::Maybe,
            Err(TryRecvError::Disconnected) => NextStatus::No,
        }
    }

    fn has_next(&self) -> CepFlowResult<bool> {
        self.ensure_active()?;
        let mut slot = self.lookahead();
        if slot.is_some() {
            return Ok(true);
        }
        match self.receiver.recv_timeout(self.timeout) {
            Ok(event) => {
                *slot = Some(event);
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    fn pull_soft(&self) -> Option<EventValue> {
        if !self.is_active() {
            return None;
        }
        self.lookahead()
            .take()
            .or_else(|| self.receiver.try_recv().ok())
    }

    fn pull(&self) -> CepFlowResult<EventValue> {
        self.ensure_active()?;
        if let Some(event) = self.lookahead().take() {
            return Ok(event);
        }
        self.receiver
            .recv_timeout(self.timeout)
            .map_err(|e| match e {
                RecvTimeoutError::Timeout => CepFlowError::PullTimeout {
                    position: self.position,
                    timeout_ms: self.timeout.as_millis() as u64,
                },
                RecvTimeoutError::Disconnected => CepFlowError::ProcessorDropped {
                    processor: self.processor_id,
                },
            })
    }

    fn start(&self) {
        if !self.disposed.load(Ordering::Acquire) {
            self.active.store(true, Ordering::Release);
        }
    }

    fn stop(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.active.store(false, Ordering::Release);
        self.lookahead().take();
        while self.receiver.try_recv().is_ok() {}
    }

    fn position(&self) -> usize {
        self.position
    }

    fn processor_id(&self) -> ProcessorId {
        self.processor_id
    }
}
