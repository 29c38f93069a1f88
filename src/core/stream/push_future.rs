// SPDX-License-Identifier: MIT OR Apache-2.0

use crossbeam_channel::Receiver;

use crate::core::error::{CepFlowError, CepFlowResult};

/// Completion handle returned by `Pushable::push_fast`.
///
/// Either the push already ran on the calling thread (the future is born
/// complete) or it was handed to an executor and the result arrives on a
/// one-shot channel. Side effects of the push are only guaranteed once
/// [`PushFuture::wait`] has returned.
#[derive(Debug)]
pub struct PushFuture {
    state: FutureState,
}

#[derive(Debug)]
enum FutureState {
    Completed(CepFlowResult<()>),
    Pending(Receiver<CepFlowResult<()>>),
}

impl PushFuture {
    /// An already-successful future, for pushes that needed no async work.
    pub fn ready() -> Self {
        Self::completed(Ok(()))
    }

    pub fn completed(result: CepFlowResult<()>) -> Self {
        Self {
            state: FutureState::Completed(result),
        }
    }

    pub(crate) fn pending(receiver: Receiver<CepFlowResult<()>>) -> Self {
        Self {
            state: FutureState::Pending(receiver),
        }
    }

    /// Whether `wait` would return without blocking.
    pub fn is_done(&self) -> bool {
        match &self.state {
            FutureState::Completed(_) => true,
            FutureState::Pending(receiver) => !receiver.is_empty(),
        }
    }

    /// Block until the push has finished and return its outcome.
    ///
    /// A worker that goes away without reporting is a dispatch failure.
    pub fn wait(self) -> CepFlowResult<()> {
        let receiver = match self.state {
            FutureState::Completed(result) => return result,
            FutureState::Pending(receiver) => receiver,
        };

        receiver.recv().map_err(|_| worker_vanished())?
    }
}

fn worker_vanished() -> CepFlowError {
    CepFlowError::dispatch("dispatched push ended without reporting a result")
}
