// SPDX-License-Identifier: MIT OR Apache-2.0

//! CepFlow Core Error Types
//!
//! Every failure raised while moving events between processors, evaluating
//! functions or driving slices is reported through [`CepFlowError`]. Errors
//! propagate synchronously to whoever called `push` (or waited on the future
//! returned by `push_fast`); nothing in the core retries on its own.

use crate::core::query::processor::ProcessorId;
use thiserror::Error;

/// Result type for CepFlow operations
pub type CepFlowResult<T> = Result<T, CepFlowError>;

/// Comprehensive CepFlow error types
#[derive(Error, Debug)]
pub enum CepFlowError {
    /// A function could not compute a result for a reason other than
    /// "needs more input".
    #[error("Evaluation of '{function}' failed: {message}")]
    Evaluation { function: String, message: String },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// The lazy front loop hit its iteration ceiling without settling.
    #[error("Front evaluation did not converge after {iterations} iterations (current front {front})")]
    FrontEvaluationExhausted { iterations: usize, front: u64 },

    #[error("Dispatch failed: {message}")]
    Dispatch {
        message: String,
        #[source]
        source: Option<Box<CepFlowError>>,
    },

    #[error("Duplication with state is not supported by {component}")]
    UnsupportedDuplication { component: String },

    #[error("{direction} port {index} out of range (arity {arity})")]
    PortOutOfRange {
        direction: &'static str,
        index: usize,
        arity: usize,
    },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Processor {processor} was dropped while a port still referenced it")]
    ProcessorDropped { processor: ProcessorId },

    #[error("Lock poisoned: {component}")]
    LockPoisoned { component: String },

    #[error("No event available on output {position} after {timeout_ms} ms")]
    PullTimeout { position: usize, timeout_ms: u64 },

    #[error("Pullable on output {position} is stopped")]
    PullableStopped { position: usize },

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        config_key: Option<String>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

// Custom error creation helpers
impl CepFlowError {
    /// Create an evaluation error for the named function
    pub fn evaluation(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Evaluation {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a dispatch error with no underlying cause
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap the failure of a dispatched push
    pub fn dispatch_with_source(message: impl Into<String>, source: CepFlowError) -> Self {
        Self::Dispatch {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an unsupported duplication error
    pub fn unsupported_duplication(component: impl Into<String>) -> Self {
        Self::UnsupportedDuplication {
            component: component.into(),
        }
    }

    /// Input port index outside the processor's input arity
    pub fn input_out_of_range(index: usize, arity: usize) -> Self {
        Self::PortOutOfRange {
            direction: "Input",
            index,
            arity,
        }
    }

    /// Output port index outside the processor's output arity
    pub fn output_out_of_range(index: usize, arity: usize) -> Self {
        Self::PortOutOfRange {
            direction: "Output",
            index,
            arity,
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a lock poisoned error
    pub fn lock_poisoned(component: impl Into<String>) -> Self {
        Self::LockPoisoned {
            component: component.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: None,
        }
    }

    /// Create a configuration error with a specific key
    pub fn configuration_with_key(message: impl Into<String>, config_key: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: Some(config_key.into()),
        }
    }

    /// Create a generic error from a string
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// The innermost error of a dispatch chain, or `self` for any other variant.
    pub fn root_cause(&self) -> &CepFlowError {
        match self {
            Self::Dispatch {
                source: Some(inner),
                ..
            } => inner.root_cause(),
            other => other,
        }
    }
}
