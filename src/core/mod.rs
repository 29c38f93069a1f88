// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod config;
pub mod error;
pub mod event;
pub mod function;
pub mod partition;
pub mod query;
pub mod stream;
pub mod util;

pub use self::config::{EngineConfig, EngineContext};
pub use self::error::{CepFlowError, CepFlowResult};
pub use self::event::{EventMap, EventValue};
pub use self::function::{Context, Function};
pub use self::partition::{Slice, SliceStats};
pub use self::query::processor::{
    ApplyFunction, ApplyFunctionLazy, HandleOptions, Processor, ProcessorHandle, ProcessorId,
};
pub use self::stream::{
    connect, connect_all, NextStatus, PushFuture, Pullable, Pushable, QueueSink, SinkBuffer,
};
pub use self::util::ExecutorService;
