// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod queue_sink;

pub use queue_sink::{QueueSink, SinkBuffer};
