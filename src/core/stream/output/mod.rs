// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod ports;
pub mod pullable;
pub mod sink;

pub use ports::OutputPorts;
pub use pullable::{NextStatus, OutputPullable, Pullable};
pub use sink::{QueueSink, SinkBuffer};
