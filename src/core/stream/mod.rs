// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod connector;
pub mod input;
pub mod output;
pub mod push_future;

pub use self::connector::{connect, connect_all};
pub use self::input::{InputFronts, InputPushable, Pushable};
pub use self::output::{
    NextStatus, OutputPorts, OutputPullable, Pullable, QueueSink, SinkBuffer,
};
pub use self::push_future::PushFuture;
