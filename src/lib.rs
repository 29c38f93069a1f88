// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event-stream processing over graphs of processors.
//!
//! Processors exchange [`EventValue`](core::EventValue)s through per-port
//! endpoints: upstream code pushes into a [`Pushable`](core::Pushable),
//! downstream code pulls from a [`Pullable`](core::Pullable).
//! [`ApplyFunctionLazy`](core::ApplyFunctionLazy) aligns inputs arriving at
//! different rates into fronts, and [`Slice`](core::Slice) splits a stream
//! into per-key sub-pipelines created and retired on the fly.

pub mod core;
