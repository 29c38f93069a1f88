// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod slice;

pub use slice::{ContextHook, Slice, SliceStats};
