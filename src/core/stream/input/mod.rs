// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod input_fronts;
pub mod pushable;

pub use input_fronts::InputFronts;
pub use pushable::{InputPushable, Pushable};
