// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod executor_service;

pub use executor_service::ExecutorService;
