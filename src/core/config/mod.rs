// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod engine_config;
pub mod engine_context;

pub use engine_config::{
    EngineConfig, ExecutorConfig, FrontSyncConfig, PullConfig, SliceConfig,
    ENV_EXECUTOR_THREADS, ENV_MAX_FRONT_ITERATIONS, ENV_PULL_TIMEOUT_MS,
};
pub use engine_context::EngineContext;
