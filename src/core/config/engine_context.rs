// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use crate::core::config::EngineConfig;
use crate::core::error::CepFlowResult;
use crate::core::function::Function;
use crate::core::partition::Slice;
use crate::core::query::processor::{ApplyFunctionLazy, HandleOptions, Processor, ProcessorHandle};
use crate::core::util::ExecutorService;

/// Validated configuration plus the resources built from it.
///
/// Processors created through the context pick up the configured iteration
/// ceiling, pull timeout and executor.
#[derive(Debug, Clone)]
pub struct EngineContext {
    config: EngineConfig,
    executor: Option<Arc<ExecutorService>>,
}

impl EngineContext {
    pub fn new(config: EngineConfig) -> CepFlowResult<Self> {
        config.validate()?;
        let executor = if config.executor.enabled {
            Some(Arc::new(ExecutorService::new(
                &config.executor.thread_name_prefix,
                config.effective_pool_size(),
            )))
        } else {
            None
        };
        log::debug!(
            "Engine context ready (executor: {}, max front iterations: {})",
            executor
                .as_ref()
                .map_or("disabled".to_string(), |e| format!("{} threads", e.pool_size())),
            config.front_sync.max_iterations
        );
        Ok(Self { config, executor })
    }

    /// Defaults overridden by the `CEPFLOW_*` environment.
    pub fn from_env() -> CepFlowResult<Self> {
        Self::new(EngineConfig::default().with_env_overrides()?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn executor(&self) -> Option<&Arc<ExecutorService>> {
        self.executor.as_ref()
    }

    pub fn handle_options(&self) -> HandleOptions {
        HandleOptions {
            executor: self.executor.clone(),
            pull_timeout: self.config.pull_timeout(),
        }
    }

    /// Wrap `processor` in a handle using this context's options.
    pub fn register<P: Processor + 'static>(&self, processor: P) -> ProcessorHandle {
        ProcessorHandle::with_options(processor, self.handle_options())
    }

    pub fn apply_function_lazy<F: Function + 'static>(&self, function: F) -> ApplyFunctionLazy {
        ApplyFunctionLazy::new(function).with_max_iterations(self.config.front_sync.max_iterations)
    }

    /// A slice whose sub-processors dispatch through this context's executor.
    pub fn slice<F, P>(&self, slicing_function: F, template: P) -> CepFlowResult<Slice>
    where
        F: Function + 'static,
        P: Processor + 'static,
    {
        Ok(Slice::new(slicing_function, template)?
            .explode_collections(self.config.slice.explode_collections)
            .with_handle_options(self.handle_options()))
    }
}
