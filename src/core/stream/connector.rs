// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph wiring helpers.
//!
//! Pushes run synchronously through the chain of connected processors while
//! each upstream processor stays locked, so the graph must be acyclic: a
//! processor reachable from its own outputs would wait on itself.

use crate::core::error::{CepFlowError, CepFlowResult};
use crate::core::query::processor::ProcessorHandle;

/// Route output `output` of `upstream` into input `input` of `downstream`.
pub fn connect(
    upstream: &ProcessorHandle,
    output: usize,
    downstream: &ProcessorHandle,
    input: usize,
) -> CepFlowResult<()> {
    if upstream.same_processor(downstream) {
        return Err(CepFlowError::connection(format!(
            "cannot connect processor {} to itself",
            upstream.id()
        )));
    }
    if output >= upstream.output_arity() {
        return Err(CepFlowError::output_out_of_range(
            output,
            upstream.output_arity(),
        ));
    }
    let pushable = downstream.pushable_input(input)?;
    upstream.lock()?.output_ports_mut().connect(output, pushable)?;
    log::debug!(
        "Connected {}[{}] -> {}[{}]",
        upstream.name(),
        output,
        downstream.name(),
        input
    );
    Ok(())
}

/// Connect output `i` of `upstream` to input `i` of `downstream` for every `i`.
pub fn connect_all(upstream: &ProcessorHandle, downstream: &ProcessorHandle) -> CepFlowResult<()> {
    if upstream.output_arity() != downstream.input_arity() {
        return Err(CepFlowError::connection(format!(
            "arity mismatch: {} has {} output(s), {} has {} input(s)",
            upstream.name(),
            upstream.output_arity(),
            downstream.name(),
            downstream.input_arity()
        )));
    }
    for i in 0..upstream.output_arity() {
        connect(upstream, i, downstream, i)?;
    }
    Ok(())
}
