// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use cepflow::core::{EventValue, Pullable};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `{owner: <owner>}`
pub fn owner_event(owner: &str) -> EventValue {
    EventValue::record([("owner", owner)])
}

/// `{owner: <owner>, value: <value>}`
pub fn valued_event(owner: &str, value: i64) -> EventValue {
    EventValue::record([
        ("owner", EventValue::from(owner)),
        ("value", EventValue::Long(value)),
    ])
}

/// Slice snapshot as an ordered `key -> value` map, for readable assertions.
pub fn snapshot(value: &EventValue) -> BTreeMap<String, EventValue> {
    value
        .as_map()
        .map(|m| m.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
        .unwrap_or_default()
}

pub fn longs(entries: &[(&str, i64)]) -> BTreeMap<String, EventValue> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), EventValue::Long(*v)))
        .collect()
}

/// Everything currently buffered on a pull endpoint.
pub fn drain(pullable: &Arc<dyn Pullable>) -> Vec<EventValue> {
    std::iter::from_fn(|| pullable.pull_soft()).collect()
}
