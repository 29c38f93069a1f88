// SPDX-License-Identifier: MIT OR Apache-2.0

// Slice tests: per-key sub-pipelines, snapshots, cleanup and dispatch

#[path = "common/mod.rs"]
mod common;
use common::{drain, init_logging, longs, owner_event, snapshot, valued_event};

use std::time::Duration;

use cepflow::core::config::ExecutorConfig;
use cepflow::core::function::{ClosureFunction, Cumulative, FieldGetter};
use cepflow::core::{
    ApplyFunction, ApplyFunctionLazy, CepFlowError, CepFlowResult, EngineConfig, EngineContext,
    EventValue, Processor, ProcessorHandle, Slice,
};

fn count_at_least(limit: i64) -> ClosureFunction {
    ClosureFunction::unary("count-limit", move |v| {
        Ok(EventValue::Bool(v.as_i64().unwrap_or(0) >= limit))
    })
}

fn owner_counter() -> Slice {
    Slice::new(FieldGetter::new("owner"), ApplyFunction::new(Cumulative::counter())).unwrap()
}

fn value_sum() -> Cumulative {
    Cumulative::new("value-sum", 0i64, |acc, event| {
        let total = acc.as_i64().unwrap_or(0);
        let value = event.get_field("value").as_i64().ok_or_else(|| {
            CepFlowError::type_mismatch("long", event.get_field("value").type_name())
        })?;
        Ok(EventValue::Long(total + value))
    })
}

fn key(k: &str) -> EventValue {
    EventValue::from(k)
}

/// `{tags: [<tag>, ...]}`
fn tagged(tags: &[&str]) -> EventValue {
    let tags = tags.iter().map(|t| EventValue::from(*t)).collect();
    EventValue::record([("tags", EventValue::list(tags))])
}

fn tag_counter() -> Slice {
    Slice::new(FieldGetter::new("tags"), ApplyFunction::new(Cumulative::counter()))
        .unwrap()
        .explode_collections(true)
}

#[test]
fn test_owner_count_with_cleanup() {
    init_logging();
    let slice = owner_counter().with_cleaning_function(count_at_least(3));
    let handle = ProcessorHandle::new(slice);
    let out = handle.pullable_output(0).unwrap();

    for owner in ["A", "B", "A", "A"] {
        handle.push(0, owner_event(owner)).unwrap();
    }

    let snapshots: Vec<_> = drain(&out).iter().map(snapshot).collect();
    assert_eq!(
        snapshots,
        vec![
            longs(&[("A", 1)]),
            longs(&[("A", 1), ("B", 1)]),
            longs(&[("A", 2), ("B", 1)]),
            longs(&[("A", 3), ("B", 1)]),
        ]
    );

    handle
        .inspect::<Slice, _, _>(|s| {
            assert!(!s.has_slice(&key("A")));
            assert!(!s.has_sink(&key("A")));
            assert_eq!(s.last_value(&key("A")), Some(&EventValue::Long(3)));
            assert!(s.has_slice(&key("B")));
            assert_eq!(s.active_slice_count(), 1);
            assert_eq!(s.stats().slices_cleaned, 1);
            assert_eq!(s.stats().events_processed, 4);
        })
        .unwrap();
}

#[test]
fn test_retired_key_starts_a_fresh_slice() {
    init_logging();
    let handle = ProcessorHandle::new(owner_counter().with_cleaning_function(count_at_least(2)));
    let out = handle.pullable_output(0).unwrap();

    for owner in ["A", "A", "A"] {
        handle.push(0, owner_event(owner)).unwrap();
    }

    let last = drain(&out).pop().unwrap();
    assert_eq!(snapshot(&last), longs(&[("A", 1)]));
    let created = handle
        .inspect::<Slice, _, _>(|s| s.stats().slices_created)
        .unwrap();
    assert_eq!(created, 2);
}

#[test]
fn test_broadcast_updates_every_live_key_and_creates_none() {
    init_logging();
    let handle = ProcessorHandle::new(owner_counter());
    let out = handle.pullable_output(0).unwrap();

    handle.push(0, owner_event("A")).unwrap();
    handle.push(0, owner_event("B")).unwrap();
    handle.push(0, owner_event("A")).unwrap();

    // Explicit sentinel.
    handle
        .push(0, EventValue::record([("owner", EventValue::ToAllSlices)]))
        .unwrap();
    // Missing key behaves the same way.
    handle.push(0, EventValue::record([("other", 1)])).unwrap();

    let snapshots: Vec<_> = drain(&out).iter().map(snapshot).collect();
    assert_eq!(snapshots[3], longs(&[("A", 3), ("B", 2)]));
    assert_eq!(snapshots[4], longs(&[("A", 4), ("B", 3)]));

    handle
        .inspect::<Slice, _, _>(|s| {
            assert_eq!(s.active_slice_count(), 2);
            assert_eq!(s.stats().slices_created, 2);
        })
        .unwrap();
}

#[test]
fn test_broadcast_without_slices_outputs_current_snapshot() {
    init_logging();
    let handle = ProcessorHandle::new(owner_counter());
    let out = handle.pullable_output(0).unwrap();

    handle
        .push(0, EventValue::record([("owner", EventValue::ToAllSlices)]))
        .unwrap();

    let outputs = drain(&out);
    assert_eq!(outputs.len(), 1);
    assert!(snapshot(&outputs[0]).is_empty());
}

#[test]
fn test_reset_keeps_last_values() {
    init_logging();
    let handle = ProcessorHandle::new(owner_counter().with_cleaning_function(count_at_least(3)));
    let out = handle.pullable_output(0).unwrap();
    for owner in ["A", "B", "A", "A"] {
        handle.push(0, owner_event(owner)).unwrap();
    }

    handle.reset().unwrap();
    handle
        .inspect::<Slice, _, _>(|s| {
            assert_eq!(s.active_slice_count(), 0);
            assert!(!s.has_sink(&key("B")));
            assert_eq!(s.last_values().len(), 2);
        })
        .unwrap();

    // B's counter restarted with its new slice.
    handle.push(0, owner_event("B")).unwrap();
    let last = drain(&out).pop().unwrap();
    assert_eq!(snapshot(&last), longs(&[("A", 3), ("B", 1)]));
}

#[test]
fn test_slice_matches_standalone_processor() {
    init_logging();
    let template = ApplyFunction::new(value_sum());
    let standalone = ProcessorHandle::from_boxed(template.duplicate(false).unwrap(), Default::default());
    let standalone_out = standalone.pullable_output(0).unwrap();

    let sliced = ProcessorHandle::new(Slice::new(FieldGetter::new("owner"), template).unwrap());
    let sliced_out = sliced.pullable_output(0).unwrap();

    let events = [("A", 5), ("B", 100), ("A", 7), ("B", 1), ("A", -2), ("C", 9)];
    let mut a_from_slice = Vec::new();
    for (owner, value) in events {
        sliced.push(0, valued_event(owner, value)).unwrap();
        let snap = sliced_out.pull().unwrap();
        if owner == "A" {
            standalone.push(0, valued_event(owner, value)).unwrap();
            a_from_slice.push(snap.get_field("A"));
        }
    }

    assert_eq!(a_from_slice, drain(&standalone_out));
    assert_eq!(
        a_from_slice,
        vec![EventValue::Long(5), EventValue::Long(12), EventValue::Long(10)]
    );
}

#[test]
fn test_exploded_collections_dispatch_to_each_key() {
    init_logging();
    let handle = ProcessorHandle::new(tag_counter());
    let out = handle.pullable_output(0).unwrap();

    handle.push(0, tagged(&["x", "y"])).unwrap();
    handle.push(0, tagged(&["y"])).unwrap();
    handle.push(0, tagged(&[])).unwrap();

    let snapshots: Vec<_> = drain(&out).iter().map(snapshot).collect();
    assert_eq!(snapshots[0], longs(&[("x", 1), ("y", 1)]));
    assert_eq!(snapshots[1], longs(&[("x", 1), ("y", 2)]));
    assert_eq!(snapshots[2], snapshots[1]);
}

#[test]
fn test_repeated_element_is_dispatched_per_occurrence() {
    init_logging();
    let handle = ProcessorHandle::new(tag_counter());
    let out = handle.pullable_output(0).unwrap();

    handle.push(0, tagged(&["A", "A"])).unwrap();
    handle.push(0, tagged(&["B", "A", "B"])).unwrap();

    let snapshots: Vec<_> = drain(&out).iter().map(snapshot).collect();
    assert_eq!(snapshots[0], longs(&[("A", 2)]));
    assert_eq!(snapshots[1], longs(&[("A", 3), ("B", 2)]));
    let stats = handle.inspect::<Slice, _, _>(|s| s.stats()).unwrap();
    assert_eq!(stats.slices_created, 2);
    assert_eq!(stats.events_processed, 2);
}

#[test]
fn test_key_retired_mid_collection_is_recreated_by_later_element() {
    init_logging();
    let handle =
        ProcessorHandle::new(tag_counter().with_cleaning_function(count_at_least(2)));
    let out = handle.pullable_output(0).unwrap();

    // Second A reaches the limit and retires the slice; the third starts over.
    handle.push(0, tagged(&["A", "A", "A"])).unwrap();

    assert_eq!(snapshot(&drain(&out)[0]), longs(&[("A", 1)]));
    handle
        .inspect::<Slice, _, _>(|s| {
            assert!(s.has_slice(&key("A")));
            assert_eq!(s.stats().slices_created, 2);
            assert_eq!(s.stats().slices_cleaned, 1);
        })
        .unwrap();
}

#[test]
fn test_collection_is_a_single_key_without_explode() {
    init_logging();
    let slice = Slice::new(FieldGetter::new("tags"), ApplyFunction::new(Cumulative::counter()))
        .unwrap();
    let handle = ProcessorHandle::new(slice);

    let tags = EventValue::list(vec!["x".into(), "y".into()]);
    handle
        .push(0, EventValue::record([("tags", tags.clone())]))
        .unwrap();

    handle
        .inspect::<Slice, _, _>(|s| {
            assert_eq!(s.slice_keys(), vec![tags.clone()]);
        })
        .unwrap();
}

#[test]
fn test_stateful_duplicate_is_rejected() {
    let handle = ProcessorHandle::new(owner_counter().explode_collections(true));
    handle.push(0, owner_event("A")).unwrap();

    let err = handle.duplicate(true).unwrap_err();
    assert!(matches!(err, CepFlowError::UnsupportedDuplication { .. }));

    let copy = handle.duplicate(false).unwrap();
    copy.inspect::<Slice, _, _>(|s| {
        assert_eq!(s.active_slice_count(), 0);
        assert!(s.last_values().is_empty());
        assert!(s.explodes_collections());
    })
    .unwrap();
}

#[test]
fn test_context_hook_seeds_new_slices() {
    init_logging();
    let tag = ClosureFunction::new("slice-tag", 1, 1, |_, ctx| {
        Ok(vec![ctx.get("slice").cloned().unwrap_or_default()])
    });
    let slice = Slice::new(FieldGetter::new("owner"), ApplyFunction::new(tag))
        .unwrap()
        .with_context_hook(|processor: &mut dyn Processor, key: &EventValue| {
            processor.context_mut().insert("slice", key.clone());
        });
    let handle = ProcessorHandle::new(slice);
    let out = handle.pullable_output(0).unwrap();

    handle.push(0, owner_event("A")).unwrap();
    handle.push(0, owner_event("B")).unwrap();

    let last = drain(&out).pop().unwrap();
    assert_eq!(last.get_field("A"), EventValue::from("A"));
    assert_eq!(last.get_field("B"), EventValue::from("B"));
}

#[test]
fn test_silent_sub_pipeline_keeps_placeholder() {
    init_logging();
    // Emits only once an event carries a value.
    let gate = ClosureFunction::unary("gate", |e| Ok(e.get_field("value")))
        .with_lazy(|inputs, _| {
            Ok(inputs[0]
                .as_ref()
                .map(|e| e.get_field("value"))
                .filter(|v| !v.is_null())
                .map(|v| vec![v]))
        });
    let slice = Slice::new(FieldGetter::new("owner"), ApplyFunctionLazy::new(gate)).unwrap();
    let handle = ProcessorHandle::new(slice);
    let out = handle.pullable_output(0).unwrap();

    handle.push(0, owner_event("A")).unwrap();
    handle.push(0, valued_event("B", 4)).unwrap();

    let snapshots: Vec<_> = drain(&out).iter().map(snapshot).collect();
    assert_eq!(snapshots[0].get("A"), Some(&EventValue::Null));
    assert_eq!(snapshots[1].get("A"), Some(&EventValue::Null));
    assert_eq!(snapshots[1].get("B"), Some(&EventValue::Long(4)));
}

fn pooled_context(threads: usize) -> EngineContext {
    EngineContext::new(EngineConfig {
        executor: ExecutorConfig {
            enabled: true,
            pool_size: Some(threads),
            thread_name_prefix: "slice-test".to_string(),
        },
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_executor_dispatch_keeps_per_key_order() -> CepFlowResult<()> {
    init_logging();
    let ctx = pooled_context(4);
    let slice = ctx.slice(FieldGetter::new("owner"), ApplyFunction::new(value_sum()))?;
    let handle = ctx.register(slice);
    let out = handle.pullable_output(0)?;

    let owners = ["A", "B", "C", "D", "E"];
    for i in 0..100 {
        handle.push(0, valued_event(owners[i % owners.len()], i as i64))?;
    }

    let last = drain(&out).pop().unwrap();
    for (offset, owner) in owners.iter().enumerate() {
        let expected: i64 = (0..100).filter(|i| i % 5 == offset).map(|i| i as i64).sum();
        assert_eq!(last.get_field(owner), EventValue::Long(expected));
    }
    assert!(ctx.executor().unwrap().tasks_completed() >= 100);
    Ok(())
}

#[test]
fn test_sub_pipeline_failure_surfaces_as_dispatch_error() {
    init_logging();
    let ctx = pooled_context(2);
    let handle = ctx.register(
        ctx.slice(FieldGetter::new("owner"), ApplyFunction::new(value_sum()))
            .unwrap(),
    );

    handle.push(0, valued_event("A", 1)).unwrap();
    let err = handle.push(0, owner_event("A")).unwrap_err();
    assert!(matches!(err, CepFlowError::Dispatch { .. }));
    assert!(matches!(err.root_cause(), CepFlowError::TypeMismatch { .. }));

    // Earlier history is untouched.
    handle
        .inspect::<Slice, _, _>(|s| {
            assert_eq!(s.last_value(&key("A")), Some(&EventValue::Long(1)));
        })
        .unwrap();
}

#[test]
fn test_panicking_sub_pipeline_is_a_dispatch_error() {
    init_logging();
    let ctx = pooled_context(2);
    let explode = ClosureFunction::unary("explode", |e| {
        if e.get_field("owner") == EventValue::from("boom") {
            panic!("sub-pipeline blew up");
        }
        Ok(EventValue::Bool(true))
    });
    let handle = ctx.register(
        ctx.slice(FieldGetter::new("owner"), ApplyFunction::new(explode))
            .unwrap(),
    );

    handle.push(0, owner_event("ok")).unwrap();
    let err = handle.push(0, owner_event("boom")).unwrap_err();
    assert!(matches!(err, CepFlowError::Dispatch { .. }));

    // Other keys keep working.
    handle.push(0, owner_event("ok")).unwrap();
}

#[test]
fn test_push_fast_into_pooled_slice_always_completes() {
    init_logging();
    let ctx = pooled_context(2);
    let handle = ctx.register(
        ctx.slice(FieldGetter::new("owner"), ApplyFunction::new(Cumulative::counter()))
            .unwrap(),
    );
    let input = handle.pushable_input(0).unwrap();

    let owners = ["A", "B", "C", "D"];
    let futures: Vec<_> = (0..4_000)
        .map(|i| input.push_fast(owner_event(owners[i % owners.len()])))
        .collect();

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let outcome: CepFlowResult<()> = futures.into_iter().try_for_each(|f| f.wait());
        let _ = done_tx.send(outcome);
    });
    done_rx
        .recv_timeout(Duration::from_secs(30))
        .expect("every push_fast resolves")
        .unwrap();

    handle
        .inspect::<Slice, _, _>(|s| {
            for owner in owners {
                assert_eq!(s.last_value(&key(owner)), Some(&EventValue::Long(1_000)));
            }
        })
        .unwrap();
}
