// tests/property_reconstruction.rs

mod common;
use crate::common::builders::{InvocationSpec, LogBuilder};

use proptest::prelude::*;

use wfsched::logs::{self, LogRecord};

/// `(gap before start, exec ms, host, task type, fails)` per invocation.
type InvocationShape = (u64, u64, usize, u64, bool);

fn log_strategy() -> impl Strategy<Value = (LogBuilder, usize, usize)> {
    proptest::collection::vec(
        (0..500u64, 1..1000u64, 0..3usize, 0..4u64, proptest::bool::weighted(0.2)),
        1..12,
    )
    .prop_map(|shapes: Vec<InvocationShape>| {
        let hosts = ["h1", "h2", "h3"];
        let mut builder = LogBuilder::new("run-p").workflow("wf", 0);
        let mut start = 0;
        let mut end = 0;
        let mut succeeded = 0;

        for (i, (gap, exec_ms, host, task_type, fails)) in shapes.iter().copied().enumerate() {
            start += gap;
            let id = i as u64 + 1;
            let mut spec = InvocationSpec::new(
                id,
                task_type,
                &format!("type-{task_type}"),
                hosts[host],
                &format!("c{id}"),
                start,
                exec_ms,
            )
            .input(exec_ms * 3);
            if fails {
                spec = spec.failing(1);
            } else {
                succeeded += 1;
            }
            end = end.max(spec.completed_at);
            builder = builder.invocation(spec);
        }

        let builder = builder.workflow_time(end + 1, end + 1);
        (builder, shapes.len(), succeeded)
    })
}

proptest! {
    #[test]
    fn reconstruction_is_stable((builder, invocations, succeeded) in log_strategy()) {
        let raw = builder.records();
        let recon = logs::reconstruct(raw.clone()).unwrap();

        prop_assert_eq!(recon.invocations.len(), invocations);
        prop_assert!(recon.run.peak_containers as usize <= succeeded);
        prop_assert!(recon.records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        // Duplicated input collapses to the same run.
        let doubled: Vec<LogRecord> = raw.iter().chain(raw.iter()).cloned().collect();
        prop_assert_eq!(&logs::reconstruct(doubled).unwrap(), &recon);

        // Cleaned records reconstruct to the same run.
        prop_assert_eq!(&logs::reconstruct(recon.records.clone()).unwrap(), &recon);

        let last = recon.records.last().map(|r| r.timestamp).unwrap_or(0);
        prop_assert!(recon.run.no_task_ready_time <= recon.run.peak_containers * last);
    }
}
