// src/logs/cleanup.rs

//! First reconstruction pass: deduplicate, drop failed containers,
//! cross-link cluster events to invocations, and sort.
//!
//! Each step is a function from records to new records; nothing is patched
//! in place.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::errors::{Result, SchedError};
use crate::logs::record::{ClusterEventKind, Linkage, LogRecord, RecordIdentity, RecordKey};
use crate::types::{ContainerId, InvocationId};

/// Run the whole first pass.
pub fn clean(records: Vec<LogRecord>) -> Result<Vec<LogRecord>> {
    let received = records.len();
    let records = remove_duplicates(records);
    let deduplicated = records.len();
    let records = remove_bad_containers(records)?;
    let records = link_cluster_events(records)?;
    let records = sort_by_timestamp(records);

    debug!(
        received,
        duplicates = received - deduplicated,
        bad_container_records = deduplicated - records.len(),
        kept = records.len(),
        "log cleanup finished"
    );

    Ok(records)
}

/// Collapse copies of the same event (equal [`LogRecord::identity`]),
/// keeping the first occurrence in arrival order.
pub fn remove_duplicates(records: Vec<LogRecord>) -> Vec<LogRecord> {
    let mut seen: HashSet<RecordIdentity> = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.identity()))
        .collect()
}

/// Drop every container that completed with a non-zero exit code: both the
/// completion record reporting the failure and the container's allocation.
pub fn remove_bad_containers(records: Vec<LogRecord>) -> Result<Vec<LogRecord>> {
    let mut bad: HashSet<ContainerId> = HashSet::new();
    for record in &records {
        if let Some(ClusterEventKind::Completed {
            container_id,
            exit_code,
        }) = record.cluster_event()?
        {
            if exit_code != 0 {
                debug!(container = %container_id, exit_code, "excluding failed container");
                bad.insert(container_id);
            }
        }
    }

    if bad.is_empty() {
        return Ok(records);
    }

    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        let drop = match record.cluster_event()? {
            Some(ClusterEventKind::Completed { exit_code, .. }) => exit_code != 0,
            Some(ClusterEventKind::Allocated { container_id }) => bad.contains(&container_id),
            _ => false,
        };
        if !drop {
            kept.push(record);
        }
    }

    Ok(kept)
}

/// Attribute cluster events to the invocations they served.
///
/// Four FIFO substreams are joined in arrival order:
/// - `invoc-exec` records queue up waiting for a container request;
/// - a `container-requested` event takes the oldest waiting invocation;
/// - `container-allocated` events are indexed by container id;
/// - `container-completed` events queue up waiting for their timing;
/// - an `invoc-time` record takes the oldest completed container and links it,
///   and that container's allocation, to its invocation.
///
/// Any underflow is a [`SchedError::ReconciliationMismatch`].
///
/// Cluster events that already carry an invocation id (a previously cleaned
/// log) keep their linkage and take no part in the FIFO matching.
pub fn link_cluster_events(records: Vec<LogRecord>) -> Result<Vec<LogRecord>> {
    let mut links: Vec<Option<Linkage>> = vec![None; records.len()];
    let mut exec_queue: VecDeque<usize> = VecDeque::new();
    let mut allocated: HashMap<ContainerId, usize> = HashMap::new();
    let mut completed_queue: VecDeque<(usize, ContainerId)> = VecDeque::new();

    let mut already_completed: HashSet<InvocationId> = HashSet::new();
    for record in &records {
        if let (Some(ClusterEventKind::Completed { .. }), Some(id)) =
            (record.cluster_event()?, record.linkage.invocation_id)
        {
            already_completed.insert(id);
        }
    }

    for (idx, record) in records.iter().enumerate() {
        let prelinked = record.linkage.invocation_id;
        match record.key {
            RecordKey::InvocExec => exec_queue.push_back(idx),
            RecordKey::InvocTime
                if prelinked.is_some_and(|id| already_completed.contains(&id)) => {}
            RecordKey::InvocTime => {
                let (completed_idx, container_id) =
                    completed_queue.pop_front().ok_or_else(|| {
                        SchedError::ReconciliationMismatch(format!(
                            "invoc-time at {} (invocation {:?}) has no completed container",
                            record.timestamp, record.linkage.invocation_id
                        ))
                    })?;
                let allocated_idx = allocated.get(&container_id).copied().ok_or_else(|| {
                    SchedError::ReconciliationMismatch(format!(
                        "completed container {container_id} was never allocated"
                    ))
                })?;
                links[completed_idx] = Some(record.linkage.clone());
                links[allocated_idx] = Some(record.linkage.clone());
            }
            RecordKey::ClusterEvent => match record.cluster_event()? {
                Some(ClusterEventKind::Requested) if prelinked.is_some() => {
                    exec_queue.retain(|&i| records[i].linkage.invocation_id != prelinked);
                }
                Some(ClusterEventKind::Requested) => {
                    let exec_idx = exec_queue.pop_front().ok_or_else(|| {
                        SchedError::ReconciliationMismatch(format!(
                            "container requested at {} with no invocation waiting",
                            record.timestamp
                        ))
                    })?;
                    links[idx] = Some(records[exec_idx].linkage.clone());
                }
                Some(ClusterEventKind::Allocated { container_id }) => {
                    allocated.insert(container_id, idx);
                }
                Some(ClusterEventKind::Completed { container_id, .. }) => {
                    if !allocated.contains_key(&container_id) {
                        return Err(SchedError::ReconciliationMismatch(format!(
                            "container {container_id} completed at {} without prior allocation",
                            record.timestamp
                        )));
                    }
                    if prelinked.is_none() {
                        completed_queue.push_back((idx, container_id));
                    }
                }
                Some(ClusterEventKind::Other(_)) | None => {}
            },
            _ => {}
        }
    }

    Ok(records
        .into_iter()
        .zip(links)
        .map(|(record, link)| match link {
            Some(linkage) => record.with_linkage(&linkage),
            None => record,
        })
        .collect())
}

/// Stable sort by timestamp; equal timestamps keep arrival order.
pub fn sort_by_timestamp(mut records: Vec<LogRecord>) -> Vec<LogRecord> {
    records.sort_by_key(|r| r.timestamp);
    records
}
