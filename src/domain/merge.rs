//! Per-field last-write-wins merge between a local record and a remote snapshot.
//!
//! Field values are atomic. The strictly newer `updated_at` wins; on equal timestamps the
//! remote side wins so two devices converge instead of oscillating. There are no vector
//! clocks: list-valued fields merged this way lose concurrent appends.

use crate::domain::entities::{ConflictOverwrite, FieldValue, StepData, StepDataMap};
use crate::domain::value_objects::{RecordId, RecordStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Local,
    Remote,
}

pub fn resolve(local: &FieldValue, remote: &FieldValue) -> Winner {
    if local.updated_at > remote.updated_at {
        Winner::Local
    } else {
        Winner::Remote
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub merged: StepDataMap,
    /// Fields where the local side won and the remote must be told.
    pub outgoing: StepDataMap,
    /// Local values replaced by a different remote value.
    pub overwritten: Vec<ConflictOverwrite>,
    /// Remote fields adopted locally (new or changed).
    pub incoming: usize,
}

impl MergeOutcome {
    pub fn has_outgoing(&self) -> bool {
        self.outgoing.values().any(|step| !step.is_empty())
    }

    pub fn outgoing_field_count(&self) -> usize {
        crate::domain::entities::step_data::field_count(&self.outgoing)
    }
}

pub fn merge_step_data(
    record_id: &RecordId,
    local: &StepDataMap,
    remote: &StepDataMap,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    let empty = StepData::new();

    let mut steps: Vec<&String> = local.keys().chain(remote.keys()).collect();
    steps.sort();
    steps.dedup();

    for step in steps {
        let local_step = local.get(step).unwrap_or(&empty);
        let remote_step = remote.get(step).unwrap_or(&empty);

        let mut fields: Vec<&String> = local_step.keys().chain(remote_step.keys()).collect();
        fields.sort();
        fields.dedup();

        let mut merged_step = StepData::new();
        let mut outgoing_step = StepData::new();

        for field in fields {
            match (local_step.get(field), remote_step.get(field)) {
                (Some(l), None) => {
                    merged_step.insert(field.clone(), l.clone());
                    outgoing_step.insert(field.clone(), l.clone());
                }
                (None, Some(r)) => {
                    merged_step.insert(field.clone(), r.clone());
                    outcome.incoming += 1;
                }
                (Some(l), Some(r)) => match resolve(l, r) {
                    Winner::Local => {
                        merged_step.insert(field.clone(), l.clone());
                        outgoing_step.insert(field.clone(), l.clone());
                    }
                    Winner::Remote => {
                        if l.value != r.value {
                            outcome.overwritten.push(ConflictOverwrite {
                                record_id: record_id.clone(),
                                step: step.clone(),
                                field: field.clone(),
                                local: l.clone(),
                                remote: r.clone(),
                            });
                        }
                        if l != r {
                            outcome.incoming += 1;
                        }
                        merged_step.insert(field.clone(), r.clone());
                    }
                },
                (None, None) => {}
            }
        }

        if !merged_step.is_empty() {
            outcome.merged.insert(step.clone(), merged_step);
        }
        if !outgoing_step.is_empty() {
            outcome.outgoing.insert(step.clone(), outgoing_step);
        }
    }

    outcome
}

/// Status only ever moves forward, so the furthest-along side wins.
pub fn merge_status(local: RecordStatus, remote: RecordStatus) -> RecordStatus {
    local.max(remote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn id() -> RecordId {
        RecordId::new("p-1".into()).unwrap()
    }

    fn map(entries: &[(&str, &str, Value, i64)]) -> StepDataMap {
        let mut out = StepDataMap::new();
        for (step, field, value, ts) in entries {
            out.entry(step.to_string())
                .or_default()
                .insert(*field, FieldValue::new(value.clone(), *ts));
        }
        out
    }

    #[test]
    fn strictly_newer_side_wins_and_ties_go_remote() {
        let l = FieldValue::new(json!(1), 100);
        assert_eq!(resolve(&l, &FieldValue::new(json!(2), 99)), Winner::Local);
        assert_eq!(resolve(&l, &FieldValue::new(json!(2), 100)), Winner::Remote);
        assert_eq!(resolve(&l, &FieldValue::new(json!(2), 101)), Winner::Remote);
    }

    #[test]
    fn newer_remote_overwrites_local_without_push() {
        let local = map(&[("s", "x", json!(5), 100)]);
        let remote = map(&[("s", "x", json!(7), 200)]);

        let outcome = merge_step_data(&id(), &local, &remote);

        assert_eq!(outcome.merged["s"].get("x").unwrap().value, json!(7));
        assert!(!outcome.has_outgoing());
        assert_eq!(outcome.overwritten.len(), 1);
        assert_eq!(outcome.overwritten[0].local.value, json!(5));
    }

    #[test]
    fn newer_local_is_pushed_as_field_diff() {
        let local = map(&[("s", "x", json!(5), 300), ("s", "y", json!("a"), 10)]);
        let remote = map(&[("s", "x", json!(7), 200), ("s", "y", json!("a"), 10)]);

        let outcome = merge_step_data(&id(), &local, &remote);

        assert_eq!(outcome.outgoing_field_count(), 1);
        assert_eq!(outcome.outgoing["s"].get("x").unwrap().value, json!(5));
        assert!(outcome.overwritten.is_empty());
        assert_eq!(outcome.incoming, 0);
    }

    #[test]
    fn one_sided_fields_flow_in_both_directions() {
        let local = map(&[("a", "only_local", json!(true), 1)]);
        let remote = map(&[("b", "only_remote", json!(null), 1)]);

        let outcome = merge_step_data(&id(), &local, &remote);

        assert_eq!(outcome.merged.len(), 2);
        assert_eq!(outcome.merged["b"].get("only_remote").unwrap().value, Value::Null);
        assert!(outcome.outgoing["a"].contains("only_local"));
        assert_eq!(outcome.incoming, 1);
    }

    #[test]
    fn equal_timestamps_with_same_value_are_not_conflicts() {
        let local = map(&[("s", "x", json!(1), 50)]);
        let outcome = merge_step_data(&id(), &local, &local.clone());
        assert!(outcome.overwritten.is_empty());
        assert!(!outcome.has_outgoing());
        assert_eq!(outcome.incoming, 0);
    }

    #[test]
    fn status_merge_keeps_furthest_forward() {
        assert_eq!(
            merge_status(RecordStatus::InProgress, RecordStatus::Validated),
            RecordStatus::Validated
        );
        assert_eq!(
            merge_status(RecordStatus::Exported, RecordStatus::Draft),
            RecordStatus::Exported
        );
    }
}
