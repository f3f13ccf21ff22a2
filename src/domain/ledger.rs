//! Field timestamp ledger: the only way wizard answers are read from or written into a
//! [`Record`]. Reads strip timestamps; writes stamp every field with the caller's clock.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::domain::entities::{FieldValue, Record, StepData};
use crate::domain::value_objects::WizardStep;
use crate::shared::error::AppError;

/// Result of stamping a batch of fields into a record.
#[derive(Debug, Clone)]
pub struct FieldWrite {
    pub record: Record,
    /// Fields actually written, with their new timestamps.
    pub written: StepData,
    /// Fields ignored because the ledger already holds a newer write.
    pub stale: Vec<String>,
}

impl FieldWrite {
    pub fn changed(&self) -> bool {
        !self.written.is_empty()
    }
}

pub fn get_field<'a>(record: &'a Record, step: &str, field: &str) -> Option<&'a Value> {
    record
        .step_data
        .get(step)
        .and_then(|data| data.get(field))
        .map(|fv| &fv.value)
}

/// Raw values of a step; absent fields are absent, `null` stays `null`.
pub fn get_step_values(record: &Record, step: &str) -> Map<String, Value> {
    record
        .step_data
        .get(step)
        .map(StepData::values)
        .unwrap_or_default()
}

/// Pure write: returns the updated record, never touches storage.
pub fn set_fields(record: Record, step: &str, fields: Map<String, Value>, now: i64) -> Record {
    apply_fields(record, step, fields, now).record
}

/// Timestamped write. A field is skipped only when the ledger already holds a later write
/// or this exact write; every other field is stamped with `now`, equal values included.
pub fn apply_fields(
    record: Record,
    step: &str,
    fields: Map<String, Value>,
    now: i64,
) -> FieldWrite {
    let stamped = fields
        .into_iter()
        .map(|(field, value)| (field, value, now))
        .collect();
    write_stamped(record, step, stamped, now)
}

/// A user edit made at `now`. Each field is stamped past whatever the ledger holds for it,
/// so the edit lands even over a value written by a clock running ahead of ours.
pub fn record_edit(
    record: Record,
    step: &str,
    fields: Map<String, Value>,
    now: i64,
) -> FieldWrite {
    let current = record.step_data.get(step);
    let stamped = fields
        .into_iter()
        .map(|(field, value)| {
            let at = current
                .and_then(|data| data.get(&field))
                .map_or(now, |existing| now.max(existing.updated_at.saturating_add(1)));
            (field, value, at)
        })
        .collect();
    write_stamped(record, step, stamped, now)
}

fn write_stamped(
    mut record: Record,
    step: &str,
    fields: Vec<(String, Value, i64)>,
    now: i64,
) -> FieldWrite {
    let mut written = StepData::new();
    let mut stale = Vec::new();
    let step_data = record.step_data.entry(step.to_string()).or_default();

    for (field, value, at) in fields {
        match step_data.get(&field) {
            Some(existing) if existing.updated_at > at => {
                stale.push(field);
                continue;
            }
            Some(existing) if existing.updated_at == at && existing.value == value => continue,
            _ => {}
        }
        let stamped = FieldValue::new(value, at);
        step_data.insert(field.clone(), stamped.clone());
        written.insert(field, stamped);
    }

    if step_data.is_empty() {
        record.step_data.remove(step);
    }

    if !written.is_empty() {
        record.sync_meta.is_dirty = true;
        record.sync_meta.needs_attention = false;
        record.sync_meta.last_error = None;
        record.touch(now);
    }

    FieldWrite {
        record,
        written,
        stale,
    }
}

/// Typed view of one wizard step, decoded from and encoded into the schema-agnostic ledger.
pub trait StepForm: Serialize + DeserializeOwned {
    fn step() -> WizardStep;
}

pub fn decode_step<F: StepForm>(record: &Record) -> Result<F, AppError> {
    let values = get_step_values(record, F::step().as_str());
    serde_json::from_value(Value::Object(values)).map_err(|e| {
        AppError::DeserializationError(format!("step {}: {e}", F::step()))
    })
}

pub fn encode_step<F: StepForm>(form: &F) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(form)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::ValidationError(format!(
            "step {} must encode to an object, got {other}",
            F::step()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::OwnerScope;
    use serde::Deserialize;
    use serde_json::json;

    fn record() -> Record {
        let mut record = Record::new_local(OwnerScope::new("org".into()).unwrap(), 0);
        record.sync_meta.is_dirty = false;
        record
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn step_values_keep_falsy_values_and_strip_timestamps() {
        let record = set_fields(
            record(),
            "general",
            fields(json!({"a": null, "b": false, "c": 0, "d": ""})),
            10,
        );

        let values = get_step_values(&record, "general");
        assert_eq!(values.len(), 4);
        assert_eq!(values["a"], Value::Null);
        assert_eq!(values["b"], json!(false));
        assert_eq!(values["c"], json!(0));
        assert!(values.values().all(|v| v.get("updated_at").is_none()));
        assert!(!values.contains_key("missing"));
        assert_eq!(get_field(&record, "general", "missing"), None);
        assert_eq!(get_field(&record, "general", "a"), Some(&Value::Null));
    }

    #[test]
    fn set_fields_marks_dirty_and_stamps() {
        let record = set_fields(record(), "heating", fields(json!({"boiler": "gas"})), 42);
        assert!(record.sync_meta.is_dirty);
        let stored = record.step_data["heating"].get("boiler").unwrap();
        assert_eq!(stored.updated_at, 42);
        assert_eq!(record.updated_at, 42);
    }

    #[test]
    fn later_timestamp_wins_regardless_of_call_order() {
        let in_order = set_fields(record(), "s", fields(json!({"x": 1})), 100);
        let in_order = set_fields(in_order, "s", fields(json!({"x": 2})), 200);

        let reversed = set_fields(record(), "s", fields(json!({"x": 2})), 200);
        let write = apply_fields(reversed, "s", fields(json!({"x": 1})), 100);

        assert_eq!(get_field(&in_order, "s", "x"), Some(&json!(2)));
        assert_eq!(get_field(&write.record, "s", "x"), Some(&json!(2)));
        assert_eq!(write.stale, vec!["x".to_string()]);
        assert!(!write.changed());
        assert_eq!(write.record.step_data["s"].get("x").unwrap().updated_at, 200);
    }

    #[test]
    fn equal_value_is_restamped_at_a_later_time() {
        let mut first = set_fields(record(), "s", fields(json!({"x": 1})), 100);
        first.sync_meta.is_dirty = false;

        let repeat = apply_fields(first.clone(), "s", fields(json!({"x": 1})), 100);
        assert!(!repeat.changed());
        assert!(!repeat.record.sync_meta.is_dirty);

        let later = apply_fields(first, "s", fields(json!({"x": 1})), 150);
        assert!(later.changed());
        assert!(later.record.sync_meta.is_dirty);
        assert_eq!(later.written.get("x").unwrap().updated_at, 150);
    }

    #[test]
    fn edits_are_stamped_past_values_from_a_clock_ahead() {
        let ahead = set_fields(record(), "s", fields(json!({"x": 7, "y": 1})), 9_000);

        let edit = record_edit(ahead, "s", fields(json!({"x": 2, "z": true})), 4_000);

        assert!(edit.stale.is_empty());
        assert_eq!(edit.written.len(), 2);
        let step = &edit.record.step_data["s"];
        assert_eq!(step.get("x").unwrap(), &FieldValue::new(json!(2), 9_001));
        assert_eq!(step.get("z").unwrap().updated_at, 4_000);
        assert_eq!(step.get("y").unwrap().updated_at, 9_000);
    }

    #[test]
    fn edits_restamp_values_that_did_not_change() {
        let synced = set_fields(record(), "s", fields(json!({"x": 1})), 1_000);
        let edit = record_edit(synced, "s", fields(json!({"x": 1})), 4_000);
        assert!(edit.changed());
        assert_eq!(edit.written.get("x").unwrap().updated_at, 4_000);
    }

    #[test]
    fn write_clears_needs_attention() {
        let mut flagged = record();
        flagged.sync_meta.needs_attention = true;
        flagged.sync_meta.last_error = Some("rejected".into());
        let record = set_fields(flagged, "s", fields(json!({"x": 1})), 5);
        assert!(!record.sync_meta.needs_attention);
        assert!(record.sync_meta.last_error.is_none());
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct GeneralForm {
        address: String,
        surface_m2: Option<f64>,
    }

    impl StepForm for GeneralForm {
        fn step() -> WizardStep {
            WizardStep::General
        }
    }

    #[test]
    fn typed_step_forms_round_trip_through_the_ledger() {
        let form = GeneralForm {
            address: "12 rue des Lilas".into(),
            surface_m2: None,
        };
        let encoded = encode_step(&form).unwrap();
        let record = set_fields(record(), WizardStep::General.as_str(), encoded, 7);

        let decoded: GeneralForm = decode_step(&record).unwrap();
        assert_eq!(decoded, form);
    }
}
