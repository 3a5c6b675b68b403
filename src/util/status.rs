use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;

/// Condition type reporting the outcome of the whole Workload reconciliation
pub const AVAILABLE_CONDITION: &str = "Available";

/// Reason attached to every condition written by the workload controller
pub const RECONCILING_REASON: &str = "Reconciling";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Sets the corresponding condition in conditions to new_condition and returns
/// whether anything was changed.
///
/// 1. If the condition of the specified type already exists, status, reason, message and
///    observed generation are overwritten. LastTransitionTime is taken from new_condition
///    only if the status differs from the old status
/// 2. If a condition of the specified type does not exist, new_condition is appended
pub fn set_status_condition(conditions: &mut Vec<Condition>, new_condition: Condition) -> bool {
    let Some(existing) = find_status_condition_mut(conditions, &new_condition.type_) else {
        conditions.push(new_condition);
        return true;
    };

    let mut changed = false;

    if existing.status != new_condition.status {
        existing.status = new_condition.status;
        existing.last_transition_time = new_condition.last_transition_time;
        changed = true;
    }

    if existing.reason != new_condition.reason {
        existing.reason = new_condition.reason;
        changed = true;
    }

    if existing.message != new_condition.message {
        existing.message = new_condition.message;
        changed = true;
    }

    if existing.observed_generation != new_condition.observed_generation {
        existing.observed_generation = new_condition.observed_generation;
        changed = true;
    }

    changed
}

/// Finds the condition_type in conditions.
pub fn find_status_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions
        .iter()
        .find(|condition| condition.type_ == condition_type)
}

fn find_status_condition_mut<'a>(
    conditions: &'a mut [Condition],
    condition_type: &str,
) -> Option<&'a mut Condition> {
    conditions
        .iter_mut()
        .find(|condition| condition.type_ == condition_type)
}

/// Returns true when the condition_type is present and set to `True`
pub fn is_status_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_status_condition(conditions, condition_type)
        .is_some_and(|condition| condition.status == ConditionStatus::True.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    use super::*;

    fn condition(status: ConditionStatus, message: &str, at: Time) -> Condition {
        Condition {
            type_: AVAILABLE_CONDITION.to_string(),
            status: status.to_string(),
            reason: RECONCILING_REASON.to_string(),
            message: message.to_string(),
            last_transition_time: at,
            observed_generation: Some(1),
        }
    }

    #[test]
    fn test_set_status_condition_appends_in_discovery_order() {
        let t0 = Time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut conditions = Vec::new();

        assert!(set_status_condition(
            &mut conditions,
            Condition {
                type_: "Progressing".to_string(),
                ..condition(ConditionStatus::True, "first", t0.clone())
            }
        ));
        assert!(set_status_condition(
            &mut conditions,
            condition(ConditionStatus::Unknown, "second", t0.clone())
        ));

        let types: Vec<_> = conditions.iter().map(|c| c.type_.as_str()).collect();
        assert_eq!(types, vec!["Progressing", AVAILABLE_CONDITION]);
    }

    #[test]
    fn test_transition_time_tracks_last_status_change() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let at = |minutes: i64| Time(start + Duration::minutes(minutes));
        let mut conditions = Vec::new();

        set_status_condition(&mut conditions, condition(ConditionStatus::Unknown, "starting", at(0)));
        set_status_condition(&mut conditions, condition(ConditionStatus::False, "failed once", at(1)));
        set_status_condition(&mut conditions, condition(ConditionStatus::False, "failed twice", at(2)));
        set_status_condition(&mut conditions, condition(ConditionStatus::True, "created", at(3)));
        set_status_condition(&mut conditions, condition(ConditionStatus::True, "created again", at(4)));

        assert_eq!(conditions.len(), 1);
        let available = find_status_condition(&conditions, AVAILABLE_CONDITION).unwrap();
        assert_eq!(available.status, "True");
        assert_eq!(available.message, "created again");
        assert_eq!(available.last_transition_time, at(3));
    }

    #[test]
    fn test_identical_condition_is_not_a_change() {
        let t0 = Time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let t1 = Time(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        let mut conditions = vec![condition(ConditionStatus::True, "ok", t0.clone())];

        assert!(!set_status_condition(&mut conditions, condition(ConditionStatus::True, "ok", t1)));
        assert_eq!(conditions[0].last_transition_time, t0);
    }

    #[test]
    fn test_message_only_edit_keeps_transition_time() {
        let t0 = Time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let t1 = Time(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        let mut conditions = vec![condition(ConditionStatus::False, "old", t0.clone())];

        assert!(set_status_condition(&mut conditions, condition(ConditionStatus::False, "new", t1)));
        assert_eq!(conditions[0].message, "new");
        assert_eq!(conditions[0].last_transition_time, t0);
    }

    #[test]
    fn test_is_status_condition_true() {
        let t0 = Time(Utc::now());
        let conditions = vec![condition(ConditionStatus::True, "ok", t0)];
        assert!(is_status_condition_true(&conditions, AVAILABLE_CONDITION));
        assert!(!is_status_condition_true(&conditions, "Degraded"));
    }
}
