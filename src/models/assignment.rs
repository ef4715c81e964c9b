use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Kind of driving relationship. Only `Primary` is exclusive per driver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentRole {
    Primary,
    Secondary,
    Temp,
    Substitute,
}

impl AssignmentRole {
    pub fn is_exclusive(self) -> bool {
        matches!(self, AssignmentRole::Primary)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentType {
    Operation,
    MaintenanceCover,
    Training,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    pub id: Uuid,
    pub group_id: Uuid,
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub role: AssignmentRole,
    pub assignment_type: AssignmentType,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub start_mileage: Option<u64>,
    pub end_mileage: Option<u64>,
    pub start_fuel_level: Option<u8>,
    pub end_fuel_level: Option<u8>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    /// Active while the end boundary is absent or still ahead of `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.end_date {
            None => true,
            Some(end) => end > now,
        }
    }

    pub fn is_active_with_role(&self, role: AssignmentRole, now: DateTime<Utc>) -> bool {
        self.role == role && self.is_active(now)
    }
}

/// Validated input for creating an assignment.
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub group_id: Uuid,
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub role: AssignmentRole,
    pub assignment_type: AssignmentType,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub start_mileage: Option<u64>,
    pub start_fuel_level: Option<u8>,
    pub notes: Option<String>,
}

/// Partial edit. `vehicle_id` and `driver_id` are accepted but never applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentChanges {
    pub role: Option<AssignmentRole>,
    pub assignment_type: Option<AssignmentType>,
    pub start_date: Option<DateTime<Utc>>,
    /// Absent leaves the end date alone, `null` reopens the assignment.
    #[serde(default, deserialize_with = "present_or_null")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub start_mileage: Option<u64>,
    pub start_fuel_level: Option<u8>,
    pub notes: Option<String>,
    pub vehicle_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndAssignment {
    pub end_date: Option<DateTime<Utc>>,
    pub end_mileage: Option<u64>,
    pub end_fuel_level: Option<u8>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    Active,
    Historical,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentFilter {
    pub role: Option<AssignmentRole>,
    pub assignment_type: Option<AssignmentType>,
    pub vehicle_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub state: Option<AssignmentState>,
}

impl AssignmentFilter {
    pub fn matches(&self, assignment: &Assignment, now: DateTime<Utc>) -> bool {
        if self.role.is_some_and(|role| role != assignment.role) {
            return false;
        }
        if self
            .assignment_type
            .is_some_and(|kind| kind != assignment.assignment_type)
        {
            return false;
        }
        if self.vehicle_id.is_some_and(|id| id != assignment.vehicle_id) {
            return false;
        }
        if self.driver_id.is_some_and(|id| id != assignment.driver_id) {
            return false;
        }

        match self.state {
            None => true,
            Some(AssignmentState::Active) => assignment.is_active(now),
            Some(AssignmentState::Historical) => !assignment.is_active(now),
        }
    }
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<DateTime<Utc>>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    fn assignment(end_date: Option<DateTime<Utc>>) -> Assignment {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Assignment {
            id: Uuid::from_u128(1),
            group_id: Uuid::from_u128(10),
            vehicle_id: Uuid::from_u128(20),
            driver_id: Uuid::from_u128(30),
            role: AssignmentRole::Primary,
            assignment_type: AssignmentType::Operation,
            start_date: start,
            end_date,
            start_mileage: None,
            end_mileage: None,
            start_fuel_level: None,
            end_fuel_level: None,
            notes: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn open_ended_assignment_is_always_active() {
        let open = assignment(None);
        let far_future = Utc.with_ymd_and_hms(2099, 12, 31, 0, 0, 0).unwrap();
        let far_past = Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap();

        assert!(open.is_active(far_past));
        assert!(open.is_active(far_future));
    }

    #[test]
    fn ended_assignment_is_active_strictly_before_end() {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let ended = assignment(Some(end));

        assert!(ended.is_active(end - Duration::seconds(1)));
        assert!(!ended.is_active(end));
        assert!(!ended.is_active(end + Duration::seconds(1)));
    }

    #[test]
    fn only_primary_is_exclusive() {
        assert!(AssignmentRole::Primary.is_exclusive());
        assert!(!AssignmentRole::Secondary.is_exclusive());
        assert!(!AssignmentRole::Temp.is_exclusive());
        assert!(!AssignmentRole::Substitute.is_exclusive());
    }

    #[test]
    fn changes_distinguish_missing_and_null_end_date() {
        let untouched: AssignmentChanges = serde_json::from_str(r#"{"notes":"x"}"#).unwrap();
        assert!(untouched.end_date.is_none());

        let reopened: AssignmentChanges = serde_json::from_str(r#"{"end_date":null}"#).unwrap();
        assert_eq!(reopened.end_date, Some(None));

        let moved: AssignmentChanges =
            serde_json::from_str(r#"{"end_date":"2024-05-01T00:00:00Z"}"#).unwrap();
        assert_eq!(
            moved.end_date,
            Some(Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()))
        );
    }

    #[test]
    fn filter_applies_state_at_evaluation_time() {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let ended = assignment(Some(end));
        let filter = AssignmentFilter {
            state: Some(AssignmentState::Historical),
            ..Default::default()
        };

        assert!(!filter.matches(&ended, end - Duration::days(1)));
        assert!(filter.matches(&ended, end + Duration::days(1)));
    }

    #[test]
    fn filter_matches_on_role_and_driver() {
        let open = assignment(None);
        let now = Utc::now();

        let by_role = AssignmentFilter {
            role: Some(AssignmentRole::Temp),
            ..Default::default()
        };
        assert!(!by_role.matches(&open, now));

        let by_driver = AssignmentFilter {
            driver_id: Some(open.driver_id),
            ..Default::default()
        };
        assert!(by_driver.matches(&open, now));
    }
}
