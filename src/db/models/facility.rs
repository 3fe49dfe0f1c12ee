// src/db/models/facility.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::approval::ApprovalStatus;
use crate::utils::validation::{require_positive_bounded, ValidationErrors};

pub const MAX_ATTENDEES: i32 = 500;

/// A bookable facility (tennis court, conference hall, ...).
#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct Facility {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub facility_type: String,
    pub capacity: Option<i32>,
    pub hourly_rate: f64,
    pub requires_approval: bool,
    pub is_available: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewFacility {
    pub name: String,
    pub description: Option<String>,
    pub facility_type: String,
    pub capacity: Option<i32>,
    pub hourly_rate: f64,
    pub requires_approval: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFacility {
    pub name: Option<String>,
    pub description: Option<String>,
    pub facility_type: Option<String>,
    pub capacity: Option<i32>,
    pub hourly_rate: Option<f64>,
    pub requires_approval: Option<bool>,
    pub is_available: Option<bool>,
}

/// A reservation against a facility. `club_manager_approval` is the stage
/// record, set atomically with `status`.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct FacilityBooking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub facility_id: Uuid,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub purpose: Option<String>,
    pub attendees: i32,
    pub status: ApprovalStatus,
    pub club_manager_approval: ApprovalStatus,
    pub approved_by: Option<Uuid>,
    pub approval_notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct NewFacilityBooking {
    pub facility_id: Uuid,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub purpose: Option<String>,
    pub attendees: i32,
}

impl NewFacilityBooking {
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_positive_bounded(&mut errors, "attendees", self.attendees, MAX_ATTENDEES);
        if self.booking_date < today {
            errors.push("booking_date", "must not be in the past");
        }
        if self.end_time <= self.start_time {
            errors.push("end_time", "must be after start_time");
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking() -> NewFacilityBooking {
        NewFacilityBooking {
            facility_id: Uuid::new_v4(),
            booking_date: NaiveDate::from_ymd_opt(2025, 7, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            purpose: Some("team offsite".to_string()),
            attendees: 12,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    }

    #[test]
    fn valid_booking_passes() {
        assert!(booking().validate(today()).is_ok());
    }

    #[test]
    fn end_time_must_be_after_start_time() {
        let mut req = booking();
        req.end_time = req.start_time;
        assert!(req.validate(today()).unwrap_err().has_field("end_time"));
    }

    #[test]
    fn booking_date_must_not_be_in_the_past() {
        let req = booking();
        let later = NaiveDate::from_ymd_opt(2025, 7, 11).unwrap();
        assert!(req.validate(later).unwrap_err().has_field("booking_date"));
    }

    #[test]
    fn attendee_count_is_bounded() {
        let mut req = booking();
        req.attendees = MAX_ATTENDEES + 1;
        assert!(req.validate(today()).is_err());
        req.attendees = 0;
        assert!(req.validate(today()).is_err());
    }
}
