// src/db/models/accommodation.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::approval::ApprovalStatus;
use crate::utils::validation::{require_non_empty, require_positive_bounded, ValidationErrors};

pub const MAX_GUESTS: i32 = 20;

/// Who pays for the stay.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "billing_target", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingTarget {
    Guest,
    Department,
}

/// A guest-room request. `status` is what the requester's own listing reads;
/// `hr_approval` is the stage record, set atomically with `status` on the
/// single approval action.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct AccommodationRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub guest_name: String,
    pub guest_address: Option<String>,
    pub check_in_date: NaiveDate,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_date: NaiveDate,
    pub check_out_time: Option<NaiveTime>,
    pub purpose_of_visit: String,
    pub guests: i32,
    pub billing_to: BillingTarget,
    pub room_type_preference: Option<String>,
    pub special_requests: Option<String>,
    pub assigned_accommodation_id: Option<Uuid>,
    pub status: ApprovalStatus,
    pub hr_approval: ApprovalStatus,
    pub approved_by: Option<Uuid>,
    pub approval_notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct NewAccommodationRequest {
    pub guest_name: String,
    pub guest_address: Option<String>,
    pub check_in_date: NaiveDate,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_date: NaiveDate,
    pub check_out_time: Option<NaiveTime>,
    pub purpose_of_visit: String,
    pub guests: i32,
    pub billing_to: BillingTarget,
    pub room_type_preference: Option<String>,
    pub special_requests: Option<String>,
}

impl NewAccommodationRequest {
    /// Authoritative server-side validation; the client-side checks are a
    /// convenience only.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_non_empty(&mut errors, "guest_name", &self.guest_name);
        require_non_empty(&mut errors, "purpose_of_visit", &self.purpose_of_visit);
        require_positive_bounded(&mut errors, "guests", self.guests, MAX_GUESTS);
        if self.check_in_date < today {
            errors.push("check_in_date", "must not be in the past");
        }
        if self.check_out_date <= self.check_in_date {
            errors.push("check_out_date", "must be after check_in_date");
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> NewAccommodationRequest {
        NewAccommodationRequest {
            guest_name: "A. Visitor".to_string(),
            guest_address: None,
            check_in_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            check_in_time: None,
            check_out_date: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            check_out_time: None,
            purpose_of_visit: "client visit".to_string(),
            guests: 2,
            billing_to: BillingTarget::Department,
            room_type_preference: None,
            special_requests: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate(today()).is_ok());
    }

    #[test]
    fn checkout_must_be_after_checkin() {
        let mut req = request();
        req.check_out_date = req.check_in_date;
        let errors = req.validate(today()).unwrap_err();
        assert!(errors.has_field("check_out_date"));

        req.check_out_date = req.check_in_date.pred_opt().unwrap();
        assert!(req.validate(today()).is_err());
    }

    #[test]
    fn check_in_must_not_be_in_the_past() {
        let req = request();
        let late_today = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let errors = req.validate(late_today).unwrap_err();
        assert!(errors.has_field("check_in_date"));
    }

    #[test]
    fn guest_count_must_be_positive_and_bounded() {
        let mut req = request();
        req.guests = 0;
        assert!(req.validate(today()).unwrap_err().has_field("guests"));
        req.guests = MAX_GUESTS + 1;
        assert!(req.validate(today()).unwrap_err().has_field("guests"));
        req.guests = MAX_GUESTS;
        assert!(req.validate(today()).is_ok());
    }

    #[test]
    fn required_text_fields_must_be_present() {
        let mut req = request();
        req.purpose_of_visit = "   ".to_string();
        let errors = req.validate(today()).unwrap_err();
        assert!(errors.has_field("purpose_of_visit"));
    }
}
