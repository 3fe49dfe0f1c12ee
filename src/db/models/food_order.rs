// src/db/models/food_order.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::approval::ApprovalStatus;
use crate::utils::validation::{require_positive_bounded, ValidationErrors};

pub const MAX_ITEM_QUANTITY: i32 = 50;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "meal_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Supper,
}

/// Kitchen fulfillment stages for an approved order. `delivered` and
/// `cancelled` are terminal.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Received,
    Preparing,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    fn rank(self) -> u8 {
        match self {
            OrderStatus::Received => 0,
            OrderStatus::Preparing => 1,
            OrderStatus::Ready => 2,
            OrderStatus::Delivered => 3,
            OrderStatus::Cancelled => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Fulfillment moves forward only; cancellation is allowed from any
    /// non-terminal stage.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            OrderStatus::Cancelled => true,
            _ => next.rank() > self.rank(),
        }
    }
}

/// A meal order. `admin_approval` gates the order; `status` tracks kitchen
/// fulfillment once it is approved.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct FoodOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_date: NaiveDate,
    pub delivery_time: NaiveTime,
    pub meal_type: MealType,
    pub total_amount: f64,
    pub special_requests: Option<String>,
    pub admin_approval: ApprovalStatus,
    pub status: OrderStatus,
    pub approved_by: Option<Uuid>,
    pub approval_notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct FoodOrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub price: f64,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct NewFoodOrderItem {
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct NewFoodOrder {
    pub order_date: NaiveDate,
    pub delivery_time: NaiveTime,
    pub meal_type: MealType,
    pub special_requests: Option<String>,
    pub items: Vec<NewFoodOrderItem>,
}

impl NewFoodOrder {
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.order_date < today {
            errors.push("order_date", "must not be in the past");
        }
        if self.items.is_empty() {
            errors.push("items", "order must contain at least one item");
        }
        for item in &self.items {
            require_positive_bounded(&mut errors, "quantity", item.quantity, MAX_ITEM_QUANTITY);
        }
        errors.into_result()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
}

/// Order joined with its line items for detail views.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FoodOrderWithItems {
    #[serde(flatten)]
    pub order: FoodOrder,
    pub items: Vec<FoodOrderItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> NewFoodOrder {
        NewFoodOrder {
            order_date: NaiveDate::from_ymd_opt(2025, 8, 5).unwrap(),
            delivery_time: NaiveTime::from_hms_opt(12, 30, 0).unwrap(),
            meal_type: MealType::Lunch,
            special_requests: None,
            items: vec![NewFoodOrderItem {
                menu_item_id: Uuid::new_v4(),
                quantity: 2,
                notes: None,
            }],
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 1).unwrap()
    }

    #[test]
    fn valid_order_passes() {
        assert!(order().validate(today()).is_ok());
    }

    #[test]
    fn order_must_contain_items() {
        let mut req = order();
        req.items.clear();
        assert!(req.validate(today()).unwrap_err().has_field("items"));
    }

    #[test]
    fn quantities_are_positive_and_bounded() {
        let mut req = order();
        req.items[0].quantity = 0;
        assert!(req.validate(today()).is_err());
        req.items[0].quantity = MAX_ITEM_QUANTITY + 1;
        assert!(req.validate(today()).is_err());
    }

    #[test]
    fn order_date_must_not_be_in_the_past() {
        let req = order();
        let later = NaiveDate::from_ymd_opt(2025, 8, 6).unwrap();
        assert!(req.validate(later).unwrap_err().has_field("order_date"));
    }

    #[test]
    fn fulfillment_advances_forward_only() {
        use OrderStatus::*;
        assert!(Received.can_advance_to(Preparing));
        assert!(Received.can_advance_to(Delivered));
        assert!(Preparing.can_advance_to(Ready));
        assert!(!Ready.can_advance_to(Preparing));
        assert!(!Preparing.can_advance_to(Preparing));
    }

    #[test]
    fn delivered_and_cancelled_are_terminal() {
        use OrderStatus::*;
        assert!(Received.can_advance_to(Cancelled));
        assert!(Ready.can_advance_to(Cancelled));
        assert!(!Delivered.can_advance_to(Cancelled));
        assert!(!Cancelled.can_advance_to(Received));
        assert!(!Delivered.can_advance_to(Ready));
    }
}
