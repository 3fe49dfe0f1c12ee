// src/db/models/catalog.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::food_order::MealType;

/// A guest room that can be assigned to an approved accommodation request.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct Accommodation {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub room_type: String,
    pub capacity: i32,
    pub price_per_night: f64,
    pub is_available: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewAccommodation {
    pub name: String,
    pub description: Option<String>,
    pub room_type: String,
    pub capacity: i32,
    pub price_per_night: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAccommodation {
    pub name: Option<String>,
    pub description: Option<String>,
    pub room_type: Option<String>,
    pub capacity: Option<i32>,
    pub price_per_night: Option<f64>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct MenuItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub meal_type: MealType,
    pub price: f64,
    pub is_vegetarian: bool,
    pub is_vegan: bool,
    pub is_available: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewMenuItem {
    pub name: String,
    pub description: Option<String>,
    pub meal_type: MealType,
    pub price: f64,
    pub is_vegetarian: Option<bool>,
    pub is_vegan: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMenuItem {
    pub name: Option<String>,
    pub description: Option<String>,
    pub meal_type: Option<MealType>,
    pub price: Option<f64>,
    pub is_vegetarian: Option<bool>,
    pub is_vegan: Option<bool>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetAvailability {
    pub is_available: bool,
}
