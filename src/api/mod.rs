pub mod accommodation;
pub mod auth;
pub mod catalog;
pub mod facility;
pub mod food_order;
pub mod health;
pub mod notification;
pub mod user;
