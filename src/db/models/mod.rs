pub mod accommodation;
pub mod approval;
pub mod catalog;
pub mod facility;
pub mod food_order;
pub mod notification;
pub mod user;
