//! Meal-description parsing, food logging and daily nutrient tracking.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod extraction;
pub mod food_bank;
pub mod food_logs;
pub mod nutrition;
pub mod profiles;
pub mod sanitizer;
pub mod sessions;
pub mod state;
pub mod store;
