//! HTTP handlers mounted by the API router.

pub mod admin;
pub mod health;
pub mod live;
pub mod root;
