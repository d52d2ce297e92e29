//! `medlem-api` — HTTP surface for the membership engine.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
