//! Shared domain models and HTTP payload types for Contrato+.

pub mod api;
pub mod models;
