//! # collegecm
//!
//! Backend for a college's academic records: subjects (per academic year),
//! student exemptions from subjects, and bulk subject import from
//! spreadsheets exported as CSV.
//!
//! ## Architecture
//!
//! - [`validator`]: Field-error accumulator shared by all entity validation
//! - [`models`]: Domain records and their validation rules
//! - [`db`]: Repository traits, in-memory and Postgres backends, configuration
//! - [`services`]: Multi-step workflows (bulk import)
//! - [`http`]: Axum-based REST API (feature `http-server`)

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod db;
pub mod models;
pub mod services;
pub mod validator;

#[cfg(feature = "http-server")]
pub mod http;
