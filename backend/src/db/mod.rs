//! Database module for academic records storage.
//!
//! This module provides abstractions for database operations via the Repository pattern,
//! allowing different storage backends to be swapped easily.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  HTTP handlers / import service                         │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository traits (repository/) - Abstract Interface   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴──────────────────┐
//!     │                                  │
//! ┌───▼──────────────────┐   ┌───────────▼──────────────────┐
//! │  LocalRepository     │   │  PostgresRepository          │
//! │  (in-memory)         │   │  (Diesel + r2d2)             │
//! └──────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! - `repository`: Trait definitions and the error taxonomy
//! - `repositories::local`: In-memory implementation for tests and local development
//! - `repositories::postgres`: Postgres implementation with Diesel ORM
//! - `factory`: Factory and builder for creating repository instances
//! - `repo_config`: `repository.toml` support
//!
//! # Usage
//! ```ignore
//! use collegecm::db::{RepositoryFactory, RepositoryType};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = RepositoryFactory::create(RepositoryType::Local, None).await?;
//!     assert!(repo.health_check().await?);
//!     Ok(())
//! }
//! ```

// When both features are enabled, RepositoryType::from_env still picks
// Postgres only if a database URL is present.
#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;

// Postgres config is colocated with the repository implementation.
#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::PostgresConfig;

/// Placeholder so signatures stay identical when Postgres support is compiled out.
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}

pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
pub use repo_config::RepositoryConfig;
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    ErrorContext, ExemptedRepository, FullRepository, PrivilegeRepository, RepositoryError,
    RepositoryResult, StudentRepository, SubjectRepository,
};
