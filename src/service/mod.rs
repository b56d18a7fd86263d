//! Resource services
//!
//! Business rules live here; handlers only translate HTTP to service calls.

use thiserror::Error;

pub mod group;

pub use group::{GroupId, GroupInput, GroupService};

/// Outcome kinds of a service call
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("Group not found")]
    NotFound,

    #[error("Persistence error: {0}")]
    Persistence(#[from] sea_orm::DbErr),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
