pub mod date_rules;
pub mod error;
pub mod events;
pub mod filter;
pub mod metrics;
pub mod record;
pub mod repository;
pub mod service;
pub mod sort;

pub use crate::error::VisitError;
pub use crate::record::{RawVisitRecord, VisitRecord};
pub use crate::service::{VisitService, VisitServiceBuilder};
