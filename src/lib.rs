//! Entity query layer
//!
//! Translates loosely-typed caller requests (search filters, sort orders,
//! relation lists, field exclusions and pagination) into store queries, and
//! exposes a generic CRUD facade over statically declared entity schemas.

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod orm;
pub mod query;
pub mod services;

pub use error::{EntityError, ErrorEnvelope};
pub use query::{EntityQueryOptions, QueryOptions};
pub use services::{EntityService, FindAllResult, ServiceConfig};
