//! Entity services and process-wide setup

pub mod entity;
pub mod logging;

pub use entity::{
    Actor, DeleteOutcome, EntityService, FindAllResult, Paginated, ServiceConfig,
};
pub use logging::init_tracing;
