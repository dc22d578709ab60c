//! Request-to-query translation
//!
//! Caller options (search, sort, relations, exclude, pagination) pass through
//! a set of pure resolvers and come out as a [`QueryOptions`] for a store.

pub mod assembler;
pub mod filter;
pub mod normalize;
pub mod options;
pub mod pagination;
pub mod query_string;
pub mod relations;
pub mod resolve;
pub mod selection;
pub mod value;

pub use assembler::{FieldAccess, QueryOptions, assemble, validate_predicate};
pub use filter::{FieldCondition, FilterNode, OperatorSpec};
pub use normalize::normalize;
pub use options::{EntityQueryOptions, OrderSpec, SortDirection};
pub use pagination::{PageLimits, Pagination, PaginationMeta, page_count};
pub use relations::{RelationsInput, resolve_relations};
pub use resolve::{FieldPredicate, Predicate, resolve_filter};
pub use selection::{ExcludeList, RelationSelection, Selection, resolve_selection};
pub use value::{Scalar, Value};
