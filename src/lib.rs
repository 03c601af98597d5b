//! paapi - signed, throttled client for the Product Advertising XML API
//! with batch operations, typed service errors and pagination

pub mod api;
pub mod config;
pub mod errors;
pub mod paginate;
pub mod xml;

pub use api::{ApiClient, Dispatch, Operation, RequestParameters};
pub use config::{ClientConfig, Config, Credentials};
pub use errors::{ApiError, Result, ServiceError};
pub use paginate::{PageState, Paginator, PaginatorSpec};
pub use xml::{Document, ResponseProcessor, XmlProcessor};
