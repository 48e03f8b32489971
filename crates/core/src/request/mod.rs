//! Service-request data model and storage.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteRequestStore;
pub use store::{
    CreateRequest, GroupBy, RequestError, RequestFilter, RequestStore, SortOrder,
};
pub use types::{
    InternalNote, Priority, RequestStatus, ServiceRequest, StatusHistoryEntry,
};
