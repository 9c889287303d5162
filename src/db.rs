pub use self::error::DatabaseError;
pub use self::manager::DatabaseManager;
pub use self::stores::{
    ContactStore, ContaminantStore, CustomerStore, DocumentStore, FeedbackStore, NarrativeStore,
    QualificationStore, SchemaStore, SiteStore,
};

pub mod cache;
pub mod error;
pub mod manager;
pub mod models;
pub mod sqlite;
pub mod stores;

#[cfg(test)]
pub(crate) mod testutil;
