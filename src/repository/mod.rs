//! Typed repositories over the collection store.
//!
//! Each repository owns one collection name and encodes the lookup and
//! filter rules for its entity. Every mutation goes through
//! [`CollectionStore::update`](crate::core::store::CollectionStore::update).

pub mod providers;
pub mod requests;
pub mod responses;

pub use providers::ProviderRepository;
pub use requests::RequestRepository;
pub use responses::ResponseRepository;
