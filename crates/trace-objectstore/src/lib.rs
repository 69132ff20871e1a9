//! Pluggable object store capability set (spec.md §9): `Read`, `Write`,
//! `List`, `Delete`, behind one trait implemented by a local-disk backend
//! (tests, single-binary deployments) and S3/Azure Blob backends.

mod azure;
mod error;
mod local;
mod s3;
mod store;

pub use azure::AzureBlobStore;
pub use error::ObjectStoreError;
pub use local::LocalDisk;
pub use s3::S3Store;
pub use store::{hedged_read, ObjectStore};
