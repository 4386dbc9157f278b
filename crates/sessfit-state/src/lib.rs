pub mod memory;
pub mod mongo;
pub mod s3;

pub use memory::{MemoryDocStore, MemoryObjectStore};
pub use mongo::MongoDocStore;
pub use s3::S3ObjectStore;
