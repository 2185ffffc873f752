pub mod store;

pub use store::{BackoffConfig, StoreConfig, SynchronousMode};
