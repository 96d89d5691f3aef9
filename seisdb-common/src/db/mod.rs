//! Database layer: initialization, store adapter, entity-graph
//! persistence, and bulk seeding

pub mod graph;
pub mod init;
pub mod loader;
pub mod schema;
pub mod store;

pub use graph::{MergePolicy, NodeId, PersistenceEngine, Record, Value};
pub use init::{connect, init_database, init_memory};
pub use store::{SqlParam, StatementOutcome, Store};
