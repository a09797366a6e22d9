pub mod memory;
pub mod resolver;

pub use memory::{ClusterOp, InMemoryCluster};
pub use resolver::StaticClusterResolver;
