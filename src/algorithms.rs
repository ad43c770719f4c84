pub mod louvain;
pub mod registry;
pub mod wcc;

pub use registry::{
    Algorithm, AlgorithmConfig, AlgorithmRegistry, AlgorithmResult, ExecutionContext, LouvainAlgorithm,
    MemoryRange, WCCAlgorithm,
};
