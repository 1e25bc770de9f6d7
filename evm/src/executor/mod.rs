//! Execution engines: the precompile dispatch table and the
//! `StackExecutor`/`StackState` transactional overlay built on top of
//! `evm-runtime`'s `Handler` seam.

pub mod precompile;
pub mod stack;

pub use precompile::{BuiltinPrecompiles, PrecompileFailure, PrecompileOutput, PrecompileResult, PrecompileSet};
pub use stack::{
    Accessed, Log, MemoryStackState, StackExecutor, StackState, StackSubstateMetadata,
};
