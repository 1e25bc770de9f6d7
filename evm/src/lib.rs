//! Top-level EVM crate: gas metering, host backend, and the executors that
//! drive `evm-runtime::Runtime` to completion.
//!
//! `evm-core`/`evm-runtime` define the interpreter and the `Handler` seam
//! it runs against; this crate supplies the piece the teacher leaves to
//! its consumers -- a concrete `Handler` (`StackExecutor`) backed by a
//! transactional state overlay (`MemoryStackState`) and a gas meter
//! (`Gasometer`).

#![deny(warnings)]
#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod backend;
pub mod executor;
pub mod gasometer;

pub use evm_runtime::{
    Capture, Config, Context, CreateScheme, ExitError, ExitFatal, ExitReason, ExitRevert,
    ExitSucceed, Handler, Opcode, Transfer,
};

pub use crate::backend::{Backend, Basic, MemoryAccount, MemoryBackend, MemoryVicinity};
pub use crate::executor::{
    BuiltinPrecompiles, Log, MemoryStackState, PrecompileFailure, PrecompileOutput,
    PrecompileResult, PrecompileSet, StackExecutor, StackState, StackSubstateMetadata,
};
pub use crate::gasometer::Gasometer;

use alloc::vec::Vec;
use primitive_types::U256;

/// The fully-resolved outcome of a top-level `transact_call`/
/// `transact_create`: the interpreter's exit reason, its output (return
/// data, or the deployed address encoded as 20 bytes for a create), the
/// gas actually charged, and the logs it emitted.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    pub exit_reason: ExitReason,
    pub output: Vec<u8>,
    pub used_gas: u64,
    pub logs: Vec<Log>,
}

impl ExecutionResult {
    pub fn is_succeed(&self) -> bool {
        matches!(self.exit_reason, ExitReason::Succeed(_))
    }

    /// The fee owed for this execution at the given gas price.
    pub fn fee(&self, price: U256) -> U256 {
        U256::from(self.used_gas) * price
    }
}
