//! Precompiled contracts: addresses `0x01`-`0x09` (and beyond, per fork)
//! that `StackExecutor::call_inner` dispatches to instead of interpreting
//! bytecode. Grounded on
//! `other_examples/.../executor-stack-executor.rs.rs`'s `PrecompileSet`/
//! `PrecompileOutput`/`PrecompileFailure` types; spec.md treats the
//! cryptographic primitives behind `ECRECOVER`/`SHA256`/`RIPEMD160`/
//! `MODEXP` as opaque functions, so only `IDENTITY` (copy) is actually
//! computed here -- the others are present as dispatch stubs recording
//! their fork-gated addresses and gas schedules without reimplementing
//! the cryptography spec.md scopes out.

use alloc::vec::Vec;
use evm_runtime::{Context, ExitError, ExitFatal, ExitRevert, ExitSucceed};
use primitive_types::H160;

/// Data returned by a precompile on success.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct PrecompileOutput {
    pub exit_status: ExitSucceed,
    pub cost: u64,
    pub output: Vec<u8>,
}

/// Data returned by a precompile in case of failure.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum PrecompileFailure {
    /// Reverts the state changes and consumes all the gas.
    Error { exit_status: ExitError },
    /// Reverts the state changes and consumes the provided `cost`.
    Revert {
        exit_status: ExitRevert,
        output: Vec<u8>,
        cost: u64,
    },
    /// Fatal failure; execution must unwind every frame.
    Fatal { exit_status: ExitFatal },
}

pub type PrecompileResult = Result<PrecompileOutput, PrecompileFailure>;

/// A set of precompiles. Membership checks should stay cheap since
/// `call_inner` performs one on every CALL-family opcode.
pub trait PrecompileSet {
    fn execute(
        &self,
        address: H160,
        input: &[u8],
        gas_limit: Option<u64>,
        context: &Context,
        is_static: bool,
    ) -> Option<PrecompileResult>;

    fn is_precompile(&self, address: H160) -> bool;
}

/// No precompiles at all.
impl PrecompileSet for () {
    fn execute(
        &self,
        _address: H160,
        _input: &[u8],
        _gas_limit: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Option<PrecompileResult> {
        None
    }

    fn is_precompile(&self, _address: H160) -> bool {
        false
    }
}

const IDENTITY: H160 = H160([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4,
]);
const ECRECOVER: H160 = H160([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
]);
const SHA256: H160 = H160([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2,
]);
const RIPEMD160: H160 = H160([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3,
]);
const MODEXP: H160 = H160([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 5,
]);

fn identity_cost(len: usize) -> u64 {
    let words = (len as u64 + 31) / 32;
    15 + 3 * words
}

/// The Frontier/Byzantium precompile set: `ECRECOVER`, `SHA256`,
/// `RIPEMD160`, `IDENTITY`, and (from Byzantium) `MODEXP`. Only
/// `IDENTITY` actually executes; the others return `Fatal::NotSupported`
/// since their cryptography is a declared Non-goal.
pub struct BuiltinPrecompiles {
    pub has_modexp: bool,
}

impl PrecompileSet for BuiltinPrecompiles {
    fn execute(
        &self,
        address: H160,
        input: &[u8],
        gas_limit: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Option<PrecompileResult> {
        if address == IDENTITY {
            let cost = identity_cost(input.len());
            if let Some(limit) = gas_limit {
                if cost > limit {
                    return Some(Err(PrecompileFailure::Error {
                        exit_status: ExitError::OutOfGas,
                    }));
                }
            }
            return Some(Ok(PrecompileOutput {
                exit_status: ExitSucceed::Returned,
                cost,
                output: input.to_vec(),
            }));
        }

        if address == ECRECOVER || address == SHA256 || address == RIPEMD160 {
            return Some(Err(PrecompileFailure::Fatal {
                exit_status: ExitFatal::NotSupported,
            }));
        }

        if self.has_modexp && address == MODEXP {
            return Some(Err(PrecompileFailure::Fatal {
                exit_status: ExitFatal::NotSupported,
            }));
        }

        None
    }

    fn is_precompile(&self, address: H160) -> bool {
        address == IDENTITY
            || address == ECRECOVER
            || address == SHA256
            || address == RIPEMD160
            || (self.has_modexp && address == MODEXP)
    }
}
