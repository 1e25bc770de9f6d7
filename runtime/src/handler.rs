use crate::{Context, CreateScheme};
use alloc::vec::Vec;
use evm_core::{Capture, ExitError, ExitReason, Opcode, Stack};
use primitive_types::{H160, H256, U256};

/// A value transfer, as seen by a `CALL`/`CALLCODE` (never by
/// `DELEGATECALL`/`STATICCALL`, which carry no value of their own).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transfer {
    /// Source address.
    pub source: H160,
    /// Target address.
    pub target: H160,
    /// Transfer value.
    pub value: U256,
}

/// The host surface `evm-runtime` needs to resolve every opcode it cannot
/// answer on its own: world state reads, environment reads, and the two
/// opcode families -- calls and creates -- that recurse into a new frame.
///
/// Everything here is read-through/write-buffered from the caller's point
/// of view; how warm sets, snapshots and commits are realized is left to
/// the implementor (see the `evm` crate's `StackExecutor`/`MemoryBackend`
/// for the reference realization of the transactional overlay).
pub trait Handler {
    /// Interrupt that may be yielded when `create` cannot complete
    /// synchronously (e.g. requires a nested interpreter run driven by
    /// the caller).
    type CreateInterrupt;
    /// Feedback type fed back into a resolved create interrupt.
    type CreateFeedback;
    /// Interrupt that may be yielded when `call` cannot complete
    /// synchronously.
    type CallInterrupt;
    /// Feedback type fed back into a resolved call interrupt.
    type CallFeedback;

    /// Get balance of address.
    fn balance(&self, address: H160) -> U256;
    /// Get code size of address.
    fn code_size(&self, address: H160) -> U256;
    /// Get code hash of address.
    fn code_hash(&self, address: H160) -> H256;
    /// Get code of address.
    fn code(&self, address: H160) -> Vec<u8>;
    /// Get storage value of address at index.
    fn storage(&self, address: H160, index: H256) -> H256;
    /// Get original storage value of address at index, if available.
    fn original_storage(&self, address: H160, index: H256) -> H256;

    /// Get the gas left value.
    fn gas_left(&self) -> U256;
    /// Get the gas price value.
    fn gas_price(&self) -> U256;
    /// Get execution origin.
    fn origin(&self) -> H160;
    /// Get environmental block hash.
    fn block_hash(&self, number: U256) -> H256;
    /// Get environmental block number.
    fn block_number(&self) -> U256;
    /// Get environmental coinbase.
    fn block_coinbase(&self) -> H160;
    /// Get environmental block timestamp.
    fn block_timestamp(&self) -> U256;
    /// Get environmental block difficulty.
    fn block_difficulty(&self) -> U256;
    /// Get environmental gas limit.
    fn block_gas_limit(&self) -> U256;
    /// Get environmental base fee per gas (`BASEFEE`, London onwards; zero
    /// on earlier forks since fee-market semantics are out of scope).
    fn block_base_fee_per_gas(&self) -> U256;
    /// Get environmental chain ID.
    fn chain_id(&self) -> U256;

    /// Whether an address exists.
    fn exists(&self, address: H160) -> bool;
    /// Whether an address has already been deleted.
    fn deleted(&self, address: H160) -> bool;
    /// Whether an address or (address, storage key) has already been
    /// accessed in the current transaction (EIP-2929).
    fn is_cold(&self, address: H160, index: Option<H256>) -> bool;

    /// Set storage value of address at index.
    fn set_storage(&mut self, address: H160, index: H256, value: H256) -> Result<(), ExitError>;
    /// Create a log owned by address with given topics and data.
    fn log(&mut self, address: H160, topics: Vec<H256>, data: Vec<u8>) -> Result<(), ExitError>;
    /// Mark an address as deleted, with funds transferred to target.
    fn mark_delete(&mut self, address: H160, target: H160) -> Result<(), ExitError>;
    /// Invoke a create operation.
    fn create(
        &mut self,
        caller: H160,
        scheme: CreateScheme,
        value: U256,
        init_code: Vec<u8>,
        target_gas: Option<u64>,
    ) -> Capture<(ExitReason, Option<H160>, Vec<u8>), Self::CreateInterrupt>;
    /// Invoke a call operation.
    fn call(
        &mut self,
        code_address: H160,
        transfer: Option<Transfer>,
        input: Vec<u8>,
        target_gas: Option<u64>,
        is_static: bool,
        context: Context,
    ) -> Capture<(ExitReason, Vec<u8>), Self::CallInterrupt>;

    /// Pre-validation step, invoked before gas is charged or the opcode is
    /// evaluated. Implementors do the actual gas accounting here (base
    /// cost, dynamic cost, memory expansion, cold/warm access) against
    /// their own `GasMeter`; returning `Err` halts the current frame.
    fn pre_validate(
        &mut self,
        context: &Context,
        opcode: Opcode,
        stack: &Stack,
    ) -> Result<(), ExitError>;

    /// Step listener, invoked once per successfully executed opcode. The
    /// default is a no-op so tracing stays off the hot path unless a
    /// `Handler` implementation opts in.
    fn register_step(&mut self, _step: crate::RuntimeStep) {}
}
