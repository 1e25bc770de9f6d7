//! The host surface an executor reads chain/account state through, plus a
//! simple in-memory implementation for tests and standalone use.
//!
//! Grounded on the wider SputnikVM family's `backend` module (consumed by
//! `executor::stack::StackExecutor` the same way here), adapted to the
//! `Handler`/`Config` types already defined by the teacher's `runtime`
//! crate.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use primitive_types::{H160, H256, U256};

/// An account balance/nonce pair, the minimal info a `Backend` must be
/// able to answer for any address.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Basic {
    pub balance: U256,
    pub nonce: U256,
}

/// Chain and block context visible to every opcode in a transaction,
/// fixed for the whole transaction's execution.
#[derive(Clone, Debug)]
pub struct MemoryVicinity {
    pub gas_price: U256,
    pub origin: H160,
    pub chain_id: U256,
    pub block_hashes: Vec<H256>,
    pub block_number: U256,
    pub block_coinbase: H160,
    pub block_timestamp: U256,
    pub block_difficulty: U256,
    pub block_gas_limit: U256,
    pub block_base_fee_per_gas: U256,
}

/// Read-through access to world state: balances, code, storage, and
/// block/chain context. Never mutated directly -- the overlay in
/// `executor::stack::MemoryStackState` buffers writes and only asks a
/// `Backend` for the state as of the start of the transaction.
pub trait Backend {
    fn gas_price(&self) -> U256;
    fn origin(&self) -> H160;
    fn block_hash(&self, number: U256) -> H256;
    fn block_number(&self) -> U256;
    fn block_coinbase(&self) -> H160;
    fn block_timestamp(&self) -> U256;
    fn block_difficulty(&self) -> U256;
    fn block_gas_limit(&self) -> U256;
    fn block_base_fee_per_gas(&self) -> U256;
    fn chain_id(&self) -> U256;

    /// Whether an account exists.
    fn exists(&self, address: H160) -> bool;
    fn basic(&self, address: H160) -> Basic;
    fn code(&self, address: H160) -> Vec<u8>;
    fn storage(&self, address: H160, index: H256) -> H256;
    /// The value a storage slot held at the start of the transaction,
    /// needed by the SSTORE net-gas schedule (EIP-1283/2200).
    fn original_storage(&self, address: H160, index: H256) -> Option<H256>;
}

/// A single account's state in the in-memory `Backend`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MemoryAccount {
    pub nonce: U256,
    pub balance: U256,
    pub storage: BTreeMap<H256, H256>,
    pub code: Vec<u8>,
}

/// A `Backend` entirely held in memory, for tests and embedders who do
/// not have a real trie-backed state store.
#[derive(Clone, Debug)]
pub struct MemoryBackend<'vicinity> {
    vicinity: &'vicinity MemoryVicinity,
    state: BTreeMap<H160, MemoryAccount>,
}

impl<'vicinity> MemoryBackend<'vicinity> {
    pub fn new(vicinity: &'vicinity MemoryVicinity, state: BTreeMap<H160, MemoryAccount>) -> Self {
        Self { vicinity, state }
    }

    /// The underlying account map, as it stood when this backend was
    /// built (callers apply overlay changes through the executor, not
    /// this type, so this is a snapshot view only).
    pub fn state(&self) -> &BTreeMap<H160, MemoryAccount> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut BTreeMap<H160, MemoryAccount> {
        &mut self.state
    }
}

impl<'vicinity> Backend for MemoryBackend<'vicinity> {
    fn gas_price(&self) -> U256 {
        self.vicinity.gas_price
    }

    fn origin(&self) -> H160 {
        self.vicinity.origin
    }

    fn block_hash(&self, number: U256) -> H256 {
        if number >= self.vicinity.block_number
            || self.vicinity.block_number - number - U256::one()
                >= U256::from(self.vicinity.block_hashes.len())
        {
            H256::default()
        } else {
            let index = (self.vicinity.block_number - number - U256::one()).as_usize();
            self.vicinity.block_hashes[index]
        }
    }

    fn block_number(&self) -> U256 {
        self.vicinity.block_number
    }

    fn block_coinbase(&self) -> H160 {
        self.vicinity.block_coinbase
    }

    fn block_timestamp(&self) -> U256 {
        self.vicinity.block_timestamp
    }

    fn block_difficulty(&self) -> U256 {
        self.vicinity.block_difficulty
    }

    fn block_gas_limit(&self) -> U256 {
        self.vicinity.block_gas_limit
    }

    fn block_base_fee_per_gas(&self) -> U256 {
        self.vicinity.block_base_fee_per_gas
    }

    fn chain_id(&self) -> U256 {
        self.vicinity.chain_id
    }

    fn exists(&self, address: H160) -> bool {
        self.state.contains_key(&address)
    }

    fn basic(&self, address: H160) -> Basic {
        self.state
            .get(&address)
            .map(|a| Basic {
                balance: a.balance,
                nonce: a.nonce,
            })
            .unwrap_or_default()
    }

    fn code(&self, address: H160) -> Vec<u8> {
        self.state
            .get(&address)
            .map(|v| v.code.clone())
            .unwrap_or_default()
    }

    fn storage(&self, address: H160, index: H256) -> H256 {
        self.state
            .get(&address)
            .and_then(|v| v.storage.get(&index).copied())
            .unwrap_or_default()
    }

    fn original_storage(&self, address: H160, index: H256) -> Option<H256> {
        Some(self.storage(address, index))
    }
}
