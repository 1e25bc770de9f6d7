//! Gas metering for the interpreter.
//!
//! The teacher (`velas-evm`) folds gas bookkeeping straight into
//! `runtime::Config` and the `Handler::pre_validate` seam rather than a
//! separate crate. We keep that shape: `Gasometer` is a plain counter
//! owned by `StackExecutor`, and the per-opcode pricing table below is
//! consulted from `StackExecutor::pre_validate`. Grounded on the wider
//! SputnikVM family's `evm-gasometer` crate (`gasometer/src/lib.rs`,
//! `standard/gasometer/mod.rs` in the example pack).

use evm_runtime::{Config, ExitError, Opcode, Stack};
use primitive_types::{H256, U256};

mod consts {
    pub const G_ZERO: u64 = 0;
    pub const G_BASE: u64 = 2;
    pub const G_VERYLOW: u64 = 3;
    pub const G_LOW: u64 = 5;
    pub const G_MID: u64 = 8;
    pub const G_HIGH: u64 = 10;
    pub const G_JUMPDEST: u64 = 1;
    pub const G_SHA3: u64 = 30;
    pub const G_SHA3WORD: u64 = 6;
    pub const G_COPY: u64 = 3;
    pub const G_LOG: u64 = 375;
    pub const G_LOGDATA: u64 = 8;
    pub const G_LOGTOPIC: u64 = 375;
    pub const G_CREATE: u64 = 32000;
    pub const G_CODEDEPOSIT: u64 = 200;
    pub const G_COLD_SLOAD: u64 = 2100;
    pub const G_COLD_ACCOUNT_ACCESS: u64 = 2600;
    pub const G_WARM_STORAGE_READ: u64 = 100;
}

/// A single opcode's dynamic cost, carrying the stack/storage state it
/// needs priced. Static (constant) costs are folded into the `Zero`..
/// `High` variants; everything else depends on the machine or host state
/// at the moment the opcode is about to run.
pub enum GasCost {
    Zero,
    Base,
    VeryLow,
    Low,
    Mid,
    High,
    Jumpdest,
    Sha3 {
        len: U256,
    },
    VeryLowCopy {
        len: U256,
    },
    Log {
        n: u8,
        len: U256,
    },
    Exp {
        power: U256,
    },
    ExtCodeSize {
        is_cold: bool,
    },
    ExtCodeCopy {
        is_cold: bool,
        len: U256,
    },
    ExtCodeHash {
        is_cold: bool,
    },
    Balance {
        is_cold: bool,
    },
    Sload {
        is_cold: bool,
    },
    Sstore {
        is_cold: bool,
        original: H256,
        current: H256,
        new: H256,
    },
    Call {
        is_cold: bool,
        target_exists: bool,
        has_value: bool,
    },
    Create,
    Create2 {
        len: U256,
    },
    Suicide {
        target_exists: bool,
        has_value: bool,
    },
}

impl GasCost {
    /// Price this opcode, given the gas remaining (needed for EIP-1706's
    /// stipend check on SSTORE) and the active fork's `Config`.
    pub fn cost(&self, gas_left: u64, config: &Config) -> Result<u64, ExitError> {
        Ok(match *self {
            GasCost::Zero => consts::G_ZERO,
            GasCost::Base => consts::G_BASE,
            GasCost::VeryLow => consts::G_VERYLOW,
            GasCost::Low => consts::G_LOW,
            GasCost::Mid => consts::G_MID,
            GasCost::High => consts::G_HIGH,
            GasCost::Jumpdest => consts::G_JUMPDEST,
            GasCost::Sha3 { len } => {
                consts::G_SHA3 + consts::G_SHA3WORD * num_words(len)?
            }
            GasCost::VeryLowCopy { len } => consts::G_VERYLOW + consts::G_COPY * num_words(len)?,
            GasCost::Log { n, len } => {
                consts::G_LOG
                    + consts::G_LOGTOPIC * u64::from(n)
                    + consts::G_LOGDATA * bytes_len(len)?
            }
            GasCost::Exp { power } => {
                let byte_len = (256 - power.leading_zeros() as u64 + 7) / 8;
                consts::G_HIGH + config.gas_expbyte * byte_len
            }
            GasCost::ExtCodeSize { is_cold } => access_cost(is_cold, config.gas_ext_code, config),
            GasCost::ExtCodeCopy { is_cold, len } => {
                access_cost(is_cold, config.gas_ext_code, config) + consts::G_COPY * num_words(len)?
            }
            GasCost::ExtCodeHash { is_cold } => {
                access_cost(is_cold, config.gas_ext_code_hash, config)
            }
            GasCost::Balance { is_cold } => access_cost(is_cold, config.gas_balance, config),
            GasCost::Sload { is_cold } => access_cost(is_cold, config.gas_sload, config),
            GasCost::Sstore {
                is_cold,
                original,
                current,
                new,
            } => sstore_cost(is_cold, original, current, new, gas_left, config)?,
            GasCost::Call {
                is_cold,
                target_exists,
                has_value,
            } => {
                let mut cost = access_cost(is_cold, config.gas_call, config);
                if has_value {
                    cost += 9000;
                }
                if has_value && !target_exists {
                    cost += config.gas_suicide_new_account;
                }
                cost
            }
            GasCost::Create => consts::G_CREATE,
            GasCost::Create2 { len } => consts::G_CREATE + consts::G_SHA3WORD * num_words(len)?,
            GasCost::Suicide {
                target_exists,
                has_value,
            } => {
                config.gas_suicide
                    + if has_value && !target_exists {
                        config.gas_suicide_new_account
                    } else {
                        0
                    }
            }
        })
    }

    /// The gas refund an opcode schedules (only ever non-zero for
    /// SSTORE / SUICIDE, handled at the `StackExecutor` level -- the
    /// net-metering SSTORE refund lives here since it needs the same
    /// original/current/new triple as the cost calculation).
    pub fn refund(&self, config: &Config) -> i64 {
        match *self {
            GasCost::Sstore {
                original,
                current,
                new,
                ..
            } => sstore_refund(original, current, new, config),
            _ => 0,
        }
    }
}

fn access_cost(is_cold: bool, warm_cost: u64, config: &Config) -> u64 {
    if !config.increase_state_access_gas {
        return warm_cost;
    }
    if is_cold {
        consts::G_COLD_ACCOUNT_ACCESS
    } else {
        consts::G_WARM_STORAGE_READ
    }
}

fn sload_cost(is_cold: bool, config: &Config) -> u64 {
    if !config.increase_state_access_gas {
        return config.gas_sload;
    }
    if is_cold {
        consts::G_COLD_SLOAD
    } else {
        consts::G_WARM_STORAGE_READ
    }
}

/// SSTORE pricing. Pre-Constantinople this is the flat
/// set-if-zero/reset-otherwise schedule; from Constantinople's EIP-1283
/// (re-enabled as EIP-2200 in Istanbul, repriced by EIP-2929 in Berlin)
/// it is the net-gas schedule that only charges for an actual change in
/// the slot's value across the whole transaction.
fn sstore_cost(
    is_cold: bool,
    original: H256,
    current: H256,
    new: H256,
    gas_left: u64,
    config: &Config,
) -> Result<u64, ExitError> {
    if !config.sstore_gas_metering {
        let cost = if current == H256::zero() && new != H256::zero() {
            config.gas_sstore_set
        } else {
            config.gas_sstore_reset
        };
        return Ok(cost);
    }

    if config.sstore_revert_under_stipend && gas_left <= 2300 {
        return Err(ExitError::OutOfGas);
    }

    let warm_access = sload_cost(false, config);
    let cold_surcharge = if is_cold { consts::G_COLD_SLOAD } else { 0 };

    let cost = if current == new {
        warm_access
    } else if original == current {
        if original == H256::zero() {
            config.gas_sstore_set
        } else {
            config.gas_sstore_reset
        }
    } else {
        warm_access
    };

    Ok(cost + cold_surcharge)
}

fn sstore_refund(original: H256, current: H256, new: H256, config: &Config) -> i64 {
    if !config.sstore_gas_metering {
        return if current != H256::zero() && new == H256::zero() {
            config.refund_sstore_clears
        } else {
            0
        };
    }

    if current == new {
        return 0;
    }

    let mut refund = 0i64;
    if original == current {
        if original != H256::zero() && new == H256::zero() {
            refund += config.refund_sstore_clears;
        }
    } else {
        if original != H256::zero() {
            if current == H256::zero() {
                refund -= config.refund_sstore_clears;
            } else if new == H256::zero() {
                refund += config.refund_sstore_clears;
            }
        }
        if original == new {
            let warm_access = sload_cost(false, config) as i64;
            refund += if original == H256::zero() {
                config.gas_sstore_set as i64 - warm_access
            } else {
                config.gas_sstore_reset as i64 - warm_access
            };
        }
    }
    refund
}

fn num_words(len: U256) -> Result<u64, ExitError> {
    bytes_len(len).map(|len| (len + 31) / 32)
}

fn bytes_len(len: U256) -> Result<u64, ExitError> {
    if len > U256::from(u64::max_value()) {
        return Err(ExitError::OutOfGas);
    }
    Ok(len.as_u64())
}

/// A memory-expansion request: read or write of `len` bytes starting at
/// `offset`. Zero-length requests never grow memory (EVM semantics).
pub struct MemoryCost {
    pub offset: U256,
    pub len: U256,
}

/// Tracks gas consumption for a single call frame: the running total,
/// accumulated refund, and the highest memory size billed so far.
pub struct Gasometer<'config> {
    gas_limit: u64,
    used_gas: u64,
    memory_words: u64,
    refunded_gas: i64,
    config: &'config Config,
}

impl<'config> Gasometer<'config> {
    pub fn new(gas_limit: u64, config: &'config Config) -> Self {
        Self {
            gas_limit,
            used_gas: 0,
            memory_words: 0,
            refunded_gas: 0,
            config,
        }
    }

    /// Gas remaining to spend in this frame.
    pub fn gas(&self) -> u64 {
        self.gas_limit - self.used_gas
    }

    pub fn total_used_gas(&self) -> u64 {
        self.used_gas
    }

    pub fn refunded_gas(&self) -> i64 {
        self.refunded_gas
    }

    pub fn config(&self) -> &'config Config {
        self.config
    }

    /// Explicitly fail the frame with `OutOfGas`, consuming everything
    /// that was left -- used when a nested call/create fails after
    /// partially running (the gas it was given is gone regardless).
    pub fn fail(&mut self) -> ExitError {
        self.used_gas = self.gas_limit;
        ExitError::OutOfGas
    }

    /// Deduct an explicit cost, failing with `OutOfGas` if it would
    /// exceed the frame's limit.
    pub fn record_cost(&mut self, cost: u64) -> Result<(), ExitError> {
        let total = self.used_gas.checked_add(cost).ok_or(ExitError::OutOfGas)?;
        if total > self.gas_limit {
            return Err(ExitError::OutOfGas);
        }
        self.used_gas = total;
        Ok(())
    }

    pub fn record_refund(&mut self, refund: i64) {
        self.refunded_gas = self.refunded_gas.saturating_add(refund);
    }

    /// Give back gas a child frame did not use, once it has exited --
    /// the parent's `used_gas` is reduced by however much of the gas it
    /// handed to the child came back unspent.
    pub fn record_stipend(&mut self, stipend: u64) {
        self.used_gas = self.used_gas.saturating_sub(stipend);
    }

    /// Charge for the code a successful `CREATE`/`CREATE2` deposits,
    /// `G_CODEDEPOSIT` gas per byte.
    pub fn record_deposit(&mut self, len: usize) -> Result<(), ExitError> {
        self.record_cost(len as u64 * consts::G_CODEDEPOSIT)
    }

    /// The intrinsic cost of a transaction's calldata, `21000`/`53000`
    /// base plus per-byte calldata pricing (EIP-2028).
    pub fn record_transaction_cost(&mut self, is_create: bool, data: &[u8]) -> Result<(), ExitError> {
        let zero_data_len = data.iter().filter(|b| **b == 0).count() as u64;
        let non_zero_data_len = data.len() as u64 - zero_data_len;
        let base = if is_create {
            self.config.gas_transaction_create
        } else {
            self.config.gas_transaction_call
        };
        let cost = base
            + zero_data_len * self.config.gas_transaction_zero_data
            + non_zero_data_len * self.config.gas_transaction_non_zero_data;
        self.record_cost(cost)
    }

    /// Charge for growing memory to cover `memory`, per the quadratic
    /// expansion schedule `C(x) = 3*x + x^2/512` (`x` in 32-byte words).
    /// A no-op if the frame's memory already covers the requested range.
    pub fn record_memory(&mut self, memory: MemoryCost) -> Result<(), ExitError> {
        if memory.len.is_zero() {
            return Ok(());
        }
        let end = memory
            .offset
            .checked_add(memory.len)
            .ok_or(ExitError::OutOfGas)?;
        if end > U256::from(u64::max_value()) {
            return Err(ExitError::OutOfGas);
        }
        let words = (end.as_u64() + 31) / 32;
        if words <= self.memory_words {
            return Ok(());
        }
        let old_cost = memory_expansion_cost(self.memory_words);
        let new_cost = memory_expansion_cost(words);
        self.memory_words = words;
        self.record_cost(new_cost - old_cost)
    }

    /// Price and charge a single opcode's dynamic cost plus any memory
    /// expansion it requires, in one step -- mirrors the teacher's
    /// `Handler::pre_validate` call site in `runtime::Runtime::run`.
    pub fn record_dynamic_cost(
        &mut self,
        cost: GasCost,
        memory: Option<MemoryCost>,
    ) -> Result<(), ExitError> {
        let gas_left = self.gas();
        let charge = cost.cost(gas_left, self.config)?;
        let refund = cost.refund(self.config);
        self.record_cost(charge)?;
        self.record_refund(refund);
        if let Some(memory) = memory {
            self.record_memory(memory)?;
        }
        Ok(())
    }
}

fn memory_expansion_cost(words: u64) -> u64 {
    3 * words + words * words / 512
}

/// Peek a stack slot without popping it -- `pre_validate` must price an
/// opcode before `evm-core`/`evm-runtime` consume its operands.
pub fn peek_u256(stack: &Stack, n: usize) -> Result<U256, ExitError> {
    stack.peek(n).map(|v| U256::from_big_endian(&v[..]))
}

/// Static (opcode-only, no stack/host inspection needed) costs, per the
/// yellow paper's `W_zero`..`W_high` tiers. `PUSHn`/`DUPn`/`SWAPn` share a
/// single tier across their whole 0x60-0x9f range.
pub fn static_opcode_cost(opcode: Opcode) -> Option<GasCost> {
    use GasCost::*;

    Some(match opcode {
        Opcode::STOP | Opcode::RETURN | Opcode::REVERT | Opcode::SUICIDE => Zero,

        Opcode(0x60..=0x9f) => VeryLow, // PUSH1..PUSH32, DUP1..DUP16, SWAP1..SWAP16

        Opcode::ADD
        | Opcode::SUB
        | Opcode::NOT
        | Opcode::LT
        | Opcode::GT
        | Opcode::SLT
        | Opcode::SGT
        | Opcode::EQ
        | Opcode::ISZERO
        | Opcode::AND
        | Opcode::OR
        | Opcode::XOR
        | Opcode::BYTE
        | Opcode::SHL
        | Opcode::SHR
        | Opcode::SAR
        | Opcode::CALLDATALOAD
        | Opcode::MLOAD
        | Opcode::MSTORE
        | Opcode::MSTORE8 => VeryLow,

        Opcode::MUL | Opcode::DIV | Opcode::SDIV | Opcode::MOD | Opcode::SMOD | Opcode::SIGNEXTEND => Low,

        Opcode::ADDMOD | Opcode::MULMOD | Opcode::JUMP => Mid,

        Opcode::JUMPI => High,

        Opcode::JUMPDEST => Jumpdest,

        Opcode::ADDRESS
        | Opcode::ORIGIN
        | Opcode::CALLER
        | Opcode::CALLVALUE
        | Opcode::CALLDATASIZE
        | Opcode::CODESIZE
        | Opcode::GASPRICE
        | Opcode::COINBASE
        | Opcode::TIMESTAMP
        | Opcode::NUMBER
        | Opcode::DIFFICULTY
        | Opcode::GASLIMIT
        | Opcode::RETURNDATASIZE
        | Opcode::CHAINID
        | Opcode::SELFBALANCE
        | Opcode::BASEFEE
        | Opcode::POP
        | Opcode::PC
        | Opcode::MSIZE
        | Opcode::GAS => Base,

        _ => return None,
    })
}
