//! End-to-end scenarios driving `StackExecutor` against an in-memory
//! `MemoryBackend`, one per concrete case.

use std::collections::BTreeMap;

use evm::backend::{MemoryAccount, MemoryBackend, MemoryVicinity};
use evm::executor::{BuiltinPrecompiles, MemoryStackState, StackExecutor, StackSubstateMetadata};
use evm::{Config, ExitError, ExitReason, ExitRevert};
use primitive_types::{H160, H256, U256};

fn vicinity() -> MemoryVicinity {
    MemoryVicinity {
        gas_price: U256::zero(),
        origin: H160::zero(),
        chain_id: U256::one(),
        block_hashes: Vec::new(),
        block_number: U256::zero(),
        block_coinbase: H160::zero(),
        block_timestamp: U256::zero(),
        block_difficulty: U256::zero(),
        block_gas_limit: U256::max_value(),
        block_base_fee_per_gas: U256::zero(),
    }
}

fn caller() -> H160 {
    H160::repeat_byte(0x11)
}

fn target() -> H160 {
    H160::repeat_byte(0x22)
}

/// Deploy `code` at `target()` with `balance`, then run `transact_call`
/// against it with the given calldata and gas limit.
fn run(
    code: &[u8],
    gas_limit: u64,
    data: Vec<u8>,
) -> (ExitReason, Vec<u8>, MemoryBackend<'static>) {
    let vicinity = Box::leak(Box::new(vicinity()));
    let mut state = BTreeMap::new();
    state.insert(
        caller(),
        MemoryAccount {
            nonce: U256::zero(),
            balance: U256::from(1_000_000_000u64),
            storage: BTreeMap::new(),
            code: Vec::new(),
        },
    );
    state.insert(
        target(),
        MemoryAccount {
            nonce: U256::zero(),
            balance: U256::zero(),
            storage: BTreeMap::new(),
            code: code.to_vec(),
        },
    );
    let mut backend = MemoryBackend::new(vicinity, state);

    let config = Config::istanbul();
    let metadata = StackSubstateMetadata::new(gas_limit, &config);
    let stack_state = MemoryStackState::new(metadata, &mut backend);
    let precompiles = BuiltinPrecompiles { has_modexp: true };
    let mut executor = StackExecutor::new_with_precompiles(stack_state, &config, &precompiles);

    let (reason, output) =
        executor.transact_call(caller(), target(), U256::zero(), data, gas_limit);
    (reason, output, backend)
}

#[test]
fn simple_add() {
    // PUSH1 1; PUSH1 2; ADD; STOP is implicit (falls off the end).
    let code = hex::decode("6001600201").unwrap();
    let (reason, output, _) = run(&code, 100_000, Vec::new());
    assert!(matches!(reason, ExitReason::Succeed(_)));
    assert!(output.is_empty());
}

#[test]
fn out_of_gas_on_push() {
    let code = hex::decode("6001").unwrap();
    let (reason, _, _) = run(&code, 2, Vec::new());
    assert_eq!(reason, ExitReason::Error(ExitError::OutOfGas));
}

#[test]
fn stack_underflow_on_pop() {
    let code = hex::decode("50").unwrap();
    let (reason, _, _) = run(&code, 100_000, Vec::new());
    assert_eq!(reason, ExitReason::Error(ExitError::StackUnderflow));
}

#[test]
fn invalid_opcode() {
    let code = hex::decode("fe").unwrap();
    let (reason, _, _) = run(&code, 100_000, Vec::new());
    assert_eq!(reason, ExitReason::Error(ExitError::DesignatedInvalid));
}

#[test]
fn jump_into_push_immediate_is_invalid() {
    // PUSH1 0x01; JUMP -- the target (1) lands on the PUSH1's own
    // immediate operand byte, which is never a valid jump destination
    // even where its value happens to equal 0x5b.
    let code = hex::decode("600156").unwrap();
    let (reason, _, _) = run(&code, 100_000, Vec::new());
    assert_eq!(reason, ExitReason::Error(ExitError::InvalidJump));
}

#[test]
fn memory_expansion_and_return() {
    // PUSH1 0xff; PUSH1 0x00; MSTORE; PUSH1 0x20; PUSH1 0x00; RETURN
    let code = hex::decode("60ff60005260206000f3").unwrap();
    let (reason, output, _) = run(&code, 100_000, Vec::new());
    assert!(matches!(reason, ExitReason::Succeed(_)));
    let mut expected = [0u8; 32];
    expected[31] = 0xff;
    assert_eq!(output, expected);
}

#[test]
fn revert_preserves_output_and_rolls_back_storage() {
    // PUSH1 1; PUSH1 0; SSTORE; PUSH1 0x20; PUSH1 0; REVERT
    let code = hex::decode("600160005560206000fd").unwrap();
    let (reason, output, backend) = run(&code, 100_000, Vec::new());
    assert_eq!(
        reason,
        ExitReason::Revert(ExitRevert::Reverted)
    );
    assert_eq!(output, [0u8; 32]);
    let account = backend.state().get(&target()).unwrap();
    assert_eq!(
        account.storage.get(&H256::zero()).copied().unwrap_or_default(),
        H256::zero()
    );
}

#[test]
fn empty_code_succeeds_with_empty_output() {
    let (reason, output, _) = run(&[], 21_000, Vec::new());
    assert!(matches!(reason, ExitReason::Succeed(_)));
    assert!(output.is_empty());
}

#[test]
fn staticcall_callee_sstore_is_rejected() {
    // Callee: PUSH1 1; PUSH1 0; SSTORE; STOP -- forbidden once reached
    // through a STATICCALL.
    let callee = H160::repeat_byte(0x33);
    let callee_code = hex::decode("600160005500").unwrap();

    let mut caller_code = Vec::new();
    caller_code.extend_from_slice(&[0x60, 0x00]); // retLength
    caller_code.extend_from_slice(&[0x60, 0x00]); // retOffset
    caller_code.extend_from_slice(&[0x60, 0x00]); // argsLength
    caller_code.extend_from_slice(&[0x60, 0x00]); // argsOffset
    caller_code.push(0x73); // PUSH20 <callee>
    caller_code.extend_from_slice(&callee[..]);
    caller_code.extend_from_slice(&[0x61, 0x27, 0x10]); // PUSH2 0x2710 (gas)
    caller_code.push(0xfa); // STATICCALL
    caller_code.extend_from_slice(&[0x60, 0x00]); // PUSH1 0
    caller_code.push(0x52); // MSTORE
    caller_code.extend_from_slice(&[0x60, 0x20]); // PUSH1 0x20
    caller_code.extend_from_slice(&[0x60, 0x00]); // PUSH1 0
    caller_code.push(0xf3); // RETURN

    let vicinity = Box::leak(Box::new(vicinity()));
    let mut state = BTreeMap::new();
    state.insert(
        caller(),
        MemoryAccount {
            nonce: U256::zero(),
            balance: U256::from(1_000_000_000u64),
            storage: BTreeMap::new(),
            code: Vec::new(),
        },
    );
    state.insert(
        target(),
        MemoryAccount {
            nonce: U256::zero(),
            balance: U256::zero(),
            storage: BTreeMap::new(),
            code: caller_code,
        },
    );
    state.insert(
        callee,
        MemoryAccount {
            nonce: U256::zero(),
            balance: U256::zero(),
            storage: BTreeMap::new(),
            code: callee_code,
        },
    );
    let mut backend = MemoryBackend::new(vicinity, state);

    let config = Config::istanbul();
    let gas_limit = 100_000;
    let metadata = StackSubstateMetadata::new(gas_limit, &config);
    let stack_state = MemoryStackState::new(metadata, &mut backend);
    let precompiles = BuiltinPrecompiles { has_modexp: true };
    let mut executor = StackExecutor::new_with_precompiles(stack_state, &config, &precompiles);

    let (reason, output) =
        executor.transact_call(caller(), target(), U256::zero(), Vec::new(), gas_limit);

    // The outer call still succeeds -- STATICCALL reports the rejected
    // sub-call as failure (0) on the stack rather than aborting.
    assert!(matches!(reason, ExitReason::Succeed(_)));
    assert_eq!(output, [0u8; 32]);

    let account = backend.state().get(&callee).unwrap();
    assert!(account.storage.get(&H256::zero()).is_none());
}
