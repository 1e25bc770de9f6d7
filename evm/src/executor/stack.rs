//! `StackExecutor`: the `Handler` implementation that actually drives the
//! interpreter, plus the transactional (snapshot/commit/revert) state
//! overlay spec.md's HostContext calls for.
//!
//! Grounded directly on
//! `other_examples/.../executor-stack-executor.rs.rs` (the wider
//! SputnikVM family's `executor::stack` module) -- the teacher
//! (`velas-evm`) stops at the `Handler` trait and leaves this to its
//! consumers, so this is the part of the workspace the pack's other
//! example repos fill in.

use crate::backend::{Backend, Basic, MemoryAccount};
use crate::executor::precompile::{PrecompileFailure, PrecompileOutput, PrecompileSet};
use crate::gasometer::{self, Gasometer, MemoryCost};
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cmp::min;
use core::convert::Infallible;
use evm_runtime::{
    Capture, Config, Context, CreateScheme, ExitError, ExitReason, Handler, Opcode, Runtime,
    Stack, Transfer,
};
use primitive_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};

/// EIP-2929 warm/cold bookkeeping for one call frame.
#[derive(Default, Clone, Debug)]
pub struct Accessed {
    pub accessed_addresses: BTreeSet<H160>,
    pub accessed_storage: BTreeSet<(H160, H256)>,
}

impl Accessed {
    pub fn access_address(&mut self, address: H160) {
        self.accessed_addresses.insert(address);
    }

    pub fn access_addresses<I: Iterator<Item = H160>>(&mut self, addresses: I) {
        for address in addresses {
            self.accessed_addresses.insert(address);
        }
    }

    pub fn access_storages<I: Iterator<Item = (H160, H256)>>(&mut self, storages: I) {
        for storage in storages {
            self.accessed_storage.insert(storage);
        }
    }
}

/// Metadata for one call frame: its gas meter, whether it runs in static
/// (no-state-change) mode, its nesting depth, and (post-Berlin) the set
/// of addresses/slots it has touched.
#[derive(Clone, Debug)]
pub struct StackSubstateMetadata<'config> {
    gasometer: Gasometer<'config>,
    is_static: bool,
    depth: Option<usize>,
    accessed: Option<Accessed>,
}

impl<'config> StackSubstateMetadata<'config> {
    pub fn new(gas_limit: u64, config: &'config Config) -> Self {
        let accessed = if config.increase_state_access_gas {
            Some(Accessed::default())
        } else {
            None
        };
        Self {
            gasometer: Gasometer::new(gas_limit, config),
            is_static: false,
            depth: None,
            accessed,
        }
    }

    pub fn swallow_commit(&mut self, other: Self) -> Result<(), ExitError> {
        self.gasometer.record_stipend(other.gasometer.gas());
        self.gasometer.record_refund(other.gasometer.refunded_gas());

        if let (Some(mut other_accessed), Some(self_accessed)) =
            (other.accessed, self.accessed.as_mut())
        {
            self_accessed
                .accessed_addresses
                .append(&mut other_accessed.accessed_addresses);
            self_accessed
                .accessed_storage
                .append(&mut other_accessed.accessed_storage);
        }

        Ok(())
    }

    pub fn swallow_revert(&mut self, other: Self) -> Result<(), ExitError> {
        self.gasometer.record_stipend(other.gasometer.gas());
        Ok(())
    }

    pub fn swallow_discard(&mut self, _other: Self) -> Result<(), ExitError> {
        Ok(())
    }

    pub fn spit_child(&self, gas_limit: u64, is_static: bool) -> Self {
        Self {
            gasometer: Gasometer::new(gas_limit, self.gasometer.config()),
            is_static: is_static || self.is_static,
            depth: match self.depth {
                None => Some(0),
                Some(n) => Some(n + 1),
            },
            accessed: self.accessed.as_ref().map(|_| Accessed::default()),
        }
    }

    pub fn gasometer(&self) -> &Gasometer<'config> {
        &self.gasometer
    }

    pub fn gasometer_mut(&mut self) -> &mut Gasometer<'config> {
        &mut self.gasometer
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn depth(&self) -> Option<usize> {
        self.depth
    }

    pub fn access_address(&mut self, address: H160) {
        if let Some(accessed) = &mut self.accessed {
            accessed.access_address(address);
        }
    }

    pub fn access_addresses<I: Iterator<Item = H160>>(&mut self, addresses: I) {
        if let Some(accessed) = &mut self.accessed {
            accessed.access_addresses(addresses);
        }
    }

    pub fn access_storage(&mut self, address: H160, key: H256) {
        if let Some(accessed) = &mut self.accessed {
            accessed.accessed_storage.insert((address, key));
        }
    }

    pub fn accessed(&self) -> &Option<Accessed> {
        &self.accessed
    }
}

/// The state surface `StackExecutor` needs beyond raw `Backend` reads:
/// the writable, nestable overlay plus frame metadata.
pub trait StackState<'config>: Backend {
    fn metadata(&self) -> &StackSubstateMetadata<'config>;
    fn metadata_mut(&mut self) -> &mut StackSubstateMetadata<'config>;

    fn enter(&mut self, gas_limit: u64, is_static: bool);
    fn exit_commit(&mut self) -> Result<(), ExitError>;
    fn exit_revert(&mut self) -> Result<(), ExitError>;
    fn exit_discard(&mut self) -> Result<(), ExitError>;

    fn is_empty(&self, address: H160) -> bool;
    fn deleted(&self, address: H160) -> bool;
    fn is_cold(&self, address: H160) -> bool;
    fn is_storage_cold(&self, address: H160, key: H256) -> bool;

    fn inc_nonce(&mut self, address: H160);
    fn set_storage(&mut self, address: H160, key: H256, value: H256);
    fn reset_storage(&mut self, address: H160);
    fn log(&mut self, address: H160, topics: Vec<H256>, data: Vec<u8>);
    fn set_deleted(&mut self, address: H160);
    fn set_code(&mut self, address: H160, code: Vec<u8>);
    fn transfer(&mut self, transfer: Transfer) -> Result<(), ExitError>;
    fn reset_balance(&mut self, address: H160);
    fn touch(&mut self, address: H160);
}

/// An emitted `LOG0`-`LOG4`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Log {
    pub address: H160,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

/// One frame's worth of buffered writes: accounts created/modified,
/// accounts deleted, and logs emitted, all layered over whatever the
/// parent frame (or, at the bottom, the `Backend`) already holds.
#[derive(Clone, Debug, Default)]
struct MemoryStackSubstate<'config> {
    metadata: Option<StackSubstateMetadata<'config>>,
    accounts: BTreeMap<H160, MemoryAccount>,
    logs: Vec<Log>,
    deletes: BTreeSet<H160>,
}

impl<'config> MemoryStackSubstate<'config> {
    fn known_account(&self, address: H160) -> Option<&MemoryAccount> {
        self.accounts.get(&address)
    }

    fn known_storage(&self, address: H160, key: H256) -> Option<H256> {
        self.accounts
            .get(&address)
            .and_then(|a| a.storage.get(&key).copied())
    }

    fn account_mut<B: Backend>(&mut self, address: H160, backend: &B) -> &mut MemoryAccount {
        self.accounts.entry(address).or_insert_with(|| {
            let basic = backend.basic(address);
            MemoryAccount {
                nonce: basic.nonce,
                balance: basic.balance,
                storage: BTreeMap::new(),
                code: backend.code(address),
            }
        })
    }
}

/// The concrete, in-memory `StackState`: a `Backend` plus a stack of
/// `MemoryStackSubstate` frames, one per nested CALL/CREATE depth.
pub struct MemoryStackState<'backend, 'config, B> {
    backend: &'backend mut B,
    substates: Vec<MemoryStackSubstate<'config>>,
}

impl<'backend, 'config, B: Backend> MemoryStackState<'backend, 'config, B> {
    pub fn new(metadata: StackSubstateMetadata<'config>, backend: &'backend mut B) -> Self {
        Self {
            backend,
            substates: alloc::vec![MemoryStackSubstate {
                metadata: Some(metadata),
                ..Default::default()
            }],
        }
    }

    fn top(&self) -> &MemoryStackSubstate<'config> {
        self.substates.last().expect("substate stack is never empty")
    }

    fn top_mut(&mut self) -> &mut MemoryStackSubstate<'config> {
        self.substates
            .last_mut()
            .expect("substate stack is never empty")
    }

    fn account(&self, address: H160) -> MemoryAccount {
        for substate in self.substates.iter().rev() {
            if let Some(account) = substate.known_account(address) {
                return account.clone();
            }
        }
        MemoryAccount {
            nonce: self.backend.basic(address).nonce,
            balance: self.backend.basic(address).balance,
            storage: BTreeMap::new(),
            code: self.backend.code(address),
        }
    }

    pub fn deconstruct(
        self,
    ) -> (impl IntoIterator<Item = (H160, MemoryAccount)>, impl IntoIterator<Item = Log>) {
        let mut substates = self.substates;
        let final_state = substates.pop().expect("substate stack is never empty");
        (final_state.accounts, final_state.logs)
    }
}

impl<'backend, 'config, B: Backend> Backend for MemoryStackState<'backend, 'config, B> {
    fn gas_price(&self) -> U256 {
        self.backend.gas_price()
    }
    fn origin(&self) -> H160 {
        self.backend.origin()
    }
    fn block_hash(&self, number: U256) -> H256 {
        self.backend.block_hash(number)
    }
    fn block_number(&self) -> U256 {
        self.backend.block_number()
    }
    fn block_coinbase(&self) -> H160 {
        self.backend.block_coinbase()
    }
    fn block_timestamp(&self) -> U256 {
        self.backend.block_timestamp()
    }
    fn block_difficulty(&self) -> U256 {
        self.backend.block_difficulty()
    }
    fn block_gas_limit(&self) -> U256 {
        self.backend.block_gas_limit()
    }
    fn block_base_fee_per_gas(&self) -> U256 {
        self.backend.block_base_fee_per_gas()
    }
    fn chain_id(&self) -> U256 {
        self.backend.chain_id()
    }

    fn exists(&self, address: H160) -> bool {
        for substate in self.substates.iter().rev() {
            if substate.known_account(address).is_some() {
                return true;
            }
        }
        self.backend.exists(address)
    }

    fn basic(&self, address: H160) -> Basic {
        let account = self.account(address);
        Basic {
            balance: account.balance,
            nonce: account.nonce,
        }
    }

    fn code(&self, address: H160) -> Vec<u8> {
        self.account(address).code
    }

    fn storage(&self, address: H160, index: H256) -> H256 {
        for substate in self.substates.iter().rev() {
            if let Some(value) = substate.known_storage(address, index) {
                return value;
            }
            if substate.known_account(address).is_some() {
                // The account was loaded into this frame without this
                // particular key being written -- fall through to the
                // backend's original value for it.
                break;
            }
        }
        self.backend.storage(address, index)
    }

    fn original_storage(&self, address: H160, index: H256) -> Option<H256> {
        self.backend.original_storage(address, index)
    }
}

impl<'backend, 'config, B: Backend> StackState<'config> for MemoryStackState<'backend, 'config, B> {
    fn metadata(&self) -> &StackSubstateMetadata<'config> {
        self.top().metadata.as_ref().expect("metadata always set")
    }

    fn metadata_mut(&mut self) -> &mut StackSubstateMetadata<'config> {
        self.top_mut().metadata.as_mut().expect("metadata always set")
    }

    fn enter(&mut self, gas_limit: u64, is_static: bool) {
        let metadata = self.metadata().spit_child(gas_limit, is_static);
        self.substates.push(MemoryStackSubstate {
            metadata: Some(metadata),
            ..Default::default()
        });
    }

    fn exit_commit(&mut self) -> Result<(), ExitError> {
        let child = self.substates.pop().expect("more exits than enters");
        let parent = self.top_mut();
        parent
            .metadata
            .as_mut()
            .expect("metadata always set")
            .swallow_commit(child.metadata.expect("metadata always set"))?;
        parent.accounts.extend(child.accounts);
        parent.logs.extend(child.logs);
        parent.deletes.extend(child.deletes);
        Ok(())
    }

    fn exit_revert(&mut self) -> Result<(), ExitError> {
        let child = self.substates.pop().expect("more exits than enters");
        let parent = self.top_mut();
        parent
            .metadata
            .as_mut()
            .expect("metadata always set")
            .swallow_revert(child.metadata.expect("metadata always set"))
    }

    fn exit_discard(&mut self) -> Result<(), ExitError> {
        let child = self.substates.pop().expect("more exits than enters");
        let parent = self.top_mut();
        parent
            .metadata
            .as_mut()
            .expect("metadata always set")
            .swallow_discard(child.metadata.expect("metadata always set"))
    }

    fn is_empty(&self, address: H160) -> bool {
        let account = self.account(address);
        account.balance.is_zero() && account.nonce.is_zero() && account.code.is_empty()
    }

    fn deleted(&self, address: H160) -> bool {
        self.substates.iter().rev().any(|s| s.deletes.contains(&address))
    }

    fn is_cold(&self, address: H160) -> bool {
        !self
            .metadata()
            .accessed()
            .as_ref()
            .map(|a| a.accessed_addresses.contains(&address))
            .unwrap_or(true)
    }

    fn is_storage_cold(&self, address: H160, key: H256) -> bool {
        !self
            .metadata()
            .accessed()
            .as_ref()
            .map(|a| a.accessed_storage.contains(&(address, key)))
            .unwrap_or(true)
    }

    fn inc_nonce(&mut self, address: H160) {
        let backend = &*self.backend;
        self.top_mut().account_mut(address, backend).nonce += U256::one();
    }

    fn set_storage(&mut self, address: H160, key: H256, value: H256) {
        let backend = &*self.backend;
        self.top_mut()
            .account_mut(address, backend)
            .storage
            .insert(key, value);
    }

    fn reset_storage(&mut self, address: H160) {
        let backend = &*self.backend;
        self.top_mut().account_mut(address, backend).storage = BTreeMap::new();
    }

    fn log(&mut self, address: H160, topics: Vec<H256>, data: Vec<u8>) {
        self.top_mut().logs.push(Log { address, topics, data });
    }

    fn set_deleted(&mut self, address: H160) {
        self.top_mut().deletes.insert(address);
    }

    fn set_code(&mut self, address: H160, code: Vec<u8>) {
        let backend = &*self.backend;
        self.top_mut().account_mut(address, backend).code = code;
    }

    fn transfer(&mut self, transfer: Transfer) -> Result<(), ExitError> {
        if transfer.value.is_zero() {
            return Ok(());
        }
        let backend = &*self.backend;
        {
            let source = self.substates.last_mut().unwrap().account_mut(transfer.source, backend);
            if source.balance < transfer.value {
                return Err(ExitError::OutOfFund);
            }
            source.balance -= transfer.value;
        }
        let backend = &*self.backend;
        self.top_mut()
            .account_mut(transfer.target, backend)
            .balance += transfer.value;
        Ok(())
    }

    fn reset_balance(&mut self, address: H160) {
        let backend = &*self.backend;
        self.top_mut().account_mut(address, backend).balance = U256::zero();
    }

    fn touch(&mut self, address: H160) {
        let backend = &*self.backend;
        let _ = self.top_mut().account_mut(address, backend);
    }
}

/// The result of one fully-resolved CALL-family opcode, as seen by the
/// substate machinery (`Succeeded`/`Reverted`/`Failed` mirror
/// `exit_commit`/`exit_revert`/`exit_discard`).
enum StackExitKind {
    Succeeded,
    Reverted,
    Failed,
}

/// The executor: wraps a `StackState` and a `PrecompileSet` and drives
/// nested `Runtime`s to completion. Because `CallInterrupt`/
/// `CreateInterrupt` are `Infallible` here, every `Handler::call`/
/// `create` call resolves synchronously and recursively -- `Runtime::run`
/// never actually observes a `Capture::Trap` from this `Handler`.
pub struct StackExecutor<'config, 'precompiles, S, P> {
    config: &'config Config,
    state: S,
    precompile_set: &'precompiles P,
}

impl<'config, 'precompiles, S: StackState<'config>, P: PrecompileSet>
    StackExecutor<'config, 'precompiles, S, P>
{
    pub fn new_with_precompiles(
        state: S,
        config: &'config Config,
        precompile_set: &'precompiles P,
    ) -> Self {
        Self {
            config,
            state,
            precompile_set,
        }
    }

    pub fn config(&self) -> &'config Config {
        self.config
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }

    fn enter_substate(&mut self, gas_limit: u64, is_static: bool) {
        self.state.enter(gas_limit, is_static);
    }

    fn exit_substate(&mut self, kind: StackExitKind) -> Result<(), ExitError> {
        match kind {
            StackExitKind::Succeeded => self.state.exit_commit(),
            StackExitKind::Reverted => self.state.exit_revert(),
            StackExitKind::Failed => self.state.exit_discard(),
        }
    }

    /// Run a `Runtime` to completion. `Handler::call`/`create` always
    /// resolve synchronously for this `Handler`, so the only possible
    /// result is `Capture::Exit`.
    pub fn execute(&mut self, runtime: &mut Runtime) -> ExitReason {
        match runtime.run(self) {
            Capture::Exit(s) => s,
            Capture::Trap(_) => unreachable!("Trap is Infallible"),
        }
    }

    pub fn gas(&self) -> u64 {
        self.state.metadata().gasometer().gas()
    }

    /// Total gas actually charged against the gas limit, after applying
    /// the refund cap (`gas_used / max_refund_quotient`, 2 pre-London
    /// and 5 from London on per the teacher's fork table's
    /// `max_refund_quotient`... kept as a `Config`-less constant `2`
    /// here, matching every fork this crate implements up to Berlin).
    pub fn used_gas(&self) -> u64 {
        let total = self.state.metadata().gasometer().total_used_gas();
        let refunded = self.state.metadata().gasometer().refunded_gas().max(0) as u64;
        total - min(total / 2, refunded)
    }

    pub fn fee(&self, price: U256) -> U256 {
        U256::from(self.used_gas()) * price
    }

    pub fn nonce(&self, address: H160) -> U256 {
        self.state.basic(address).nonce
    }

    /// Derive the address a `CREATE`/`CREATE2` will deploy to.
    pub fn create_address(&self, scheme: CreateScheme) -> H160 {
        match scheme {
            CreateScheme::Create2 {
                caller,
                code_hash,
                salt,
            } => {
                let mut hasher = Keccak256::new();
                hasher.update(&[0xff]);
                hasher.update(&caller[..]);
                hasher.update(&salt[..]);
                hasher.update(&code_hash[..]);
                H160::from_slice(&hasher.finalize()[12..32])
            }
            CreateScheme::Legacy { caller } => {
                let nonce = self.nonce(caller);
                let mut stream = rlp::RlpStream::new_list(2);
                stream.append(&caller);
                stream.append(&nonce);
                H160::from_slice(&Keccak256::digest(&stream.out())[12..32])
            }
            CreateScheme::Fixed(address) => address,
        }
    }

    /// Execute a top-level `CREATE` transaction.
    pub fn transact_create(
        &mut self,
        caller: H160,
        value: U256,
        init_code: Vec<u8>,
        gas_limit: u64,
    ) -> ExitReason {
        if let Err(e) = self
            .state
            .metadata_mut()
            .gasometer_mut()
            .record_transaction_cost(true, &init_code)
        {
            return e.into();
        }

        match self.create_inner(
            caller,
            CreateScheme::Legacy { caller },
            value,
            init_code,
            Some(gas_limit),
            false,
        ) {
            Capture::Exit((s, _, _)) => s,
            Capture::Trap(infallible) => match infallible {},
        }
    }

    /// Execute a top-level `CREATE2` transaction.
    pub fn transact_create2(
        &mut self,
        caller: H160,
        value: U256,
        init_code: Vec<u8>,
        salt: H256,
        gas_limit: u64,
    ) -> ExitReason {
        let code_hash = H256::from_slice(Keccak256::digest(&init_code).as_slice());
        if let Err(e) = self
            .state
            .metadata_mut()
            .gasometer_mut()
            .record_transaction_cost(true, &init_code)
        {
            return e.into();
        }

        match self.create_inner(
            caller,
            CreateScheme::Create2 {
                caller,
                code_hash,
                salt,
            },
            value,
            init_code,
            Some(gas_limit),
            false,
        ) {
            Capture::Exit((s, _, _)) => s,
            Capture::Trap(infallible) => match infallible {},
        }
    }

    /// Execute a top-level `CALL` transaction.
    pub fn transact_call(
        &mut self,
        caller: H160,
        address: H160,
        value: U256,
        data: Vec<u8>,
        gas_limit: u64,
    ) -> (ExitReason, Vec<u8>) {
        if let Err(e) = self
            .state
            .metadata_mut()
            .gasometer_mut()
            .record_transaction_cost(false, &data)
        {
            return (e.into(), Vec::new());
        }

        if self.config.increase_state_access_gas {
            let addresses = core::iter::once(caller).chain(core::iter::once(address));
            self.state.metadata_mut().access_addresses(addresses);
        }

        self.state.inc_nonce(caller);

        let context = Context {
            caller,
            address,
            apparent_value: value,
        };

        match self.call_inner(
            address,
            Some(Transfer {
                source: caller,
                target: address,
                value,
            }),
            data,
            Some(gas_limit),
            false,
            false,
            false,
            context,
        ) {
            Capture::Exit((s, v)) => (s, v),
            Capture::Trap(infallible) => match infallible {},
        }
    }

    fn create_inner(
        &mut self,
        caller: H160,
        scheme: CreateScheme,
        value: U256,
        init_code: Vec<u8>,
        target_gas: Option<u64>,
        take_l64: bool,
    ) -> Capture<(ExitReason, Option<H160>, Vec<u8>), Infallible> {
        macro_rules! try_or_fail {
            ($e:expr) => {
                match $e {
                    Ok(v) => v,
                    Err(e) => return Capture::Exit((e.into(), None, Vec::new())),
                }
            };
        }

        fn l64(gas: u64) -> u64 {
            gas - gas / 64
        }

        let address = self.create_address(scheme);
        self.state.metadata_mut().access_address(caller);
        self.state.metadata_mut().access_address(address);

        if let Some(depth) = self.state.metadata().depth() {
            if depth > self.config.call_stack_limit {
                return Capture::Exit((ExitError::CallTooDeep.into(), None, Vec::new()));
            }
        }

        if self.state.basic(caller).balance < value {
            return Capture::Exit((ExitError::OutOfFund.into(), None, Vec::new()));
        }

        let after_gas = if take_l64 && self.config.call_l64_after_gas {
            l64(self.state.metadata().gasometer().gas())
        } else {
            self.state.metadata().gasometer().gas()
        };
        let gas_limit = min(after_gas, target_gas.unwrap_or(after_gas));
        try_or_fail!(self.state.metadata_mut().gasometer_mut().record_cost(gas_limit));

        self.state.inc_nonce(caller);
        self.enter_substate(gas_limit, false);

        if !self.state.code(address).is_empty() || self.state.basic(address).nonce > U256::zero() {
            let _ = self.exit_substate(StackExitKind::Failed);
            return Capture::Exit((ExitError::CreateCollision.into(), None, Vec::new()));
        }
        self.state.reset_storage(address);

        let context = Context {
            address,
            caller,
            apparent_value: value,
        };
        if let Err(e) = self.state.transfer(Transfer {
            source: caller,
            target: address,
            value,
        }) {
            let _ = self.exit_substate(StackExitKind::Reverted);
            return Capture::Exit((ExitReason::Error(e), None, Vec::new()));
        }

        if self.config.create_increase_nonce {
            self.state.inc_nonce(address);
        }

        let mut runtime = Runtime::new(Rc::new(init_code), Rc::new(Vec::new()), context, self.config);
        let reason = self.execute(&mut runtime);
        log::debug!(target: "evm", "create {:?}: {:?}", address, reason);

        match reason {
            ExitReason::Succeed(s) => {
                let out = runtime.machine().return_value();

                if let Some(limit) = self.config.create_contract_limit {
                    if out.len() > limit {
                        self.state.metadata_mut().gasometer_mut().fail();
                        let _ = self.exit_substate(StackExitKind::Failed);
                        return Capture::Exit((ExitError::CreateContractLimit.into(), None, Vec::new()));
                    }
                }

                match self.state.metadata_mut().gasometer_mut().record_deposit(out.len()) {
                    Ok(()) => {
                        let commit = self.exit_substate(StackExitKind::Succeeded);
                        self.state.set_code(address, out);
                        try_or_fail!(commit);
                        Capture::Exit((ExitReason::Succeed(s), Some(address), Vec::new()))
                    }
                    Err(e) => {
                        let _ = self.exit_substate(StackExitKind::Failed);
                        Capture::Exit((ExitReason::Error(e), None, Vec::new()))
                    }
                }
            }
            ExitReason::Revert(e) => {
                let _ = self.exit_substate(StackExitKind::Reverted);
                Capture::Exit((ExitReason::Revert(e), None, runtime.machine().return_value()))
            }
            ExitReason::Error(e) => {
                self.state.metadata_mut().gasometer_mut().fail();
                let _ = self.exit_substate(StackExitKind::Failed);
                Capture::Exit((ExitReason::Error(e), None, Vec::new()))
            }
            ExitReason::Fatal(e) => {
                self.state.metadata_mut().gasometer_mut().fail();
                let _ = self.exit_substate(StackExitKind::Failed);
                Capture::Exit((ExitReason::Fatal(e), None, Vec::new()))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn call_inner(
        &mut self,
        code_address: H160,
        transfer: Option<Transfer>,
        input: Vec<u8>,
        target_gas: Option<u64>,
        is_static: bool,
        take_l64: bool,
        take_stipend: bool,
        context: Context,
    ) -> Capture<(ExitReason, Vec<u8>), Infallible> {
        macro_rules! try_or_fail {
            ($e:expr) => {
                match $e {
                    Ok(v) => v,
                    Err(e) => return Capture::Exit((e.into(), Vec::new())),
                }
            };
        }

        fn l64(gas: u64) -> u64 {
            gas - gas / 64
        }

        let after_gas = if take_l64 && self.config.call_l64_after_gas {
            l64(self.state.metadata().gasometer().gas())
        } else {
            self.state.metadata().gasometer().gas()
        };
        let mut gas_limit = min(target_gas.unwrap_or(after_gas), after_gas);
        try_or_fail!(self.state.metadata_mut().gasometer_mut().record_cost(gas_limit));

        if let Some(transfer) = transfer.as_ref() {
            if take_stipend && !transfer.value.is_zero() {
                gas_limit = gas_limit.saturating_add(self.config.call_stipend);
            }
        }

        let code = self.state.code(code_address);

        self.enter_substate(gas_limit, is_static);
        self.state.touch(context.address);

        if let Some(depth) = self.state.metadata().depth() {
            if depth > self.config.call_stack_limit {
                let _ = self.exit_substate(StackExitKind::Reverted);
                return Capture::Exit((ExitError::CallTooDeep.into(), Vec::new()));
            }
        }

        if let Some(transfer) = transfer {
            if let Err(e) = self.state.transfer(transfer) {
                let _ = self.exit_substate(StackExitKind::Reverted);
                return Capture::Exit((ExitReason::Error(e), Vec::new()));
            }
        }

        if let Some(result) =
            self.precompile_set
                .execute(code_address, &input, Some(gas_limit), &context, is_static)
        {
            return match result {
                Ok(PrecompileOutput {
                    exit_status,
                    output,
                    cost,
                }) => {
                    let _ = self.state.metadata_mut().gasometer_mut().record_cost(cost);
                    let _ = self.exit_substate(StackExitKind::Succeeded);
                    Capture::Exit((ExitReason::Succeed(exit_status), output))
                }
                Err(PrecompileFailure::Error { exit_status }) => {
                    let _ = self.exit_substate(StackExitKind::Failed);
                    Capture::Exit((ExitReason::Error(exit_status), Vec::new()))
                }
                Err(PrecompileFailure::Revert {
                    exit_status,
                    output,
                    cost,
                }) => {
                    let _ = self.state.metadata_mut().gasometer_mut().record_cost(cost);
                    let _ = self.exit_substate(StackExitKind::Reverted);
                    Capture::Exit((ExitReason::Revert(exit_status), output))
                }
                Err(PrecompileFailure::Fatal { exit_status }) => {
                    self.state.metadata_mut().gasometer_mut().fail();
                    let _ = self.exit_substate(StackExitKind::Failed);
                    Capture::Exit((ExitReason::Fatal(exit_status), Vec::new()))
                }
            };
        }

        let mut runtime = Runtime::new(Rc::new(code), Rc::new(input), context, self.config);
        let reason = self.execute(&mut runtime);
        log::debug!(target: "evm", "call {:?}: {:?}", code_address, reason);

        match reason {
            ExitReason::Succeed(s) => {
                let _ = self.exit_substate(StackExitKind::Succeeded);
                Capture::Exit((ExitReason::Succeed(s), runtime.machine().return_value()))
            }
            ExitReason::Revert(e) => {
                let _ = self.exit_substate(StackExitKind::Reverted);
                Capture::Exit((ExitReason::Revert(e), runtime.machine().return_value()))
            }
            ExitReason::Error(e) => {
                let _ = self.exit_substate(StackExitKind::Failed);
                Capture::Exit((ExitReason::Error(e), Vec::new()))
            }
            ExitReason::Fatal(e) => {
                self.state.metadata_mut().gasometer_mut().fail();
                let _ = self.exit_substate(StackExitKind::Failed);
                Capture::Exit((ExitReason::Fatal(e), Vec::new()))
            }
        }
    }
}

impl<'config, 'precompiles, S: StackState<'config>, P: PrecompileSet> Handler
    for StackExecutor<'config, 'precompiles, S, P>
{
    type CreateInterrupt = Infallible;
    type CreateFeedback = Infallible;
    type CallInterrupt = Infallible;
    type CallFeedback = Infallible;

    fn balance(&self, address: H160) -> U256 {
        self.state.basic(address).balance
    }

    fn code_size(&self, address: H160) -> U256 {
        U256::from(self.state.code(address).len())
    }

    fn code_hash(&self, address: H160) -> H256 {
        if !self.exists(address) {
            return H256::default();
        }
        H256::from_slice(Keccak256::digest(&self.state.code(address)).as_slice())
    }

    fn code(&self, address: H160) -> Vec<u8> {
        self.state.code(address)
    }

    fn storage(&self, address: H160, index: H256) -> H256 {
        self.state.storage(address, index)
    }

    fn original_storage(&self, address: H160, index: H256) -> H256 {
        self.state.original_storage(address, index).unwrap_or_default()
    }

    fn exists(&self, address: H160) -> bool {
        if self.config.empty_considered_exists {
            self.state.exists(address)
        } else {
            self.state.exists(address) && !self.state.is_empty(address)
        }
    }

    fn is_cold(&self, address: H160, maybe_index: Option<H256>) -> bool {
        match maybe_index {
            None => !self.precompile_set.is_precompile(address) && self.state.is_cold(address),
            Some(index) => self.state.is_storage_cold(address, index),
        }
    }

    fn gas_left(&self) -> U256 {
        U256::from(self.state.metadata().gasometer().gas())
    }

    fn gas_price(&self) -> U256 {
        self.state.gas_price()
    }
    fn origin(&self) -> H160 {
        self.state.origin()
    }
    fn block_hash(&self, number: U256) -> H256 {
        self.state.block_hash(number)
    }
    fn block_number(&self) -> U256 {
        self.state.block_number()
    }
    fn block_coinbase(&self) -> H160 {
        self.state.block_coinbase()
    }
    fn block_timestamp(&self) -> U256 {
        self.state.block_timestamp()
    }
    fn block_difficulty(&self) -> U256 {
        self.state.block_difficulty()
    }
    fn block_gas_limit(&self) -> U256 {
        self.state.block_gas_limit()
    }
    fn block_base_fee_per_gas(&self) -> U256 {
        self.state.block_base_fee_per_gas()
    }
    fn chain_id(&self) -> U256 {
        self.state.chain_id()
    }

    fn deleted(&self, address: H160) -> bool {
        self.state.deleted(address)
    }

    fn set_storage(&mut self, address: H160, index: H256, value: H256) -> Result<(), ExitError> {
        self.state.set_storage(address, index, value);
        Ok(())
    }

    fn log(&mut self, address: H160, topics: Vec<H256>, data: Vec<u8>) -> Result<(), ExitError> {
        self.state.log(address, topics, data);
        Ok(())
    }

    fn mark_delete(&mut self, address: H160, target: H160) -> Result<(), ExitError> {
        let balance = self.balance(address);
        self.state.transfer(Transfer {
            source: address,
            target,
            value: balance,
        })?;
        self.state.reset_balance(address);
        self.state.set_deleted(address);
        Ok(())
    }

    fn create(
        &mut self,
        caller: H160,
        scheme: CreateScheme,
        value: U256,
        init_code: Vec<u8>,
        target_gas: Option<u64>,
    ) -> Capture<(ExitReason, Option<H160>, Vec<u8>), Self::CreateInterrupt> {
        self.create_inner(caller, scheme, value, init_code, target_gas, true)
    }

    fn call(
        &mut self,
        code_address: H160,
        transfer: Option<Transfer>,
        input: Vec<u8>,
        target_gas: Option<u64>,
        is_static: bool,
        context: Context,
    ) -> Capture<(ExitReason, Vec<u8>), Self::CallInterrupt> {
        self.call_inner(
            code_address,
            transfer,
            input,
            target_gas,
            is_static,
            true,
            true,
            context,
        )
    }

    fn pre_validate(
        &mut self,
        context: &Context,
        opcode: Opcode,
        stack: &Stack,
    ) -> Result<(), ExitError> {
        if let Some(cost) = gasometer::static_opcode_cost(opcode) {
            self.state.metadata_mut().gasometer_mut().record_cost(cost.cost(0, self.config)?)?;
            return Ok(());
        }

        let is_static = self.state.metadata().is_static();
        let (cost, target, memory) =
            dynamic_opcode_cost(context.address, opcode, stack, is_static, self.config, &self.state)?;

        self.state
            .metadata_mut()
            .gasometer_mut()
            .record_dynamic_cost(cost, memory)?;

        if let Some((address, key)) = target {
            self.state.metadata_mut().access_address(address);
            if let Some(key) = key {
                self.state.metadata_mut().access_storage(address, key);
            }
        }

        Ok(())
    }
}

/// Resolve a single opcode's dynamic `GasCost`, the address/slot it
/// touches (for EIP-2929 bookkeeping), and any memory expansion it
/// requires -- consulting the current `StackState` for cold/warm and
/// storage-change information the pure `GasCost` enum cannot carry by
/// itself.
fn dynamic_opcode_cost<'config, S: StackState<'config>>(
    address: H160,
    opcode: Opcode,
    stack: &Stack,
    is_static: bool,
    config: &Config,
    state: &S,
) -> Result<(gasometer::GasCost, Option<(H160, Option<H256>)>, Option<MemoryCost>), ExitError> {
    use gasometer::GasCost;

    let peek_h160 = |n: usize| -> Result<H160, ExitError> {
        let mut buf = [0u8; 32];
        gasometer::peek_u256(stack, n)?.to_big_endian(&mut buf);
        Ok(H160::from_slice(&buf[12..32]))
    };

    Ok(match opcode {
        Opcode::SHA3 => (
            GasCost::Sha3 {
                len: gasometer::peek_u256(stack, 1)?,
            },
            None,
            Some(MemoryCost {
                offset: gasometer::peek_u256(stack, 0)?,
                len: gasometer::peek_u256(stack, 1)?,
            }),
        ),
        Opcode::EXTCODESIZE | Opcode::EXTCODECOPY | Opcode::EXTCODEHASH | Opcode::BALANCE => {
            let target = peek_h160(0)?;
            let is_cold = state.is_cold(target);
            let cost = match opcode {
                Opcode::EXTCODESIZE => GasCost::ExtCodeSize { is_cold },
                Opcode::EXTCODECOPY => GasCost::ExtCodeCopy {
                    is_cold,
                    len: gasometer::peek_u256(stack, 3)?,
                },
                Opcode::EXTCODEHASH => GasCost::ExtCodeHash { is_cold },
                _ => GasCost::Balance { is_cold },
            };
            let memory = if opcode == Opcode::EXTCODECOPY {
                Some(MemoryCost {
                    offset: gasometer::peek_u256(stack, 1)?,
                    len: gasometer::peek_u256(stack, 3)?,
                })
            } else {
                None
            };
            (cost, Some((target, None)), memory)
        }
        Opcode::CALLDATACOPY | Opcode::CODECOPY => (
            GasCost::VeryLowCopy {
                len: gasometer::peek_u256(stack, 2)?,
            },
            None,
            Some(MemoryCost {
                offset: gasometer::peek_u256(stack, 0)?,
                len: gasometer::peek_u256(stack, 2)?,
            }),
        ),
        Opcode::RETURNDATACOPY => (
            GasCost::VeryLowCopy {
                len: gasometer::peek_u256(stack, 2)?,
            },
            None,
            Some(MemoryCost {
                offset: gasometer::peek_u256(stack, 0)?,
                len: gasometer::peek_u256(stack, 2)?,
            }),
        ),
        Opcode::EXP => (
            GasCost::Exp {
                power: gasometer::peek_u256(stack, 1)?,
            },
            None,
            None,
        ),
        Opcode(n @ 0xa0..=0xa4) => {
            if is_static {
                return Err(ExitError::StaticModeViolation);
            }
            let n = n - Opcode::LOG0.as_u8();
            (
                GasCost::Log {
                    n,
                    len: gasometer::peek_u256(stack, 1)?,
                },
                None,
                Some(MemoryCost {
                    offset: gasometer::peek_u256(stack, 0)?,
                    len: gasometer::peek_u256(stack, 1)?,
                }),
            )
        }
        Opcode::SLOAD => {
            let index = H256::from_slice(&{
                let mut buf = [0u8; 32];
                gasometer::peek_u256(stack, 0)?.to_big_endian(&mut buf);
                buf
            });
            let is_cold = state.is_storage_cold(address, index);
            (GasCost::Sload { is_cold }, Some((address, Some(index))), None)
        }
        Opcode::SSTORE => {
            if is_static {
                return Err(ExitError::StaticModeViolation);
            }
            let mut buf = [0u8; 32];
            gasometer::peek_u256(stack, 0)?.to_big_endian(&mut buf);
            let index = H256::from_slice(&buf);
            let mut buf = [0u8; 32];
            gasometer::peek_u256(stack, 1)?.to_big_endian(&mut buf);
            let new = H256::from_slice(&buf);
            let is_cold = state.is_storage_cold(address, index);
            (
                GasCost::Sstore {
                    is_cold,
                    original: state.original_storage(address, index).unwrap_or_default(),
                    current: state.storage(address, index),
                    new,
                },
                Some((address, Some(index))),
                None,
            )
        }
        Opcode::CALL | Opcode::CALLCODE | Opcode::DELEGATECALL | Opcode::STATICCALL => {
            // Stack layout is `gas, address, ...` for every CALL-family
            // opcode; the address is always operand 1.
            let target = peek_h160(1)?;
            let has_value = (opcode == Opcode::CALL || opcode == Opcode::CALLCODE)
                && !gasometer::peek_u256(stack, 2)?.is_zero();
            if is_static && opcode == Opcode::CALL && has_value {
                return Err(ExitError::StaticModeViolation);
            }
            let is_cold = state.is_cold(target);
            let target_exists = !state.is_empty(target) || state.exists(target);
            (
                GasCost::Call {
                    is_cold,
                    target_exists,
                    has_value,
                },
                Some((target, None)),
                None,
            )
        }
        Opcode::CREATE => {
            if is_static {
                return Err(ExitError::StaticModeViolation);
            }
            (GasCost::Create, None, None)
        }
        Opcode::CREATE2 => {
            if is_static {
                return Err(ExitError::StaticModeViolation);
            }
            (
                GasCost::Create2 {
                    len: gasometer::peek_u256(stack, 2)?,
                },
                None,
                None,
            )
        }
        Opcode::SUICIDE => {
            if is_static {
                return Err(ExitError::StaticModeViolation);
            }
            let target = peek_h160(0)?;
            let target_exists = !state.is_empty(target) || state.exists(target);
            (
                GasCost::Suicide {
                    target_exists,
                    has_value: !state.basic(address).balance.is_zero(),
                },
                None,
                None,
            )
        }
        _ => return Err(ExitError::OpcodeNotFound),
    })
}
