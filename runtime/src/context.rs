use primitive_types::{H160, H256, U256};

/// Call context, also known as the execution context. Most of the context
/// fields are used by the `ADDRESS`, `CALLER`, `CALLVALUE` opcodes and by
/// the `Handler` when it needs to know on whose behalf a nested call is
/// being made.
#[derive(Clone, Debug)]
pub struct Context {
    /// Execution address, the address `ADDRESS` returns and that `SLOAD`/
    /// `SSTORE` operate against.
    pub address: H160,
    /// Caller of the execution.
    pub caller: H160,
    /// Apparent value of the execution, the value `CALLVALUE` returns.
    /// For `DELEGATECALL` this is the *caller's* value, not the value of
    /// the delegating call.
    pub apparent_value: U256,
}

/// Create scheme, distinguishing a legacy `CREATE` (address derived from
/// sender and nonce) from a `CREATE2` (address derived from sender, salt
/// and init code hash).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CreateScheme {
    /// Legacy create scheme of `CREATE`.
    Legacy {
        /// Caller of the create.
        caller: H160,
    },
    /// Create scheme of `CREATE2`.
    Create2 {
        /// Caller of the create.
        caller: H160,
        /// Code hash.
        code_hash: H256,
        /// Salt.
        salt: H256,
    },
    /// Create at a fixed address, used by testing frameworks that do not
    /// wish to replicate address derivation.
    Fixed(H160),
}

/// Call scheme, distinguishing `CALL`, `CALLCODE`, `DELEGATECALL` and
/// `STATICCALL`. `Handler::call` receives this to decide how to wire up
/// `Context` and whether the call is static.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallScheme {
    /// `CALL` opcode.
    Call,
    /// `CALLCODE` opcode.
    CallCode,
    /// `DELEGATECALL` opcode.
    DelegateCall,
    /// `STATICCALL` opcode.
    StaticCall,
}
