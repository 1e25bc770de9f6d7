use alloc::borrow::Cow;
use alloc::vec::Vec;

/// Capture represents the result of execution: either a finished `Exit`, or
/// a `Trap` that must be resolved by a higher layer (the runtime crate,
/// which has access to the `Handler`) before execution may continue.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Capture<E, T> {
    /// The machine has exited, with the given reason.
    Exit(E),
    /// The machine has trapped. The caller is responsible for driving
    /// execution forward and feeding the result back in.
    Trap(T),
}

impl<E, T> Capture<E, T> {
    /// Map over the exit variant.
    pub fn map_exit<E2>(self, f: impl FnOnce(E) -> E2) -> Capture<E2, T> {
        match self {
            Capture::Exit(e) => Capture::Exit(f(e)),
            Capture::Trap(t) => Capture::Trap(t),
        }
    }
}

/// A trap is a deferred request to evaluate an opcode that needs a `Handler`.
/// `evm-core`'s own evaluator never trips one of these -- they can only come
/// from `evm-runtime`'s opcode table, but the type itself lives here so
/// `Machine::step` can return `Capture<ExitReason, Trap>` without depending
/// on the runtime crate.
pub type Trap = crate::opcode::Opcode;

/// Exit reason.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExitReason {
    /// Machine has succeeded executing.
    Succeed(ExitSucceed),
    /// Machine encountered an explicit revert.
    Revert(ExitRevert),
    /// Machine encountered an error that it can continue from (but the
    /// current call frame must stop).
    Error(ExitError),
    /// Machine encountered a fatal error that cannot be recovered from at
    /// any depth.
    Fatal(ExitFatal),
}

impl ExitReason {
    /// Whether the exit is succeeded.
    pub fn is_succeed(&self) -> bool {
        matches!(self, Self::Succeed(_))
    }
}

/// Exit succeed reason.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExitSucceed {
    /// Machine encountered an explicit stop.
    Stopped,
    /// Machine encountered an explicit return.
    Returned,
    /// Machine encountered an explicit suicide.
    Suicided,
}

impl From<ExitSucceed> for ExitReason {
    fn from(s: ExitSucceed) -> Self {
        Self::Succeed(s)
    }
}

/// Exit revert reason.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExitRevert {
    /// Machine encountered an explicit revert.
    Reverted,
}

impl From<ExitRevert> for ExitReason {
    fn from(s: ExitRevert) -> Self {
        Self::Revert(s)
    }
}

/// Exit error reason.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExitError {
    /// Trying to pop from an empty stack.
    StackUnderflow,
    /// Trying to push into a stack over stack limit.
    StackOverflow,
    /// Jump destination is invalid.
    InvalidJump,
    /// An opcode accesses memory region, but the region is invalid.
    InvalidRange,
    /// Encountered the designated invalid opcode.
    DesignatedInvalid,
    /// Called `CALL` opcode with a call stack that is too deep.
    CallTooDeep,
    /// Create opcode encountered collision (with an existing account).
    CreateCollision,
    /// Create init code exceeds limit.
    CreateContractLimit,
    /// An opcode accepts input that is too large.
    InvalidCode(crate::opcode::Opcode),
    /// An opcode accesses a memory or return-data region out of its bounds.
    OutOfOffset,
    /// The opcode byte is not assigned in the current fork's table.
    OpcodeNotFound,
    /// Out of gas.
    OutOfGas,
    /// Out of fund.
    OutOfFund,
    /// PC underflow (unused).
    PCUnderflow,
    /// Attempt to create an empty account (runtime, reserved).
    CreateEmpty,
    /// Other normal errors.
    Other(Cow<'static, str>),
    /// Attempted to modify state in a static context.
    StaticModeViolation,
}

impl From<ExitError> for ExitReason {
    fn from(s: ExitError) -> Self {
        Self::Error(s)
    }
}

/// Exit fatal reason.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExitFatal {
    /// The operation is not supported.
    NotSupported,
    /// The trap (interrupt) is unhandled.
    UnhandledInterrupt,
    /// The environment explicitly set call errors as fatal error.
    CallErrorAsFatal(ExitError),
    /// Out of memory while allocating (tracked resource, not the host
    /// process's own heap).
    OutOfMemory,
    /// Other fatal errors.
    Other(Cow<'static, str>),
}

impl From<ExitFatal> for ExitReason {
    fn from(s: ExitFatal) -> Self {
        Self::Fatal(s)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ExitError {}

#[cfg(feature = "std")]
impl core::fmt::Display for ExitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ExitFatal {}

#[cfg(feature = "std")]
impl core::fmt::Display for ExitFatal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

/// A stable, machine-readable status code. Mirrors `ExitReason` but as a
/// single flat integer so it can cross an FFI/serialization boundary
/// unambiguously (see the `EVMExecutionStatusCode` table the spec pins).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(i8)]
pub enum StatusCode {
    Success = 0,
    Failure = 1,
    Revert = 2,
    OutOfGas = 3,
    InvalidInstruction = 4,
    UndefinedInstruction = 5,
    StackOverflow = 6,
    StackUnderflow = 7,
    BadJumpDestination = 8,
    InvalidMemoryAccess = 9,
    CallDepthExceeded = 10,
    StaticModeViolation = 11,
    PrecompileFailure = 12,
    ContractValidationFailure = 13,
    ArgumentOutOfRange = 14,
    Halted = 17,
    InternalError = -1,
    Rejected = -2,
    OutOfMemory = -3,
}

impl From<&ExitReason> for StatusCode {
    fn from(reason: &ExitReason) -> Self {
        match reason {
            ExitReason::Succeed(_) => StatusCode::Success,
            ExitReason::Revert(_) => StatusCode::Revert,
            ExitReason::Error(ExitError::OutOfGas) => StatusCode::OutOfGas,
            ExitReason::Error(ExitError::DesignatedInvalid) => StatusCode::InvalidInstruction,
            ExitReason::Error(ExitError::StackOverflow) => StatusCode::StackOverflow,
            ExitReason::Error(ExitError::StackUnderflow) => StatusCode::StackUnderflow,
            ExitReason::Error(ExitError::InvalidJump) => StatusCode::BadJumpDestination,
            ExitReason::Error(ExitError::InvalidRange) | ExitReason::Error(ExitError::OutOfOffset) => {
                StatusCode::InvalidMemoryAccess
            }
            ExitReason::Error(ExitError::CallTooDeep) => StatusCode::CallDepthExceeded,
            ExitReason::Error(ExitError::StaticModeViolation) => StatusCode::StaticModeViolation,
            ExitReason::Error(ExitError::CreateCollision)
            | ExitReason::Error(ExitError::CreateContractLimit)
            | ExitReason::Error(ExitError::CreateEmpty) => StatusCode::ContractValidationFailure,
            ExitReason::Error(ExitError::InvalidCode(_)) => StatusCode::ArgumentOutOfRange,
            ExitReason::Error(ExitError::OpcodeNotFound) => StatusCode::UndefinedInstruction,
            ExitReason::Error(_) => StatusCode::Failure,
            ExitReason::Fatal(ExitFatal::OutOfMemory) => StatusCode::OutOfMemory,
            ExitReason::Fatal(ExitFatal::NotSupported) => StatusCode::PrecompileFailure,
            ExitReason::Fatal(_) => StatusCode::InternalError,
        }
    }
}

/// Output produced alongside a `Capture::Exit(ExitReason)`, kept distinct
/// from the reason so callers aren't tempted to allocate for the common
/// empty-output case.
pub type Output = Vec<u8>;
