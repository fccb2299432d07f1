//! Error types of the crate.
//!
//! [`Error`] covers misuse of the graph API and broken internal invariants.
//! Errors of the analysed program are [`ProgramError`]s, wrapped in
//! [`Error::Program`]; the symbolic engine records them as events and only
//! abandons the current path.

use thiserror::Error;

use crate::ir::ValueType;

macro_rules! internal_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Internal {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Internal {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors fall into three groups with very different handling expectations:
///
/// # Error Categories
///
/// ## Structural / API misuse
/// - [`Error::NodeExists`] - A node with the requested name is already present
/// - [`Error::UnknownNode`] - A node id or name does not resolve to a live node
/// - [`Error::BlockClosed`] - An instruction was appended after the block's control suffix
/// - [`Error::MalformedBlock`] - The control suffix of a block is not well formed
/// - [`Error::AmbiguousExit`] - An exit node with several predecessors was removed
/// - [`Error::ReturnOutsideFunction`] - A `return` appeared in a block owned by no function
/// - [`Error::UnknownFunction`] - A function id does not resolve
///
/// These propagate immediately and stop the run.
///
/// ## User program errors
/// - [`Error::Program`] - The analysed program is wrong (see [`ProgramError`])
///
/// The symbolic engine turns these into error diagnostics and only aborts the
/// path that triggered them; see [`Error::is_recoverable`].
///
/// ## Internal invariant violations
/// - [`Error::NotLaminar`] - Loop bodies overlap without nesting
/// - [`Error::Internal`] - Any other broken invariant, tagged with its source location
///
/// A caller is never expected to recover from these; they indicate a bug in
/// this crate rather than in the analysed program.
///
/// # Examples
///
/// ```rust
/// use flowcheck::{Error, cfg::ControlFlowGraph};
///
/// let mut cfg = ControlFlowGraph::new();
/// cfg.create_node("entry", false, false, None)?;
///
/// match cfg.create_node("entry", false, false, None) {
///     Err(Error::NodeExists(name)) => assert_eq!(name, "entry"),
///     other => panic!("unexpected result: {other:?}"),
/// }
/// # Ok::<(), flowcheck::Error>(())
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A node with this name already exists and overwriting was not requested.
    #[error("node '{0}' already exists")]
    NodeExists(String),

    /// The referenced node does not exist (or has been removed).
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    /// The block already ends in a jump or return; nothing may follow it.
    #[error("block '{0}' is already closed by a control instruction")]
    BlockClosed(String),

    /// The block's control suffix is not one of `jump`, `return` or
    /// `jumpif` followed by `jump`.
    #[error("malformed block '{block}': {message}")]
    MalformedBlock {
        /// Name of the offending block
        block: String,
        /// What is wrong with it
        message: String,
    },

    /// Removing an exit node is only possible when a unique predecessor can
    /// take over its role.
    #[error("cannot remove exit node '{0}': it has more than one predecessor")]
    AmbiguousExit(String),

    /// A `return` was placed in a block that belongs to no function.
    #[error("return in block '{0}' which does not belong to a function")]
    ReturnOutsideFunction(String),

    /// The function id does not resolve.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// The analysed program is wrong. Recoverable: the affected path is
    /// abandoned and the error is reported as a diagnostic.
    #[error(transparent)]
    Program(#[from] ProgramError),

    /// Two loop bodies share nodes without one containing the other.
    ///
    /// Natural loops of a reducible graph always nest; seeing this means the
    /// loop finder was fed inconsistent data.
    #[error("loop bodies of '{outer}' and '{inner}' overlap without nesting (not laminar)")]
    NotLaminar {
        /// Header of the loop sorted first
        outer: String,
        /// Header of the partially overlapping loop
        inner: String,
    },

    /// An internal invariant was violated.
    ///
    /// The error includes the source location where the violation was detected
    /// for debugging purposes.
    #[error("internal error: {message} ({file}:{line})")]
    Internal {
        /// The message to be printed for the internal error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}

impl Error {
    /// Returns `true` for errors that only invalidate the current path of the
    /// analysed program.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Program(_))
    }

    /// Returns `true` for errors that signal a bug in this crate.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal { .. } | Error::NotLaminar { .. })
    }
}

/// Errors in the analysed program detected during simplification or symbolic
/// execution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgramError {
    /// Operands of a comparison or arithmetic operation have different types,
    /// or the operation is not defined for the type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Division by a value that is always zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Modulo by a value that is always zero.
    #[error("modulo by zero")]
    ModuloByZero,

    /// Every possible index lies outside the array.
    #[error("index {index} is out of bounds for array '{array}' of size {size}")]
    OutOfBounds {
        /// Array name
        array: String,
        /// Rendered index range
        index: String,
        /// Declared size
        size: String,
    },

    /// The index can never be an integer.
    #[error("index {index} into array '{array}' is not an integer")]
    NonIntegralIndex {
        /// Array name
        array: String,
        /// Rendered index range
        index: String,
    },

    /// Use of an identifier that was never declared on this path.
    #[error("use of undeclared identifier '{0}'")]
    Undeclared(String),

    /// Control reached a block that was referenced but never defined.
    #[error("jump to undeclared state '{0}'")]
    UndeclaredState(String),

    /// The value assigned does not match the declared type of the target.
    #[error("cannot assign a {found} value to '{name}' of type {expected}")]
    AssignmentMismatch {
        /// Target variable
        name: String,
        /// Declared type
        expected: ValueType,
        /// Type of the assigned value
        found: ValueType,
    },

    /// An array was declared with a size that cannot be a positive integer.
    #[error("invalid size {size} for array '{array}'")]
    InvalidArraySize {
        /// Array name
        array: String,
        /// Rendered size
        size: String,
    },
}
