//! Instruction set shared with the front end.
//!
//! The front end lowers source programs into blocks of [`Instruction`]s over
//! two scalar domains ([`ValueType::Double`] and [`ValueType::String`]) plus
//! flat arrays. Everything in this module is plain data with a textual
//! [`Display`](std::fmt::Display) form; the graph model and the analyses give
//! it meaning.
//!
//! # Calling convention
//!
//! A call site pushes every live local (`push x`), then a return-site marker
//! (`pushstate resume`), then the arguments, and finally jumps to the callee's
//! entry block. The callee pops its parameters. Its exit block ends in
//! `return v`, which removes the marker and leaves `v` on the stack for the
//! return site to `pop`, after which the saved locals are popped back in
//! reverse order.

mod instruction;
mod ops;
mod value;

pub use instruction::Instruction;
pub use ops::{ArithOp, Comparison, RelOp};
pub use value::{Literal, Operand, ValueType};
