//! Function metadata used to resolve interprocedural edges.

use std::fmt;

use crate::{ir::ValueType, utils::graph::NodeId};

/// Index of a function in the graph's function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub(crate) usize);

impl FunctionId {
    /// Returns the raw table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// One call of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    /// Block that performs the call (jumps to the function entry).
    pub caller: NodeId,
    /// Block at which execution resumes after the return.
    pub return_to: NodeId,
    /// Number of caller locals pushed before the call and popped after it.
    pub saved_variables: usize,
}

/// Signature and layout of a function.
#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    /// Function name
    pub name: String,
    /// Parameters in declaration order
    pub params: Vec<(String, ValueType)>,
    /// Return type, `None` for procedures
    pub return_type: Option<ValueType>,
    /// Entry block
    pub first: Option<NodeId>,
    /// Exit block (ends in `return`)
    pub exit: Option<NodeId>,
    /// Registered calls
    pub calls: Vec<FunctionCall>,
}

impl FunctionSymbol {
    pub(crate) fn new(
        name: &str,
        params: Vec<(String, ValueType)>,
        return_type: Option<ValueType>,
    ) -> Self {
        Self {
            name: name.to_string(),
            params,
            return_type,
            first: None,
            exit: None,
            calls: Vec::new(),
        }
    }

    /// Blocks execution may resume at after this function returns.
    pub fn return_sites(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.calls.iter().map(|c| c.return_to)
    }

    /// The call record whose caller is `node`, if any.
    #[must_use]
    pub fn call_from(&self, node: NodeId) -> Option<&FunctionCall> {
        self.calls.iter().find(|c| c.caller == node)
    }
}

impl fmt::Display for FunctionSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(name, ty)| format!("{ty} {name}"))
            .collect();
        match self.return_type {
            Some(ty) => write!(f, "{ty} {}({})", self.name, params.join(", ")),
            None => write!(f, "void {}({})", self.name, params.join(", ")),
        }
    }
}
