//! Fluent construction of control-flow graphs.

use crate::{
    cfg::ControlFlowGraph,
    ir::{ArithOp, Comparison, Instruction, Literal, Operand, RelOp, ValueType},
    Error, Result,
};

/// Conversion into an [`Operand`] for the builder's instruction helpers.
///
/// Numbers become literals and bare strings become variable references; use
/// [`Operand::str`] for a string literal.
pub trait IntoOperand {
    /// Performs the conversion.
    fn into_operand(self) -> Operand;
}

impl IntoOperand for Operand {
    fn into_operand(self) -> Operand {
        self
    }
}

impl IntoOperand for Literal {
    fn into_operand(self) -> Operand {
        Operand::Literal(self)
    }
}

impl IntoOperand for f64 {
    fn into_operand(self) -> Operand {
        Operand::num(self)
    }
}

impl IntoOperand for &str {
    fn into_operand(self) -> Operand {
        Operand::var(self)
    }
}

impl IntoOperand for String {
    fn into_operand(self) -> Operand {
        Operand::Var(self)
    }
}

#[derive(Debug)]
struct FunctionDraft {
    name: String,
    params: Vec<(String, ValueType)>,
    return_type: Option<ValueType>,
}

#[derive(Debug)]
struct CallDraft {
    function: String,
    return_to: String,
    saved: usize,
}

#[derive(Debug)]
struct BlockDraft {
    name: String,
    function: Option<usize>,
    is_exit: bool,
    line: Option<usize>,
    instructions: Vec<Instruction>,
    call: Option<CallDraft>,
}

/// Builder for [`ControlFlowGraph`]s, mostly used by tests and benchmarks in
/// place of a source-language front end.
///
/// Blocks are opened with [`block`](Self::block); instruction helpers append
/// to the open block. Blocks opened after [`function`](Self::function) belong
/// to that function, and its first block pops the parameters. Calls follow the
/// crate's calling convention and are wired up in [`build`](Self::build), so a
/// function may be called before it is defined.
///
/// # Examples
///
/// ```rust
/// use flowcheck::cfg::ProgramBuilder;
/// use flowcheck::ir::{ArithOp, RelOp, ValueType};
///
/// let cfg = ProgramBuilder::new()
///     .block("entry")
///     .declare("i", ValueType::Double)
///     .assign("i", 0.0)
///     .jump("head")
///     .block("head")
///     .branch("i", RelOp::Lt, 10.0, "body", "done")
///     .block("body")
///     .eval("i", "i", ArithOp::Add, 1.0)
///     .jump("head")
///     .block("done")
///     .end()
///     .build()?;
///
/// assert_eq!(cfg.len(), 4);
/// # Ok::<(), flowcheck::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    functions: Vec<FunctionDraft>,
    blocks: Vec<BlockDraft>,
    current_function: Option<usize>,
    last: Option<usize>,
    error: Option<Error>,
}

impl ProgramBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn open(&mut self, name: &str, is_exit: bool) {
        if is_exit && self.current_function.is_none() {
            self.fail(Error::ReturnOutsideFunction(name.to_string()));
        }
        let mut instructions = Vec::new();
        if let Some(f) = self.current_function {
            let is_entry = !self.blocks.iter().any(|b| b.function == Some(f));
            if is_entry {
                instructions.extend(self.functions[f].params.iter().rev().map(|(p, _)| {
                    Instruction::Pop {
                        target: Some(p.clone()),
                    }
                }));
            }
        }
        self.blocks.push(BlockDraft {
            name: name.to_string(),
            function: self.current_function,
            is_exit,
            line: None,
            instructions,
            call: None,
        });
    }

    /// Opens a new block.
    #[must_use]
    pub fn block(mut self, name: &str) -> Self {
        self.open(name, false);
        self
    }

    /// Opens the exit block of the current function.
    #[must_use]
    pub fn exit_block(mut self, name: &str) -> Self {
        self.open(name, true);
        self
    }

    /// Starts a function; the blocks opened next belong to it.
    #[must_use]
    pub fn function(
        mut self,
        name: &str,
        params: &[(&str, ValueType)],
        return_type: Option<ValueType>,
    ) -> Self {
        self.functions.push(FunctionDraft {
            name: name.to_string(),
            params: params.iter().map(|(p, t)| ((*p).to_string(), *t)).collect(),
            return_type,
        });
        self.current_function = Some(self.functions.len() - 1);
        self
    }

    /// Returns to the main program; the blocks opened next belong to no
    /// function.
    #[must_use]
    pub fn main(mut self) -> Self {
        self.current_function = None;
        self
    }

    /// Records the source line of the open block.
    #[must_use]
    pub fn line(mut self, line: usize) -> Self {
        if let Some(block) = self.blocks.last_mut() {
            block.line = Some(line);
        }
        self
    }

    /// Appends an arbitrary instruction to the open block.
    #[must_use]
    pub fn instr(mut self, instruction: Instruction) -> Self {
        match self.blocks.last_mut() {
            Some(block) => block.instructions.push(instruction),
            None => self.fail(Error::MalformedBlock {
                block: String::new(),
                message: format!("'{instruction}' outside of any block"),
            }),
        }
        self
    }

    /// `ty name`
    #[must_use]
    pub fn declare(self, name: &str, ty: ValueType) -> Self {
        self.instr(Instruction::Declare {
            name: name.to_string(),
            ty,
        })
    }

    /// `target = value`
    #[must_use]
    pub fn assign(self, target: &str, value: impl IntoOperand) -> Self {
        self.instr(Instruction::Assign {
            target: target.to_string(),
            value: value.into_operand(),
        })
    }

    /// `target = lhs op rhs`
    #[must_use]
    pub fn eval(
        self,
        target: &str,
        lhs: impl IntoOperand,
        op: ArithOp,
        rhs: impl IntoOperand,
    ) -> Self {
        self.instr(Instruction::Evaluate {
            target: target.to_string(),
            op,
            lhs: lhs.into_operand(),
            rhs: rhs.into_operand(),
        })
    }

    /// `print value`
    #[must_use]
    pub fn print(self, value: impl IntoOperand) -> Self {
        self.instr(Instruction::Print(value.into_operand()))
    }

    /// `input target`
    #[must_use]
    pub fn input(self, target: &str) -> Self {
        self.instr(Instruction::Input {
            target: target.to_string(),
        })
    }

    /// `push value`
    #[must_use]
    pub fn push(self, value: impl IntoOperand) -> Self {
        self.instr(Instruction::Push(value.into_operand()))
    }

    /// `pushstate block`
    #[must_use]
    pub fn push_state(self, block: &str) -> Self {
        self.instr(Instruction::PushState(block.to_string()))
    }

    /// `pop target`
    #[must_use]
    pub fn pop(self, target: &str) -> Self {
        self.instr(Instruction::Pop {
            target: Some(target.to_string()),
        })
    }

    /// `pop`, discarding the value
    #[must_use]
    pub fn pop_discard(self) -> Self {
        self.instr(Instruction::Pop { target: None })
    }

    /// `ty name[size]`
    #[must_use]
    pub fn array(self, name: &str, ty: ValueType, size: impl IntoOperand) -> Self {
        self.instr(Instruction::DeclareArray {
            name: name.to_string(),
            ty,
            size: size.into_operand(),
        })
    }

    /// `target = array[index]`
    #[must_use]
    pub fn array_read(self, target: &str, array: &str, index: impl IntoOperand) -> Self {
        self.instr(Instruction::ArrayRead {
            target: target.to_string(),
            array: array.to_string(),
            index: index.into_operand(),
        })
    }

    /// `array[index] = value`
    #[must_use]
    pub fn array_write(
        self,
        array: &str,
        index: impl IntoOperand,
        value: impl IntoOperand,
    ) -> Self {
        self.instr(Instruction::ArrayWrite {
            array: array.to_string(),
            index: index.into_operand(),
            value: value.into_operand(),
        })
    }

    /// `jump target`
    #[must_use]
    pub fn jump(self, target: &str) -> Self {
        self.instr(Instruction::Jump(target.to_string()))
    }

    /// `jumpif lhs op rhs on_true` followed by `jump on_false`
    #[must_use]
    pub fn branch(
        self,
        lhs: impl IntoOperand,
        op: RelOp,
        rhs: impl IntoOperand,
        on_true: &str,
        on_false: &str,
    ) -> Self {
        self.instr(Instruction::JumpIf {
            comparison: Comparison::new(lhs.into_operand(), op, rhs.into_operand()),
            target: on_true.to_string(),
        })
        .jump(on_false)
    }

    /// Shorthand for `branch(var, RelOp::Lt, value, on_true, on_false)`.
    #[must_use]
    pub fn branch_lt(self, var: &str, value: f64, on_true: &str, on_false: &str) -> Self {
        self.branch(var, RelOp::Lt, value, on_true, on_false)
    }

    /// `return value`
    #[must_use]
    pub fn ret(self, value: impl IntoOperand) -> Self {
        self.instr(Instruction::Return(Some(value.into_operand())))
    }

    /// `return`
    #[must_use]
    pub fn ret_void(self) -> Self {
        self.instr(Instruction::Return(None))
    }

    /// Lowers a call of `function` at the end of the open block.
    ///
    /// The block pushes the `saved` locals, the return-site marker for
    /// `return_to` and the arguments, then jumps to the callee's entry. The
    /// `return_to` block is expected to pop the result (if any) and the saved
    /// locals in reverse order.
    #[must_use]
    pub fn call(
        mut self,
        function: &str,
        saved: &[&str],
        args: &[Operand],
        return_to: &str,
    ) -> Self {
        for var in saved {
            self = self.push(*var);
        }
        self = self.push_state(return_to);
        for arg in args {
            self = self.push(arg.clone());
        }
        match self.blocks.last_mut() {
            Some(block) => {
                block.call = Some(CallDraft {
                    function: function.to_string(),
                    return_to: return_to.to_string(),
                    saved: saved.len(),
                });
            }
            None => self.fail(Error::UnknownFunction(function.to_string())),
        }
        self
    }

    /// Marks the open block as the program's final block.
    #[must_use]
    pub fn end(mut self) -> Self {
        if !self.blocks.is_empty() {
            self.last = Some(self.blocks.len() - 1);
        }
        self
    }

    /// Creates the graph.
    ///
    /// # Errors
    ///
    /// The first error raised while building: duplicate block names,
    /// malformed control suffixes, calls of unknown functions, `return`
    /// outside a function.
    pub fn build(self) -> Result<ControlFlowGraph> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut cfg = ControlFlowGraph::new();
        let fids: Vec<_> = self
            .functions
            .iter()
            .map(|f| cfg.add_function(&f.name, f.params.clone(), f.return_type))
            .collect();

        let mut ids = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let function = block.function.map(|f| fids[f]);
            let id = cfg.create_node(&block.name, false, block.is_exit, function)?;
            if let Some(line) = block.line {
                cfg.set_line(id, line)?;
            }
            ids.push(id);
        }

        let mut entries = vec![None; fids.len()];
        for (block, &id) in self.blocks.iter().zip(&ids) {
            if let Some(f) = block.function {
                if entries[f].is_none() {
                    entries[f] = Some((block.name.clone(), id));
                    cfg.set_function_entry(fids[f], id)?;
                }
            }
        }

        let mut calls = Vec::new();
        for (block, &id) in self.blocks.into_iter().zip(&ids) {
            let mut instructions = block.instructions;
            if let Some(call) = block.call {
                let f = self
                    .functions
                    .iter()
                    .position(|f| f.name == call.function)
                    .ok_or_else(|| Error::UnknownFunction(call.function.clone()))?;
                let (entry, _) = entries[f]
                    .clone()
                    .ok_or_else(|| Error::UnknownFunction(call.function.clone()))?;
                instructions.push(Instruction::Jump(entry));
                calls.push((fids[f], id, call.return_to, call.saved));
            }
            cfg.set_instructions(id, instructions)?;
        }

        for (function, caller, return_to, saved) in calls {
            let return_to = cfg
                .node_id(&return_to)
                .ok_or(Error::UnknownNode(return_to))?;
            cfg.register_call(function, caller, return_to, saved)?;
        }

        if let Some(last) = self.last {
            cfg.set_last(ids[last])?;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::Terminator;

    #[test]
    fn test_build_loop() -> Result<()> {
        let cfg = ProgramBuilder::new()
            .block("entry")
            .assign("i", 0.0)
            .jump("head")
            .block("head")
            .branch_lt("i", 10.0, "body", "done")
            .block("body")
            .eval("i", "i", ArithOp::Add, 1.0)
            .jump("head")
            .block("done")
            .end()
            .build()?;

        let head = cfg.node_id("head").ok_or(Error::UnknownNode("head".into()))?;
        assert_eq!(cfg.predecessors(head).len(), 2);
        assert_eq!(cfg.last(), cfg.node_id("done"));
        assert_eq!(cfg.first(), cfg.node_id("entry"));
        Ok(())
    }

    #[test]
    fn test_call_lowering() -> Result<()> {
        let cfg = ProgramBuilder::new()
            .block("main")
            .assign("x", 4.0)
            .call("sq", &["x"], &[Operand::var("x")], "resume")
            .block("resume")
            .pop("r")
            .pop("x")
            .end()
            .function("sq", &[("n", ValueType::Double)], Some(ValueType::Double))
            .exit_block("sq_exit")
            .eval("n", "n", ArithOp::Mul, "n")
            .ret("n")
            .build()?;

        let main = cfg.node_id("main").ok_or(Error::UnknownNode("main".into()))?;
        let exit = cfg.node_id("sq_exit").ok_or(Error::UnknownNode("sq_exit".into()))?;
        let listing: Vec<String> = cfg.listing(main).iter().map(ToString::to_string).collect();
        assert_eq!(
            listing,
            vec!["x = 4", "push x", "pushstate resume", "push x", "jump sq_exit"]
        );
        assert_eq!(
            cfg.node(exit).map(|n| n.instructions()[0].to_string()),
            Some("pop n".to_string())
        );
        assert!(matches!(
            cfg.node(exit).map(|n| n.terminator()),
            Some(Terminator::Return(Some(_)))
        ));
        assert_eq!(cfg.call_at(main).map(|(_, c)| c.saved_variables), Some(1));
        Ok(())
    }

    #[test]
    fn test_duplicate_block() {
        let result = ProgramBuilder::new().block("a").block("a").build();
        assert_eq!(result.err(), Some(Error::NodeExists("a".into())));
    }

    #[test]
    fn test_unknown_function() {
        let result = ProgramBuilder::new()
            .block("a")
            .call("missing", &[], &[], "b")
            .block("b")
            .build();
        assert_eq!(result.err(), Some(Error::UnknownFunction("missing".into())));
    }
}
