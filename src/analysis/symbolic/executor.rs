//! Transfer functions: the effect of one instruction on a [`Fringe`].
//!
//! User-program errors come back as [`Error::Program`] and abort only the
//! path being executed; warnings go to the [`EventLog`] once per block and
//! message. Stack misuse that the front end can never produce (popping an
//! empty stack, popping a return marker into a variable) is an internal
//! error.

use crate::{
    analysis::symbolic::{
        Fringe, Interval, Monotonicity, StackEntry, SymbolicArray, SymbolicValue,
        SymbolicVariable,
    },
    cfg::{CfgNode, ControlFlowGraph},
    compiler::{EventKind, EventLog},
    error::ProgramError,
    ir::{ArithOp, Instruction, Literal, Operand, RelOp, ValueType},
    Result,
};

/// Executes the straight-line part of one block.
pub struct Executor<'a> {
    cfg: &'a ControlFlowGraph,
    events: &'a EventLog,
    node: &'a str,
    line: Option<usize>,
    quiet: bool,
}

impl<'a> Executor<'a> {
    /// Creates an executor for the instructions of `node`.
    #[must_use]
    pub fn new(cfg: &'a ControlFlowGraph, events: &'a EventLog, node: &'a CfgNode) -> Self {
        Self {
            cfg,
            events,
            node: node.name(),
            line: node.line(),
            quiet: false,
        }
    }

    /// Suppresses warnings. Used when re-executing blocks whose diagnostics
    /// were already reported.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    fn warn(&self, message: String) {
        if !self.quiet {
            self.events
                .record_once(EventKind::Warning, self.node, self.line, message);
        }
    }

    /// Runs every instruction of the block.
    ///
    /// # Errors
    ///
    /// See [`Executor::execute`].
    pub fn run(&self, fringe: &mut Fringe, instructions: &[Instruction]) -> Result<()> {
        for instr in instructions {
            self.execute(fringe, instr)?;
        }
        Ok(())
    }

    /// Reads an operand.
    ///
    /// # Errors
    ///
    /// [`ProgramError::Undeclared`] for an unknown variable.
    pub fn operand(&self, fringe: &Fringe, op: &Operand) -> Result<SymbolicValue> {
        match op {
            Operand::Literal(lit) => Ok(SymbolicValue::from(lit)),
            Operand::Var(name) => {
                let var = fringe
                    .var(name)
                    .ok_or_else(|| ProgramError::Undeclared(name.clone()))?;
                if !var.defined {
                    self.warn(format!("'{name}' may be used before initialization"));
                }
                Ok(var.value.clone())
            }
        }
    }

    fn index(&self, fringe: &Fringe, op: &Operand) -> Result<Interval<f64>> {
        match self.operand(fringe, op)? {
            SymbolicValue::Double(i) => Ok(i),
            SymbolicValue::String(_) => {
                Err(ProgramError::TypeMismatch(format!("index '{op}' is not a double")).into())
            }
        }
    }

    /// Writes `value` to `target`, declaring it on first use.
    fn assign(
        &self,
        fringe: &mut Fringe,
        target: &str,
        value: SymbolicValue,
        change: Monotonicity,
    ) -> Result<()> {
        let found = value.value_type();
        match fringe.var_mut(target) {
            Some(var) if var.ty != found => Err(ProgramError::AssignmentMismatch {
                name: target.to_string(),
                expected: var.ty,
                found,
            }
            .into()),
            Some(var) => {
                var.write(value, change);
                Ok(())
            }
            None => {
                let mut var = SymbolicVariable::declared(found);
                var.write(value, change);
                fringe.vars.insert(target, var);
                Ok(())
            }
        }
    }

    /// Applies one instruction.
    ///
    /// # Errors
    ///
    /// [`Error::Program`](crate::Error::Program) for errors in the analysed
    /// program; internal errors for stack misuse and for control
    /// instructions, which never appear in a block body.
    pub fn execute(&self, fringe: &mut Fringe, instr: &Instruction) -> Result<()> {
        match instr {
            Instruction::Declare { name, ty } => {
                fringe.vars.insert(name, SymbolicVariable::declared(*ty));
            }
            Instruction::Assign { target, value } => {
                if value.as_var() == Some(target.as_str()) {
                    self.warn(format!("useless assignment '{instr}'"));
                    let current = self.operand(fringe, value)?;
                    return self.assign(fringe, target, current, Monotonicity::None);
                }
                let new = self.operand(fringe, value)?;
                let change = match fringe.var(target) {
                    Some(old) if old.defined && old.value.is_determinate() && old.value == new => {
                        Monotonicity::None
                    }
                    _ => Monotonicity::Unknown,
                };
                self.assign(fringe, target, new, change)?;
                if let Some(source) = value.as_var() {
                    fringe.vars.relate(target, RelOp::Eq, source);
                }
            }
            Instruction::Evaluate {
                target,
                op,
                lhs,
                rhs,
            } => {
                let a = self.operand(fringe, lhs)?;
                let b = self.operand(fringe, rhs)?;
                if is_useless(*op, lhs, rhs) {
                    self.warn(format!("useless operation '{instr}'"));
                }
                if matches!(op, ArithOp::Div | ArithOp::Mod)
                    && b.as_double().is_some_and(|d| d.contains_zero() && !d.is_determinate())
                {
                    self.warn(format!("possible division by zero in '{instr}'"));
                }
                let result = a.apply(*op, &b)?;
                let change = if lhs.as_var() == Some(target.as_str()) {
                    Monotonicity::of_step(*op, &a, &b)
                } else if rhs.as_var() == Some(target.as_str())
                    && matches!(op, ArithOp::Add | ArithOp::Mul)
                {
                    Monotonicity::of_step(*op, &b, &a)
                } else {
                    Monotonicity::Unknown
                };
                self.assign(fringe, target, result, change)?;
            }
            Instruction::Print(op) => {
                self.operand(fringe, op)?;
            }
            Instruction::Input { target } => {
                let ty = fringe.var(target).map_or(ValueType::Double, |v| v.ty);
                self.assign(fringe, target, SymbolicValue::full(ty), Monotonicity::Unknown)?;
            }
            Instruction::Push(op) => {
                let entry = match op {
                    Operand::Var(name) => StackEntry::Value {
                        source: Some(name.clone()),
                        variable: fringe
                            .var(name)
                            .cloned()
                            .ok_or_else(|| ProgramError::Undeclared(name.clone()))?,
                    },
                    Operand::Literal(lit) => StackEntry::Value {
                        source: None,
                        variable: SymbolicVariable::with_value(SymbolicValue::from(lit)),
                    },
                };
                fringe.stack.push(entry);
            }
            Instruction::PushState(state) => {
                let target = self
                    .cfg
                    .node_id(state)
                    .ok_or_else(|| ProgramError::UndeclaredState(state.clone()))?;
                fringe.stack.push(StackEntry::State(target));
            }
            Instruction::Pop { target } => self.pop(fringe, target.as_deref())?,
            Instruction::DeclareArray { name, ty, size } => {
                let size = self.index(fringe, size)?;
                let array = SymbolicArray::declare(name, *ty, &size)?;
                if size.integer_range().is_some_and(|(lo, _)| lo < 1) {
                    self.warn(format!("possibly invalid array size {size} for '{name}'"));
                }
                fringe.arrays.insert(name.clone(), array);
            }
            Instruction::ArrayRead {
                target,
                array,
                index,
            } => {
                let at = self.index(fringe, index)?;
                let arr = fringe
                    .arrays
                    .get(array)
                    .ok_or_else(|| ProgramError::Undeclared(array.clone()))?;
                let range = arr.check_index(&at)?;
                if range.may_overflow {
                    self.warn(format!("index {at} may be out of bounds for '{array}'"));
                }
                let (value, defined) = arr.read(&range);
                if !defined {
                    self.warn(format!(
                        "element of '{array}' may be used before initialization"
                    ));
                }
                self.assign(fringe, target, value, Monotonicity::Unknown)?;
            }
            Instruction::ArrayWrite {
                array,
                index,
                value,
            } => {
                let at = self.index(fringe, index)?;
                let value = self.operand(fringe, value)?;
                let arr = fringe
                    .arrays
                    .get_mut(array)
                    .ok_or_else(|| ProgramError::Undeclared(array.clone()))?;
                if value.value_type() != arr.element_type() {
                    return Err(ProgramError::AssignmentMismatch {
                        name: array.clone(),
                        expected: arr.element_type(),
                        found: value.value_type(),
                    }
                    .into());
                }
                let range = arr.check_index(&at)?;
                arr.write(&range, &value);
                if range.may_overflow {
                    self.warn(format!("index {at} may be out of bounds for '{array}'"));
                }
            }
            Instruction::JumpIf { .. } | Instruction::Jump(_) | Instruction::Return(_) => {
                return Err(internal_error!(
                    "control instruction '{}' in the body of '{}'",
                    instr,
                    self.node
                ));
            }
        }
        Ok(())
    }

    fn pop(&self, fringe: &mut Fringe, target: Option<&str>) -> Result<()> {
        let entry = fringe.stack.pop().ok_or_else(|| {
            internal_error!("bad stack use: pop from an empty stack in '{}'", self.node)
        })?;
        let (source, variable) = match entry {
            StackEntry::Value { source, variable } => (source, variable),
            StackEntry::State(state) => {
                return Err(internal_error!(
                    "bad stack use: return marker {} popped as a value in '{}'",
                    state,
                    self.node
                ))
            }
        };
        let Some(target) = target else {
            return Ok(());
        };
        if source.as_deref() == Some(target) {
            fringe.vars.insert(target, variable);
            return Ok(());
        }
        let defined = variable.defined;
        self.assign(fringe, target, variable.value, Monotonicity::Unknown)?;
        if let Some(var) = fringe.var_mut(target) {
            var.defined = defined;
        }
        Ok(())
    }
}

/// `x + 0`, `0 + x`, `x - 0`, `x * 1`, `1 * x`, `x / 1`.
fn is_useless(op: ArithOp, lhs: &Operand, rhs: &Operand) -> bool {
    let is = |operand: &Operand, value: f64| {
        matches!(operand.as_literal(), Some(Literal::Double(v)) if *v == value)
    };
    match op {
        ArithOp::Add => is(lhs, 0.0) || is(rhs, 0.0),
        ArithOp::Sub => is(rhs, 0.0),
        ArithOp::Mul => is(lhs, 1.0) || is(rhs, 1.0),
        ArithOp::Div => is(rhs, 1.0),
        ArithOp::Mod => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cfg::ProgramBuilder, Error};

    fn setup() -> Result<ControlFlowGraph> {
        ProgramBuilder::new().block("main").line(3).end().build()
    }

    fn assign(target: &str, value: Operand) -> Instruction {
        Instruction::Assign {
            target: target.into(),
            value,
        }
    }

    fn eval(target: &str, lhs: Operand, op: ArithOp, rhs: Operand) -> Instruction {
        Instruction::Evaluate {
            target: target.into(),
            op,
            lhs,
            rhs,
        }
    }

    fn run_on(
        cfg: &ControlFlowGraph,
        events: &EventLog,
        mut fringe: Fringe,
        program: &[Instruction],
    ) -> Result<Fringe> {
        let node = cfg
            .first()
            .and_then(|id| cfg.node(id))
            .ok_or_else(|| internal_error!("no entry block"))?;
        Executor::new(cfg, events, node).run(&mut fringe, program)?;
        Ok(fringe)
    }

    fn run(cfg: &ControlFlowGraph, events: &EventLog, program: &[Instruction]) -> Result<Fringe> {
        run_on(cfg, events, Fringe::new(), program)
    }

    #[test]
    fn test_arithmetic_and_monotonicity() -> Result<()> {
        let cfg = setup()?;
        let events = EventLog::new();
        let fringe = run(
            &cfg,
            &events,
            &[
                assign("i", Operand::num(2.0)),
                eval("i", Operand::var("i"), ArithOp::Add, Operand::num(3.0)),
                eval("j", Operand::var("i"), ArithOp::Mul, Operand::num(2.0)),
            ],
        )?;
        assert_eq!(fringe.var("i").map(|v| v.value.clone()), Some(SymbolicValue::number(5.0)));
        assert_eq!(fringe.var("j").map(|v| v.value.clone()), Some(SymbolicValue::number(10.0)));
        assert!(events.is_empty());

        let restarted = run_on(
            &cfg,
            &events,
            fringe.restart(),
            &[eval("i", Operand::var("i"), ArithOp::Sub, Operand::num(1.0))],
        )?;
        assert_eq!(
            restarted.var("i").map(|v| v.monotonicity),
            Some(Monotonicity::Decreasing)
        );
        Ok(())
    }

    #[test]
    fn test_warnings() -> Result<()> {
        let cfg = setup()?;
        let events = EventLog::new();
        run(
            &cfg,
            &events,
            &[
                Instruction::Declare {
                    name: "x".into(),
                    ty: ValueType::Double,
                },
                Instruction::Print(Operand::var("x")),
                assign("x", Operand::var("x")),
                eval("x", Operand::var("x"), ArithOp::Add, Operand::num(0.0)),
                Instruction::Input { target: "y".into() },
                eval("z", Operand::num(1.0), ArithOp::Div, Operand::var("y")),
            ],
        )?;
        let messages: Vec<&str> = events.warnings().map(|e| e.message.as_str()).collect();
        assert!(messages.contains(&"'x' may be used before initialization"));
        assert!(messages.contains(&"useless assignment 'x = x'"));
        assert!(messages.iter().any(|m| m.starts_with("useless operation")));
        assert!(messages.iter().any(|m| m.starts_with("possible division by zero")));
        assert!(events.warnings().all(|e| e.line == Some(3)));
        Ok(())
    }

    #[test]
    fn test_program_errors() -> Result<()> {
        let cfg = setup()?;
        let events = EventLog::new();
        let undeclared = run(&cfg, &events, &[Instruction::Print(Operand::var("nope"))]);
        assert!(matches!(
            undeclared,
            Err(Error::Program(ProgramError::Undeclared(_)))
        ));

        let mismatch = run(
            &cfg,
            &events,
            &[
                assign("s", Operand::str("a")),
                assign("s", Operand::num(1.0)),
            ],
        );
        assert!(matches!(
            mismatch,
            Err(Error::Program(ProgramError::AssignmentMismatch { .. }))
        ));

        let div = run(
            &cfg,
            &events,
            &[eval("x", Operand::num(1.0), ArithOp::Div, Operand::num(0.0))],
        );
        assert!(matches!(div, Err(Error::Program(ProgramError::DivisionByZero))));

        let state = run(&cfg, &events, &[Instruction::PushState("nowhere".into())]);
        assert!(matches!(
            state,
            Err(Error::Program(ProgramError::UndeclaredState(_)))
        ));
        Ok(())
    }

    #[test]
    fn test_stack_round_trip() -> Result<()> {
        let cfg = setup()?;
        let events = EventLog::new();
        let fringe = run(
            &cfg,
            &events,
            &[
                assign("i", Operand::num(1.0)),
                Instruction::Push(Operand::var("i")),
                assign("i", Operand::num(9.0)),
                Instruction::Push(Operand::num(4.0)),
                Instruction::Pop {
                    target: Some("r".into()),
                },
                Instruction::Pop {
                    target: Some("i".into()),
                },
            ],
        )?;
        assert_eq!(fringe.var("i").map(|v| v.value.clone()), Some(SymbolicValue::number(1.0)));
        assert_eq!(fringe.var("r").map(|v| v.value.clone()), Some(SymbolicValue::number(4.0)));
        assert!(fringe.stack.is_empty());

        let empty = run(&cfg, &events, &[Instruction::Pop { target: None }]);
        assert!(empty.is_err_and(|e| e.is_internal()));

        let marker = run(
            &cfg,
            &events,
            &[
                Instruction::PushState("main".into()),
                Instruction::Pop {
                    target: Some("x".into()),
                },
            ],
        );
        assert!(marker.is_err_and(|e| e.is_internal()));
        Ok(())
    }

    #[test]
    fn test_array_bounds() -> Result<()> {
        let cfg = setup()?;
        let events = EventLog::new();
        let declare = Instruction::DeclareArray {
            name: "a".into(),
            ty: ValueType::Double,
            size: Operand::num(5.0),
        };
        let write_at = |index: Operand| Instruction::ArrayWrite {
            array: "a".into(),
            index,
            value: Operand::num(1.0),
        };

        let hard = run(&cfg, &events, &[declare.clone(), write_at(Operand::num(7.0))]);
        assert!(matches!(
            hard,
            Err(Error::Program(ProgramError::OutOfBounds { .. }))
        ));
        assert!(events.is_empty());

        let mut seeded = Fringe::new();
        seeded
            .vars
            .insert("k", SymbolicVariable::with_value(SymbolicValue::range(0.0, 6.0)));
        let fringe = run_on(
            &cfg,
            &events,
            seeded,
            &[
                declare,
                write_at(Operand::var("k")),
                Instruction::ArrayRead {
                    target: "v".into(),
                    array: "a".into(),
                    index: Operand::num(0.0),
                },
            ],
        )?;
        assert!(events
            .warnings()
            .any(|e| e.message == "index [0, 6] may be out of bounds for 'a'"));
        assert!(fringe.var("v").is_some());

        let control = run(&cfg, &events, &[Instruction::Jump("main".into())]);
        assert!(control.is_err_and(|e| e.is_internal()));
        Ok(())
    }

    #[test]
    fn test_array_size_may_be_invalid() -> Result<()> {
        let cfg = setup()?;
        let events = EventLog::new();
        let declare = |size: Operand| Instruction::DeclareArray {
            name: "a".into(),
            ty: ValueType::Double,
            size,
        };

        let mut seeded = Fringe::new();
        seeded
            .vars
            .insert("n", SymbolicVariable::with_value(SymbolicValue::range(-2.0, 4.0)));
        let fringe = run_on(&cfg, &events, seeded, &[declare(Operand::var("n"))])?;
        assert!(fringe.arrays.get("a").is_some());
        assert!(events
            .warnings()
            .any(|e| e.message == "possibly invalid array size [-2, 4] for 'a'"));

        let quiet = EventLog::new();
        run(&cfg, &quiet, &[declare(Operand::num(3.0))])?;
        assert!(quiet.is_empty());

        let never = run(&cfg, &quiet, &[declare(Operand::num(0.0))]);
        assert!(matches!(
            never,
            Err(Error::Program(ProgramError::InvalidArraySize { .. }))
        ));
        Ok(())
    }
}
