//! The control-flow graph arena.

use std::fmt::{self, Write};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    cfg::{CfgNode, FunctionCall, FunctionId, FunctionSymbol, Terminator},
    ir::{Comparison, Instruction, Operand, ValueType},
    utils::{
        escape_dot,
        graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors},
    },
    Error, Result,
};

/// Control suffix of an instruction list, before target names are resolved.
enum Suffix {
    None,
    Jump(String),
    Branch(Comparison, String, String),
    Return(Option<Operand>),
}

/// A control-flow graph of named basic blocks.
///
/// The graph exclusively owns its nodes in an arena of slots indexed by
/// [`NodeId`]; edges are ids resolved through the graph. Every mutation of an
/// edge goes through [`ControlFlowGraph::set_terminator`] (directly or via the
/// instruction-list setters), which is the single place where predecessor
/// back-references are kept symmetric with successor edges.
///
/// Besides local edges, a block ending in `return` has one edge to each
/// return site registered for its function with
/// [`register_call`](ControlFlowGraph::register_call).
///
/// # Examples
///
/// ```rust
/// use flowcheck::cfg::ControlFlowGraph;
/// use flowcheck::ir::{Instruction, Operand};
///
/// let mut cfg = ControlFlowGraph::new();
/// let entry = cfg.create_node("entry", false, false, None)?;
/// cfg.set_instructions(entry, vec![
///     Instruction::Print(Operand::num(1.0)),
///     Instruction::Jump("done".into()),
/// ])?;
///
/// // "done" was created as a placeholder by the forward reference.
/// let done = cfg.node_id("done").unwrap();
/// assert!(!cfg.node(done).unwrap().is_populated());
/// assert_eq!(cfg.successors(entry), vec![done]);
/// assert!(cfg.node(done).unwrap().predecessors().contains(&entry));
/// # Ok::<(), flowcheck::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph {
    nodes: Vec<Option<CfgNode>>,
    names: FxHashMap<String, NodeId>,
    functions: Vec<FunctionSymbol>,
    first: Option<NodeId>,
    last: Option<NodeId>,
}

impl ControlFlowGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a block.
    ///
    /// If a block with this name exists, it is returned when `overwrite` is
    /// set or when it is only a placeholder left by a forward reference;
    /// otherwise [`Error::NodeExists`] is returned. The first block created
    /// becomes the graph's first block.
    ///
    /// # Errors
    ///
    /// [`Error::NodeExists`] on a name collision, [`Error::UnknownFunction`] if
    /// `function` does not resolve.
    pub fn create_node(
        &mut self,
        name: &str,
        overwrite: bool,
        is_exit: bool,
        function: Option<FunctionId>,
    ) -> Result<NodeId> {
        if let Some(function) = function {
            self.function_checked(function)?;
        }

        let id = match self.names.get(name) {
            Some(&id) => {
                let node = self.slot_mut(id)?;
                if node.populated && !overwrite {
                    return Err(Error::NodeExists(name.to_string()));
                }
                node.populated = true;
                node.is_exit |= is_exit;
                if function.is_some() {
                    node.function = function;
                }
                id
            }
            None => {
                let id = NodeId::new(self.nodes.len());
                self.nodes.push(Some(CfgNode::new(name, function, is_exit)));
                self.names.insert(name.to_string(), id);
                id
            }
        };

        if self.first.is_none() {
            self.first = Some(id);
        }
        if is_exit {
            if let Some(function) = function {
                self.functions[function.0].exit = Some(id);
            }
        }
        Ok(id)
    }

    /// Returns the block named `name`, creating an unpopulated placeholder if
    /// there is none.
    fn placeholder(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        let id = NodeId::new(self.nodes.len());
        let mut node = CfgNode::new(name, None, false);
        node.populated = false;
        self.nodes.push(Some(node));
        self.names.insert(name.to_string(), id);
        id
    }

    /// Looks a block up by name.
    #[must_use]
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Returns the block with the given id, if it is still live.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&CfgNode> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut CfgNode> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn slot(&self, id: NodeId) -> Result<&CfgNode> {
        self.node(id).ok_or_else(|| Error::UnknownNode(id.to_string()))
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut CfgNode> {
        self.node_mut(id)
            .ok_or_else(|| Error::UnknownNode(id.to_string()))
    }

    /// Returns the name of a live block.
    #[must_use]
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(CfgNode::name)
    }

    /// Name for messages: the block name, or the raw id of a removed block.
    pub(crate) fn label(&self, id: NodeId) -> String {
        self.name(id).map_or_else(|| id.to_string(), str::to_string)
    }

    /// Returns `true` if `id` refers to a live block.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of live blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Returns `true` if the graph has no live blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over live blocks in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &CfgNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId::new(i), n)))
    }

    /// The program's first block.
    #[must_use]
    pub fn first(&self) -> Option<NodeId> {
        self.first
    }

    /// The program's final block.
    #[must_use]
    pub fn last(&self) -> Option<NodeId> {
        self.last
    }

    /// Designates the program's first block.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownNode`] if `id` is not live.
    pub fn set_first(&mut self, id: NodeId) -> Result<()> {
        self.slot(id)?;
        self.first = Some(id);
        Ok(())
    }

    /// Designates the program's final block.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownNode`] if `id` is not live.
    pub fn set_last(&mut self, id: NodeId) -> Result<()> {
        self.slot(id)?;
        self.last = Some(id);
        Ok(())
    }

    /// Records the source line a block starts at.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownNode`] if `id` is not live.
    pub fn set_line(&mut self, id: NodeId, line: usize) -> Result<()> {
        self.slot_mut(id)?.line = Some(line);
        Ok(())
    }

    /// Replaces the instruction list of a block.
    ///
    /// The list may end in a control suffix: `jump`, `return`, or `jumpif`
    /// followed by `jump`. The suffix becomes the block's terminator, closes
    /// the block, and registers predecessor back-references on its targets.
    /// Targets that do not exist yet are created as placeholders.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedBlock`] for a malformed suffix,
    /// [`Error::ReturnOutsideFunction`] for a `return` in a block owned by no
    /// function, [`Error::UnknownNode`] if `id` is not live.
    pub fn set_instructions(&mut self, id: NodeId, mut instructions: Vec<Instruction>) -> Result<()> {
        let node = self.slot(id)?;
        let name = node.name.clone();
        let function = node.function;

        let split = instructions
            .iter()
            .position(Instruction::is_control)
            .unwrap_or(instructions.len());
        let suffix = instructions.split_off(split);
        let suffix = if suffix.is_empty() {
            Suffix::None
        } else {
            Self::parse_suffix(&name, suffix)?
        };

        let terminator = match suffix {
            Suffix::None => Terminator::End,
            Suffix::Jump(target) => Terminator::Jump(self.placeholder(&target)),
            Suffix::Branch(comparison, on_true, on_false) => Terminator::Branch {
                comparison,
                on_true: self.placeholder(&on_true),
                on_false: self.placeholder(&on_false),
            },
            Suffix::Return(value) => {
                if function.is_none() {
                    return Err(Error::ReturnOutsideFunction(name));
                }
                Terminator::Return(value)
            }
        };

        let closed = terminator != Terminator::End;
        self.set_terminator(id, terminator)?;
        let node = self.slot_mut(id)?;
        node.instructions = instructions;
        node.closed = closed;
        node.pending_branch = None;
        Ok(())
    }

    fn parse_suffix(block: &str, suffix: Vec<Instruction>) -> Result<Suffix> {
        let malformed = |message: &str| Error::MalformedBlock {
            block: block.to_string(),
            message: message.to_string(),
        };

        let mut iter = suffix.into_iter();
        let suffix = match (iter.next(), iter.next()) {
            (Some(Instruction::Jump(target)), None) => Suffix::Jump(target),
            (Some(Instruction::Return(value)), None) => Suffix::Return(value),
            (Some(Instruction::JumpIf { comparison, target }), Some(Instruction::Jump(other))) => {
                Suffix::Branch(comparison, target, other)
            }
            (Some(Instruction::JumpIf { .. }), None) => {
                return Err(malformed("conditional jump without a fall-through jump"))
            }
            _ => return Err(malformed("control instructions must end the block")),
        };
        if iter.next().is_some() {
            return Err(malformed("instructions after the final jump"));
        }
        Ok(suffix)
    }

    /// Appends one instruction to a block that is still open.
    ///
    /// Control instructions close the block the same way
    /// [`set_instructions`](Self::set_instructions) does; a `jumpif` waits for
    /// the `jump` that must follow it.
    ///
    /// # Errors
    ///
    /// [`Error::BlockClosed`] once the block ends in `jump` or `return`,
    /// [`Error::MalformedBlock`] for anything but `jump` after `jumpif`.
    pub fn push_instruction(&mut self, id: NodeId, instruction: Instruction) -> Result<()> {
        let node = self.slot(id)?;
        if node.closed {
            return Err(Error::BlockClosed(node.name.clone()));
        }
        let name = node.name.clone();
        let has_pending = node.pending_branch.is_some();
        let function = node.function;
        let malformed = |message: &str| Error::MalformedBlock {
            block: name.clone(),
            message: message.to_string(),
        };

        match instruction {
            Instruction::JumpIf { comparison, target } => {
                if has_pending {
                    return Err(malformed("two conditional jumps in a row"));
                }
                let target = self.placeholder(&target);
                self.slot_mut(id)?.pending_branch = Some((comparison, target));
            }
            Instruction::Jump(target) => {
                let target = self.placeholder(&target);
                let terminator = match self.slot_mut(id)?.pending_branch.take() {
                    Some((comparison, on_true)) => Terminator::Branch {
                        comparison,
                        on_true,
                        on_false: target,
                    },
                    None => Terminator::Jump(target),
                };
                self.set_terminator(id, terminator)?;
                self.slot_mut(id)?.closed = true;
            }
            Instruction::Return(value) => {
                if has_pending {
                    return Err(malformed("return after a conditional jump"));
                }
                if function.is_none() {
                    return Err(Error::ReturnOutsideFunction(name));
                }
                self.set_terminator(id, Terminator::Return(value))?;
                self.slot_mut(id)?.closed = true;
            }
            other => {
                if has_pending {
                    return Err(malformed("instruction after a conditional jump"));
                }
                self.slot_mut(id)?.instructions.push(other);
            }
        }
        Ok(())
    }

    /// Successors of a block: its local edges, or the registered return sites
    /// for a block ending in `return`.
    #[must_use]
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        match &node.terminator {
            Terminator::Return(_) => {
                let mut sites: Vec<NodeId> = node
                    .function
                    .and_then(|f| self.functions.get(f.0))
                    .map(|f| f.return_sites().collect())
                    .unwrap_or_default();
                sites.sort_unstable();
                sites.dedup();
                sites
            }
            other => other.targets(),
        }
    }

    /// Predecessors of a block.
    #[must_use]
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|n| n.predecessors.iter().copied().collect())
            .unwrap_or_default()
    }

    fn attach(&mut self, id: NodeId) {
        for succ in self.successors(id) {
            if let Some(node) = self.node_mut(succ) {
                node.predecessors.insert(id);
            }
        }
    }

    fn detach(&mut self, id: NodeId) {
        for succ in self.successors(id) {
            if let Some(node) = self.node_mut(succ) {
                node.predecessors.remove(&id);
            }
        }
    }

    /// Replaces a block's terminator, keeping back-references symmetric. A
    /// branch with two identical targets is stored as a jump.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownNode`] if `id` or a target is not live.
    pub fn set_terminator(&mut self, id: NodeId, terminator: Terminator) -> Result<()> {
        let terminator = match terminator {
            Terminator::Branch {
                on_true, on_false, ..
            } if on_true == on_false => Terminator::Jump(on_true),
            other => other,
        };
        for target in terminator.targets() {
            self.slot(target)?;
        }
        self.detach(id);
        self.slot_mut(id)?.terminator = terminator;
        self.attach(id);
        Ok(())
    }

    /// Replaces the straight-line part of a block, keeping its terminator.
    pub(crate) fn set_body(&mut self, id: NodeId, instructions: Vec<Instruction>) -> Result<()> {
        self.slot_mut(id)?.instructions = instructions;
        Ok(())
    }

    /// Blocks ending in `return` that belong to `function`.
    fn returning_blocks(&self, function: FunctionId) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| {
                n.function == Some(function) && matches!(n.terminator, Terminator::Return(_))
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Runs `edit` on the call records of `function` while keeping the
    /// back-references of its return edges symmetric.
    fn edit_calls(&mut self, function: FunctionId, edit: impl FnOnce(&mut Vec<FunctionCall>)) {
        let returning = self.returning_blocks(function);
        for &r in &returning {
            self.detach(r);
        }
        edit(&mut self.functions[function.0].calls);
        for &r in &returning {
            self.attach(r);
        }
    }

    /// Removes a block.
    ///
    /// Successors lose the back-reference. Predecessors lose their edge: a
    /// branch collapses into a jump to its other target and a jump becomes the
    /// end of the block. Removing a function's exit block hands the exit role
    /// (and the `return`) to its unique predecessor. Call records naming the
    /// block are dropped.
    ///
    /// # Errors
    ///
    /// [`Error::AmbiguousExit`] if the block is an exit block with more than
    /// one predecessor, [`Error::UnknownNode`] if it is not live.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let node = self.slot(id)?;
        let preds: Vec<NodeId> = node
            .predecessors
            .iter()
            .copied()
            .filter(|&p| p != id)
            .collect();
        if node.is_exit && preds.len() > 1 {
            return Err(Error::AmbiguousExit(node.name.clone()));
        }
        let unique_pred = match preds.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
        let is_exit = node.is_exit;
        let function = node.function;
        let terminator = node.terminator.clone();
        let name = node.name.clone();

        self.detach(id);

        let mut heir = None;
        for pred in preds {
            let Some(pred_node) = self.node(pred) else {
                continue;
            };
            let replacement = match &pred_node.terminator {
                Terminator::Jump(t) if *t == id => {
                    if is_exit && pred_node.function == function {
                        heir = Some(pred);
                        match &terminator {
                            Terminator::Jump(t) if *t == pred => Terminator::End,
                            other => other.clone(),
                        }
                    } else {
                        Terminator::End
                    }
                }
                Terminator::Branch {
                    on_true, on_false, ..
                } => {
                    let other = if *on_true == id { *on_false } else { *on_true };
                    Terminator::Jump(other)
                }
                // Return edges disappear with the call records below.
                _ => continue,
            };
            self.set_terminator(pred, replacement)?;
        }

        for f in 0..self.functions.len() {
            let fid = FunctionId(f);
            if self.functions[f]
                .calls
                .iter()
                .any(|c| c.caller == id || c.return_to == id)
            {
                self.edit_calls(fid, |calls| {
                    calls.retain(|c| c.caller != id && c.return_to != id);
                });
            }
            let symbol = &mut self.functions[f];
            if symbol.first == Some(id) {
                symbol.first = None;
            }
            if symbol.exit == Some(id) {
                symbol.exit = heir;
            }
        }

        if let Some(heir) = heir {
            // the heir now ends in the inherited return
            let returning = matches!(self.slot(heir)?.terminator, Terminator::Return(_));
            self.slot_mut(heir)?.is_exit = returning;
            if !returning {
                if let Some(f) = function {
                    self.functions[f.0].exit = None;
                }
            }
        }

        if self.first == Some(id) {
            self.first = None;
        }
        if self.last == Some(id) {
            self.last = unique_pred;
        }

        self.names.remove(&name);
        self.nodes[id.index()] = None;
        log::debug!("removed block '{name}'");
        Ok(())
    }

    /// Redirects every reference to `old` (edges, pushed return markers, call
    /// records, function entries, the first block) to `new`.
    pub(crate) fn redirect(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        let old_name = self.slot(old)?.name.clone();
        let new_name = self.slot(new)?.name.clone();

        for pred in self.predecessors(old) {
            let mut terminator = self.slot(pred)?.terminator.clone();
            terminator.retarget(old, new);
            self.set_terminator(pred, terminator)?;
        }

        for slot in self.nodes.iter_mut().flatten() {
            for instr in &mut slot.instructions {
                if let Instruction::PushState(state) = instr {
                    if *state == old_name {
                        state.clone_from(&new_name);
                    }
                }
            }
        }

        for f in 0..self.functions.len() {
            if self.functions[f].calls.iter().any(|c| c.return_to == old) {
                self.edit_calls(FunctionId(f), |calls| {
                    for call in calls.iter_mut().filter(|c| c.return_to == old) {
                        call.return_to = new;
                    }
                });
            }
            if self.functions[f].first == Some(old) {
                self.functions[f].first = Some(new);
            }
        }

        if self.first == Some(old) {
            self.first = Some(new);
        }
        Ok(())
    }

    /// Appends `absorbed` to `into` and deletes `absorbed`.
    ///
    /// `into` takes over the instructions, terminator, exit role, last-block
    /// role and call records of `absorbed`. The caller guarantees that
    /// `absorbed` is only reachable through `into`.
    pub(crate) fn merge_into(&mut self, into: NodeId, absorbed: NodeId) -> Result<()> {
        if into == absorbed {
            return Err(internal_error!("cannot merge block {} into itself", into));
        }
        let absorbed_node = self.slot(absorbed)?;
        let instructions = absorbed_node.instructions.clone();
        let terminator = absorbed_node.terminator.clone();
        let is_exit = absorbed_node.is_exit;
        let name = absorbed_node.name.clone();

        // Detach `into -> absorbed` and `absorbed -> *` first.
        self.set_terminator(into, Terminator::End)?;
        self.detach(absorbed);
        self.slot_mut(absorbed)?.terminator = Terminator::End;

        for symbol in &mut self.functions {
            for call in symbol.calls.iter_mut().filter(|c| c.caller == absorbed) {
                call.caller = into;
            }
            if symbol.exit == Some(absorbed) {
                symbol.exit = Some(into);
            }
        }
        if self.last == Some(absorbed) {
            self.last = Some(into);
        }

        let node = self.slot_mut(into)?;
        node.instructions.extend(instructions);
        node.is_exit |= is_exit;
        self.set_terminator(into, terminator)?;

        self.names.remove(&name);
        self.nodes[absorbed.index()] = None;
        Ok(())
    }

    /// Adds a function to the function table.
    pub fn add_function(
        &mut self,
        name: &str,
        params: Vec<(String, ValueType)>,
        return_type: Option<ValueType>,
    ) -> FunctionId {
        self.functions
            .push(FunctionSymbol::new(name, params, return_type));
        FunctionId(self.functions.len() - 1)
    }

    fn function_checked(&self, id: FunctionId) -> Result<&FunctionSymbol> {
        self.functions
            .get(id.0)
            .ok_or_else(|| Error::UnknownFunction(id.to_string()))
    }

    /// Returns a function's metadata.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&FunctionSymbol> {
        self.functions.get(id.0)
    }

    /// Looks a function up by name.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(FunctionId)
    }

    /// Iterates over the function table.
    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &FunctionSymbol)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FunctionId(i), f))
    }

    /// Designates a function's entry block.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownFunction`] / [`Error::UnknownNode`] if either id does
    /// not resolve.
    pub fn set_function_entry(&mut self, function: FunctionId, entry: NodeId) -> Result<()> {
        self.function_checked(function)?;
        self.slot(entry)?;
        self.functions[function.0].first = Some(entry);
        Ok(())
    }

    /// Records a call of `function` made by `caller` that resumes at
    /// `return_to`, adding the return edges of the function's exit blocks.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownFunction`] / [`Error::UnknownNode`] if an id does not
    /// resolve.
    pub fn register_call(
        &mut self,
        function: FunctionId,
        caller: NodeId,
        return_to: NodeId,
        saved_variables: usize,
    ) -> Result<()> {
        self.function_checked(function)?;
        self.slot(caller)?;
        self.slot(return_to)?;
        self.edit_calls(function, |calls| {
            calls.push(FunctionCall {
                caller,
                return_to,
                saved_variables,
            });
        });
        Ok(())
    }

    /// The function called by `caller`, if it is a registered call site.
    #[must_use]
    pub fn call_at(&self, caller: NodeId) -> Option<(FunctionId, &FunctionCall)> {
        self.functions()
            .find_map(|(id, f)| f.call_from(caller).map(|call| (id, call)))
    }

    /// Entry blocks of every routine: the program's first block followed by
    /// each function entry.
    #[must_use]
    pub fn routine_entries(&self) -> Vec<NodeId> {
        self.first
            .into_iter()
            .chain(self.functions.iter().filter_map(|f| f.first))
            .filter(|&id| self.contains(id))
            .collect()
    }

    /// Blocks whose instructions push a return marker naming `name`.
    #[must_use]
    pub fn state_references(&self, name: &str) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| n.pushed_states().any(|s| s == name))
            .map(|(id, _)| id)
            .collect()
    }

    /// Every name read anywhere in the graph (operands, guards, returned
    /// values, array names).
    #[must_use]
    pub fn read_variables(&self) -> FxHashSet<String> {
        let mut read = FxHashSet::default();
        for (_, node) in self.nodes() {
            for instr in &node.instructions {
                read.extend(instr.read_names().into_iter().map(str::to_string));
            }
            match &node.terminator {
                Terminator::Branch { comparison, .. } => {
                    read.extend(comparison.variables().map(str::to_string));
                }
                Terminator::Return(Some(Operand::Var(v))) => {
                    read.insert(v.clone());
                }
                _ => {}
            }
        }
        read
    }

    /// Blocks writing each scalar variable (declarations included).
    #[must_use]
    pub fn variable_writers(&self) -> FxHashMap<String, FxHashSet<NodeId>> {
        let mut writers: FxHashMap<String, FxHashSet<NodeId>> = FxHashMap::default();
        for (id, node) in self.nodes() {
            for instr in &node.instructions {
                if let Some(var) = instr.defined_variable() {
                    writers.entry(var.to_string()).or_default().insert(id);
                }
            }
        }
        writers
    }

    /// Full instruction listing of a block, control suffix included.
    #[must_use]
    pub fn listing(&self, id: NodeId) -> Vec<Instruction> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let mut listing = node.instructions.clone();
        listing.extend(node.control_suffix(|t| self.label(t)));
        listing
    }

    /// Generates a DOT representation of the graph for Graphviz.
    ///
    /// Each block is rendered with its full listing; the first block is
    /// highlighted green and function exits red. Branch edges are labelled
    /// `true`/`false` and return edges are dashed.
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph CFG {\n");
        if let Some(name) = title {
            let _ = writeln!(dot, "    label=\"{}\";", escape_dot(name));
        }
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    edge [fontname=\"Courier\", fontsize=9];\n\n");

        for (id, node) in self.nodes() {
            let mut label = escape_dot(&node.name);
            label.push_str("\\l");
            for instr in self.listing(id) {
                label.push_str(&escape_dot(&instr.to_string()));
                label.push_str("\\l");
            }
            let style = if Some(id) == self.first {
                ", style=filled, fillcolor=lightgreen"
            } else if node.is_exit {
                ", style=filled, fillcolor=lightcoral"
            } else if !node.populated {
                ", style=dashed"
            } else {
                ""
            };
            let _ = writeln!(dot, "    {id} [label=\"{label}\"{style}];");
        }

        dot.push('\n');

        for (id, node) in self.nodes() {
            match &node.terminator {
                Terminator::End => {}
                Terminator::Jump(t) => {
                    let _ = writeln!(dot, "    {id} -> {t};");
                }
                Terminator::Branch {
                    on_true, on_false, ..
                } => {
                    let _ = writeln!(dot, "    {id} -> {on_true} [label=\"true\", color=green];");
                    let _ = writeln!(dot, "    {id} -> {on_false} [label=\"false\", color=red];");
                }
                Terminator::Return(_) => {
                    for site in self.successors(id) {
                        let _ = writeln!(dot, "    {id} -> {site} [style=dashed];");
                    }
                }
            }
        }

        dot.push_str("}\n");
        dot
    }

    /// Checks the structural invariants.
    ///
    /// Every successor edge has a matching back-reference and vice versa,
    /// branches have two distinct targets, `return` only ends blocks owned by a
    /// function, and every designated block is live.
    ///
    /// # Errors
    ///
    /// [`Error::Internal`] naming the first violation found.
    pub fn validate(&self) -> Result<()> {
        for (id, node) in self.nodes() {
            for succ in self.successors(id) {
                let Some(succ_node) = self.node(succ) else {
                    return Err(internal_error!(
                        "edge from '{}' to removed block {}",
                        node.name,
                        succ
                    ));
                };
                if !succ_node.predecessors.contains(&id) {
                    return Err(internal_error!(
                        "'{}' is missing predecessor '{}'",
                        succ_node.name,
                        node.name
                    ));
                }
            }
            for &pred in &node.predecessors {
                if !self.successors(pred).contains(&id) {
                    return Err(internal_error!(
                        "'{}' lists '{}' as predecessor without an edge",
                        node.name,
                        self.label(pred)
                    ));
                }
            }
            match &node.terminator {
                Terminator::Branch {
                    on_true, on_false, ..
                } if on_true == on_false => {
                    return Err(internal_error!(
                        "branch in '{}' has identical targets",
                        node.name
                    ));
                }
                Terminator::Return(_) if node.function.is_none() => {
                    return Err(internal_error!(
                        "'{}' returns outside of a function",
                        node.name
                    ));
                }
                _ => {}
            }
        }

        let designated = self
            .first
            .into_iter()
            .chain(self.last)
            .chain(self.functions.iter().flat_map(|f| f.first.into_iter().chain(f.exit)))
            .chain(
                self.functions
                    .iter()
                    .flat_map(|f| f.calls.iter().flat_map(|c| [c.caller, c.return_to])),
            );
        for id in designated {
            if !self.contains(id) {
                return Err(internal_error!("designated block {} is not live", id));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ControlFlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut current = None;
        for (id, node) in self.nodes() {
            if node.function != current {
                current = node.function;
                if let Some(symbol) = node.function.and_then(|fid| self.function(fid)) {
                    writeln!(f, "function {symbol}")?;
                }
            }
            write!(f, "{}:", node.name)?;
            if Some(id) == self.first {
                write!(f, " ; first")?;
            }
            if Some(id) == self.last {
                write!(f, " ; last")?;
            }
            if node.is_exit {
                write!(f, " ; exit")?;
            }
            writeln!(f)?;
            for instr in self.listing(id) {
                writeln!(f, "    {instr}")?;
            }
        }
        Ok(())
    }
}

impl GraphBase for ControlFlowGraph {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        self.nodes().map(|(id, _)| id)
    }
}

impl Successors for ControlFlowGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        ControlFlowGraph::successors(self, node).into_iter()
    }
}

impl Predecessors for ControlFlowGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        ControlFlowGraph::predecessors(self, node).into_iter()
    }
}

impl RootedGraph for ControlFlowGraph {
    fn entry(&self) -> NodeId {
        self.first.unwrap_or(NodeId::new(usize::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::RelOp;

    fn lt(var: &str, value: f64) -> Comparison {
        Comparison::new(Operand::var(var), RelOp::Lt, Operand::num(value))
    }

    #[test]
    fn test_create_node_collision() -> Result<()> {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.create_node("a", false, false, None)?;
        assert_eq!(
            cfg.create_node("a", false, false, None),
            Err(Error::NodeExists("a".into()))
        );
        assert_eq!(cfg.create_node("a", true, false, None)?, a);
        assert_eq!(cfg.first(), Some(a));
        Ok(())
    }

    #[test]
    fn test_placeholder_is_adopted() -> Result<()> {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.create_node("a", false, false, None)?;
        cfg.set_instructions(a, vec![Instruction::Jump("b".into())])?;
        let b = cfg.node_id("b").ok_or(Error::UnknownNode("b".into()))?;
        assert!(!cfg.node(b).is_some_and(CfgNode::is_populated));

        assert_eq!(cfg.create_node("b", false, false, None)?, b);
        assert!(cfg.node(b).is_some_and(CfgNode::is_populated));
        cfg.validate()
    }

    #[test]
    fn test_set_instructions_branch() -> Result<()> {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.create_node("a", false, false, None)?;
        cfg.set_instructions(
            a,
            vec![
                Instruction::Print(Operand::num(1.0)),
                Instruction::JumpIf {
                    comparison: lt("x", 3.0),
                    target: "t".into(),
                },
                Instruction::Jump("f".into()),
            ],
        )?;

        let t = cfg.node_id("t").ok_or(Error::UnknownNode("t".into()))?;
        let f = cfg.node_id("f").ok_or(Error::UnknownNode("f".into()))?;
        assert_eq!(cfg.successors(a), vec![t, f]);
        assert_eq!(cfg.predecessors(t), vec![a]);
        assert_eq!(cfg.listing(a).len(), 3);

        cfg.set_instructions(a, vec![Instruction::Jump("f".into())])?;
        assert!(cfg.predecessors(t).is_empty());
        assert_eq!(cfg.predecessors(f), vec![a]);
        cfg.validate()
    }

    #[test]
    fn test_malformed_suffix() -> Result<()> {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.create_node("a", false, false, None)?;
        let lone = cfg.set_instructions(
            a,
            vec![Instruction::JumpIf {
                comparison: lt("x", 3.0),
                target: "t".into(),
            }],
        );
        assert!(matches!(lone, Err(Error::MalformedBlock { .. })));

        let middle = cfg.set_instructions(
            a,
            vec![
                Instruction::Jump("t".into()),
                Instruction::Print(Operand::num(1.0)),
            ],
        );
        assert!(matches!(middle, Err(Error::MalformedBlock { .. })));

        let ret = cfg.set_instructions(a, vec![Instruction::Return(None)]);
        assert_eq!(ret, Err(Error::ReturnOutsideFunction("a".into())));
        Ok(())
    }

    #[test]
    fn test_push_instruction_closes_block() -> Result<()> {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.create_node("a", false, false, None)?;
        cfg.push_instruction(a, Instruction::Print(Operand::num(1.0)))?;
        cfg.push_instruction(
            a,
            Instruction::JumpIf {
                comparison: lt("x", 1.0),
                target: "t".into(),
            },
        )?;
        assert!(matches!(
            cfg.push_instruction(a, Instruction::Print(Operand::num(2.0))),
            Err(Error::MalformedBlock { .. })
        ));
        cfg.push_instruction(a, Instruction::Jump("f".into()))?;
        assert!(cfg.node(a).is_some_and(|n| n.terminator().is_branch()));
        assert_eq!(
            cfg.push_instruction(a, Instruction::Print(Operand::num(3.0))),
            Err(Error::BlockClosed("a".into()))
        );
        cfg.validate()
    }

    #[test]
    fn test_remove_node_collapses_branch() -> Result<()> {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.create_node("a", false, false, None)?;
        cfg.set_instructions(
            a,
            vec![
                Instruction::JumpIf {
                    comparison: lt("x", 3.0),
                    target: "t".into(),
                },
                Instruction::Jump("f".into()),
            ],
        )?;
        let t = cfg.create_node("t", false, false, None)?;
        let f = cfg.create_node("f", false, false, None)?;

        cfg.remove_node(t)?;
        assert!(!cfg.contains(t));
        assert_eq!(cfg.node(a).map(|n| n.terminator().clone()), Some(Terminator::Jump(f)));
        assert_eq!(cfg.node_id("t"), None);
        cfg.validate()
    }

    #[test]
    fn test_remove_exit_node() -> Result<()> {
        let mut cfg = ControlFlowGraph::new();
        let f = cfg.add_function("f", Vec::new(), None);
        let main = cfg.create_node("main", false, false, None)?;
        let body = cfg.create_node("body", false, false, Some(f))?;
        let exit = cfg.create_node("exit", false, true, Some(f))?;
        let resume = cfg.create_node("resume", false, false, None)?;
        cfg.set_function_entry(f, body)?;
        cfg.set_instructions(
            main,
            vec![
                Instruction::PushState("resume".into()),
                Instruction::Jump("body".into()),
            ],
        )?;
        cfg.set_instructions(body, vec![Instruction::Jump("exit".into())])?;
        cfg.set_instructions(exit, vec![Instruction::Return(None)])?;
        cfg.register_call(f, main, resume, 0)?;

        assert_eq!(cfg.successors(exit), vec![resume]);
        assert_eq!(cfg.predecessors(resume), vec![exit]);

        cfg.remove_node(exit)?;
        assert!(cfg.node(body).is_some_and(CfgNode::is_exit));
        assert_eq!(cfg.function(f).and_then(|s| s.exit), Some(body));
        assert_eq!(cfg.successors(body), vec![resume]);
        assert_eq!(cfg.predecessors(resume), vec![body]);
        cfg.validate()
    }

    #[test]
    fn test_remove_ambiguous_exit() -> Result<()> {
        let mut cfg = ControlFlowGraph::new();
        let f = cfg.add_function("f", Vec::new(), None);
        let a = cfg.create_node("a", false, false, Some(f))?;
        let b = cfg.create_node("b", false, false, Some(f))?;
        let exit = cfg.create_node("exit", false, true, Some(f))?;
        cfg.set_instructions(a, vec![Instruction::Jump("exit".into())])?;
        cfg.set_instructions(b, vec![Instruction::Jump("exit".into())])?;
        cfg.set_instructions(exit, vec![Instruction::Return(None)])?;

        assert_eq!(
            cfg.remove_node(exit),
            Err(Error::AmbiguousExit("exit".into()))
        );
        Ok(())
    }

    #[test]
    fn test_redirect_updates_push_sites() -> Result<()> {
        let mut cfg = ControlFlowGraph::new();
        let f = cfg.add_function("f", Vec::new(), None);
        let main = cfg.create_node("main", false, false, None)?;
        let exit = cfg.create_node("exit", false, true, Some(f))?;
        let hop = cfg.create_node("hop", false, false, None)?;
        let resume = cfg.create_node("resume", false, false, None)?;
        cfg.set_function_entry(f, exit)?;
        cfg.set_instructions(
            main,
            vec![
                Instruction::PushState("hop".into()),
                Instruction::Jump("exit".into()),
            ],
        )?;
        cfg.set_instructions(exit, vec![Instruction::Return(None)])?;
        cfg.set_instructions(hop, vec![Instruction::Jump("resume".into())])?;
        cfg.register_call(f, main, hop, 0)?;

        cfg.redirect(hop, resume)?;
        assert_eq!(cfg.state_references("resume"), vec![main]);
        assert_eq!(cfg.successors(exit), vec![resume]);
        assert!(cfg.predecessors(hop).is_empty());
        cfg.remove_node(hop)?;
        cfg.validate()
    }

    #[test]
    fn test_to_dot_and_listing() -> Result<()> {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.create_node("a", false, false, None)?;
        cfg.set_instructions(
            a,
            vec![
                Instruction::Print(Operand::str("hi")),
                Instruction::JumpIf {
                    comparison: lt("x", 3.0),
                    target: "t".into(),
                },
                Instruction::Jump("f".into()),
            ],
        )?;
        cfg.create_node("t", false, false, None)?;
        cfg.create_node("f", false, false, None)?;

        let dot = cfg.to_dot(Some("demo"));
        assert!(dot.starts_with("digraph CFG {"));
        assert!(dot.contains("label=\"demo\""));
        assert!(dot.contains("jumpif x \\< 3 t"));
        assert!(dot.contains("[label=\"true\", color=green]"));

        let text = cfg.to_string();
        assert!(text.starts_with("a: ; first\n"));
        assert!(text.contains("    jump f\n"));
        Ok(())
    }
}
