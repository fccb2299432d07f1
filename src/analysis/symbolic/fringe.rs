//! Execution context of one symbolic path.
//!
//! A [`Fringe`] bundles everything a path carries: scalar variables, the
//! runtime stack, arrays, the branch conditions taken so far and a record of
//! the state it had when it last entered each node. Forking is O(1): the
//! variable set forks its scope chain and everything else is a persistent
//! [`imbl`] structure.
//!
//! # Revisits
//!
//! Entry states are keyed by `(node, innermost return-site marker)`, so the
//! same function block reached from different call sites is tracked
//! separately. See [`Fringe::enter`] for what happens on a revisit.

use std::{fmt, rc::Rc};

use imbl::{HashMap as ImHashMap, Vector};
use rustc_hash::FxHashMap;

use crate::{
    analysis::symbolic::{
        AbstractDomain, Monotonicity, SymbolicArray, SymbolicStack, SymbolicValue,
        SymbolicVarSet, SymbolicVariable,
    },
    ir::Comparison,
    utils::graph::NodeId,
};

/// A branch taken on a path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathCondition {
    /// Block holding the branch
    pub node: String,
    /// The test that held on this path
    pub test: Comparison,
}

impl fmt::Display for PathCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at '{}'", self.test, self.node)
    }
}

/// Outcome of entering a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revisit {
    /// First entry in this call context.
    First,
    /// The recorded state covers the current one: nothing new, stop.
    Subsumed,
    /// The state was widened against the recorded one; continue.
    Widened,
    /// Widening budget spent; stop.
    Exhausted,
    /// Recursive re-entry whose variables, arrays and arguments the
    /// recorded state covers: the invocation is summarised instead of
    /// followed.
    Recursion,
    /// Re-entered while returning into an enclosing invocation of the same
    /// routine; continue. The shrinking call depth bounds this.
    Unwound,
}

/// Frozen path state used for subsumption tests.
#[derive(Debug, Clone)]
struct Snapshot {
    vars: FxHashMap<String, SymbolicVariable>,
    arrays: ImHashMap<String, SymbolicArray>,
    stack: SymbolicStack,
}

impl Snapshot {
    /// Coverage of variables, arrays and the stack. A recursive entry always
    /// has a deeper stack, so without `whole_stack` only the innermost
    /// frames are compared.
    fn subsumes(&self, current: &Snapshot, whole_stack: bool) -> bool {
        current
            .vars
            .iter()
            .all(|(name, var)| self.vars.get(name).is_some_and(|old| old.subsumes(var)))
            && current
                .arrays
                .iter()
                .all(|(name, arr)| self.arrays.get(name).is_some_and(|old| old.subsumes(arr)))
            && if whole_stack {
                self.stack.subsumes(&current.stack)
            } else {
                self.stack.frame_subsumes(&current.stack)
            }
    }
}

#[derive(Debug, Clone)]
struct VisitRecord {
    snapshot: Rc<Snapshot>,
    widenings: usize,
    call_depth: usize,
}

type VisitKey = (NodeId, Option<NodeId>);

/// One in-flight path.
#[derive(Debug, Clone, Default)]
pub struct Fringe {
    /// Scalar variables
    pub vars: SymbolicVarSet,
    /// Runtime stack
    pub stack: SymbolicStack,
    /// Declared arrays
    pub arrays: ImHashMap<String, SymbolicArray>,
    /// `false` once the path is known to be impossible
    pub feasible: bool,
    /// Branch conditions taken, in order
    pub conditions: Vector<PathCondition>,
    /// Number of node entries on this path
    pub depth: usize,
    visits: ImHashMap<VisitKey, VisitRecord>,
}

impl Fringe {
    /// A feasible path with no state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            feasible: true,
            ..Self::default()
        }
    }

    /// Splits off an independent path continuing from the current state.
    #[must_use]
    pub fn fork(&mut self) -> Self {
        Self {
            vars: self.vars.fork(),
            stack: self.stack.clone(),
            arrays: self.arrays.clone(),
            feasible: self.feasible,
            conditions: self.conditions.clone(),
            depth: self.depth,
            visits: self.visits.clone(),
        }
    }

    /// Looks a scalar up.
    #[must_use]
    pub fn var(&self, name: &str) -> Option<&SymbolicVariable> {
        self.vars.get(name)
    }

    /// Mutable access to a scalar.
    pub fn var_mut(&mut self, name: &str) -> Option<&mut SymbolicVariable> {
        self.vars.get_mut(name)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            vars: self
                .vars
                .iter()
                .map(|(n, v)| (n.to_string(), v.clone()))
                .collect(),
            arrays: self.arrays.clone(),
            stack: self.stack.clone(),
        }
    }

    /// Records entry into `node`.
    ///
    /// On a revisit in the same call context:
    /// - a shallower call stack means the path is returning into an
    ///   enclosing invocation ([`Revisit::Unwound`]);
    /// - a recorded state covering the current one is a fixed point
    ///   ([`Revisit::Subsumed`]). With a deeper call stack (recursion) the
    ///   innermost stack frames stand in for the whole stack, and the fixed
    ///   point is [`Revisit::Recursion`]: the caller summarises the
    ///   invocation;
    /// - otherwise, unless `max_widenings` is spent ([`Revisit::Exhausted`]),
    ///   every bound that moved since the recorded state is widened and the
    ///   path continues ([`Revisit::Widened`]).
    pub fn enter(&mut self, node: NodeId, max_widenings: usize) -> Revisit {
        self.depth += 1;
        let key = (node, self.stack.top_state());
        let call_depth = self.stack.call_depth();
        let current = self.snapshot();

        let Some(record) = self.visits.get(&key).cloned() else {
            self.visits.insert(
                key,
                VisitRecord {
                    snapshot: Rc::new(current),
                    widenings: 0,
                    call_depth,
                },
            );
            return Revisit::First;
        };

        if call_depth < record.call_depth {
            return Revisit::Unwound;
        }
        let recursive = call_depth > record.call_depth;
        if record.snapshot.subsumes(&current, !recursive) {
            return if recursive {
                Revisit::Recursion
            } else {
                Revisit::Subsumed
            };
        }
        if record.widenings >= max_widenings {
            return Revisit::Exhausted;
        }

        self.widen_from(&record.snapshot);
        self.visits.insert(
            key,
            VisitRecord {
                snapshot: Rc::new(self.snapshot()),
                widenings: record.widenings + 1,
                call_depth: record.call_depth.min(call_depth),
            },
        );
        Revisit::Widened
    }

    fn widen_from(&mut self, old: &Snapshot) {
        self.vars.for_each_mut(|name, var| {
            let Some(prev) = old.vars.get(name) else {
                return;
            };
            if prev.ty != var.ty {
                return;
            }
            let widened = prev.value.widen(&var.value);
            if widened != var.value {
                var.value = widened;
                var.version += 1;
                var.relations.clear();
            }
            var.defined &= prev.defined;
        });
        self.stack.widen_frame(&old.stack);
        let arrays: Vec<(String, SymbolicArray)> = self
            .arrays
            .iter()
            .filter_map(|(name, arr)| {
                old.arrays
                    .get(name)
                    .map(|prev| (name.clone(), prev.widen(arr)))
            })
            .collect();
        for (name, arr) in arrays {
            self.arrays.insert(name, arr);
        }
    }

    /// Forgets every scalar value and array element: each may now hold
    /// any value of its type. Definedness is kept.
    pub fn clobber(&mut self) {
        self.vars.for_each_mut(|_, var| {
            let defined = var.defined;
            var.write(SymbolicValue::full(var.ty), Monotonicity::Unknown);
            var.defined = defined;
        });
        let names: Vec<String> = self.arrays.keys().cloned().collect();
        for name in names {
            if let Some(arr) = self.arrays.get_mut(&name) {
                arr.clobber();
            }
        }
    }

    /// Hull of two entry states of the same node.
    ///
    /// Variables known on one side only are kept but marked undefined.
    #[must_use]
    pub fn join(&self, other: &Fringe) -> Fringe {
        let mut vars = SymbolicVarSet::new();
        for (name, var) in self.vars.iter() {
            let merged = match other.vars.get(name) {
                Some(o) if o.ty == var.ty => var.join(o),
                _ => SymbolicVariable {
                    defined: false,
                    ..var.clone()
                },
            };
            vars.insert(name, merged);
        }
        for (name, var) in other.vars.iter() {
            if !self.vars.contains(name) {
                vars.insert(
                    name,
                    SymbolicVariable {
                        defined: false,
                        ..var.clone()
                    },
                );
            }
        }

        let mut arrays = self.arrays.clone();
        for (name, arr) in &other.arrays {
            let merged = match self.arrays.get(name) {
                Some(mine) => mine.join(arr),
                None => arr.clone(),
            };
            arrays.insert(name.clone(), merged);
        }

        Fringe {
            vars,
            stack: self.stack.join(&other.stack),
            arrays,
            feasible: self.feasible || other.feasible,
            conditions: Vector::new(),
            depth: 0,
            visits: ImHashMap::new(),
        }
    }

    /// The current state without path history (conditions, revisit
    /// records, depth).
    #[must_use]
    pub fn detached(&self) -> Fringe {
        let mut vars = self.vars.clone();
        vars.flatten();
        Fringe {
            vars,
            stack: self.stack.clone(),
            arrays: self.arrays.clone(),
            feasible: self.feasible,
            conditions: Vector::new(),
            depth: 0,
            visits: ImHashMap::new(),
        }
    }

    /// A fresh path starting from this state: no history, every
    /// monotonicity reset to [`Monotonicity::Fresh`].
    #[must_use]
    pub fn restart(&self) -> Fringe {
        let mut fringe = self.detached();
        fringe.feasible = true;
        fringe
            .vars
            .for_each_mut(|_, var| var.monotonicity = Monotonicity::Fresh);
        fringe
    }
}

impl fmt::Display for Fringe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for name in self.vars.names() {
            if let Some(var) = self.vars.get(&name) {
                if !first {
                    f.write_str(", ")?;
                }
                first = false;
                write!(f, "{name}: {var}")?;
            }
        }
        let mut arrays: Vec<&SymbolicArray> = self.arrays.values().collect();
        arrays.sort_by(|a, b| a.name().cmp(b.name()));
        for arr in arrays {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{arr}")?;
        }
        if !self.stack.is_empty() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "stack {}", self.stack)?;
        }
        Ok(())
    }
}
