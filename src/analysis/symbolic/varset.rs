//! Scoped variable sets with copy-on-write forking.
//!
//! A [`SymbolicVarSet`] is a chain of scopes. Forking freezes the current
//! scope behind an [`Rc`] and hands each side an empty child scope on top of
//! it, so a fork costs O(1). Reads walk the chain; the first write to a
//! variable that lives in an ancestor copies it into the local scope.
//!
//! ```text
//!            [frozen: x, y]
//!             /          \
//!     [then: x']        [else: (empty)]
//! ```
//!
//! Chains longer than [`MAX_CHAIN`] are flattened into a single scope so
//! lookups stay cheap on long paths.

use std::{collections::VecDeque, rc::Rc};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{analysis::symbolic::SymbolicVariable, ir::RelOp};

/// Scope depth at which a chain is flattened.
pub const MAX_CHAIN: usize = 32;

/// Variables visible on one path.
#[derive(Debug, Clone, Default)]
pub struct SymbolicVarSet {
    scope: FxHashMap<String, SymbolicVariable>,
    parent: Option<Rc<SymbolicVarSet>>,
    depth: usize,
}

impl SymbolicVarSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn child_of(parent: Rc<SymbolicVarSet>) -> Self {
        let depth = parent.depth + 1;
        let mut child = Self {
            scope: FxHashMap::default(),
            parent: Some(parent),
            depth,
        };
        if depth > MAX_CHAIN {
            child.flatten();
        }
        child
    }

    /// Number of scopes below this one.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Splits off an independent copy. Both `self` and the returned set
    /// continue from the current contents.
    #[must_use]
    pub fn fork(&mut self) -> Self {
        let frozen = Rc::new(std::mem::take(self));
        *self = Self::child_of(Rc::clone(&frozen));
        Self::child_of(frozen)
    }

    /// Collapses the chain into a single local scope.
    pub fn flatten(&mut self) {
        let mut merged = FxHashMap::default();
        for (name, var) in self.iter() {
            merged.insert(name.to_string(), var.clone());
        }
        self.scope = merged;
        self.parent = None;
        self.depth = 0;
    }

    /// Looks `name` up through the chain.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SymbolicVariable> {
        let mut current = Some(self);
        while let Some(set) = current {
            if let Some(var) = set.scope.get(name) {
                return Some(var);
            }
            current = set.parent.as_deref();
        }
        None
    }

    /// Mutable access, copying the variable into the local scope first.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut SymbolicVariable> {
        if !self.scope.contains_key(name) {
            let inherited = self.parent.as_deref().and_then(|p| p.get(name))?.clone();
            self.scope.insert(name.to_string(), inherited);
        }
        self.scope.get_mut(name)
    }

    /// Returns `true` if `name` is visible.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Binds `name` in the local scope. Rebinding a visible name moves the
    /// version past the previous binding's, so relations recorded against
    /// the old binding go stale.
    pub fn insert(&mut self, name: impl Into<String>, mut var: SymbolicVariable) {
        let name = name.into();
        if let Some(previous) = self.get(&name) {
            var.version = var.version.max(previous.version + 1);
        }
        self.scope.insert(name, var);
    }

    /// Every visible variable, innermost binding first, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SymbolicVariable)> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut scopes = Vec::new();
        let mut current = Some(self);
        while let Some(set) = current {
            scopes.push(&set.scope);
            current = set.parent.as_deref();
        }
        scopes
            .into_iter()
            .flat_map(|scope| scope.iter())
            .filter(move |(name, _)| seen.insert(name.as_str()))
            .map(|(name, var)| (name.as_str(), var))
    }

    /// Names of every visible variable, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.iter().map(|(n, _)| n.to_string()).collect();
        names.sort();
        names
    }

    /// Applies `f` to every visible variable, localising each one.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&str, &mut SymbolicVariable)) {
        for name in self.names() {
            if let Some(var) = self.get_mut(&name) {
                f(&name, var);
            }
        }
    }

    /// The strongest known relation `lhs ? rhs`, following relation edges
    /// transitively.
    ///
    /// Only relations recorded against the current version of their target
    /// are used.
    #[must_use]
    pub fn relation(&self, lhs: &str, rhs: &str) -> Option<RelOp> {
        if lhs == rhs {
            return Some(RelOp::Eq);
        }
        let mut queue: VecDeque<(String, RelOp)> = VecDeque::new();
        let mut visited: FxHashSet<(String, RelOp)> = FxHashSet::default();
        let mut found: Option<RelOp> = None;

        let expand = |from: &str, via: Option<RelOp>, queue: &mut VecDeque<(String, RelOp)>| {
            let Some(var) = self.get(from) else {
                return;
            };
            for rel in &var.relations {
                if self.get(&rel.other).map(|v| v.version) != Some(rel.version) {
                    continue;
                }
                let op = match via {
                    Some(prefix) => match prefix.compose(rel.op) {
                        Some(op) => op,
                        None => continue,
                    },
                    None => rel.op,
                };
                queue.push_back((rel.other.clone(), op));
            }
        };

        expand(lhs, None, &mut queue);
        while let Some((name, op)) = queue.pop_front() {
            if !visited.insert((name.clone(), op)) {
                continue;
            }
            if name == rhs {
                found = Some(match found {
                    Some(prev) if prev.implies(op) => prev,
                    _ => op,
                });
                continue;
            }
            expand(&name, Some(op), &mut queue);
        }
        found
    }

    /// Records `lhs op rhs` on both variables.
    pub fn relate(&mut self, lhs: &str, op: RelOp, rhs: &str) {
        if lhs == rhs {
            return;
        }
        let (Some(lv), Some(rv)) = (
            self.get(lhs).map(|v| v.version),
            self.get(rhs).map(|v| v.version),
        ) else {
            return;
        };
        if let Some(var) = self.get_mut(lhs) {
            var.relate(op, rhs, rv);
        }
        if let Some(var) = self.get_mut(rhs) {
            var.relate(op.flip(), lhs, lv);
        }
    }
}
