//! Configuration for the verification pipeline.
//!
//! [`VerifierConfig`] bundles the settings of each stage: graph
//! simplification ([`SimplifyConfig`]), the symbolic search
//! ([`SearchConfig`]) and whether loops are checked for termination.

/// Settings of the graph simplifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplifyConfig {
    /// Maximum node visits of the worklist before it stops (default: 10 000).
    pub max_iterations: usize,

    /// Fold constants and literal branches.
    pub constant_propagation: bool,

    /// Redirect edges around blocks without instructions.
    pub elide_empty_blocks: bool,

    /// Merge a block into its single predecessor when that predecessor has no
    /// other successor.
    pub fuse_blocks: bool,

    /// Drop declarations and literal assignments of variables that are never
    /// read.
    pub remove_unused_assignments: bool,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            constant_propagation: true,
            elide_empty_blocks: true,
            fuse_blocks: true,
            remove_unused_assignments: true,
        }
    }
}

impl SimplifyConfig {
    /// A configuration with every pass disabled.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            constant_propagation: false,
            elide_empty_blocks: false,
            fuse_blocks: false,
            remove_unused_assignments: false,
            ..Self::default()
        }
    }

    /// Returns true if any pass is enabled.
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.constant_propagation
            || self.elide_empty_blocks
            || self.fuse_blocks
            || self.remove_unused_assignments
    }

    /// Sets the worklist visit cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Enables or disables constant propagation.
    #[must_use]
    pub fn with_constant_propagation(mut self, enabled: bool) -> Self {
        self.constant_propagation = enabled;
        self
    }

    /// Enables or disables empty block elision.
    #[must_use]
    pub fn with_elide_empty_blocks(mut self, enabled: bool) -> Self {
        self.elide_empty_blocks = enabled;
        self
    }

    /// Enables or disables block fusion.
    #[must_use]
    pub fn with_fuse_blocks(mut self, enabled: bool) -> Self {
        self.fuse_blocks = enabled;
        self
    }

    /// Enables or disables removal of unused assignments.
    #[must_use]
    pub fn with_remove_unused_assignments(mut self, enabled: bool) -> Self {
        self.remove_unused_assignments = enabled;
        self
    }
}

/// Settings of the symbolic search.
///
/// Exceeding a cap truncates the search. A truncated search cannot prove a
/// block unreachable, so dead-code elimination is skipped for that run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Maximum number of paths (default: 100 000).
    pub max_paths: usize,

    /// Maximum block entries along one path (default: 10 000).
    pub max_depth: usize,

    /// Widenings allowed at one block of one path before the path stops
    /// (default: 2).
    pub max_widenings: usize,

    /// Remove blocks no feasible path reaches.
    pub eliminate_dead_code: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_paths: 100_000,
            max_depth: 10_000,
            max_widenings: 2,
            eliminate_dead_code: true,
        }
    }
}

impl SearchConfig {
    /// Sets the path cap.
    #[must_use]
    pub fn with_max_paths(mut self, max: usize) -> Self {
        self.max_paths = max;
        self
    }

    /// Sets the per-path depth cap.
    #[must_use]
    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    /// Sets the widening budget per block.
    #[must_use]
    pub fn with_max_widenings(mut self, max: usize) -> Self {
        self.max_widenings = max;
        self
    }

    /// Enables or disables dead-code elimination.
    #[must_use]
    pub fn with_eliminate_dead_code(mut self, enabled: bool) -> Self {
        self.eliminate_dead_code = enabled;
        self
    }
}

/// Settings of the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Simplification before the analyses.
    pub simplify: SimplifyConfig,

    /// Symbolic search.
    pub search: SearchConfig,

    /// Check every loop for a termination argument.
    pub validate_termination: bool,

    /// Simplify again after dead-code elimination.
    pub post_simplify: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            simplify: SimplifyConfig::default(),
            search: SearchConfig::default(),
            validate_termination: true,
            post_simplify: false,
        }
    }
}

impl VerifierConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Analysis only: the graph is not modified (no simplification, no
    /// dead-code elimination).
    #[must_use]
    pub fn analysis() -> Self {
        Self {
            simplify: SimplifyConfig::disabled(),
            search: SearchConfig::default().with_eliminate_dead_code(false),
            post_simplify: false,
            ..Self::default()
        }
    }

    /// Everything enabled, including a second simplification after dead
    /// code is removed.
    #[must_use]
    pub fn full() -> Self {
        Self {
            post_simplify: true,
            ..Self::default()
        }
    }

    /// Replaces the simplifier settings.
    #[must_use]
    pub fn with_simplify(mut self, simplify: SimplifyConfig) -> Self {
        self.simplify = simplify;
        self
    }

    /// Replaces the search settings.
    #[must_use]
    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Enables or disables termination checking.
    #[must_use]
    pub fn with_validate_termination(mut self, enabled: bool) -> Self {
        self.validate_termination = enabled;
        self
    }

    /// Enables or disables the second simplification.
    #[must_use]
    pub fn with_post_simplify(mut self, enabled: bool) -> Self {
        self.post_simplify = enabled;
        self
    }
}
