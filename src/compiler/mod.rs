//! Graph simplification and the diagnostic event stream.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Simplifier                                  │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  PassScheduler               FIFO worklist of dirty node ids     │
//! │    ├─ seeded in reverse postorder, then every live node          │
//! │    ├─ each node offered to every pass in order                   │
//! │    └─ validate() once the worklist drains                        │
//! │                                                                  │
//! │  CfgPass trait               Interface for all passes            │
//! │    └─ run_on_node()           Local rewrite, returns dirty nodes  │
//! │                                                                  │
//! │  Passes                                                          │
//! │    ├─ ConstantPropagationPass  fold, collapse constant branches  │
//! │    ├─ EmptyBlockElisionPass    redirect around trampolines       │
//! │    └─ BlockFusionPass          merge into sole predecessor       │
//! │                                                                  │
//! │  EventLog                    Transformations and diagnostics     │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod events;
mod pass;
mod passes;
mod scheduler;

pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::CfgPass;
pub use passes::{BlockFusionPass, ConstantPropagationPass, EmptyBlockElisionPass};
pub use scheduler::{PassScheduler, SimplifyStats};
