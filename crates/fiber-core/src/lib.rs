#![doc = r"Tree reconciliation core: elements, fibers, hooks, and the commit protocol."]

mod begin_work;
mod child_reconciler;
pub mod collections;
mod commit_work;
mod complete_work;
pub mod element;
pub mod fiber;
pub mod flags;
pub mod hooks;
pub mod host_config;
pub mod memory_host;
pub mod platform;
mod root;
mod update_queue;
mod work_loop;

pub use commit_work::CommitStats;
pub use element::{
    Component, Element, ElementBuilder, ElementType, EventHandler, Key, Node, NodeRef, PropValue,
    Props, StyleValue,
};
pub use fiber::{Fiber, FiberArena, FiberId, FiberProps, RootState, WorkTag};
pub use flags::{ExecutionContext, Flags};
pub use hooks::{Cleanup, Dispatch, HookContext, HookKind, SetState, StateAction};
pub use host_config::HostConfig;
pub use memory_host::{style_value, HostNodeId, HostOp, MemoryHost, PropChange};
pub use platform::{Task, TaskScheduler};
pub use root::{
    create_root_container, create_root_container_with_options, update_root_container, FiberRoot,
    RootOptions,
};

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileError {
    TooManyHooks {
        component: &'static str,
        expected: usize,
    },
    TooFewHooks {
        component: &'static str,
        expected: usize,
        rendered: usize,
    },
    HookKindMismatch {
        component: &'static str,
        index: usize,
        expected: HookKind,
        found: HookKind,
    },
    TooManyReRenders {
        component: &'static str,
        limit: usize,
    },
    MissingHostParent {
        fiber: FiberId,
    },
    UnresolvedComponent {
        fiber: FiberId,
    },
    MissingInstance {
        fiber: FiberId,
    },
    ReentrantPassiveFlush,
    RootPoisoned,
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::TooManyHooks {
                component,
                expected,
            } => write!(
                f,
                "{component} rendered more hooks than the {expected} of its previous render"
            ),
            ReconcileError::TooFewHooks {
                component,
                expected,
                rendered,
            } => write!(
                f,
                "{component} rendered {rendered} hooks; previous render had {expected}"
            ),
            ReconcileError::HookKindMismatch {
                component,
                index,
                expected,
                found,
            } => {
                if expected == found {
                    write!(f, "{component} changed the state type of hook {index} ({found})")
                } else {
                    write!(
                        f,
                        "{component} called {found} at hook {index}; previous render called {expected}"
                    )
                }
            }
            ReconcileError::TooManyReRenders { component, limit } => write!(
                f,
                "{component} re-rendered more than {limit} times during one render"
            ),
            ReconcileError::MissingHostParent { fiber } => {
                write!(f, "fiber {fiber} has no host parent")
            }
            ReconcileError::UnresolvedComponent { fiber } => {
                write!(f, "fiber {fiber} reached commit without rendering")
            }
            ReconcileError::MissingInstance { fiber } => {
                write!(f, "fiber {fiber} has no host instance")
            }
            ReconcileError::ReentrantPassiveFlush => {
                f.write_str("passive effects flushed while rendering or committing")
            }
            ReconcileError::RootPoisoned => f.write_str("root failed earlier and was poisoned"),
        }
    }
}

impl std::error::Error for ReconcileError {}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod render_tests;

#[cfg(test)]
#[path = "tests/hook_tests.rs"]
mod hook_tests;

#[cfg(test)]
#[path = "tests/commit_tests.rs"]
mod commit_tests;
