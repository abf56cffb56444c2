//! Testing utilities and harness for Fiber-RS

pub mod testing;

// Re-export testing utilities
pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
    pub use fiber_core::{
        Cleanup, Component, Element, HookContext, HostOp, Node, NodeRef, Props, PropChange,
        ReconcileError, RootOptions, SetState,
    };
}
