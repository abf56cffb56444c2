//! Depth-first driver of one render pass.

use std::rc::Rc;

use log::trace;

use crate::begin_work::begin_work;
use crate::complete_work::complete_work;
use crate::fiber::{create_work_in_progress, FiberArena, FiberId, FiberProps};
use crate::host_config::HostConfig;
use crate::root::{RootOptions, RootShared};
use crate::ReconcileError;

/// State of an in-progress render. Owns the only cursor into the
/// work-in-progress tree.
pub(crate) struct RenderSession<'a, H: HostConfig> {
    pub(crate) arena: &'a mut FiberArena<H>,
    pub(crate) host: &'a mut H,
    pub(crate) shared: &'a Rc<RootShared>,
    pub(crate) options: &'a RootOptions,
    work_in_progress: Option<FiberId>,
    units: usize,
}

impl<'a, H: HostConfig> RenderSession<'a, H> {
    pub(crate) fn new(
        arena: &'a mut FiberArena<H>,
        host: &'a mut H,
        shared: &'a Rc<RootShared>,
        options: &'a RootOptions,
    ) -> Self {
        Self {
            arena,
            host,
            shared,
            options,
            work_in_progress: None,
            units: 0,
        }
    }

    /// Merges interleaved updates and creates the work-in-progress root.
    pub(crate) fn prepare_fresh_stack(&mut self, current_root: FiberId) -> FiberId {
        self.shared.concurrent_queues.finish_queueing();
        let root = create_work_in_progress(self.arena, current_root, FiberProps::None);
        self.work_in_progress = Some(root);
        root
    }

    pub(crate) fn work_loop_sync(&mut self) -> Result<usize, ReconcileError> {
        while let Some(unit) = self.work_in_progress {
            self.perform_unit_of_work(unit)?;
        }
        Ok(self.units)
    }

    fn perform_unit_of_work(&mut self, unit: FiberId) -> Result<(), ReconcileError> {
        self.units += 1;
        trace!("begin {unit} {:?}", self.arena[unit].tag);
        let current = self.arena[unit].alternate;
        let next = begin_work(self, current, unit)?;

        let fiber = &mut self.arena[unit];
        fiber.memoized_props = fiber.pending_props.clone();

        match next {
            Some(child) => self.work_in_progress = Some(child),
            None => self.complete_unit_of_work(unit)?,
        }
        Ok(())
    }

    fn complete_unit_of_work(&mut self, unit: FiberId) -> Result<(), ReconcileError> {
        let mut completed = unit;
        loop {
            complete_work(self, completed)?;
            let fiber = &self.arena[completed];
            if let Some(sibling) = fiber.sibling {
                self.work_in_progress = Some(sibling);
                return Ok(());
            }
            match fiber.return_fiber {
                Some(parent) => completed = parent,
                None => {
                    self.work_in_progress = None;
                    return Ok(());
                }
            }
        }
    }
}
