use bitflags::bitflags;

bitflags! {
    /// Commit-time work recorded on a fiber during render.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u16 {
        const PLACEMENT = 1 << 1;
        const UPDATE = 1 << 2;
        const CHILD_DELETION = 1 << 4;
        const CONTENT_RESET = 1 << 5;
        const REF = 1 << 9;
        const PASSIVE = 1 << 11;

        const MUTATION_MASK = Self::PLACEMENT.bits()
            | Self::UPDATE.bits()
            | Self::CHILD_DELETION.bits()
            | Self::CONTENT_RESET.bits()
            | Self::REF.bits();
        const PASSIVE_MASK = Self::PASSIVE.bits() | Self::CHILD_DELETION.bits();
    }
}

bitflags! {
    /// Tags carried by an effect record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HookFlags: u8 {
        const HAS_EFFECT = 1 << 0;
        const PASSIVE = 1 << 3;
    }
}

bitflags! {
    /// What the root is doing right now.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExecutionContext: u8 {
        const BATCHED = 1 << 0;
        const RENDER = 1 << 1;
        const COMMIT = 1 << 2;
    }
}

impl ExecutionContext {
    pub fn is_working(self) -> bool {
        self.intersects(ExecutionContext::RENDER | ExecutionContext::COMMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_cover_expected_bits() {
        assert!(Flags::MUTATION_MASK.contains(Flags::PLACEMENT | Flags::CHILD_DELETION));
        assert!(!Flags::MUTATION_MASK.contains(Flags::PASSIVE));
        assert!(Flags::PASSIVE_MASK.contains(Flags::CHILD_DELETION));
    }

    #[test]
    fn batched_context_is_not_working() {
        assert!(!ExecutionContext::BATCHED.is_working());
        assert!((ExecutionContext::BATCHED | ExecutionContext::COMMIT).is_working());
    }
}
