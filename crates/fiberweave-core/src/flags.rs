use bitflags::bitflags;

bitflags! {
    /// Side effects a fiber carries into the commit phase.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u32 {
        const PLACEMENT = 0b0001;
        const UPDATE = 0b0010;
        const CHILD_DELETION = 0b0100;
        const PASSIVE = 0b1000;

        const MUTATION_MASK = Self::PLACEMENT.bits() | Self::UPDATE.bits() | Self::CHILD_DELETION.bits();
        const PASSIVE_MASK = Self::PASSIVE.bits() | Self::CHILD_DELETION.bits();
    }
}

bitflags! {
    /// Tags on an effect record.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct HookFlags: u8 {
        /// The effect must fire during the next flush.
        const HAS_EFFECT = 0b0001;
        const PASSIVE = 0b1000;
    }
}

bitflags! {
    /// What the owning root is doing right now.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
    pub(crate) struct ExecutionContext: u8 {
        const RENDER = 0b010;
        const COMMIT = 0b100;
    }
}
