//! Combinable mode flags

use std::ops::BitOr;

/// A set of independent mode flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StateFlags(u8);

impl StateFlags {
    pub const NONE: Self = Self(0);
    pub const STARTED: Self = Self(1);
    pub const RUNNING: Self = Self(1 << 1);
    pub const WAITING: Self = Self(1 << 2);
    pub const STOPPED: Self = Self(1 << 3);
    pub const FINISHED: Self = Self(1 << 4);
    pub const ERROR: Self = Self(1 << 5);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for StateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Mutable flag register owned by a single thread.
///
/// The fleet keeps one of these for its batch cycle (`STARTED`/`WAITING`);
/// it carries no synchronization of its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateRegister {
    flags: StateFlags,
}

impl StateRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self) -> StateFlags {
        self.flags
    }

    pub fn activate(&mut self, flags: StateFlags) {
        self.flags.0 |= flags.0;
    }

    pub fn deactivate(&mut self, flags: StateFlags) {
        self.flags.0 &= !flags.0;
    }

    pub fn toggle(&mut self, flags: StateFlags) {
        self.flags.0 ^= flags.0;
    }

    pub fn clear(&mut self) {
        self.flags = StateFlags::NONE;
    }

    /// True if at least one of `flags` is set.
    pub fn contains_any(&self, flags: StateFlags) -> bool {
        self.flags.0 & flags.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.flags == StateFlags::NONE
    }
}
