//! Entity identifiers and monotonic id generators

use core::fmt;

/// Identifier of a game entity that owns physics state
///
/// The physics layer never interprets the value; it only carries it back
/// to the caller in events and lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntityId(pub u64);

impl EntityId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Monotonic id source owned by a single system
///
/// Each system keeps its own generator, so ids are deterministic per
/// instance and no process-wide counter exists.
#[derive(Clone, Debug)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Generator whose first id is `start`
    pub const fn starting_at(start: u64) -> Self {
        Self { next: start }
    }

    /// Generate the next id
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id the next call will return
    pub fn peek(&self) -> u64 {
        self.next
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
