use core::fmt;
use core::num::NonZeroU32;

/// Position of a node, link, tank, pattern or curve in its arena.
///
/// Stored as `index + 1` in a `NonZeroU32` so `Option<Id>` stays four bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZeroU32);

impl Id {
    pub fn from_index(index: u32) -> Self {
        Self(NonZeroU32::new(index.saturating_add(1)).unwrap_or(NonZeroU32::MIN))
    }

    /// Create an Id from a `usize` position in an arena.
    pub fn from_usize(index: usize) -> Self {
        Self::from_index(index as u32)
    }

    pub fn index(self) -> u32 {
        self.0.get() - 1
    }

    /// Recover the 0-based index as an arena position.
    pub fn pos(self) -> usize {
        self.index() as usize
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

// Aliases name the arena an id points into.
pub type NodeId = Id;
pub type LinkId = Id;
pub type TankId = Id;
pub type PatternId = Id;
pub type CurveId = Id;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trip_index() {
        for i in [0_u32, 1, 2, 42, 10_000] {
            let id = Id::from_index(i);
            assert_eq!(id.index(), i);
            assert_eq!(Id::from_usize(i as usize).pos(), i as usize);
        }
    }

    #[test]
    fn option_id_is_small() {
        assert_eq!(
            core::mem::size_of::<Id>(),
            core::mem::size_of::<Option<Id>>()
        );
    }
}
