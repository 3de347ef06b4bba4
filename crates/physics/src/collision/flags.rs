//! Content flags for collision filtering.

use serde::{Deserialize, Serialize};

/// What kind of volume a brush is.
///
/// Queries pass a mask; a brush takes part only if its contents intersect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContentFlags(pub u32);

impl ContentFlags {
    /// Empty space - nothing here.
    pub const EMPTY: Self = Self(0);

    /// Solid level geometry: floors, walls, platforms.
    pub const SOLID: Self = Self(1 << 0);

    /// Blocks the character but not probes for ground.
    pub const PLAYER_CLIP: Self = Self(1 << 1);

    /// Overlap-only volume. Never blocks and never counts as ground.
    pub const TRIGGER: Self = Self(1 << 2);

    /// Jump pad volume. Overlap-only, like a trigger.
    pub const JUMP_PAD: Self = Self(1 << 3);

    /// What the ground probe and the rewind probe stand on.
    pub const MASK_GROUND: Self = Self::SOLID;

    /// What blocks the character body.
    pub const MASK_BODY: Self = Self(Self::SOLID.0 | Self::PLAYER_CLIP.0);

    /// Check if these flags contain a specific flag.
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any of the given flags are set.
    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Overlap-only contents never block movement.
    #[inline]
    pub fn is_overlap_only(self) -> bool {
        self.intersects(Self::TRIGGER | Self::JUMP_PAD) && !self.intersects(Self::MASK_BODY)
    }
}

impl std::ops::BitOr for ContentFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for ContentFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks() {
        assert!(ContentFlags::MASK_BODY.contains(ContentFlags::SOLID));
        assert!(ContentFlags::MASK_BODY.contains(ContentFlags::PLAYER_CLIP));
        assert!(!ContentFlags::MASK_GROUND.intersects(ContentFlags::PLAYER_CLIP));
        assert!(!ContentFlags::MASK_GROUND.intersects(ContentFlags::TRIGGER));
    }

    #[test]
    fn test_overlap_only() {
        assert!(ContentFlags::TRIGGER.is_overlap_only());
        assert!(ContentFlags::JUMP_PAD.is_overlap_only());
        assert!(!(ContentFlags::JUMP_PAD | ContentFlags::SOLID).is_overlap_only());
        assert!(!ContentFlags::EMPTY.is_overlap_only());
    }
}
