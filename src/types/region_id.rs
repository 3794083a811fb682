//! Region identifier newtype.

use std::fmt;

/// Identifier of a region (polygon record) in a region collection.
///
/// Ids are assigned in shapefile record order starting at zero, matching
/// the numbering used on the region axis of fraction rasters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RegionId(u32);

impl RegionId {
    /// Create a new region id.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Position of this id when ids are dense from zero.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl From<u32> for RegionId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<RegionId> for u32 {
    #[inline]
    fn from(id: RegionId) -> u32 {
        id.0
    }
}
