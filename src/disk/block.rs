//! Translation of a file's logical data blocks to byte offsets in the image.
//!
//! A file lives entirely within one cylinder.  Sector 0 of the cylinder holds
//! the catalog entry header, and data starts in the following sector.  Each
//! 512-byte sector carries one 256-byte logical block (byte-pair encoded).
//! The controller cannot reach the sector positions straddling the first head
//! boundary in sequential access, so on profiles with the sector skip the
//! position counter jumps over them exactly once.

use std::io;

use log::debug;

use crate::disk::codec::PAIR_SIZE;
use crate::disk::error::DiskError;
use crate::disk::geometry::{FormatProfile, Geometry, SECTOR_SIZE};

/// Logical bytes per data block.
pub const BLOCK_SIZE: usize = SECTOR_SIZE / PAIR_SIZE;

/// The running sector position counter.  Each call to `step()` consumes one
/// block and yields the counter for the next one, so a sequence of blocks is
/// a fold over this value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectorCounter {
    next: usize,
    skip_at: Option<usize>,
}

/// The outcome of placing one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectorStep {
    /// Data sector position of the block, counted from the sector after the
    /// header.
    pub position: usize,
    /// True if the counter jumped over the reserved positions for this block.
    pub skipped: bool,
}

impl SectorCounter {
    pub fn new(sectors: u8, sector_skip: bool) -> SectorCounter {
        SectorCounter {
            next: 0,
            skip_at: if sector_skip {
                (sectors as usize).checked_sub(2)
            } else {
                None
            },
        }
    }

    pub fn for_profile(geometry: &Geometry, profile: &FormatProfile) -> SectorCounter {
        Self::new(geometry.sectors, profile.sector_skip)
    }

    /// Place one block.  The skip is decided on the value accumulated from all
    /// prior blocks: when it equals `sectors - 2`, the block lands two
    /// positions further on.
    pub fn step(self) -> (SectorCounter, SectorStep) {
        let skipped = self.skip_at == Some(self.next);
        let position = if skipped { self.next + 2 } else { self.next };
        let counter = SectorCounter {
            next: position + 1,
            ..self
        };
        (counter, SectorStep { position, skipped })
    }

    /// An endless sequence of block positions starting from this counter.
    pub fn positions(self) -> impl Iterator<Item = usize> {
        (0..).scan(self, |counter, _: usize| {
            let (next, step) = counter.step();
            *counter = next;
            Some(step.position)
        })
    }
}

/// The location of one block of file data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    /// Byte offset of the block within the image.
    pub offset: usize,
    /// Logical bytes in this block; raw bytes are twice this.
    pub length: usize,
}

impl Extent {
    #[inline]
    pub fn raw_length(&self) -> usize {
        self.length * PAIR_SIZE
    }
}

/// Yield the extents holding `data_size` logical bytes of the file in
/// `cylinder`: `data_size / 256` full blocks followed by the remainder, if
/// any.  Fails with `FileTooLarge` when a block would fall outside the
/// cylinder.
pub struct BlockIterator {
    base: usize,
    sectors_per_cylinder: usize,
    counter: SectorCounter,
    remaining: usize,
}

impl BlockIterator {
    pub fn new(
        geometry: &Geometry,
        profile: &FormatProfile,
        cylinder: usize,
        data_size: usize,
    ) -> BlockIterator {
        BlockIterator {
            base: geometry.cylinder_offset(cylinder),
            sectors_per_cylinder: geometry.sectors_per_cylinder(),
            counter: SectorCounter::for_profile(geometry, profile),
            remaining: data_size,
        }
    }

    /// Resolve every extent up front, so that a file which does not fit is
    /// rejected before anything is read or written.
    pub fn extents(self) -> io::Result<Vec<Extent>> {
        self.collect()
    }
}

impl Iterator for BlockIterator {
    type Item = io::Result<Extent>;

    fn next(&mut self) -> Option<io::Result<Extent>> {
        if self.remaining == 0 {
            return None;
        }
        let (counter, step) = self.counter.step();
        self.counter = counter;
        if step.skipped {
            debug!("skipping to data sector position {}", step.position);
        }

        // Sector 0 holds the header.
        let sector = step.position + 1;
        if sector >= self.sectors_per_cylinder {
            self.remaining = 0;
            return Some(Err(DiskError::FileTooLarge.into()));
        }

        let length = self.remaining.min(BLOCK_SIZE);
        self.remaining -= length;
        Some(Ok(Extent {
            offset: self.base + sector * SECTOR_SIZE,
            length,
        }))
    }
}

/// The most logical bytes a single cylinder can hold under this geometry and
/// profile.
pub fn cylinder_capacity(geometry: &Geometry, profile: &FormatProfile) -> usize {
    let sectors_per_cylinder = geometry.sectors_per_cylinder();
    SectorCounter::for_profile(geometry, profile)
        .positions()
        .take_while(|&position| position + 1 < sectors_per_cylinder)
        .count()
        * BLOCK_SIZE
}
