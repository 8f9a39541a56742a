//! Disk geometry, the volume header in cylinder 0, and the format profiles
//! that distinguish the two generations of image files.

use std::fmt;
use std::io;

use log::{debug, warn};

use crate::disk::codec::{self, TERMINATOR};
use crate::disk::error::DiskError;
use crate::disk::image::Image;

/// Bytes per physical sector.
pub const SECTOR_SIZE: usize = 512;

/// Raw size of the volume header and of every catalog entry header.
pub const HEADER_SIZE: usize = 64;

/// Longest name that fits before the terminator.
pub const NAME_LENGTH: usize = 15;

// Logical offsets within the volume header.
const VOLUME_NAME_OFFSET: usize = 0;
const VOLUME_CYLINDERS_OFFSET: usize = 16;
const VOLUME_HEADS_OFFSET: usize = 18;
const VOLUME_SECTORS_OFFSET: usize = 19;

/// How the volume header stores the number of cylinders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CylinderEncoding {
    /// The stored value is the cylinder count.
    Count,
    /// The stored value is the highest cylinder index (count - 1).
    MaxIndex,
}

impl CylinderEncoding {
    /// Convert the stored header value to a true cylinder count.
    #[inline]
    pub fn to_count(self, stored: u16) -> usize {
        match self {
            CylinderEncoding::Count => stored as usize,
            CylinderEncoding::MaxIndex => stored as usize + 1,
        }
    }

    /// Convert a true cylinder count to the value stored in the header.
    pub fn to_stored(self, count: usize) -> io::Result<u16> {
        let stored = match self {
            CylinderEncoding::Count => Some(count),
            CylinderEncoding::MaxIndex => count.checked_sub(1),
        };
        match stored {
            Some(s) if s <= u16::MAX as usize => Ok(s as u16),
            _ => Err(DiskError::InvalidGeometry.into()),
        }
    }
}

/// How an image whose length disagrees with its header is treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizePolicy {
    /// Any difference is a geometry mismatch.
    Exact,
    /// A shorter image is a mismatch; trailing bytes are only reported.
    AllowTrailing,
}

/// The conventions of one generation of image files.  A single `Geometry`
/// implementation serves every profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatProfile {
    pub name: &'static str,
    pub cylinder_encoding: CylinderEncoding,
    pub size_policy: SizePolicy,
    /// Whether file data skips the sector positions reserved by the
    /// controller's sequential access (see `block::SectorCounter`).
    pub sector_skip: bool,
}

/// First-generation images: literal cylinder count, exact size, contiguous
/// data sectors.
pub static V1: FormatProfile = FormatProfile {
    name: "v1",
    cylinder_encoding: CylinderEncoding::Count,
    size_policy: SizePolicy::Exact,
    sector_skip: false,
};

/// Second-generation images: max-index cylinder count, trailing padding
/// tolerated, sector skip applied.
pub static V2: FormatProfile = FormatProfile {
    name: "v2",
    cylinder_encoding: CylinderEncoding::MaxIndex,
    size_policy: SizePolicy::AllowTrailing,
    sector_skip: true,
};

pub static PROFILES: [&FormatProfile; 2] = [&V1, &V2];

impl FormatProfile {
    pub fn from_name(name: &str) -> Option<&'static FormatProfile> {
        PROFILES
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .copied()
    }

    /// Check an actual image length against the length a geometry expects.
    pub fn check_size(&self, expected: usize, actual: usize) -> io::Result<()> {
        let mismatch = match self.size_policy {
            SizePolicy::Exact => actual != expected,
            SizePolicy::AllowTrailing => actual < expected,
        };
        if mismatch {
            return Err(DiskError::GeometryMismatch { expected, actual }.into());
        }
        if actual > expected {
            warn!(
                "image has {} trailing bytes beyond the expected size of {}",
                actual - expected,
                expected
            );
        }
        Ok(())
    }
}

/// Cylinder, head and sector counts of an image, plus the volume name.
/// `cylinders` is always the true count, whatever the profile stores.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub name: String,
    pub cylinders: usize,
    pub heads: u8,
    pub sectors: u8,
}

impl Geometry {
    pub fn new(name: &str, cylinders: usize, heads: u8, sectors: u8) -> io::Result<Geometry> {
        check_name(name)?;
        let geometry = Geometry {
            name: name.to_string(),
            cylinders,
            heads,
            sectors,
        };
        geometry.check()?;
        Ok(geometry)
    }

    fn check(&self) -> io::Result<()> {
        // The translator needs at least two sectors per track, and cylinder 0
        // is always the volume header.
        if self.cylinders < 1 || self.heads < 1 || self.sectors < 2 {
            return Err(DiskError::InvalidGeometry.into());
        }
        Ok(())
    }

    /// Bytes per cylinder.
    #[inline]
    pub fn cylinder_size(&self) -> usize {
        self.heads as usize * self.sectors as usize * SECTOR_SIZE
    }

    /// Physical sectors per cylinder, the header sector included.
    #[inline]
    pub fn sectors_per_cylinder(&self) -> usize {
        self.heads as usize * self.sectors as usize
    }

    /// Byte offset of the first byte of a cylinder.
    #[inline]
    pub fn cylinder_offset(&self, cylinder: usize) -> usize {
        self.cylinder_size() * cylinder
    }

    /// The total number of bytes an image of this geometry occupies.
    pub fn size(&self) -> usize {
        self.cylinders * self.cylinder_size()
    }

    /// Read the volume header from cylinder 0 and validate the image length
    /// against it.
    pub fn read(image: &Image, profile: &FormatProfile) -> io::Result<Geometry> {
        let geometry = Self::from_header(image.slice(0, HEADER_SIZE)?, profile)?;
        debug!(
            "volume \"{}\" C/H/S {}/{}/{} ({} profile)",
            geometry.name, geometry.cylinders, geometry.heads, geometry.sectors, profile.name
        );
        profile.check_size(geometry.size(), image.len())?;
        Ok(geometry)
    }

    /// Decode a volume header.  No size validation is performed.
    pub fn from_header(header: &[u8], profile: &FormatProfile) -> io::Result<Geometry> {
        let stored = codec::u16_at(header, VOLUME_CYLINDERS_OFFSET);
        let geometry = Geometry {
            name: codec::decode(&header[VOLUME_NAME_OFFSET..], NAME_LENGTH + 1),
            cylinders: profile.cylinder_encoding.to_count(stored),
            heads: codec::byte_at(header, VOLUME_HEADS_OFFSET),
            sectors: codec::byte_at(header, VOLUME_SECTORS_OFFSET),
        };
        geometry.check()?;
        Ok(geometry)
    }

    /// Encode the volume header into `header`, which must be `HEADER_SIZE`
    /// bytes.  Bytes beyond the known fields are zeroed.
    pub fn write_header(&self, header: &mut [u8], profile: &FormatProfile) -> io::Result<()> {
        assert_eq!(header.len(), HEADER_SIZE);
        check_name(&self.name)?;
        self.check()?;
        let stored = profile.cylinder_encoding.to_stored(self.cylinders)?;
        for b in header.iter_mut() {
            *b = 0;
        }
        let name = self.name.as_bytes();
        for (i, &c) in name.iter().enumerate() {
            codec::set_byte_at(header, VOLUME_NAME_OFFSET + i, c);
        }
        codec::set_byte_at(header, VOLUME_NAME_OFFSET + name.len(), TERMINATOR);
        codec::set_u16_at(header, VOLUME_CYLINDERS_OFFSET, stored);
        codec::set_byte_at(header, VOLUME_HEADS_OFFSET, self.heads);
        codec::set_byte_at(header, VOLUME_SECTORS_OFFSET, self.sectors);
        Ok(())
    }
}

impl Default for Geometry {
    fn default() -> Geometry {
        Geometry {
            name: "ORAO".to_string(),
            cylinders: 124,
            heads: 16,
            sectors: 63,
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Disk name : {}", self.name)?;
        write!(f, "C/H/S : {}/{}/{}", self.cylinders, self.heads, self.sectors)
    }
}

/// Names must be 1-15 printable ASCII characters, and cannot contain the
/// terminator.  Stored names are space-padded and read back trimmed, so a
/// name may not begin or end with a space.
pub fn check_name(name: &str) -> io::Result<()> {
    if name.len() > NAME_LENGTH {
        return Err(DiskError::FilenameTooLong.into());
    }
    if name.is_empty()
        || name.trim() != name
        || !name.bytes().all(|c| (0x20..0x7F).contains(&c))
    {
        return Err(DiskError::InvalidFilename.into());
    }
    Ok(())
}
