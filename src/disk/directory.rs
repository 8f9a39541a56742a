//! Catalog entries and the catalog scan.
//!
//! Every cylinder after the volume header starts with a 64-byte header
//! (32 logical bytes) that either describes the file stored in that cylinder,
//! marks the slot as deleted, or marks the end of the catalog.

use std::fmt;
use std::io;

use globset::{GlobBuilder, GlobMatcher};
use log::debug;

use crate::disk::codec::{self, TERMINATOR};
use crate::disk::error::DiskError;
use crate::disk::geometry::{self, Geometry, HEADER_SIZE, NAME_LENGTH};
use crate::disk::image::Image;

const STATUS_END: u8 = 0x00;
const STATUS_DELETED: u8 = 0xFF;

const FILE_TYPE_OBJECT: u8 = b'O';
const FILE_TYPE_BASIC: u8 = b'B';

// Logical offsets within a catalog entry header.
const ENTRY_FILENAME_OFFSET: usize = 0;
const ENTRY_TERMINATOR_OFFSET: usize = 15;
const ENTRY_START_ADDRESS_OFFSET: usize = 16;
const ENTRY_END_ADDRESS_OFFSET: usize = 18;
const ENTRY_AUTO_ADDRESS_OFFSET: usize = 20;
const ENTRY_FILE_TYPE_OFFSET: usize = 22;
const ENTRY_FLAG_OFFSET: usize = 23;

/// Derived from the first byte of a catalog entry header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryStatus {
    /// No further cylinders are part of the catalog.
    End,
    /// A free slot left behind by an erased file.
    Deleted,
    Active,
}

impl EntryStatus {
    pub fn from_byte(byte: u8) -> EntryStatus {
        match byte {
            STATUS_END => EntryStatus::End,
            STATUS_DELETED => EntryStatus::Deleted,
            _ => EntryStatus::Active,
        }
    }
}

/// The file type tag of a catalog entry.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum FileType {
    /// Machine code ('O').
    Object,
    /// A BASIC program ('B').
    Basic,
    Unknown(u8),
}

impl FileType {
    pub fn from_byte(byte: u8) -> FileType {
        match byte {
            FILE_TYPE_OBJECT => FileType::Object,
            FILE_TYPE_BASIC => FileType::Basic,
            b => FileType::Unknown(b),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            FileType::Object => FILE_TYPE_OBJECT,
            FileType::Basic => FILE_TYPE_BASIC,
            FileType::Unknown(b) => b,
        }
    }

    /// Parse a file type tag such as "O" or "b".
    pub fn from_string(string: &str) -> Option<FileType> {
        match string.to_uppercase().as_str() {
            "O" => Some(FileType::Object),
            "B" => Some(FileType::Basic),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let byte = self.to_byte();
        if byte.is_ascii_graphic() {
            write!(f, "{}", byte as char)
        } else {
            f.write_str("?")
        }
    }
}

/// One catalog entry: the header of the cylinder holding the file.
#[derive(Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub status: EntryStatus,
    pub filename: String,
    pub start_address: u16,
    pub end_address: u16,
    pub auto_address: u16,
    pub file_type: FileType,
    /// Carried through verbatim; its meaning is undocumented.
    pub flag: u8,
    /// The cylinder this entry (and its file) occupies.
    pub cylinder: usize,
}

impl DirectoryEntry {
    /// Parse a `HEADER_SIZE` header read from `cylinder`.
    pub fn parse(bytes: &[u8], cylinder: usize) -> DirectoryEntry {
        assert_eq!(bytes.len(), HEADER_SIZE);
        DirectoryEntry {
            status: EntryStatus::from_byte(codec::byte_at(bytes, 0)),
            filename: codec::decode(&bytes[ENTRY_FILENAME_OFFSET..], NAME_LENGTH + 1)
                .trim_end()
                .to_string(),
            start_address: codec::u16_at(bytes, ENTRY_START_ADDRESS_OFFSET),
            end_address: codec::u16_at(bytes, ENTRY_END_ADDRESS_OFFSET),
            auto_address: codec::u16_at(bytes, ENTRY_AUTO_ADDRESS_OFFSET),
            file_type: FileType::from_byte(codec::byte_at(bytes, ENTRY_FILE_TYPE_OFFSET)),
            flag: codec::byte_at(bytes, ENTRY_FLAG_OFFSET),
            cylinder,
        }
    }

    /// Serialize this entry into a `HEADER_SIZE` buffer.  The name is padded
    /// with spaces to 15 characters and terminated; bytes after the known
    /// fields are zeroed.
    pub fn to_bytes(&self, bytes: &mut [u8]) -> io::Result<()> {
        assert_eq!(bytes.len(), HEADER_SIZE);
        geometry::check_name(&self.filename)?;
        for b in bytes.iter_mut() {
            *b = 0;
        }
        let name = self.filename.as_bytes();
        for i in 0..NAME_LENGTH {
            let c = name.get(i).copied().unwrap_or(b' ');
            codec::set_byte_at(bytes, ENTRY_FILENAME_OFFSET + i, c);
        }
        codec::set_byte_at(bytes, ENTRY_TERMINATOR_OFFSET, TERMINATOR);
        codec::set_u16_at(bytes, ENTRY_START_ADDRESS_OFFSET, self.start_address);
        codec::set_u16_at(bytes, ENTRY_END_ADDRESS_OFFSET, self.end_address);
        codec::set_u16_at(bytes, ENTRY_AUTO_ADDRESS_OFFSET, self.auto_address);
        codec::set_byte_at(bytes, ENTRY_FILE_TYPE_OFFSET, self.file_type.to_byte());
        codec::set_byte_at(bytes, ENTRY_FLAG_OFFSET, self.flag);
        Ok(())
    }

    /// The file length in bytes, `end - start + 1`.
    pub fn data_size(&self) -> io::Result<usize> {
        if self.end_address < self.start_address {
            return Err(DiskError::InvalidAddressRange.into());
        }
        Ok((self.end_address - self.start_address) as usize + 1)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == EntryStatus::Active
    }

    /// Byte offset of this entry's header within the image.
    #[inline]
    pub fn header_offset(&self, geometry: &Geometry) -> usize {
        geometry.cylinder_offset(self.cylinder)
    }
}

impl fmt::Display for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:16} {}  {:04X} {:04X} {:04X} {:02X}",
            self.filename,
            self.file_type,
            self.start_address,
            self.end_address,
            self.auto_address,
            self.flag
        )
    }
}

impl fmt::Debug for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "\"{}\",{:?},{} {:04X}-{:04X} @ cylinder {}",
            self.filename,
            self.status,
            self.file_type,
            self.start_address,
            self.end_address,
            self.cylinder
        )
    }
}

/// A "does this name match" predicate used to select catalog entries.
pub trait NameMatch {
    fn name_matches(&self, filename: &str) -> bool;
}

impl NameMatch for GlobMatcher {
    fn name_matches(&self, filename: &str) -> bool {
        self.is_match(filename)
    }
}

impl NameMatch for str {
    fn name_matches(&self, filename: &str) -> bool {
        self == filename
    }
}

/// Compile a case-insensitive glob pattern (`*` and `?` wildcards) for
/// matching catalog filenames.
pub fn pattern(glob: &str) -> io::Result<GlobMatcher> {
    GlobBuilder::new(glob)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| {
            debug!("bad pattern {:?}: {}", glob, e);
            DiskError::InvalidPattern.into()
        })
}

/// Compile a case-insensitive matcher for exactly `filename`.  Glob
/// metacharacters in the name match only themselves.
pub fn literal(filename: &str) -> io::Result<GlobMatcher> {
    GlobBuilder::new(&globset::escape(filename))
        .case_insensitive(true)
        .literal_separator(true)
        .backslash_escape(false)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| {
            debug!("bad filename {:?}: {}", filename, e);
            DiskError::InvalidFilename.into()
        })
}

/// This iterator walks cylinders 1 to N-1 and yields their catalog entries,
/// deleted ones included, until an END header is found.  Cylinders after the
/// END header are never read.
pub struct DirectoryIterator<'a> {
    image: &'a Image,
    geometry: &'a Geometry,
    cylinder: usize,
    done: bool,
}

impl<'a> DirectoryIterator<'a> {
    pub fn new(image: &'a Image, geometry: &'a Geometry) -> DirectoryIterator<'a> {
        DirectoryIterator {
            image,
            geometry,
            cylinder: 1,
            done: false,
        }
    }

    /// Restrict the sequence to active entries.
    pub fn active(self) -> impl Iterator<Item = io::Result<DirectoryEntry>> + 'a {
        self.filter(|r| match r {
            Ok(entry) => entry.is_active(),
            Err(_) => true,
        })
    }

    /// The first cylinder that a new file may occupy: the END slot or the
    /// first deleted slot, whichever comes first.
    pub fn first_free(mut self) -> io::Result<usize> {
        for entry in self.by_ref() {
            let entry = entry?;
            if entry.status == EntryStatus::Deleted {
                return Ok(entry.cylinder);
            }
        }
        match self.end_cylinder() {
            Some(cylinder) => Ok(cylinder),
            None => Err(DiskError::NoFreeSlot.into()),
        }
    }

    /// After the iteration has finished, the cylinder holding the END
    /// header, if one was reached.
    pub fn end_cylinder(&self) -> Option<usize> {
        if self.done && self.cylinder < self.geometry.cylinders {
            Some(self.cylinder)
        } else {
            None
        }
    }
}

impl<'a> Iterator for DirectoryIterator<'a> {
    type Item = io::Result<DirectoryEntry>;

    fn next(&mut self) -> Option<io::Result<DirectoryEntry>> {
        if self.done {
            return None;
        }
        if self.cylinder >= self.geometry.cylinders {
            self.done = true;
            return None;
        }

        let offset = self.geometry.cylinder_offset(self.cylinder);
        let bytes = match self.image.slice(offset, HEADER_SIZE) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let entry = DirectoryEntry::parse(bytes, self.cylinder);
        match entry.status {
            EntryStatus::End => {
                debug!("end of catalog at cylinder {}", self.cylinder);
                // Leave self.cylinder on the END slot.
                self.done = true;
                None
            }
            EntryStatus::Deleted | EntryStatus::Active => {
                debug!("cylinder {}: {:?}", self.cylinder, entry);
                self.cylinder += 1;
                Some(Ok(entry))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, cylinder: usize) -> DirectoryEntry {
        DirectoryEntry {
            status: EntryStatus::Active,
            filename: name.to_string(),
            start_address: 0x1000,
            end_address: 0x10FF,
            auto_address: 0x1000,
            file_type: FileType::Object,
            flag: 0x00,
            cylinder,
        }
    }

    /// Build an image with catalog headers written at the given cylinders.
    fn catalog_image(headers: &[(usize, Option<&DirectoryEntry>, u8)]) -> (Image, Geometry) {
        let geometry = Geometry::new("CAT", 8, 1, 4).unwrap();
        let mut image = Image::open_memory(geometry.size());
        for &(cylinder, entry, status) in headers {
            let bytes = image
                .slice_mut(geometry.cylinder_offset(cylinder), HEADER_SIZE)
                .unwrap();
            if let Some(entry) = entry {
                entry.to_bytes(bytes).unwrap();
            }
            if status != 0 {
                bytes[0] = status;
            }
        }
        (image, geometry)
    }

    #[test]
    fn test_entry_layout() {
        let mut e = entry("HELLO", 1);
        e.file_type = FileType::Basic;
        e.start_address = 0x0400;
        e.end_address = 0x0523;
        e.auto_address = 0xB147;
        e.flag = 0x12;
        let mut bytes = [0xEEu8; HEADER_SIZE];
        e.to_bytes(&mut bytes).unwrap();
        assert_eq!(&bytes[0..10], &[b'H', 0, b'E', 0, b'L', 0, b'L', 0, b'O', 0]);
        assert!(bytes[10..30].chunks(2).all(|pair| pair == [b' ', 0]));
        assert_eq!(&bytes[0x1E..0x20], &[0x04, 0]);
        assert_eq!(
            &bytes[0x20..0x30],
            &[0x00, 0, 0x04, 0, 0x23, 0, 0x05, 0, 0x47, 0, 0xB1, 0, b'B', 0, 0x12, 0]
        );
        assert!(bytes[0x30..].iter().all(|&b| b == 0));

        let parsed = DirectoryEntry::parse(&bytes, 1);
        assert_eq!(parsed, e);
        assert_eq!(parsed.data_size().unwrap(), 0x124);
        assert_eq!(
            parsed.to_string(),
            "HELLO            B  0400 0523 B147 12"
        );
    }

    #[test]
    fn test_status() {
        assert_eq!(EntryStatus::from_byte(0x00), EntryStatus::End);
        assert_eq!(EntryStatus::from_byte(0xFF), EntryStatus::Deleted);
        assert_eq!(EntryStatus::from_byte(b'A'), EntryStatus::Active);
        assert_eq!(EntryStatus::from_byte(0x01), EntryStatus::Active);
    }

    #[test]
    fn test_invalid_range() {
        let mut e = entry("BACKWARDS", 1);
        e.end_address = e.start_address - 1;
        assert_eq!(e.data_size().unwrap_err(), DiskError::InvalidAddressRange);
        e.end_address = e.start_address;
        assert_eq!(e.data_size().unwrap(), 1);
    }

    #[test]
    fn test_scan_stops_at_end() {
        let a = entry("A", 1);
        let b = entry("B", 2);
        let stale = entry("STALE", 4);
        // Cylinder 3 is END, cylinder 4 holds an active header that must not
        // be reported.
        let (image, geometry) =
            catalog_image(&[(1, Some(&a), 0), (2, Some(&b), 0), (4, Some(&stale), 0)]);
        let names: Vec<String> = DirectoryIterator::new(&image, &geometry)
            .map(|e| e.unwrap().filename)
            .collect();
        assert_eq!(names, vec!["A", "B"]);

        let mut iter = DirectoryIterator::new(&image, &geometry);
        assert_eq!(iter.by_ref().count(), 2);
        assert_eq!(iter.end_cylinder(), Some(3));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_scan_restartable() {
        let a = entry("A", 1);
        let (image, geometry) = catalog_image(&[(1, Some(&a), 0)]);
        let first: Vec<_> = DirectoryIterator::new(&image, &geometry)
            .map(|e| e.unwrap())
            .collect();
        let second: Vec<_> = DirectoryIterator::new(&image, &geometry)
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_deleted_entries() {
        let a = entry("A", 1);
        let b = entry("B", 3);
        let (image, geometry) =
            catalog_image(&[(1, Some(&a), 0), (2, Some(&a), STATUS_DELETED), (3, Some(&b), 0)]);
        let all: Vec<_> = DirectoryIterator::new(&image, &geometry)
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].status, EntryStatus::Deleted);

        let active: Vec<String> = DirectoryIterator::new(&image, &geometry)
            .active()
            .map(|e| e.unwrap().filename)
            .collect();
        assert_eq!(active, vec!["A", "B"]);

        assert_eq!(
            DirectoryIterator::new(&image, &geometry).first_free().unwrap(),
            2
        );
    }

    #[test]
    fn test_first_free() {
        let (image, geometry) = catalog_image(&[]);
        assert_eq!(
            DirectoryIterator::new(&image, &geometry).first_free().unwrap(),
            1
        );

        let a = entry("A", 1);
        let full: Vec<(usize, Option<&DirectoryEntry>, u8)> =
            (1..8).map(|c| (c, Some(&a), 0)).collect();
        let (image, geometry) = catalog_image(&full);
        let mut iter = DirectoryIterator::new(&image, &geometry);
        assert_eq!(iter.by_ref().count(), 7);
        assert_eq!(iter.end_cylinder(), None);
        assert_eq!(
            DirectoryIterator::new(&image, &geometry)
                .first_free()
                .unwrap_err(),
            DiskError::NoFreeSlot
        );
    }

    #[test]
    fn test_patterns() {
        let p = pattern("HE*").unwrap();
        assert!(p.name_matches("HELLO"));
        assert!(p.name_matches("hello"));
        assert!(!p.name_matches("THE"));
        let p = pattern("GAME?").unwrap();
        assert!(p.name_matches("GAME1"));
        assert!(!p.name_matches("GAME12"));
        assert!("EXACT".name_matches("EXACT"));
        assert!(!"EXACT".name_matches("exact"));
        assert_eq!(pattern("[").unwrap_err(), DiskError::InvalidPattern);
    }

    #[test]
    fn test_literal_names() {
        for name in &["DATA[1", "A*B", "WHY?", "{X,Y}", "C:\\TMP\\", "]!-"] {
            let m = literal(name).unwrap();
            assert!(m.name_matches(name));
            assert!(m.name_matches(&name.to_lowercase()));
        }
        assert!(!literal("A*B").unwrap().name_matches("AXB"));
        assert!(!literal("WHY?").unwrap().name_matches("WHY1"));
        assert!(!literal("{X,Y}").unwrap().name_matches("X"));
        assert!(!literal("GAME").unwrap().name_matches("GAME1"));
    }
}
