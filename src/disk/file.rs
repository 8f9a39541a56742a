//! Moving file contents between a cylinder's data sectors and the host.

use std::io::{self, Read};

use crate::disk::block::{BlockIterator, Extent};
use crate::disk::codec;
use crate::disk::directory::{DirectoryEntry, EntryStatus, FileType};
use crate::disk::error::DiskError;
use crate::disk::geometry::{self, FormatProfile, Geometry};
use crate::disk::image::Image;

/// Load and execution parameters recorded in a catalog entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadParameters {
    pub start_address: u16,
    pub auto_address: u16,
    /// Opaque flag byte, written as given.
    pub flag: u8,
}

/// BASIC programs always load at the start of BASIC program memory and
/// auto-start through the interpreter, whatever the caller asks for.
pub static BASIC_LOAD: LoadParameters = LoadParameters {
    start_address: 0x0400,
    auto_address: 0xB147,
    flag: 0x12,
};

impl LoadParameters {
    /// Resolve the parameters actually written for a file of this type.
    pub fn for_type(self, file_type: FileType) -> io::Result<LoadParameters> {
        match file_type {
            FileType::Object => Ok(self),
            FileType::Basic => Ok(BASIC_LOAD),
            FileType::Unknown(t) => Err(DiskError::InvalidType(t).into()),
        }
    }
}

impl Default for LoadParameters {
    fn default() -> LoadParameters {
        LoadParameters {
            start_address: 0x0000,
            auto_address: 0x0000,
            flag: 0x00,
        }
    }
}

/// Build the catalog entry for a new file of `size` bytes.  Everything that
/// can be rejected without looking at the disk is rejected here.
pub fn new_entry(
    filename: &str,
    file_type: FileType,
    load: LoadParameters,
    size: usize,
    cylinder: usize,
) -> io::Result<DirectoryEntry> {
    geometry::check_name(filename)?;
    let load = load.for_type(file_type)?;
    if size == 0 {
        return Err(DiskError::InvalidAddressRange.into());
    }
    let end_address = match (load.start_address as usize).checked_add(size - 1) {
        Some(end) if end <= u16::MAX as usize => end as u16,
        _ => return Err(DiskError::InvalidAddressRange.into()),
    };
    Ok(DirectoryEntry {
        status: EntryStatus::Active,
        filename: filename.to_string(),
        start_address: load.start_address,
        end_address,
        auto_address: load.auto_address,
        file_type,
        flag: load.flag,
        cylinder,
    })
}

/// Resolve the data extents of an entry's file.
pub fn extents(
    geometry: &Geometry,
    profile: &FormatProfile,
    entry: &DirectoryEntry,
) -> io::Result<Vec<Extent>> {
    BlockIterator::new(geometry, profile, entry.cylinder, entry.data_size()?).extents()
}

/// A reader over the contents of one file, decoding the pad bytes away.
pub struct FileReader<'a> {
    image: &'a Image,
    extents: ::std::vec::IntoIter<Extent>,
    current: Option<Extent>,
}

impl<'a> FileReader<'a> {
    pub fn new(image: &'a Image, extents: Vec<Extent>) -> FileReader<'a> {
        FileReader {
            image,
            extents: extents.into_iter(),
            current: None,
        }
    }
}

impl<'a> Read for FileReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total_nbytes = 0;
        while total_nbytes < buf.len() {
            let extent = match self.current.take().or_else(|| self.extents.next()) {
                Some(extent) => extent,
                None => break,
            };
            let nbytes = extent.length.min(buf.len() - total_nbytes);
            let raw = self.image.slice(extent.offset, nbytes * codec::PAIR_SIZE)?;
            codec::decode_into(raw, &mut buf[total_nbytes..total_nbytes + nbytes]);
            total_nbytes += nbytes;

            // Keep the unread portion of this extent for the next call.
            if nbytes < extent.length {
                self.current = Some(Extent {
                    offset: extent.offset + nbytes * codec::PAIR_SIZE,
                    length: extent.length - nbytes,
                });
            }
        }
        Ok(total_nbytes)
    }
}

/// Encode `data` into the given extents, which must together hold exactly
/// `data.len()` logical bytes.
pub fn write_data(image: &mut Image, extents: &[Extent], data: &[u8]) -> io::Result<()> {
    let capacity: usize = extents.iter().map(|e| e.length).sum();
    assert_eq!(capacity, data.len());
    let mut data = data;
    for extent in extents {
        let (chunk, rest) = data.split_at(extent.length);
        let raw = image.slice_mut(extent.offset, extent.raw_length())?;
        codec::encode_into(chunk, raw);
        data = rest;
    }
    Ok(())
}
