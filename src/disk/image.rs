use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use memmap::{Mmap, MmapMut, MmapOptions};

use crate::disk::error::DiskError;

/// Provide backing storage (file or memory) for disk images.
pub enum Image {
    ReadOnlyMap(Mmap),
    ReadWriteMap(MmapMut),
    Memory(Vec<u8>),
}

impl Image {
    /// Allocate a zero-filled in-memory image.
    pub fn open_memory(length: usize) -> Image {
        Image::Memory(vec![0; length])
    }

    /// Wrap existing image bytes, e.g. a file read into memory or a test
    /// fixture.
    pub fn from_bytes(bytes: Vec<u8>) -> Image {
        Image::Memory(bytes)
    }

    pub fn open_read_only<P: AsRef<Path>>(path: P) -> io::Result<Image> {
        let file = File::open(path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Image::ReadOnlyMap(mmap))
    }

    pub fn open_read_write<P: AsRef<Path>>(path: P) -> io::Result<Image> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        Ok(Image::ReadWriteMap(mmap))
    }

    /// Create a zero-filled image file of the given length.  If `create_new`
    /// is false, an existing file is truncated and overwritten.
    pub fn create<P: AsRef<Path>>(path: P, length: usize, create_new: bool) -> io::Result<Image> {
        let mut options = OpenOptions::new();
        options.read(true).write(true);
        if create_new {
            options.create_new(true);
        } else {
            options.create(true).truncate(true);
        }
        let file = options.open(path)?;
        file.set_len(length as u64)?;
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        Ok(Image::ReadWriteMap(mmap))
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Image::ReadOnlyMap(mmap) => &mmap[..],
            Image::ReadWriteMap(mmap) => &mmap[..],
            Image::Memory(bytes) => &bytes[..],
        }
    }

    fn check_bounds(&self, offset: usize, length: usize) -> io::Result<usize> {
        match offset.checked_add(length) {
            Some(end) if end <= self.len() => Ok(end),
            _ => Err(DiskError::InvalidOffset.into()),
        }
    }

    pub fn check_writability(&self) -> io::Result<()> {
        match self {
            Image::ReadOnlyMap(_) => Err(DiskError::ReadOnly.into()),
            Image::ReadWriteMap(_) | Image::Memory(_) => Ok(()),
        }
    }

    pub fn slice(&self, offset: usize, length: usize) -> io::Result<&[u8]> {
        let end = self.check_bounds(offset, length)?;
        Ok(&self.bytes()[offset..end])
    }

    pub fn slice_mut(&mut self, offset: usize, length: usize) -> io::Result<&mut [u8]> {
        let end = self.check_bounds(offset, length)?;
        match self {
            Image::ReadOnlyMap(_) => Err(DiskError::ReadOnly.into()),
            Image::ReadWriteMap(mmap) => Ok(&mut mmap[offset..end]),
            Image::Memory(bytes) => Ok(&mut bytes[offset..end]),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self {
            Image::ReadOnlyMap(_) => Err(DiskError::ReadOnly.into()),
            Image::ReadWriteMap(mmap) => mmap.flush(),
            Image::Memory(_) => Ok(()),
        }
    }

    /// Return a copy of the whole image.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes().to_vec()
    }
}
