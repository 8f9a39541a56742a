//! Structs and functions relating to disk images.

mod block;
mod codec;
mod error;
mod image;

pub mod directory;
pub mod file;
pub mod geometry;

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use log::{debug, info};

pub use self::block::{
    cylinder_capacity, BlockIterator, Extent, SectorCounter, SectorStep, BLOCK_SIZE,
};
pub use self::directory::{
    literal, pattern, DirectoryEntry, DirectoryIterator, EntryStatus, FileType, NameMatch,
};
pub use self::error::DiskError;
pub use self::file::{FileReader, LoadParameters, BASIC_LOAD};
pub use self::geometry::{CylinderEncoding, FormatProfile, Geometry, SizePolicy, V1, V2};
pub use self::image::Image;

use self::geometry::{HEADER_SIZE, SECTOR_SIZE};

/// A disk image opened under a particular format profile.  Nothing about the
/// catalog is cached: every operation scans the headers on disk afresh.
pub struct Disk {
    image: Image,
    geometry: Geometry,
    profile: &'static FormatProfile,
}

impl Disk {
    /// Interpret an image, reading and validating its volume header.
    pub fn new(image: Image, profile: &'static FormatProfile) -> io::Result<Disk> {
        let geometry = Geometry::read(&image, profile)?;
        Ok(Disk {
            image,
            geometry,
            profile,
        })
    }

    /// Open an existing disk image as read-only (if `writable` is false) or
    /// read-write (if `writable` is true).
    pub fn open<P: AsRef<Path>>(
        path: P,
        writable: bool,
        profile: &'static FormatProfile,
    ) -> io::Result<Disk> {
        let image = if writable {
            Image::open_read_write(path)?
        } else {
            Image::open_read_only(path)?
        };
        Self::new(image, profile)
    }

    /// Create a new, empty disk image file.  If `create_new` is true, no file
    /// is allowed to exist at the target location.  If false, any existing
    /// file will be overwritten.
    pub fn create<P: AsRef<Path>>(
        path: P,
        geometry: &Geometry,
        profile: &'static FormatProfile,
        create_new: bool,
    ) -> io::Result<Disk> {
        // Validate before touching the filesystem.
        geometry.write_header(&mut [0u8; HEADER_SIZE], profile)?;
        let image = Image::create(path, geometry.size(), create_new)?;
        Self::initialize(image, geometry, profile)
    }

    /// Create a new, empty in-memory disk image.
    pub fn open_memory(geometry: &Geometry, profile: &'static FormatProfile) -> io::Result<Disk> {
        geometry.write_header(&mut [0u8; HEADER_SIZE], profile)?;
        Self::initialize(Image::open_memory(geometry.size()), geometry, profile)
    }

    fn initialize(
        mut image: Image,
        geometry: &Geometry,
        profile: &'static FormatProfile,
    ) -> io::Result<Disk> {
        geometry.write_header(image.slice_mut(0, HEADER_SIZE)?, profile)?;
        info!(
            "created volume \"{}\" C/H/S {}/{}/{}",
            geometry.name, geometry.cylinders, geometry.heads, geometry.sectors
        );
        Self::new(image, profile)
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    pub fn profile(&self) -> &'static FormatProfile {
        self.profile
    }

    /// Return the name of this disk as found in the volume header.
    pub fn name(&self) -> &str {
        &self.geometry.name
    }

    /// Access the underlying image.
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Return an iterator over the catalog, deleted entries included, up to
    /// the END header.
    pub fn iter(&self) -> DirectoryIterator {
        DirectoryIterator::new(&self.image, &self.geometry)
    }

    /// Return a list of all active catalog entries.
    pub fn directory(&self) -> io::Result<Vec<DirectoryEntry>> {
        self.iter().active().collect()
    }

    /// The number of cylinders available for new files: every data cylinder
    /// not holding an active file.
    pub fn blocks_free(&self) -> io::Result<usize> {
        let mut active = 0;
        for entry in self.iter().active() {
            entry?;
            active += 1;
        }
        Ok(self.geometry.cylinders - 1 - active)
    }

    /// Return every active entry whose name matches, in cylinder order.
    /// Fails with `NotFound` if nothing matches.
    pub fn find<M: NameMatch + ?Sized>(&self, filter: &M) -> io::Result<Vec<DirectoryEntry>> {
        let mut found = vec![];
        for entry in self.iter().active() {
            let entry = entry?;
            if filter.name_matches(&entry.filename) {
                found.push(entry);
            }
        }
        if found.is_empty() {
            return Err(DiskError::NotFound.into());
        }
        Ok(found)
    }

    /// Confirm that no active entry has the provided filename, ignoring case.
    pub fn check_filename_availability(&self, filename: &str) -> io::Result<()> {
        let filter = literal(filename)?;
        match self.find(&filter) {
            Ok(_) => Err(DiskError::FileExists.into()),
            Err(ref e) if *e == DiskError::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Return a reader over the contents of an active entry's file.
    pub fn reader(&self, entry: &DirectoryEntry) -> io::Result<FileReader> {
        let extents = file::extents(&self.geometry, self.profile, entry)?;
        Ok(FileReader::new(&self.image, extents))
    }

    /// Read the entire contents of an entry's file.
    pub fn read_file(&self, entry: &DirectoryEntry) -> io::Result<Vec<u8>> {
        let mut contents = Vec::with_capacity(entry.data_size()?);
        io::copy(&mut self.reader(entry)?, &mut contents)?;
        Ok(contents)
    }

    /// Stream an entry's file into `writer`, returning the bytes written.
    pub fn extract(&self, entry: &DirectoryEntry, writer: &mut dyn Write) -> io::Result<u64> {
        debug!("extracting {:?}", entry);
        io::copy(&mut self.reader(entry)?, writer)
    }

    /// Store a new file in the first END or deleted slot.  The name must not
    /// match any active entry.  Nothing is written unless every check passes.
    pub fn write_file(
        &mut self,
        filename: &str,
        file_type: FileType,
        load: LoadParameters,
        data: &[u8],
    ) -> io::Result<DirectoryEntry> {
        self.image.check_writability()?;

        // The entry is built against a placeholder cylinder so that name, type
        // and size are rejected before the catalog is consulted.
        let mut entry = file::new_entry(filename, file_type, load, data.len(), 1)?;
        self.check_filename_availability(filename)?;
        entry.cylinder = self.iter().first_free()?;
        let extents = file::extents(&self.geometry, self.profile, &entry)?;

        let header_offset = entry.header_offset(&self.geometry);
        {
            let header = self.image.slice_mut(header_offset, SECTOR_SIZE)?;
            for b in header[HEADER_SIZE..].iter_mut() {
                *b = 0;
            }
            entry.to_bytes(&mut header[..HEADER_SIZE])?;
        }
        file::write_data(&mut self.image, &extents, data)?;
        info!(
            "wrote \"{}\" ({} bytes) to cylinder {}",
            entry.filename,
            data.len(),
            entry.cylinder
        );
        Ok(entry)
    }

    /// Tombstone an entry in place: the status becomes deleted and the rest
    /// of the header sector is zeroed.  File data is left untouched.  The
    /// entry must still be active on this disk, exactly as given.
    pub fn erase(&mut self, entry: &DirectoryEntry) -> io::Result<()> {
        self.image.check_writability()?;
        if entry.cylinder == 0 || entry.cylinder >= self.geometry.cylinders {
            return Err(DiskError::InvalidOffset.into());
        }
        let offset = entry.header_offset(&self.geometry);
        let current = DirectoryEntry::parse(self.image.slice(offset, HEADER_SIZE)?, entry.cylinder);
        if !current.is_active() || current != *entry {
            return Err(DiskError::NotFound.into());
        }

        let header = self.image.slice_mut(offset, SECTOR_SIZE)?;
        for b in header.iter_mut() {
            *b = 0;
        }
        header[..codec::PAIR_SIZE].copy_from_slice(&codec::encode(0xFF));
        info!("erased \"{}\" at cylinder {}", entry.filename, entry.cylinder);
        Ok(())
    }

    /// Erase every active entry that matches `filter` and that `confirm`
    /// accepts.  Returns the entries erased; fails with `NotFound` if nothing
    /// matched.
    pub fn erase_matching<M, F>(
        &mut self,
        filter: &M,
        mut confirm: F,
    ) -> io::Result<Vec<DirectoryEntry>>
    where
        M: NameMatch + ?Sized,
        F: FnMut(&DirectoryEntry) -> bool,
    {
        let mut erased = vec![];
        for entry in self.find(filter)? {
            if confirm(&entry) {
                self.erase(&entry)?;
                erased.push(entry);
            }
        }
        Ok(erased)
    }

    /// Reset the catalog by zeroing the header of every data cylinder.  File
    /// data stays on disk but is no longer reachable.
    pub fn write_format(&mut self) -> io::Result<()> {
        self.image.check_writability()?;
        for cylinder in 1..self.geometry.cylinders {
            let offset = self.geometry.cylinder_offset(cylinder);
            for b in self.image.slice_mut(offset, HEADER_SIZE)?.iter_mut() {
                *b = 0;
            }
        }
        info!("formatted {} cylinders", self.geometry.cylinders - 1);
        Ok(())
    }

    /// Flush changes to a file-backed image.  This is a no-op for in-memory
    /// images.
    pub fn flush(&mut self) -> io::Result<()> {
        self.image.flush()
    }
}

impl fmt::Display for Disk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.geometry)
    }
}

impl fmt::Debug for Disk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Disk {{ geometry: {:?}, profile: {}, length: {} }}",
            self.geometry,
            self.profile.name,
            self.image.len()
        )
    }
}

impl<'a> IntoIterator for &'a Disk {
    type Item = io::Result<DirectoryEntry>;
    type IntoIter = DirectoryIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
