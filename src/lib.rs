//! This is a Rust library for working with the disk images of the Orao, an
//! 8-bit home computer built around the 6502.  Orao hard disk images store
//! one file per cylinder, and every byte on disk is written as a two-byte
//! pair whose second byte is zero.
//!
//! Features:
//!
//! * Read and write the volume header, under either of the two known
//! generations of image files (see `disk::FormatProfile`).
//! * Create blank images of any geometry, and format existing ones.
//! * Iterate the catalog, deleted slots included.
//! * Extract, inject, and erase files, selecting them with case-insensitive
//! glob patterns.
//! * Emulate the controller's one-time sector skip when placing file data.
//! * A sample `odisk` program for operating on images from the command line.
//!
//! Current shortcomings:
//!
//! * A file can never span more than one cylinder.
//! * Only the Object and BASIC file types can be written.
//! * The flag byte of a catalog entry is carried through without
//! interpretation.
//!
//! # Example
//!
//! The following example opens a disk image, lists its catalog, and extracts
//! every BASIC program whose name starts with "GAME":
//!
//! ```
//! use std::fs;
//! use std::io;
//! use orao::disk::{pattern, Disk, FileType, V1};
//! # fn extract_games(disk_image_filename: &str) -> io::Result<()> {
//!
//! // Open the disk image read-only
//! let disk = Disk::open(disk_image_filename, false, &V1)?;
//! println!("{}", disk);
//!
//! for entry in disk.find(&pattern("game*")?)? {
//!     if entry.file_type == FileType::Basic {
//!         let mut file = fs::File::create(&entry.filename)?;
//!         disk.extract(&entry, &mut file)?;
//!     }
//! }
//! println!("{} blocks free", disk.blocks_free()?);
//! # Ok(())
//! # }
//! ```
//!
//! For more examples, see the accompanying `odisk` program:
//!
//! ```text
//! odisk ORAO.HDD dir
//! Disk name : ORAO
//! C/H/S : 124/16/63
//! HELLO            B  0400 0523 B147 12
//! MONITOR          O  8000 87FF 8000 00
//! 121 BLOCKS FREE
//! ```
//!
//! # Design of disk image access
//!
//! Support for disk images was built using a layered scheme:
//!
//! 1. `Image` provides access to the underlying storage containing the disk
//!    image -- either a memory-mapped disk image file or an in-memory array.
//! 2. `Geometry` describes the cylinders, heads, and sectors recorded in the
//!    volume header, and a `FormatProfile` says how that header is encoded
//!    and which placement rules apply.
//! 3. `DirectoryIterator` walks the catalog headers at the start of each
//!    cylinder, and `BlockIterator` translates a file's logical blocks into
//!    byte offsets within its cylinder.
//! 4. `Disk` exposes high-level functionality such as extracting, injecting,
//!    and erasing files, and formatting the disk.
//!
//! The catalog is never cached.  Every operation rescans the headers on disk,
//! so results always reflect the current state of the image.
//!
//! # License
//!
//! Orao is distributed under the terms of both the MIT license and the
//! Apache License (Version 2.0).

pub mod disk;

pub use crate::disk::{Disk, DiskError};
