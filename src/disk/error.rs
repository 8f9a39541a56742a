use std::error;
use std::fmt;
use std::io;

/// Errors that can be returned from disk image operations.  These are
/// generally converted into `io::Error`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiskError {
    /// Unknown error
    Unknown,
    /// Write access attempted to read-only media
    ReadOnly,
    /// Offset out of bounds
    InvalidOffset,
    /// The volume header describes an unusable geometry
    InvalidGeometry,
    /// The image size does not agree with the volume header
    GeometryMismatch { expected: usize, actual: usize },
    /// File not found
    NotFound,
    /// A file with the specified filename already exists
    FileExists,
    /// No END or deleted catalog slot is left
    NoFreeSlot,
    /// Unsupported file type tag
    InvalidType(u8),
    /// Filename exceeds maximum length
    FilenameTooLong,
    /// Filename is empty or contains unencodable characters
    InvalidFilename,
    /// Start and end addresses do not describe a valid file
    InvalidAddressRange,
    /// File data does not fit in a single cylinder
    FileTooLarge,
    /// Filename pattern could not be compiled
    InvalidPattern,
}

impl error::Error for DiskError {}

impl fmt::Display for DiskError {
    /// Provide human-readable descriptions of the errors
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DiskError::GeometryMismatch { expected, actual } => write!(
                f,
                "{}: expected size is {}, but actual is {}",
                self.message(),
                expected,
                actual
            ),
            DiskError::InvalidType(t) => write!(f, "{}: 0x{:02X}", self.message(), t),
            _ => write!(f, "{}", self.message()),
        }
    }
}

impl From<DiskError> for io::Error {
    fn from(error: DiskError) -> io::Error {
        use self::DiskError::*;
        use std::io::ErrorKind;
        let kind = match error {
            Unknown => ErrorKind::Other,
            ReadOnly => ErrorKind::PermissionDenied,
            InvalidOffset => ErrorKind::InvalidInput,
            InvalidGeometry => ErrorKind::InvalidData,
            GeometryMismatch { .. } => ErrorKind::InvalidData,
            NotFound => ErrorKind::NotFound,
            FileExists => ErrorKind::AlreadyExists,
            NoFreeSlot => ErrorKind::Other,
            InvalidType(_) => ErrorKind::InvalidInput,
            FilenameTooLong => ErrorKind::InvalidInput,
            InvalidFilename => ErrorKind::InvalidInput,
            InvalidAddressRange => ErrorKind::InvalidData,
            FileTooLarge => ErrorKind::InvalidInput,
            InvalidPattern => ErrorKind::InvalidInput,
        };
        io::Error::new(kind, error)
    }
}

impl From<io::Error> for DiskError {
    fn from(error: io::Error) -> DiskError {
        DiskError::from_io_error(&error).unwrap_or(DiskError::Unknown)
    }
}

impl DiskError {
    /// If the provided `io::Error` contains a `DiskError`, return the
    /// underlying `DiskError`.  If not, return None.
    pub fn from_io_error(error: &io::Error) -> Option<DiskError> {
        error
            .get_ref()
            .and_then(|e| e.downcast_ref::<DiskError>())
            .cloned()
    }

    /// This is sometimes useful instead of .into() when the compiler doesn't
    /// have enough information to perform type inference.
    pub fn to_io_error(&self) -> io::Error {
        self.clone().into()
    }

    /// Provide terse descriptions of the errors.
    fn message(&self) -> &str {
        use self::DiskError::*;
        match *self {
            Unknown => "unknown error",
            ReadOnly => "write access attempted to read-only media",
            InvalidOffset => "offset out of bounds",
            InvalidGeometry => "invalid geometry in volume header",
            GeometryMismatch { .. } => "image size does not match geometry",
            NotFound => "file not found",
            FileExists => "a file with the specified filename already exists",
            NoFreeSlot => "no free catalog slot",
            InvalidType(_) => "invalid file type",
            FilenameTooLong => "filename exceeds maximum length",
            InvalidFilename => "invalid filename",
            InvalidAddressRange => "invalid address range",
            FileTooLarge => "file does not fit in a cylinder",
            InvalidPattern => "invalid filename pattern",
        }
    }
}

impl PartialEq<io::Error> for DiskError {
    fn eq(&self, other: &io::Error) -> bool {
        match DiskError::from_io_error(other) {
            Some(ref e) => e == self,
            None => false,
        }
    }
}

impl PartialEq<DiskError> for io::Error {
    fn eq(&self, other: &DiskError) -> bool {
        match DiskError::from_io_error(self) {
            Some(ref e) => e == other,
            None => false,
        }
    }
}
