//
// Errors
//
use std::error;
use std::fmt;
use std::io;
use std::num;
use std::path::PathBuf;
use std::result;
use ndarray as nd;

/// Type alias for composlang errors
pub type Result<X> = result::Result<X, Error>;

/// Wrapper for many kinds of errors occuring while reading or analyzing a corpus
#[derive(Debug)]
pub enum Error {
    /// Options that can't work together, found before any reading starts
    Config(String),
    /// A corpus line that doesn't fit the schema
    Parse {
        file: PathBuf,
        line_number: usize,
        line: String,
        reason: String,
    },
    /// A checkpoint that is damaged, incomplete, or belongs to other input
    Cache(String),
    /// Derived tables disagree with the statistics they were built from
    Consistency(String),
    ShapeError(nd::ShapeError),
    IOError(io::Error),
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Config(ref info) => write!(f, "Configuration error: {}", info),
            Error::Parse { ref file, line_number, ref line, ref reason } => write!(f,
                "Could not parse line {} of {}: {}. The line was: {:?}",
                line_number, file.display(), reason, line),
            Error::Cache(ref info) => write!(f, "Checkpoint error: {}", info),
            Error::Consistency(ref info) => write!(f,
                "Internal inconsistency (this is a bug, please report it): {}", info),
            Error::ShapeError(ref err) => write!(f, "NDArray shape error: {:?}", err),
            Error::IOError(ref err) => write!(f, "IO error: {}", err),
            Error::Other(ref info) => write!(f, "{}", info),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::ShapeError(ref err) => Some(err),
            Error::IOError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl Error {
    /// Shorthand for a parse failure with a borrowed line
    pub fn parse<P, L, R>(file: P, line_number: usize, line: L, reason: R) -> Self
        where P: Into<PathBuf>, L: Into<String>, R: Into<String> {
        Error::Parse {
            file: file.into(),
            line_number,
            line: line.into(),
            reason: reason.into(),
        }
    }
}

//
// Convert everything else into Error
//
impl From<nd::ShapeError> for Error {
    fn from(err: nd::ShapeError) -> Self {
        Error::ShapeError(err)
    }
}
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IOError(err)
    }
}
impl From<num::ParseIntError> for Error {
    fn from(err: num::ParseIntError) -> Self {
        Error::Other(format!("Error parsing integer: {}", err))
    }
}
impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        match *err {
            bincode::ErrorKind::Io(err) => Error::IOError(err),
            other => Error::Other(format!("Serialization error: {}", other)),
        }
    }
}
impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error::Config(format!("could not start worker pool: {}", err))
    }
}

//
// Convert Error into a general io Error
//
impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        io::Error::new(io::ErrorKind::Other, err)
    }
}
