use std::fmt;
use std::path::PathBuf;

/// A sampler could not obtain a metric from the OS.
///
/// Never fatal: the sampling loop logs it, stores a zero sample for the
/// iteration and tries again on the next tick.
#[derive(Debug)]
pub enum PlatformQueryError {
    Unsupported(&'static str),
    Io(&'static str, std::io::Error),
    Malformed(&'static str, String),
    NoVolume(PathBuf),
}

impl fmt::Display for PlatformQueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformQueryError::Unsupported(what) => {
                write!(f, "{} is not supported on this platform", what)
            }
            PlatformQueryError::Io(call, err) => write!(f, "{} failed: {}", call, err),
            PlatformQueryError::Malformed(source, detail) => {
                write!(f, "unexpected {} contents: {}", source, detail)
            }
            PlatformQueryError::NoVolume(path) => {
                write!(f, "no mounted volume contains {}", path.display())
            }
        }
    }
}

impl std::error::Error for PlatformQueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlatformQueryError::Io(_, err) => Some(err),
            _ => None,
        }
    }
}
