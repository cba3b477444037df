//! RPM reader error type

use std::io;

use repoline_core::ExtractError;

/// Error from reading an RPM lead or header section.
#[derive(Debug)]
pub enum RpmError {
    Io(io::Error),
    /// Wrong magic bytes in the lead or a header preamble.
    BadMagic(&'static str),
    /// Header index entry points outside the data store, or the store
    /// itself is malformed.
    BadStore(String),
    /// A tag the format requires is absent.
    MissingTag(&'static str),
}

impl std::fmt::Display for RpmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::BadMagic(section) => write!(f, "bad magic in {section}"),
            Self::BadStore(msg) => write!(f, "malformed header: {msg}"),
            Self::MissingTag(name) => write!(f, "missing tag: {name}"),
        }
    }
}

impl std::error::Error for RpmError {}

impl From<io::Error> for RpmError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<RpmError> for ExtractError {
    fn from(e: RpmError) -> Self {
        match e {
            RpmError::Io(e) => ExtractError::Io(e),
            other => ExtractError::Parse(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_maps_to_extract_io() {
        let err: ExtractError = RpmError::Io(io::Error::other("boom")).into();
        assert!(matches!(err, ExtractError::Io(_)));
    }

    #[test]
    fn magic_maps_to_extract_parse() {
        let err: ExtractError = RpmError::BadMagic("lead").into();
        assert!(matches!(err, ExtractError::Parse(_)));
        assert!(format!("{err}").contains("lead"));
    }
}
