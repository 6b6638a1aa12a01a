use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};

use crate::common::{DEFAULT_ORIENTATION, VALID_ORIENTATIONS, errors::ValidationError};

/// A validated three-letter anatomical axis code such as `LPI` or `RAS`.
///
/// Always stored upper-case. Parsing is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrientationCode([u8; 3]);

impl OrientationCode {
    pub fn as_str(&self) -> &str {
        // Only ever built from entries of VALID_ORIENTATIONS, which are ASCII.
        std::str::from_utf8(&self.0).unwrap_or(DEFAULT_ORIENTATION)
    }

    pub fn all() -> impl Iterator<Item = OrientationCode> {
        VALID_ORIENTATIONS.iter().filter_map(|code| code.parse().ok())
    }
}

impl Default for OrientationCode {
    fn default() -> Self {
        Self(*b"LPI")
    }
}

impl FromStr for OrientationCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match VALID_ORIENTATIONS.iter().find(|code| **code == upper) {
            Some(code) => {
                let bytes = code.as_bytes();
                Ok(Self([bytes[0], bytes[1], bytes[2]]))
            }
            None => Err(ValidationError::Orientation {
                given: s.to_string(),
                valid: VALID_ORIENTATIONS.join(", "),
            }),
        }
    }
}

impl fmt::Display for OrientationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OrientationCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
