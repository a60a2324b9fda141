//! Record payloads
//!
//! The accreditation record stored under each key, and the lenient decoder
//! used when reading payloads back out of scans.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Status given to every newly created accreditation
pub const STATUS_APPLIED: &str = "Applied";

/// An accreditation application, stored as UTF-8 JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accreditation {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Clinic")]
    pub clinic: String,

    #[serde(rename = "Doctor")]
    pub doctor: String,

    #[serde(rename = "Status")]
    pub status: String,

    #[serde(rename = "Speciality")]
    pub speciality: String,
}

impl Accreditation {
    pub fn new(
        id: impl Into<String>,
        clinic: impl Into<String>,
        doctor: impl Into<String>,
        status: impl Into<String>,
        speciality: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            clinic: clinic.into(),
            doctor: doctor.into(),
            status: status.into(),
            speciality: speciality.into(),
        }
    }

    /// Encode as the stored JSON payload
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a stored payload; malformed JSON is a `Serialization` error
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A payload as it appears in query results
///
/// Serialized untagged, so a parsed record renders as JSON and a raw
/// payload renders as a string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Decoded {
    /// The payload parsed as JSON
    Record(Value),

    /// The payload was not JSON; its text is passed through unchanged
    Raw(String),
}

impl Decoded {
    /// Parse a payload as JSON, falling back to its raw text
    ///
    /// Never fails: a scan must keep going past a malformed value.
    pub fn from_payload(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Decoded::Record(value),
            Err(e) => {
                tracing::debug!("Payload is not JSON, returning raw text: {}", e);
                Decoded::Raw(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }

    /// True when the payload fell back to raw text
    pub fn is_raw(&self) -> bool {
        matches!(self, Decoded::Raw(_))
    }
}
