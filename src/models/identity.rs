// src/models/identity.rs
//! Identity record data model.
//!
//! Defines the student identity shown after a successful scan. The same
//! structure is returned by the remote lookup service, so the serde field
//! names follow that service's wire format.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A decoded student identity.
///
/// Every field is a plain string. The presentation layer always renders a
/// value, so absent fields carry [`IdentityRecord::UNKNOWN`] instead of being
/// optional. The avatar reference and the raw payload reference default to the
/// empty string (nothing to load, nothing to echo back).
///
/// # Wire format
/// ```json
/// {
///   "student_id": "S100",
///   "full_name": "Ann Wanjiru",
///   "email": "ann@campus.ac.ke",
///   "department": "Computing",
///   "image_url": "https://cdn.campus.ac.ke/s100.png",
///   "qr_code_data": ""
/// }
/// ```
/// Missing keys and `null` values deserialize to their defaults. Numbers
/// and booleans are kept in their JSON text form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    /// Student / staff identifier
    #[serde(rename = "student_id", default = "unknown", deserialize_with = "or_unknown")]
    pub identifier: String,

    /// Full display name
    #[serde(rename = "full_name", default = "unknown", deserialize_with = "or_unknown")]
    pub display_name: String,

    /// Contact e-mail address
    #[serde(rename = "email", default = "unknown", deserialize_with = "or_unknown")]
    pub contact: String,

    /// Department or faculty
    #[serde(rename = "department", default = "unknown", deserialize_with = "or_unknown")]
    pub affiliation: String,

    /// URL of the avatar image
    #[serde(rename = "image_url", default, deserialize_with = "or_empty")]
    pub avatar: String,

    /// Opaque reference back to the scanned payload
    #[serde(rename = "qr_code_data", default, deserialize_with = "or_empty")]
    pub payload_ref: String,
}

fn unknown() -> String {
    IdentityRecord::UNKNOWN.to_string()
}

fn lenient_string<'de, D>(deserializer: D, default: &str) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => default.to_string(),
    })
}

fn or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string(deserializer, IdentityRecord::UNKNOWN)
}

fn or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string(deserializer, "")
}

impl IdentityRecord {
    /// Sentinel rendered for any field the payload did not carry.
    pub const UNKNOWN: &'static str = "N/A";

    /// Creates a record where every identity field is unknown and the avatar
    /// points at `avatar`.
    ///
    /// This is the whole result of scanning a bare image URL.
    pub fn from_avatar(avatar: impl Into<String>) -> Self {
        IdentityRecord {
            avatar: avatar.into(),
            ..Self::default()
        }
    }
}

impl Default for IdentityRecord {
    fn default() -> Self {
        IdentityRecord {
            identifier: unknown(),
            display_name: unknown(),
            contact: unknown(),
            affiliation: unknown(),
            avatar: String::new(),
            payload_ref: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_sentinel() {
        let record = IdentityRecord::default();
        assert_eq!(record.identifier, IdentityRecord::UNKNOWN);
        assert_eq!(record.display_name, IdentityRecord::UNKNOWN);
        assert_eq!(record.contact, IdentityRecord::UNKNOWN);
        assert_eq!(record.affiliation, IdentityRecord::UNKNOWN);
        assert!(record.avatar.is_empty());
        assert!(record.payload_ref.is_empty());
    }

    #[test]
    fn test_deserialize_partial_service_response() {
        let json = r#"{"student_id":"S7","full_name":"Otieno","image_url":"http://x/7.png"}"#;
        let record: IdentityRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.identifier, "S7");
        assert_eq!(record.display_name, "Otieno");
        assert_eq!(record.avatar, "http://x/7.png");
        assert_eq!(record.contact, IdentityRecord::UNKNOWN);
        assert_eq!(record.affiliation, IdentityRecord::UNKNOWN);
        assert_eq!(record.payload_ref, "");
    }

    #[test]
    fn test_deserialize_null_and_scalar_fields() {
        let json = r#"{"student_id":1042,"full_name":"Ann","email":null,"department":null,"image_url":null,"qr_code_data":null}"#;
        let record: IdentityRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.identifier, "1042");
        assert_eq!(record.display_name, "Ann");
        assert_eq!(record.contact, IdentityRecord::UNKNOWN);
        assert_eq!(record.affiliation, IdentityRecord::UNKNOWN);
        assert_eq!(record.avatar, "");
        assert_eq!(record.payload_ref, "");
    }

    #[test]
    fn test_serialize_uses_service_names() {
        let record = IdentityRecord::from_avatar("http://x/y.png");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["image_url"], "http://x/y.png");
        assert_eq!(value["student_id"], IdentityRecord::UNKNOWN);
        assert!(value.get("identifier").is_none());
    }
}
