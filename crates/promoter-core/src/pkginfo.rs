//! Typed view over a Munki pkginfo property list.
//!
//! The full dictionary is retained so a rewrite only changes `catalogs` and
//! leaves every other key untouched.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use plist::{Dictionary, Value};
use sha2::{Digest, Sha256};

use crate::error::{PromoterError, Result};

const KEY_NAME: &str = "name";
const KEY_VERSION: &str = "version";
const KEY_CATALOGS: &str = "catalogs";
const KEY_METADATA: &str = "_metadata";
const KEY_CREATION_DATE: &str = "creation_date";

/// One distributable software item from the pkgsinfo tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRecord {
    /// File name of the pkginfo.
    pub identifier: String,
    pub name: String,
    pub version: String,
    /// Catalog membership, in file order.
    pub rings: Vec<String>,
    /// `_metadata.creation_date`, when present.
    pub created: Option<DateTime<Utc>>,
    raw: Dictionary,
}

impl PackageRecord {
    /// Build a fresh record, as the import pipeline would.
    pub fn new(
        identifier: &str,
        name: &str,
        version: &str,
        rings: &[&str],
        created: Option<DateTime<Utc>>,
    ) -> Self {
        let mut raw = Dictionary::new();
        raw.insert(KEY_NAME.to_string(), Value::String(name.to_string()));
        raw.insert(KEY_VERSION.to_string(), Value::String(version.to_string()));
        if let Some(created) = created {
            let mut metadata = Dictionary::new();
            metadata.insert(
                KEY_CREATION_DATE.to_string(),
                Value::Date(SystemTime::from(created).into()),
            );
            raw.insert(KEY_METADATA.to_string(), Value::Dictionary(metadata));
        }

        let mut record = Self {
            identifier: identifier.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            rings: Vec::new(),
            created,
            raw,
        };
        record.set_rings(rings);
        record
    }

    /// Parse pkginfo bytes (XML or binary plist) read from `path`.
    pub fn parse(identifier: &str, bytes: &[u8], path: &Path) -> Result<Self> {
        let value =
            Value::from_reader(std::io::Cursor::new(bytes)).map_err(|source| {
                PromoterError::RecordParse {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

        let invalid = |reason: &str| PromoterError::RecordInvalid {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let raw = value
            .into_dictionary()
            .ok_or_else(|| invalid("top level is not a dictionary"))?;

        let name = raw
            .get(KEY_NAME)
            .and_then(Value::as_string)
            .ok_or_else(|| invalid("missing string key `name`"))?
            .to_string();
        let version = raw
            .get(KEY_VERSION)
            .and_then(Value::as_string)
            .ok_or_else(|| invalid("missing string key `version`"))?
            .to_string();
        let rings = raw
            .get(KEY_CATALOGS)
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("missing array key `catalogs`"))?
            .iter()
            .map(|v| {
                v.as_string()
                    .map(str::to_string)
                    .ok_or_else(|| invalid("`catalogs` contains a non-string entry"))
            })
            .collect::<Result<Vec<_>>>()?;
        let created = raw
            .get(KEY_METADATA)
            .and_then(Value::as_dictionary)
            .and_then(|m| m.get(KEY_CREATION_DATE))
            .and_then(Value::as_date)
            .map(|d| DateTime::<Utc>::from(SystemTime::from(d)));

        Ok(Self {
            identifier: identifier.to_string(),
            name,
            version,
            rings,
            created,
            raw,
        })
    }

    /// Creation timestamp, required once the record is a promotion candidate.
    pub fn creation_timestamp(&self, path: &Path) -> Result<DateTime<Utc>> {
        self.created.ok_or_else(|| PromoterError::RecordInvalid {
            path: path.to_path_buf(),
            reason: "missing `_metadata.creation_date`".to_string(),
        })
    }

    /// Replace catalog membership.
    pub fn set_rings<S: AsRef<str>>(&mut self, rings: &[S]) {
        self.rings = rings.iter().map(|r| r.as_ref().to_string()).collect();
        self.raw.insert(
            KEY_CATALOGS.to_string(),
            Value::Array(self.rings.iter().cloned().map(Value::String).collect()),
        );
    }

    /// Look up an arbitrary top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// Serialize the whole record as an XML property list.
    pub fn to_xml_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        Value::Dictionary(self.raw.clone()).to_writer_xml(&mut buf)?;
        Ok(buf)
    }
}

/// Hex SHA-256 of raw file bytes.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
