//! Flat string-keyed records shared by import/export and entity construction.
//!
//! # Responsibility
//! - Define the record shape every entity serializes to.
//! - Provide schema-checked field access for entity decoders.
//!
//! # Invariants
//! - Records are flat: every value is a string.
//! - Every record produced by an entity carries `object_type` and `id`.

use super::date::Date;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Discriminator key naming the entity kind of a record.
pub const OBJECT_TYPE_KEY: &str = "object_type";

/// Flat, ordered string-keyed record.
pub type Record = BTreeMap<String, String>;

/// Reason a record could not be turned into an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    MissingField(&'static str),
    InvalidInteger { field: &'static str, value: String },
    InvalidDate { field: &'static str, value: String },
    UnknownObjectType(String),
    /// Interchange element was not a JSON object.
    NotAnObject,
    /// Interchange value was nested, null, or otherwise not a scalar.
    NonScalarValue(String),
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field `{field}`"),
            Self::InvalidInteger { field, value } => {
                write!(f, "field `{field}` is not an integer: `{value}`")
            }
            Self::InvalidDate { field, value } => {
                write!(f, "field `{field}` is not a yyyy-mm-dd date: `{value}`")
            }
            Self::UnknownObjectType(value) => write!(f, "unknown object_type `{value}`"),
            Self::NotAnObject => write!(f, "record is not an object"),
            Self::NonScalarValue(key) => write!(f, "field `{key}` holds a non-scalar value"),
        }
    }
}

impl Error for RecordError {}

/// Read-only accessor enforcing a required-field schema before decoding.
pub(crate) struct RecordReader<'a> {
    record: &'a Record,
}

impl<'a> RecordReader<'a> {
    /// Fails on the first absent key so partial records never decode.
    pub(crate) fn with_schema(
        record: &'a Record,
        required: &[&'static str],
    ) -> Result<Self, RecordError> {
        if let Some(missing) = required.iter().find(|key| !record.contains_key(**key)) {
            return Err(RecordError::MissingField(missing));
        }
        Ok(Self { record })
    }

    pub(crate) fn text(&self, field: &'static str) -> Result<&'a str, RecordError> {
        self.record
            .get(field)
            .map(String::as_str)
            .ok_or(RecordError::MissingField(field))
    }

    pub(crate) fn integer(&self, field: &'static str) -> Result<i64, RecordError> {
        let value = self.text(field)?;
        value
            .trim()
            .parse::<i64>()
            .map_err(|_| RecordError::InvalidInteger {
                field,
                value: value.to_string(),
            })
    }

    pub(crate) fn date(&self, field: &'static str) -> Result<Date, RecordError> {
        let value = self.text(field)?;
        Date::parse_store(value).map_err(|_| RecordError::InvalidDate {
            field,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Record, RecordError, RecordReader};

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn schema_reports_first_missing_field() {
        let data = record(&[("id", "3")]);
        let err = RecordReader::with_schema(&data, &["id", "owner_id", "date"])
            .err()
            .unwrap();
        assert_eq!(err, RecordError::MissingField("owner_id"));
    }

    #[test]
    fn typed_accessors_validate_values() {
        let data = record(&[("id", " 12 "), ("date", "2024-02-30"), ("n", "x")]);
        let reader = RecordReader::with_schema(&data, &["id"]).unwrap();
        assert_eq!(reader.integer("id").unwrap(), 12);
        assert!(matches!(
            reader.integer("n"),
            Err(RecordError::InvalidInteger { field: "n", .. })
        ));
        assert!(matches!(
            reader.date("date"),
            Err(RecordError::InvalidDate { field: "date", .. })
        ));
    }
}
