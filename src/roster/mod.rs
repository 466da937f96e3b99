//! Roster import pipeline: delimited text in, validated student records out.
//!
//! The stages run leaves-first: [`reader`] produces [`RawRow`]s,
//! [`columns`] resolves a [`ColumnMapping`] from the header row,
//! [`transform`] applies it, [`validate`] partitions the result and
//! [`summary`] renders the human-readable digest.

pub mod columns;
pub mod export;
pub mod reader;
pub mod summary;
pub mod transform;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use columns::{detect_columns, Role};
pub use reader::{read_rows, ReadError, ReadOptions};
pub use summary::import_summary;
pub use transform::transform;
pub use validate::{is_valid_email, validate};

/// One input line, as an ordered header -> cell mapping.
///
/// Duplicate headers are kept in order; lookups return the first one and
/// the transform stage numbers the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, H, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (H, V)>,
        H: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(h, v)| (h.into(), v.into()))
                .collect(),
        }
    }

    pub fn push(&mut self, header: impl Into<String>, value: impl Into<String>) {
        self.cells.push((header.into(), value.into()));
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Header names bound to semantic student fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub student_id: Option<String>,
    pub email: Option<String>,
    pub parent_email: Option<String>,
    #[serde(default)]
    pub grade_columns: Vec<String>,
}

impl ColumnMapping {
    pub fn header_for(&self, role: Role) -> Option<&str> {
        match role {
            Role::FirstName => self.first_name.as_deref(),
            Role::LastName => self.last_name.as_deref(),
            Role::StudentId => self.student_id.as_deref(),
            Role::Email => self.email.as_deref(),
            Role::ParentEmail => self.parent_email.as_deref(),
        }
    }

    /// Returns a copy with `role` bound to `header`.
    pub fn with(mut self, role: Role, header: impl Into<String>) -> Self {
        let header = Some(header.into());
        match role {
            Role::FirstName => self.first_name = header,
            Role::LastName => self.last_name = header,
            Role::StudentId => self.student_id = header,
            Role::Email => self.email = header,
            Role::ParentEmail => self.parent_email = header,
        }
        self
    }

    /// Rejects a header bound to more than one singular role, and a grade
    /// column that also holds a singular role.
    pub fn check(&self) -> Result<(), MappingError> {
        let bound: Vec<(Role, &str)> = Role::ALL
            .iter()
            .filter_map(|role| self.header_for(*role).map(|h| (*role, h)))
            .collect();
        for (i, (role, header)) in bound.iter().enumerate() {
            if let Some((other, _)) = bound[i + 1..].iter().find(|(_, h)| h == header) {
                return Err(MappingError::SharedHeader {
                    header: header.to_string(),
                    first: role.as_str(),
                    second: other.as_str(),
                });
            }
            if self.grade_columns.iter().any(|g| g == header) {
                return Err(MappingError::GradeColumnBound {
                    header: header.to_string(),
                    role: role.as_str(),
                });
            }
        }
        Ok(())
    }

    pub fn role_of(&self, header: &str) -> Option<Role> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| self.header_for(*role) == Some(header))
    }

    /// True when `header` is bound to a singular role or listed as a grade column.
    pub fn is_mapped(&self, header: &str) -> bool {
        Role::ALL
            .iter()
            .any(|role| self.header_for(*role) == Some(header))
            || self.grade_columns.iter().any(|g| g == header)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("header {header:?} is bound to both {first} and {second}")]
    SharedHeader {
        header: String,
        first: &'static str,
        second: &'static str,
    },
    #[error("header {header:?} is bound to {role} and listed as a grade column")]
    GradeColumnBound { header: String, role: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("invalid column mapping: {0}")]
    Mapping(#[from] MappingError),
}

/// A student record produced from one raw row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedRecord {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grades: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ImportedRecord {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    MissingBothNames,
    MissingFirstName,
    MissingLastName,
    InvalidEmail,
    InvalidParentEmail,
}

impl InvalidReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::MissingBothNames => "missing_both_names",
            Self::MissingFirstName => "missing_first_name",
            Self::MissingLastName => "missing_last_name",
            Self::InvalidEmail => "invalid_email",
            Self::InvalidParentEmail => "invalid_parent_email",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::MissingBothNames => "missing both first and last name",
            Self::MissingFirstName => "missing first name",
            Self::MissingLastName => "missing last name",
            Self::InvalidEmail => "invalid email format",
            Self::InvalidParentEmail => "invalid parent email format",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRecord {
    pub record: ImportedRecord,
    pub reason: InvalidReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub valid: Vec<ImportedRecord>,
    pub invalid: Vec<InvalidRecord>,
}

impl ValidationOutcome {
    pub fn total(&self) -> usize {
        self.valid.len() + self.invalid.len()
    }
}

/// Everything one import pass produced, ready for a report consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub headers: Vec<String>,
    pub mapping: ColumnMapping,
    pub total_rows: usize,
    pub outcome: ValidationOutcome,
    pub summary: String,
}

/// Read, detect, transform and validate one uploaded file.
pub fn run_import(text: &str, opts: &ReadOptions) -> Result<ImportReport, ImportError> {
    run_import_with(text, opts, None)
}

/// Like [`run_import`], but a caller-confirmed mapping replaces detection.
pub fn run_import_with(
    text: &str,
    opts: &ReadOptions,
    mapping: Option<ColumnMapping>,
) -> Result<ImportReport, ImportError> {
    if let Some(m) = &mapping {
        m.check()?;
    }
    let table = reader::read_table(text, opts)?;
    let mapping = mapping.unwrap_or_else(|| detect_columns(&table.headers));
    let records = transform(&table.rows, &mapping);
    let outcome = validate(&records);
    let summary = import_summary(
        table.rows.len(),
        outcome.valid.len(),
        outcome.invalid.len(),
        &outcome.invalid,
    );
    tracing::debug!(
        rows = table.rows.len(),
        records = records.len(),
        valid = outcome.valid.len(),
        invalid = outcome.invalid.len(),
        "import pass complete"
    );
    Ok(ImportReport {
        headers: table.headers,
        mapping,
        total_rows: table.rows.len(),
        outcome,
        summary,
    })
}
