//! Table catalog models.
//!
//! The gateway only ever touches the tables listed in [`TableName`]. Records
//! and filters are opaque column → value maps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::errors::AppError;

/// A table row as a column → value map, in column order.
pub type Record = Map<String, Value>;

/// Tables reachable through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    LabTests,
    Medicines,
    Prescription,
    Vitals,
    MedicalHistory,
    PatientsRegistration,
    ChatHistory,
    ImageAnalysis,
}

impl TableName {
    /// Every allow-listed table, in the order they are advertised.
    pub const ALL: [TableName; 8] = [
        TableName::LabTests,
        TableName::Medicines,
        TableName::Prescription,
        TableName::Vitals,
        TableName::MedicalHistory,
        TableName::PatientsRegistration,
        TableName::ChatHistory,
        TableName::ImageAnalysis,
    ];

    /// SQL identifier of the table.
    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::LabTests => "lab_tests",
            TableName::Medicines => "medicines",
            TableName::Prescription => "prescription",
            TableName::Vitals => "vitals",
            TableName::MedicalHistory => "medical_history",
            TableName::PatientsRegistration => "patients_registration",
            TableName::ChatHistory => "chat_history",
            TableName::ImageAnalysis => "image_analysis",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AppError::InvalidTable(s.to_string()))
    }
}

/// Immutable allow-list handed to request handlers at startup.
#[derive(Debug, Clone)]
pub struct TableCatalog {
    tables: Vec<TableName>,
}

impl Default for TableCatalog {
    fn default() -> Self {
        Self {
            tables: TableName::ALL.to_vec(),
        }
    }
}

impl TableCatalog {
    /// Resolves a path segment to an allow-listed table.
    ///
    /// # Errors
    /// Returns `AppError::InvalidTable` for any name outside the catalog.
    pub fn resolve(&self, name: &str) -> Result<TableName, AppError> {
        let table: TableName = name.parse()?;
        if self.tables.contains(&table) {
            Ok(table)
        } else {
            Err(AppError::InvalidTable(name.to_string()))
        }
    }

    /// Table names as advertised to clients.
    pub fn names(&self) -> Vec<&'static str> {
        self.tables.iter().map(TableName::as_str).collect()
    }
}

/// Ordered column → value equality filters for deletes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet(Vec<(String, Value)>);

impl FilterSet {
    /// Builds filters from query-string pairs. Values stay strings.
    pub fn from_query_pairs(pairs: Vec<(String, String)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        )
    }

    /// Builds filters from a JSON object body.
    pub fn from_record(record: Record) -> Self {
        Self(record.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
