use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{ValidateEmail, ValidateUrl};

use crate::{links::Links, pagination::Pagination};

string_enum! {
    MetadataFormat {
        String => "STRING",
        Numeric => "NUMERIC",
        Boolean => "BOOLEAN",
        Date => "DATE",
        Mail => "MAIL",
        Url => "URL",
    }
}

impl MetadataFormat {
    /// validate
    ///
    /// Checks a value against the format. Values starting with `${` are
    /// expression templates resolved at runtime and are accepted as is.
    pub fn validate(&self, value: &str) -> Result<(), String> {
        if value.starts_with("${") {
            return Ok(());
        }

        let valid = match self {
            MetadataFormat::String => true,
            MetadataFormat::Numeric => value.trim().parse::<f64>().is_ok_and(f64::is_finite),
            MetadataFormat::Boolean => matches!(value, "true" | "false"),
            MetadataFormat::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
            MetadataFormat::Mail => value.validate_email(),
            MetadataFormat::Url => value.validate_url(),
        };

        if valid {
            Ok(())
        } else {
            Err(format!("Invalid {} value: {value}", self.as_str()))
        }
    }
}

/// slugify
///
/// Derives a metadata key from its display name: lower-cased, with every run of
/// non-alphanumeric characters collapsed into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Metadata
///
/// A key/value entry attached to an API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Metadata {
    pub api_id: Uuid,
    pub key: String,
    pub name: String,
    pub value: String,
    #[sqlx(try_from = "String")]
    pub format: MetadataFormat,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateMetadata {
    pub name: String,
    pub value: String,
    pub format: Option<MetadataFormat>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateMetadata {
    pub name: Option<String>,
    pub value: Option<String>,
    pub format: Option<MetadataFormat>,
}

// --- REST Representations ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MetadataEntry {
    pub key: String,
    pub name: String,
    pub value: String,
    pub format: MetadataFormat,
}

impl From<Metadata> for MetadataEntry {
    fn from(metadata: Metadata) -> Self {
        Self {
            key: metadata.key,
            name: metadata.name,
            value: metadata.value,
            format: metadata.format,
        }
    }
}

/// Page of `GET /apis/{apiId}/metadata`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MetadataResponse {
    pub data: Vec<MetadataEntry>,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}
