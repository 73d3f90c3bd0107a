use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_ORGANIZATION_ID: &str = "DEFAULT";
pub const DEFAULT_ENVIRONMENT_ID: &str = "DEFAULT";

/// Environment
///
/// A gateway environment. Every managed resource lives under exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Environment {
    pub id: String,
    pub organization_id: String,
    pub name: String,
}

impl Environment {
    pub fn default_environment() -> Self {
        Self {
            id: DEFAULT_ENVIRONMENT_ID.to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            name: "Default environment".to_string(),
        }
    }
}
