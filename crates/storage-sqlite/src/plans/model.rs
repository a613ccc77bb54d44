//! Row model shared by the `plan_sessions` and `review_sessions` tables.

use chrono::{DateTime, Utc};
use diesel::sql_types::{Nullable, Text};
use diesel::QueryableByName;

use pocketplan_core::errors::{DatabaseError, Error, Result};
use pocketplan_core::plans::{PlanDocument, PlanRecord};
use pocketplan_core::tokens::TokenHash;

/// Both family tables share this layout; the table is chosen at query time, so
/// rows are loaded by name rather than through a `table!` mapping.
#[derive(QueryableByName, Debug, Clone)]
pub struct PlanSessionDB {
    #[diesel(sql_type = Text)]
    pub token_hash: String,
    #[diesel(sql_type = Text)]
    pub plan_json: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub prev_plan_json: Option<String>,
    #[diesel(sql_type = Text)]
    pub created_at: String,
    #[diesel(sql_type = Text)]
    pub updated_at: String,
    #[diesel(sql_type = Text)]
    pub last_seen_at: String,
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            Error::Database(DatabaseError::Internal(format!(
                "Invalid {} timestamp '{}': {}",
                column, value, e
            )))
        })
}

impl TryFrom<PlanSessionDB> for PlanRecord {
    type Error = Error;

    fn try_from(row: PlanSessionDB) -> Result<Self> {
        Ok(PlanRecord {
            plan: PlanDocument::from_stored(&row.plan_json)?,
            prev_plan: row
                .prev_plan_json
                .as_deref()
                .map(PlanDocument::from_stored)
                .transpose()?,
            created_at: parse_timestamp("created_at", &row.created_at)?,
            updated_at: parse_timestamp("updated_at", &row.updated_at)?,
            last_seen_at: parse_timestamp("last_seen_at", &row.last_seen_at)?,
            token_hash: TokenHash::from_stored(row.token_hash),
        })
    }
}
