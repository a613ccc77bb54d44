//! Repository for one plan family table.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;
use log::debug;

use pocketplan_core::errors::{DatabaseError, Error, Result};
use pocketplan_core::plans::{
    format_timestamp, PlanDocument, PlanFamilyConfig, PlanRecord, PlanRepositoryTrait,
    PLAN_TABLES,
};
use pocketplan_core::tokens::TokenHash;

use super::model::PlanSessionDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;

const SELECT_COLUMNS: &str =
    "token_hash, plan_json, prev_plan_json, created_at, updated_at, last_seen_at";

fn validate_plan_table(table: &str) -> Result<()> {
    if PLAN_TABLES.contains(&table) {
        return Ok(());
    }
    Err(Error::Database(DatabaseError::Internal(format!(
        "Unsupported plan table '{}'",
        table
    ))))
}

fn quote_identifier(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

/// How an upsert treats `prev_plan_json` on conflict.
fn prev_slot_assignment(family: &PlanFamilyConfig, retain_prev: bool) -> &'static str {
    match (family.retains_previous, retain_prev) {
        (false, _) => "prev_plan_json = NULL,",
        (true, true) => "prev_plan_json = plan_json,",
        (true, false) => "",
    }
}

fn load_row(
    conn: &mut SqliteConnection,
    table: &str,
    token_hash: &TokenHash,
) -> Result<Option<PlanRecord>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE token_hash = ?",
        SELECT_COLUMNS,
        quote_identifier(table)
    );
    diesel::sql_query(sql)
        .bind::<Text, _>(token_hash.as_str())
        .get_result::<PlanSessionDB>(conn)
        .optional()
        .map_err(StorageError::from)?
        .map(PlanRecord::try_from)
        .transpose()
}

pub struct PlanRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    family: PlanFamilyConfig,
}

impl PlanRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle, family: PlanFamilyConfig) -> Result<Self> {
        validate_plan_table(family.table_name)?;
        Ok(Self {
            pool,
            writer,
            family,
        })
    }

    fn table(&self) -> &'static str {
        self.family.table_name
    }
}

#[async_trait]
impl PlanRepositoryTrait for PlanRepository {
    fn family(&self) -> &PlanFamilyConfig {
        &self.family
    }

    fn find(&self, token_hash: &TokenHash) -> Result<Option<PlanRecord>> {
        let mut conn = get_connection(&self.pool)?;
        load_row(&mut conn, self.table(), token_hash)
    }

    async fn touch(&self, token_hash: &TokenHash) -> Result<Option<PlanRecord>> {
        let table = self.table();
        let token_hash = token_hash.clone();
        self.writer
            .exec(move |conn| {
                let sql = format!(
                    "UPDATE {} SET last_seen_at = ? WHERE token_hash = ?",
                    quote_identifier(table)
                );
                let updated = diesel::sql_query(sql)
                    .bind::<Text, _>(format_timestamp(Utc::now()))
                    .bind::<Text, _>(token_hash.as_str())
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if updated == 0 {
                    return Ok(None);
                }
                load_row(conn, table, &token_hash)
            })
            .await
    }

    async fn upsert(
        &self,
        token_hash: &TokenHash,
        plan: &PlanDocument,
        retain_prev: bool,
    ) -> Result<PlanRecord> {
        let table = self.table();
        let token_hash = token_hash.clone();
        let plan_json = plan.to_json_string()?;
        let prev_assignment = prev_slot_assignment(&self.family, retain_prev);

        self.writer
            .exec(move |conn| {
                let now = format_timestamp(Utc::now());
                let sql = format!(
                    "INSERT INTO {table} \
                     (token_hash, plan_json, prev_plan_json, created_at, updated_at, last_seen_at) \
                     VALUES (?, ?, NULL, ?, ?, ?) \
                     ON CONFLICT(token_hash) DO UPDATE SET \
                     {prev_assignment} \
                     plan_json = excluded.plan_json, \
                     updated_at = excluded.updated_at, \
                     last_seen_at = excluded.last_seen_at",
                    table = quote_identifier(table),
                );
                diesel::sql_query(sql)
                    .bind::<Text, _>(token_hash.as_str())
                    .bind::<Text, _>(&plan_json)
                    .bind::<Text, _>(&now)
                    .bind::<Text, _>(&now)
                    .bind::<Text, _>(&now)
                    .execute(conn)
                    .map_err(StorageError::from)?;

                load_row(conn, table, &token_hash)?.ok_or_else(|| {
                    Error::Database(DatabaseError::Internal(format!(
                        "Upserted row {} missing from {}",
                        token_hash.short(),
                        table
                    )))
                })
            })
            .await
    }

    async fn delete_seen_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let table = self.table();
        let cutoff = format_timestamp(cutoff);
        let deleted = self
            .writer
            .exec(move |conn| {
                let sql = format!(
                    "DELETE FROM {} WHERE last_seen_at < ?",
                    quote_identifier(table)
                );
                Ok(diesel::sql_query(sql)
                    .bind::<Text, _>(&cutoff)
                    .execute(conn)
                    .map_err(StorageError::from)?)
            })
            .await?;
        debug!("[Storage] Deleted {} expired row(s) from {}", deleted, table);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use diesel::sql_types::BigInt;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::db::Database;
    use pocketplan_core::plans::validate_plan_value;
    use pocketplan_core::tokens::SessionToken;

    #[derive(QueryableByName)]
    struct CountRow {
        #[diesel(sql_type = BigInt)]
        c: i64,
    }

    fn open() -> (TempDir, Database) {
        let dir = TempDir::new().expect("tempdir");
        let db = Database::open(&dir.path().to_string_lossy()).expect("open db");
        (dir, db)
    }

    fn hash() -> TokenHash {
        SessionToken::generate().expect("generate").hash()
    }

    fn plan_with_bill(id: &str) -> PlanDocument {
        validate_plan_value(json!({ "bills": [{ "id": id, "amount": 10 }], "theme": "dark" }))
            .expect("valid")
    }

    fn count_rows(db: &Database, table: &str) -> i64 {
        let mut conn = get_connection(&db.pool()).expect("conn");
        diesel::sql_query(format!("SELECT COUNT(*) AS c FROM {}", table))
            .get_result::<CountRow>(&mut conn)
            .expect("count")
            .c
    }

    fn backdate_last_seen(db: &Database, table: &str, token_hash: &TokenHash, at: DateTime<Utc>) {
        let mut conn = get_connection(&db.pool()).expect("conn");
        diesel::sql_query(format!(
            "UPDATE {} SET last_seen_at = ? WHERE token_hash = ?",
            table
        ))
        .bind::<Text, _>(format_timestamp(at))
        .bind::<Text, _>(token_hash.as_str())
        .execute(&mut conn)
        .expect("backdate");
    }

    #[tokio::test]
    async fn creates_both_family_tables() {
        let (_dir, db) = open();
        for table in PLAN_TABLES {
            let mut conn = get_connection(&db.pool()).expect("conn");
            let row = diesel::sql_query(format!(
                "SELECT COUNT(*) AS c FROM sqlite_master WHERE type='table' AND name='{}'",
                table
            ))
            .get_result::<CountRow>(&mut conn)
            .expect("table exists");
            assert_eq!(row.c, 1, "missing table {table}");
        }
    }

    #[tokio::test]
    async fn rejects_unknown_tables() {
        let (_dir, db) = open();
        let family = PlanFamilyConfig {
            table_name: "accounts; DROP TABLE plan_sessions",
            ..PlanFamilyConfig::main()
        };
        assert!(db.plan_repository(family).is_err());
    }

    #[tokio::test]
    async fn upsert_then_read_round_trips() {
        let (_dir, db) = open();
        let repo = db.plan_repository(PlanFamilyConfig::main()).expect("repo");
        let key = hash();

        assert!(repo.find(&key).expect("find").is_none());
        let written = repo
            .upsert(&key, &plan_with_bill("rent"), false)
            .await
            .expect("upsert");
        assert_eq!(written.plan, plan_with_bill("rent"));
        assert!(written.prev_plan.is_none());
        assert_eq!(written.created_at, written.updated_at);

        let read = repo.find(&key).expect("find").expect("row");
        assert_eq!(read, written);
        assert_eq!(count_rows(&db, "plan_sessions"), 1);
    }

    #[tokio::test]
    async fn main_family_rotates_previous_only_when_asked() {
        let (_dir, db) = open();
        let repo = db.plan_repository(PlanFamilyConfig::main()).expect("repo");
        let key = hash();

        repo.upsert(&key, &PlanDocument::blank(), false)
            .await
            .expect("create");
        let second = repo
            .upsert(&key, &plan_with_bill("a"), true)
            .await
            .expect("replace");
        assert_eq!(second.prev_plan, Some(PlanDocument::blank()));

        let partial = repo
            .upsert(&key, &plan_with_bill("b"), false)
            .await
            .expect("partial");
        assert_eq!(partial.plan, plan_with_bill("b"));
        assert_eq!(partial.prev_plan, Some(PlanDocument::blank()));

        let third = repo
            .upsert(&key, &plan_with_bill("c"), true)
            .await
            .expect("replace again");
        assert_eq!(third.prev_plan, Some(plan_with_bill("b")));
        assert_eq!(third.created_at, second.created_at);
    }

    #[tokio::test]
    async fn review_family_never_keeps_previous() {
        let (_dir, db) = open();
        let repo = db.plan_repository(PlanFamilyConfig::review()).expect("repo");
        let key = hash();

        for id in ["a", "b", "c"] {
            let record = repo
                .upsert(&key, &plan_with_bill(id), true)
                .await
                .expect("upsert");
            assert!(record.prev_plan.is_none());
        }
        assert_eq!(count_rows(&db, "review_sessions"), 1);
        assert_eq!(count_rows(&db, "plan_sessions"), 0);
    }

    #[tokio::test]
    async fn touch_refreshes_last_seen_but_find_does_not() {
        let (_dir, db) = open();
        let repo = db.plan_repository(PlanFamilyConfig::main()).expect("repo");
        let key = hash();
        repo.upsert(&key, &PlanDocument::blank(), false)
            .await
            .expect("create");

        let old = Utc::now() - Duration::days(3);
        backdate_last_seen(&db, "plan_sessions", &key, old);

        let passive = repo.find(&key).expect("find").expect("row");
        assert_eq!(format_timestamp(passive.last_seen_at), format_timestamp(old));

        let touched = repo.touch(&key).await.expect("touch").expect("row");
        assert!(touched.last_seen_at > old + Duration::days(2));
        assert!(repo.touch(&hash()).await.expect("touch").is_none());
    }

    #[tokio::test]
    async fn prune_respects_the_cutoff() {
        let (_dir, db) = open();
        let repo = db.plan_repository(PlanFamilyConfig::review()).expect("repo");
        let retention = PlanFamilyConfig::review().retention();
        let now = Utc::now();
        let cutoff = now - retention;

        let expired = hash();
        let recent = hash();
        for key in [&expired, &recent] {
            repo.upsert(key, &PlanDocument::blank(), false)
                .await
                .expect("create");
        }
        backdate_last_seen(&db, "review_sessions", &expired, cutoff - Duration::seconds(1));
        backdate_last_seen(&db, "review_sessions", &recent, cutoff + Duration::seconds(1));

        assert_eq!(repo.delete_seen_before(cutoff).await.expect("prune"), 1);
        assert!(repo.find(&expired).expect("find").is_none());
        assert!(repo.find(&recent).expect("find").is_some());
    }

    #[tokio::test]
    async fn families_are_isolated() {
        let (_dir, db) = open();
        let main = db.plan_repository(PlanFamilyConfig::main()).expect("main");
        let review = db.plan_repository(PlanFamilyConfig::review()).expect("review");
        let key = hash();

        main.upsert(&key, &plan_with_bill("main"), false)
            .await
            .expect("main upsert");
        assert!(review.find(&key).expect("find").is_none());
    }
}
