pub mod models;

// Timestamps are read through `datetime()` so a malformed legacy value comes
// back as NULL instead of failing the whole row.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use models::{RequestStatus, UserField};

/// Columns added to pre-existing tables on startup, with their declarations.
/// SQLite cannot add a column with a non-constant default, so `created_at`
/// is plain TEXT here.
const USER_COLUMNS: &[(&str, &str)] = &[
    ("first_name", "TEXT"),
    ("last_name", "TEXT"),
    ("username", "TEXT"),
    ("street", "TEXT"),
    ("house", "TEXT"),
    ("flat", "TEXT"),
    ("entrance", "TEXT"),
    ("floor", "TEXT"),
    ("city", "TEXT"),
    ("phone", "TEXT"),
    ("comment", "TEXT"),
    ("tariff", "TEXT"),
    ("created_at", "TEXT"),
];

const REQUEST_COLUMNS: &[(&str, &str)] = &[
    ("bags", "INTEGER DEFAULT 1"),
    ("comment", "TEXT"),
    ("status", "TEXT DEFAULT 'new'"),
    ("created_at", "TEXT"),
];

#[derive(Debug, Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // One long-lived connection: SQLite serialises writers anyway, and an
        // in-memory database only lives as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS users (
                user_id     INTEGER PRIMARY KEY,
                first_name  TEXT,
                last_name   TEXT,
                username    TEXT,
                street      TEXT,
                house       TEXT,
                flat        TEXT,
                entrance    TEXT,
                floor       TEXT,
                city        TEXT,
                phone       TEXT,
                comment     TEXT,
                tariff      TEXT,
                created_at  TEXT DEFAULT CURRENT_TIMESTAMP
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS requests (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(user_id),
                bags        INTEGER DEFAULT 1,
                comment     TEXT,
                status      TEXT DEFAULT 'new',
                created_at  TEXT DEFAULT CURRENT_TIMESTAMP
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS referrals (
                user_id INTEGER PRIMARY KEY,
                count   INTEGER NOT NULL DEFAULT 0
            )"#,
        )
        .execute(&self.pool)
        .await?;

        for (name, decl) in USER_COLUMNS {
            self.ensure_column("users", name, decl).await?;
        }
        for (name, decl) in REQUEST_COLUMNS {
            self.ensure_column("requests", name, decl).await?;
        }

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_requests_user ON requests(user_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn ensure_column(&self, table: &str, name: &str, decl: &str) -> anyhow::Result<()> {
        let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?1)")
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        if !columns.iter().any(|c| c == name) {
            tracing::info!("Adding missing column {}.{}", table, name);
            // Identifiers come from the constant tables above, never from input.
            sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {name} {decl}"))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    // ── User Operations ────────────────────────────────────────────

    /// Creates the user row if absent, then writes the given fields.
    /// Does nothing (and creates nothing) when `fields` is empty.
    pub async fn save_user_info(
        &self,
        user_id: i64,
        fields: &[(UserField, &str)],
    ) -> anyhow::Result<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO users (user_id) VALUES (?1)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
        let mut sets = query.separated(", ");
        for (field, value) in fields {
            sets.push(field.column());
            sets.push_unseparated(" = ");
            sets.push_bind_unseparated(*value);
        }
        query.push(" WHERE user_id = ").push_bind(user_id);
        query.build().execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_user_info(&self, user_id: i64) -> anyhow::Result<Option<models::User>> {
        let user = sqlx::query_as::<_, models::User>(
            r#"
            SELECT user_id, first_name, last_name, username, street, house, flat,
                   entrance, floor, city, phone, comment, tariff,
                   datetime(created_at) AS created_at
            FROM users WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_address(
        &self,
        user_id: i64,
    ) -> anyhow::Result<Option<models::UserAddress>> {
        let address = sqlx::query_as::<_, models::UserAddress>(
            "SELECT street, house, flat, entrance, floor, city, phone FROM users WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(address)
    }

    // ── Request Operations ─────────────────────────────────────────

    /// Inserts a new request (creating an empty user row if needed) and
    /// returns its id.
    pub async fn add_request(&self, user_id: i64, bags: i64, comment: &str) -> anyhow::Result<i64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO users (user_id) VALUES (?1)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let request_id = sqlx::query(
            "INSERT INTO requests (user_id, bags, comment, status) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(user_id)
        .bind(bags)
        .bind(comment)
        .bind(RequestStatus::New.as_str())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;
        Ok(request_id)
    }

    pub async fn get_request(&self, request_id: i64) -> anyhow::Result<Option<models::Request>> {
        let req = sqlx::query_as::<_, models::Request>(
            r#"
            SELECT id, user_id, COALESCE(bags, 1) AS bags, comment,
                   COALESCE(status, 'new') AS status, datetime(created_at) AS created_at
            FROM requests WHERE id = ?1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(req)
    }

    pub async fn get_user_id_by_request_id(&self, request_id: i64) -> anyhow::Result<Option<i64>> {
        let user_id = sqlx::query_scalar("SELECT user_id FROM requests WHERE id = ?1")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user_id)
    }

    pub async fn get_all_requests(
        &self,
        limit: i64,
    ) -> anyhow::Result<Vec<models::RequestWithUser>> {
        let rows = sqlx::query_as::<_, models::RequestWithUser>(
            r#"
            SELECT r.id, r.user_id, COALESCE(r.bags, 1) AS bags, r.comment,
                   COALESCE(r.status, 'new') AS status, datetime(r.created_at) AS created_at,
                   u.street, u.house, u.flat, u.entrance, u.floor, u.city, u.phone,
                   u.first_name, u.last_name, u.username
            FROM requests r
            LEFT JOIN users u ON u.user_id = r.user_id
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Sets the request status to `done`. Returns true only for the call that
    /// performed the `new → done` transition; repeated calls are no-ops.
    pub async fn mark_request_completed(&self, request_id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE requests SET status = ?2 WHERE id = ?1 AND status IS NOT ?2",
        )
        .bind(request_id)
        .bind(RequestStatus::Done.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes every request, referral counter and user.
    pub async fn clear_all_data(&self) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM requests").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM referrals").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM users").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // ── Referral Operations ────────────────────────────────────────

    pub async fn add_ref_count(&self, ref_owner_id: i64) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO referrals (user_id, count) VALUES (?1, 1)
            ON CONFLICT(user_id) DO UPDATE SET count = referrals.count + 1
            "#,
        )
        .bind(ref_owner_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_ref_count(&self, user_id: i64) -> anyhow::Result<i64> {
        let count: Option<i64> = sqlx::query_scalar("SELECT count FROM referrals WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(count.unwrap_or(0))
    }
}

#[cfg(test)]
pub(crate) async fn test_db() -> Database {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    db.run_migrations().await.expect("migrations");
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_user_info_creates_row_and_updates_fields() {
        let db = test_db().await;

        db.save_user_info(7, &[(UserField::Street, "Ленина"), (UserField::House, "5")])
            .await
            .unwrap();
        db.save_user_info(7, &[(UserField::Phone, "+7 900 000-00-00")])
            .await
            .unwrap();

        let user = db.get_user_info(7).await.unwrap().unwrap();
        assert_eq!(user.street.as_deref(), Some("Ленина"));
        assert_eq!(user.house.as_deref(), Some("5"));
        assert_eq!(user.phone.as_deref(), Some("+7 900 000-00-00"));
        assert!(user.flat.is_none());
        assert!(user.created_at.is_some());
    }

    #[tokio::test]
    async fn save_user_info_with_no_fields_creates_nothing() {
        let db = test_db().await;
        db.save_user_info(7, &[]).await.unwrap();
        assert!(db.get_user_info(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_user_address_projects_address_columns() {
        let db = test_db().await;
        db.save_user_info(3, &[(UserField::City, "Казань"), (UserField::Floor, "2")])
            .await
            .unwrap();

        let address = db.get_user_address(3).await.unwrap().unwrap();
        assert_eq!(address.city.as_deref(), Some("Казань"));
        assert_eq!(address.floor.as_deref(), Some("2"));
        assert!(db.get_user_address(4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn add_request_ids_increase_and_resolve_to_owner() {
        let db = test_db().await;

        let first = db.add_request(11, 3, "x").await.unwrap();
        let second = db.add_request(11, 3, "x").await.unwrap();
        let third = db.add_request(12, 1, "").await.unwrap();

        assert!(first < second && second < third);
        assert_eq!(db.get_user_id_by_request_id(first).await.unwrap(), Some(11));
        assert_eq!(db.get_user_id_by_request_id(third).await.unwrap(), Some(12));
        assert_eq!(db.get_user_id_by_request_id(third + 100).await.unwrap(), None);

        // Owner rows are created on demand with empty fields.
        let owner = db.get_user_info(12).await.unwrap().unwrap();
        assert!(owner.street.is_none());

        let req = db.get_request(first).await.unwrap().unwrap();
        assert_eq!(req.bags, 3);
        assert_eq!(req.comment.as_deref(), Some("x"));
        assert_eq!(RequestStatus::from_str_loose(&req.status), RequestStatus::New);
    }

    #[tokio::test]
    async fn mark_request_completed_is_idempotent() {
        let db = test_db().await;
        let id = db.add_request(5, 2, "").await.unwrap();

        assert!(db.mark_request_completed(id).await.unwrap());
        assert!(!db.mark_request_completed(id).await.unwrap());

        let req = db.get_request(id).await.unwrap().unwrap();
        assert_eq!(req.status, "done");
    }

    #[tokio::test]
    async fn mark_unknown_request_completed_is_a_noop() {
        let db = test_db().await;
        assert!(!db.mark_request_completed(999).await.unwrap());
    }

    #[tokio::test]
    async fn get_all_requests_joins_user_fields_newest_first() {
        let db = test_db().await;
        db.save_user_info(1, &[(UserField::Street, "Мира"), (UserField::Username, "ivan")])
            .await
            .unwrap();
        let older = db.add_request(1, 1, "first").await.unwrap();
        let newer = db.add_request(1, 4, "second").await.unwrap();

        let rows = db.get_all_requests(10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, newer);
        assert_eq!(rows[1].id, older);
        assert_eq!(rows[0].street.as_deref(), Some("Мира"));
        assert_eq!(rows[0].username.as_deref(), Some("ivan"));

        assert_eq!(db.get_all_requests(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_all_data_wipes_every_table() {
        let db = test_db().await;
        db.save_user_info(1, &[(UserField::Street, "Мира")]).await.unwrap();
        let id = db.add_request(1, 1, "").await.unwrap();
        db.add_ref_count(1).await.unwrap();

        db.clear_all_data().await.unwrap();

        assert!(db.get_user_info(1).await.unwrap().is_none());
        assert!(db.get_request(id).await.unwrap().is_none());
        assert_eq!(db.get_ref_count(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn referral_counter_starts_on_first_credit_and_increments() {
        let db = test_db().await;
        assert_eq!(db.get_ref_count(9).await.unwrap(), 0);

        db.add_ref_count(9).await.unwrap();
        assert_eq!(db.get_ref_count(9).await.unwrap(), 1);

        db.add_ref_count(9).await.unwrap();
        db.add_ref_count(9).await.unwrap();
        assert_eq!(db.get_ref_count(9).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn malformed_timestamps_read_as_missing() {
        let db = test_db().await;
        db.save_user_info(8, &[(UserField::Street, "Мира")]).await.unwrap();
        let id = db.add_request(8, 1, "").await.unwrap();
        sqlx::query("UPDATE users SET created_at = 'garbage' WHERE user_id = 8")
            .execute(&db.pool)
            .await
            .unwrap();
        sqlx::query("UPDATE requests SET created_at = 'garbage' WHERE id = ?1")
            .bind(id)
            .execute(&db.pool)
            .await
            .unwrap();

        let user = db.get_user_info(8).await.unwrap().unwrap();
        assert_eq!(user.street.as_deref(), Some("Мира"));
        assert!(user.created_at.is_none());
        assert!(db.get_request(id).await.unwrap().unwrap().created_at.is_none());
        assert!(db.get_all_requests(5).await.unwrap()[0].created_at.is_none());
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = test_db().await;
        db.run_migrations().await.unwrap();
        db.add_request(1, 1, "").await.unwrap();
    }

    #[tokio::test]
    async fn migrations_add_missing_columns_to_legacy_tables() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE users (user_id INTEGER PRIMARY KEY, street TEXT)")
            .execute(&db.pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE requests (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER NOT NULL)")
            .execute(&db.pool)
            .await
            .unwrap();

        db.run_migrations().await.unwrap();

        let user_columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('users')")
                .fetch_all(&db.pool)
                .await
                .unwrap();
        for (name, _) in USER_COLUMNS {
            assert!(user_columns.iter().any(|c| c == name), "missing users.{name}");
        }

        db.save_user_info(1, &[(UserField::Tariff, "monthly")]).await.unwrap();
        let id = db.add_request(1, 2, "legacy").await.unwrap();
        let req = db.get_request(id).await.unwrap().unwrap();
        assert_eq!(req.bags, 2);
        assert_eq!(req.status, "new");
    }
}
