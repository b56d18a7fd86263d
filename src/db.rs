use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, FromQueryResult,
    QueryResult, Statement, Value,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::DatabaseConfig;

/// Pooled, parameterized access to the store.
///
/// Every statement goes through [`Gateway::query`] with positional `$n`
/// placeholders; values are bound by the driver and never spliced into SQL.
#[derive(Clone, Debug)]
pub struct Gateway {
    conn: Arc<DatabaseConnection>,
}

impl Gateway {
    /// Open a bounded connection pool and verify the store answers
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbErr> {
        let database_url = config
            .connection_url()
            .map_err(|e| DbErr::Custom(format!("Invalid database address: {}", e)))?;

        info!("Connecting to database: {}:{}/{}", config.host, config.port, config.name);

        let timeout = Duration::from_secs(config.connect_timeout_secs);
        let mut opt = ConnectOptions::new(database_url);
        opt.max_connections(config.max_connections)
            .min_connections(1)
            .connect_timeout(timeout)
            .acquire_timeout(timeout)
            .sqlx_logging(true)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        let conn = Database::connect(opt).await?;
        conn.ping().await?;
        info!(
            "Database connection established (max {} connections)",
            config.max_connections
        );

        Ok(Self::from_connection(conn))
    }

    /// Wrap an already established connection
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self::from_shared(Arc::new(conn))
    }

    /// Wrap a connection that other owners keep a handle to
    pub fn from_shared(conn: Arc<DatabaseConnection>) -> Self {
        Self { conn }
    }

    /// Execute a parameterized query and return its row set
    pub async fn query(&self, sql: &str, values: Vec<Value>) -> Result<Vec<QueryResult>, DbErr> {
        let stmt = Statement::from_sql_and_values(self.conn.get_database_backend(), sql, values);
        self.conn.query_all(stmt).await
    }

    /// Execute a parameterized query and map every row
    pub async fn fetch_all<T>(&self, sql: &str, values: Vec<Value>) -> Result<Vec<T>, DbErr>
    where
        T: FromQueryResult,
    {
        self.query(sql, values)
            .await?
            .iter()
            .map(|row| T::from_query_result(row, ""))
            .collect()
    }

    /// Execute a parameterized query and map its first row, if any
    pub async fn fetch_optional<T>(&self, sql: &str, values: Vec<Value>) -> Result<Option<T>, DbErr>
    where
        T: FromQueryResult,
    {
        Ok(self.fetch_all(sql, values).await?.into_iter().next())
    }

    /// Execute a statement without parameters or rows (DDL, fixed seeds)
    pub async fn execute(&self, sql: &str) -> Result<u64, DbErr> {
        let stmt =
            Statement::from_sql_and_values(self.conn.get_database_backend(), sql, Vec::new());
        let result = self.conn.execute(stmt).await?;
        Ok(result.rows_affected())
    }

    /// Release all pooled connections.
    ///
    /// The pool is only closed here when this is the last handle; otherwise it
    /// is released once the remaining handles are dropped.
    pub async fn close(self) -> Result<(), DbErr> {
        match Arc::try_unwrap(self.conn) {
            Ok(conn) => conn.close().await,
            Err(shared) => {
                warn!(
                    "Connection pool still has {} other handles, leaving it to drop",
                    Arc::strong_count(&shared) - 1
                );
                Ok(())
            }
        }
    }
}

const CREATE_GROUPS_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS groups (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    description TEXT,
    "membersCount" INTEGER NOT NULL DEFAULT 0,
    "createdAt" TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    "updatedAt" TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
)"#;

const GROUPS_COLUMNS: &str = "SELECT column_name::text AS column_name, data_type::text AS data_type
    FROM information_schema.columns
    WHERE table_schema = current_schema() AND table_name = 'groups'";

/// Column types the group reads can decode. Tables created by older setup
/// tools use `TIMESTAMP` and a nullable `"membersCount"`; reads cast and
/// coalesce those, so both shapes are accepted.
const EXPECTED_COLUMNS: &[(&str, &[&str])] = &[
    ("id", &["integer"]),
    ("name", &["character varying", "text"]),
    ("description", &["text", "character varying"]),
    ("membersCount", &["integer"]),
    (
        "createdAt",
        &["timestamp with time zone", "timestamp without time zone"],
    ),
    (
        "updatedAt",
        &["timestamp with time zone", "timestamp without time zone"],
    ),
];

const COUNT_GROUPS: &str = "SELECT COUNT(*) AS count FROM groups";

const SEED_GROUPS: &str = r#"INSERT INTO groups (name, description, "membersCount") VALUES
    ('Tech Enthusiasts', 'A community for technology lovers', 150),
    ('Photography Club', 'Share and learn photography techniques', 89),
    ('Book Readers', 'Discuss your favorite books and authors', 203)"#;

#[derive(Debug, FromQueryResult)]
struct RowCount {
    count: i64,
}

#[derive(Debug, FromQueryResult)]
struct ColumnInfo {
    column_name: String,
    data_type: String,
}

/// Outcome of a bootstrap run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Sample rows were inserted because the table was empty
    pub seeded: bool,
}

/// Create the groups table if absent, check its columns and seed it when
/// empty.
///
/// Safe to run repeatedly. Seeding is keyed on the row count alone, so any
/// existing row (including a manually inserted one) suppresses it.
pub async fn bootstrap(gateway: &Gateway) -> Result<BootstrapReport, DbErr> {
    gateway.execute(CREATE_GROUPS_TABLE).await?;
    verify_columns(gateway).await?;
    info!("Table \"groups\" is present");

    let count = gateway
        .fetch_optional::<RowCount>(COUNT_GROUPS, vec![])
        .await?
        .map(|row| row.count)
        .unwrap_or(0);

    if count > 0 {
        info!("Table \"groups\" has {} rows, skipping sample data", count);
        return Ok(BootstrapReport { seeded: false });
    }

    gateway.execute(SEED_GROUPS).await?;
    info!("Sample data inserted");

    Ok(BootstrapReport { seeded: true })
}

/// Fail when an existing table lacks a column or stores it as a type the
/// reads cannot decode
async fn verify_columns(gateway: &Gateway) -> Result<(), DbErr> {
    let columns: Vec<ColumnInfo> = gateway.fetch_all(GROUPS_COLUMNS, vec![]).await?;

    for (name, accepted) in EXPECTED_COLUMNS {
        match columns.iter().find(|c| c.column_name == *name) {
            Some(c) if accepted.contains(&c.data_type.as_str()) => {}
            Some(c) => {
                return Err(DbErr::Custom(format!(
                    "Table \"groups\" column \"{}\" has type {}, expected {}",
                    name,
                    c.data_type,
                    accepted.join(" or ")
                )))
            }
            None => {
                return Err(DbErr::Custom(format!(
                    "Table \"groups\" has no column \"{}\"",
                    name
                )))
            }
        }
    }
    Ok(())
}
