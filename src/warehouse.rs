// src/warehouse.rs
use duckdb::{params, Connection};
use tracing::{debug, info};

use crate::config::{ObjectStoreConfig, WarehouseConfig};
use crate::error::Result;

/// The relational warehouse the pipeline loads into.
///
/// Every call runs in autocommit mode: a statement that succeeds is durable
/// even if a later one in the same stage fails.
pub struct Warehouse {
    conn: Connection,
}

/// Quote `value` as a SQL string literal.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl Warehouse {
    /// Open the database at `config.path`, creating the file if it doesn't exist.
    pub fn open(config: &WarehouseConfig) -> Result<Self> {
        let conn = if config.path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.path)?
        };
        let warehouse = Self { conn };
        if let Some(threads) = config.threads {
            warehouse.execute(&format!("SET threads = {}", threads))?;
        }
        info!(path = %config.path, "opened warehouse");
        Ok(warehouse)
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Run one or more `;`-separated statements.
    pub fn execute(&self, sql: &str) -> Result<()> {
        debug!(sql = sql.trim(), "execute");
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Run a query returning a single integer in its first row and column.
    pub fn query_i64(&self, sql: &str) -> Result<i64> {
        debug!(sql = sql.trim(), "query");
        let value: i64 = self.conn.query_row(sql, [], |r| r.get(0))?;
        Ok(value)
    }

    pub fn count_rows(&self, table: &str) -> Result<i64> {
        self.query_i64(&format!("SELECT COUNT(*) FROM {}", table))
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            params![table],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    /// Make object-store credentials available to bulk loads from `s3://` paths.
    pub fn register_object_store(&self, store: &ObjectStoreConfig) -> Result<()> {
        let mut options = vec![
            "TYPE S3".to_string(),
            format!("KEY_ID {}", sql_literal(&store.key_id)),
            format!("SECRET {}", sql_literal(&store.secret)),
        ];
        if let Some(region) = &store.region {
            options.push(format!("REGION {}", sql_literal(region)));
        }
        if let Some(endpoint) = &store.endpoint {
            options.push(format!("ENDPOINT {}", sql_literal(endpoint)));
        }
        self.conn.execute_batch(&format!(
            "CREATE OR REPLACE SECRET i94_staging ({})",
            options.join(", ")
        ))?;
        info!("registered object store credentials");
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn execute_and_count() -> Result<()> {
        let wh = Warehouse::open_in_memory()?;
        assert!(!wh.table_exists("t")?);
        wh.execute("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1), (2), (3);")?;
        assert!(wh.table_exists("t")?);
        assert_eq!(wh.count_rows("t")?, 3);
        assert_eq!(wh.query_i64("SELECT CAST(MAX(id) AS BIGINT) FROM t")?, 3);
        Ok(())
    }

    #[test]
    fn statements_commit_individually() -> Result<()> {
        let wh = Warehouse::open_in_memory()?;
        wh.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)")?;
        wh.execute("INSERT INTO t VALUES (1)")?;
        assert!(wh.execute("INSERT INTO t VALUES (1)").is_err());
        assert_eq!(wh.count_rows("t")?, 1);
        Ok(())
    }

    #[test]
    fn literals_are_escaped() {
        assert_eq!(sql_literal("COTE D'IVOIRE"), "'COTE D''IVOIRE'");
    }

    #[test]
    fn open_from_config() -> Result<()> {
        let wh = Warehouse::open(&WarehouseConfig {
            path: ":memory:".into(),
            threads: Some(2),
        })?;
        assert_eq!(wh.query_i64("SELECT CAST(current_setting('threads') AS BIGINT)")?, 2);
        Ok(())
    }
}
