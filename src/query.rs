//! Query loader: registers the Parquet files of a split with an embedded
//! analytical engine.
//!
//! The engine sits behind [`QueryEngine`]; the pipeline only ever hands it a
//! glob pattern. The DuckDB backend is compiled in with the `duckdb-backend`
//! feature (on by default).

use serde::Serialize;

use crate::error::HfdlError;

/// Name of the view every scanned split is registered under.
pub const VIEW_NAME: &str = "dataset";

pub trait QueryEngine {
    type Table;

    /// Reads every file matched by `glob` as one table, with hive partition
    /// columns inferred from the directory names.
    fn scan(&self, glob: &str) -> Result<Self::Table, HfdlError>;
}

/// Engine for download-only callers. Any scan is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoQueryEngine;

impl QueryEngine for NoQueryEngine {
    type Table = ();

    fn scan(&self, _glob: &str) -> Result<Self::Table, HfdlError> {
        Err(HfdlError::QueryEngine("query engine not configured".to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub view: String,
    pub glob: String,
    pub columns: Vec<String>,
    pub row_count: u64,
}

#[cfg(feature = "duckdb-backend")]
pub use self::duck::{DuckDbEngine, ParquetTable};

#[cfg(feature = "duckdb-backend")]
mod duck {
    use duckdb::Connection;
    use tracing::debug;

    use super::{QueryEngine, TableSummary, VIEW_NAME};
    use crate::error::HfdlError;

    /// In-memory DuckDB instance per scan.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct DuckDbEngine;

    impl QueryEngine for DuckDbEngine {
        type Table = ParquetTable;

        fn scan(&self, glob: &str) -> Result<Self::Table, HfdlError> {
            debug!(glob, "opening in-memory DuckDB");
            let connection = Connection::open_in_memory().map_err(engine_error)?;
            let sql = format!(
                "CREATE VIEW {VIEW_NAME} AS SELECT * FROM read_parquet({}, hive_partitioning = true)",
                sql_literal(glob)
            );
            connection.execute_batch(&sql).map_err(engine_error)?;
            let columns = describe_columns(&connection).map_err(engine_error)?;
            debug!(glob, columns = columns.len(), "registered parquet view");
            Ok(ParquetTable {
                connection,
                glob: glob.to_string(),
                columns,
            })
        }
    }

    /// A split registered as the `dataset` view. Dropping it closes the
    /// database.
    pub struct ParquetTable {
        connection: Connection,
        glob: String,
        columns: Vec<String>,
    }

    impl ParquetTable {
        pub fn view_name(&self) -> &'static str {
            VIEW_NAME
        }

        pub fn glob(&self) -> &str {
            &self.glob
        }

        pub fn columns(&self) -> &[String] {
            &self.columns
        }

        pub fn row_count(&self) -> Result<u64, HfdlError> {
            let count: i64 = self
                .connection
                .query_row(&format!("SELECT count(*) FROM {VIEW_NAME}"), [], |row| {
                    row.get(0)
                })
                .map_err(engine_error)?;
            Ok(count.max(0) as u64)
        }

        pub fn summary(&self) -> Result<TableSummary, HfdlError> {
            Ok(TableSummary {
                view: VIEW_NAME.to_string(),
                glob: self.glob.clone(),
                columns: self.columns.clone(),
                row_count: self.row_count()?,
            })
        }

        /// Connection holding the view, for ad-hoc queries.
        pub fn connection(&self) -> &Connection {
            &self.connection
        }
    }

    fn describe_columns(connection: &Connection) -> duckdb::Result<Vec<String>> {
        let mut stmt = connection.prepare(&format!("DESCRIBE {VIEW_NAME}"))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn sql_literal(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn engine_error(err: duckdb::Error) -> HfdlError {
        HfdlError::QueryEngine(err.to_string())
    }

}
