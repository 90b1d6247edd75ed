//! Database configuration for runtime backend selection.
//!
//! A [`DatabaseConfig`] is parsed from a connection URL or file path, or read
//! from the `SQLCURSOR_DATABASE_URL` environment variable, and opened with
//! [`DatabaseConfig::connect`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::DbError;

#[cfg(feature = "backend-sqlite")]
use crate::backend::sqlite::SqliteDatabase;

/// Environment variable holding a connection URL.
pub const DATABASE_URL_ENV: &str = "SQLCURSOR_DATABASE_URL";

/// Where the database lives.
///
/// Serialized with a `"type"` tag, as it appears in configuration files:
/// `{"type": "sqlite", "path": "./app.db"}` or `{"type": "memory"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// SQLite database file.
    Sqlite { path: PathBuf },

    /// Private in-memory database, gone when the connection closes.
    Memory,
}

impl DatabaseConfig {
    /// Open the configured database.
    #[cfg(feature = "backend-sqlite")]
    pub fn connect(&self) -> Result<SqliteDatabase, DbError> {
        match self {
            Self::Sqlite { path } => SqliteDatabase::open(path),
            Self::Memory => SqliteDatabase::open_mem(),
        }
    }

    /// Parse from a connection URL or file path.
    ///
    /// Supported formats:
    /// - `:memory:` → Memory
    /// - `sqlite://path/to/db` → Sqlite
    /// - `./path/to/db.sqlite` or `/absolute/path` → Sqlite
    pub fn from_url(url: &str) -> Result<Self, DbError> {
        if url == ":memory:" || url == "sqlite://:memory:" {
            return Ok(Self::Memory);
        }

        if let Some(path) = url.strip_prefix("sqlite://") {
            return Ok(Self::Sqlite {
                path: PathBuf::from(path),
            });
        }

        if let Some((scheme, _)) = url.split_once("://") {
            return Err(DbError::OpenFailed {
                path: url.to_string(),
                message: format!("unsupported URL scheme '{}'", scheme),
            });
        }

        Ok(Self::Sqlite {
            path: PathBuf::from(url),
        })
    }

    /// Load from `SQLCURSOR_DATABASE_URL`, if it is set.
    pub fn from_env() -> Result<Option<Self>, DbError> {
        match std::env::var(DATABASE_URL_ENV) {
            Ok(url) if !url.is_empty() => Ok(Some(Self::from_url(&url)?)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serial_test::serial;

    #[rstest]
    #[case(":memory:", DatabaseConfig::Memory)]
    #[case("sqlite://:memory:", DatabaseConfig::Memory)]
    #[case("sqlite:///tmp/app.db", DatabaseConfig::Sqlite { path: PathBuf::from("/tmp/app.db") })]
    #[case("./app.db", DatabaseConfig::Sqlite { path: PathBuf::from("./app.db") })]
    fn test_from_url(#[case] url: &str, #[case] expected: DatabaseConfig) {
        assert_eq!(DatabaseConfig::from_url(url).unwrap(), expected);
    }

    #[test]
    fn test_from_url_rejects_other_schemes() {
        let err = DatabaseConfig::from_url("postgres://localhost/db").unwrap_err();
        assert!(err.to_string().contains("unsupported URL scheme 'postgres'"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        unsafe { std::env::set_var(DATABASE_URL_ENV, ":memory:") };
        assert_eq!(DatabaseConfig::from_env().unwrap(), Some(DatabaseConfig::Memory));

        unsafe { std::env::remove_var(DATABASE_URL_ENV) };
        assert_eq!(DatabaseConfig::from_env().unwrap(), None);
    }

    #[test]
    fn test_deserialize_tagged() {
        let config: DatabaseConfig =
            serde_json::from_str(r#"{"type": "sqlite", "path": "./app.db"}"#).unwrap();
        assert_eq!(
            config,
            DatabaseConfig::Sqlite {
                path: PathBuf::from("./app.db")
            }
        );
        let config: DatabaseConfig = serde_json::from_str(r#"{"type": "memory"}"#).unwrap();
        assert_eq!(config, DatabaseConfig::Memory);
    }

    #[cfg(feature = "backend-sqlite")]
    #[test]
    fn test_connect_sqlite_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = DatabaseConfig::Sqlite {
            path: dir.path().join("app.db"),
        };
        let db = config.connect().unwrap();
        db.execute_batch("CREATE TABLE t (x)").unwrap();
        assert!(dir.path().join("app.db").exists());
    }
}
