//! Execute tests for query command.

#[cfg(test)]
mod tests {
    use super::super::QueryCmd;
    use crate::commands::{Execute, Session};
    use db::{SqlValue, SqliteDatabase};
    use rstest::{fixture, rstest};

    #[fixture]
    fn session() -> Session {
        let db = SqliteDatabase::open_mem().expect("Failed to open database");
        db.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL, avatar BLOB);
             INSERT INTO users VALUES (1, 'ada', 9.5, x'cafe');
             INSERT INTO users VALUES (2, 'bob', NULL, NULL);
             INSERT INTO users VALUES (3, 'cy', 7.0, NULL);",
        )
        .expect("Failed to seed database");
        Session { db, max_rows: None }
    }

    fn query(sql: &str, max_rows: Option<u32>) -> QueryCmd {
        QueryCmd {
            sql: sql.to_string(),
            max_rows,
        }
    }

    #[rstest]
    fn test_query_returns_every_row(session: Session) {
        let result = query("SELECT * FROM users ORDER BY id", None)
            .execute(&session)
            .unwrap();
        assert_eq!(result.columns, vec!["id", "name", "score", "avatar"]);
        assert_eq!(result.rows.len(), 3);
        assert_eq!(
            result.rows[0],
            vec![
                SqlValue::Integer(1),
                SqlValue::from("ada"),
                SqlValue::Float(9.5),
                SqlValue::Blob(vec![0xca, 0xfe]),
            ]
        );
        assert_eq!(result.rows[1][2], SqlValue::Null);
    }

    #[rstest]
    fn test_query_respects_max_rows(session: Session) {
        let result = query("SELECT id FROM users ORDER BY id", Some(2))
            .execute(&session)
            .unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.max_rows, Some(2));
    }

    #[rstest]
    fn test_query_falls_back_to_session_max_rows(mut session: Session) {
        session.max_rows = Some(1);
        let result = query("SELECT id FROM users", None).execute(&session).unwrap();
        assert_eq!(result.rows.len(), 1);

        let result = query("SELECT id FROM users", Some(3)).execute(&session).unwrap();
        assert_eq!(result.rows.len(), 3);
    }

    #[rstest]
    fn test_query_runs_statements_without_rows(session: Session) {
        let result = query("DELETE FROM users WHERE id = 2", None)
            .execute(&session)
            .unwrap();
        assert!(result.columns.is_empty());
        assert!(result.rows.is_empty());

        let result = query("SELECT count(*) FROM users", None).execute(&session).unwrap();
        assert_eq!(result.rows, vec![vec![SqlValue::Integer(2)]]);
    }

    #[rstest]
    fn test_query_reports_sql_errors(session: Session) {
        let err = query("SELECT * FROM missing", None)
            .execute(&session)
            .unwrap_err();
        assert!(err.to_string().contains("no such table"));
    }
}
