use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, Statement, TransactionError,
};
use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::config::AppConfig;
use crate::error::AppError;

pub async fn connect_db(config: &AppConfig) -> DatabaseConnection {
    let url = config.database_url();
    if url.starts_with("sqlite") && !url.contains(":memory:") {
        ensure_sqlite_path(&url);
    }
    let db = Database::connect(&url)
        .await
        .unwrap_or_else(|e| panic!("db connect failed: {}", e));
    if url.starts_with("sqlite") {
        init_sqlite_schema(&db).await;
    }
    db
}

fn ensure_sqlite_path(raw: &str) {
    let path = raw
        .strip_prefix("sqlite://")
        .or_else(|| raw.strip_prefix("sqlite:"))
        .unwrap_or(raw);
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = OpenOptions::new().create(true).write(true).open(path);
}

pub async fn init_sqlite_schema(db: &DatabaseConnection) {
    let backend = db.get_database_backend();
    let exists_stmt = Statement::from_string(
        backend,
        "SELECT name FROM sqlite_master WHERE type='table' AND name='t_user' LIMIT 1",
    );
    let exists = db.query_one(exists_stmt).await.ok().flatten().is_some();
    if exists {
        return;
    }

    let sql = include_str!("../schema-sqlite.sql");
    for stmt in split_sql(sql) {
        let _ = db.execute(Statement::from_string(backend, stmt)).await;
    }
}

fn split_sql(input: &str) -> Vec<String> {
    let mut buf = String::new();
    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }
        buf.push_str(line);
        buf.push('\n');
    }
    buf.split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub async fn query_one<C: ConnectionTrait>(
    db: &C,
    sql: &str,
    values: Vec<sea_orm::Value>,
) -> Result<Option<sea_orm::QueryResult>, AppError> {
    let backend = db.get_database_backend();
    let stmt = Statement::from_sql_and_values(backend, sql, values);
    db.query_one(stmt).await.map_err(AppError::db)
}

pub async fn query_all<C: ConnectionTrait>(
    db: &C,
    sql: &str,
    values: Vec<sea_orm::Value>,
) -> Result<Vec<sea_orm::QueryResult>, AppError> {
    let backend = db.get_database_backend();
    let stmt = Statement::from_sql_and_values(backend, sql, values);
    db.query_all(stmt).await.map_err(AppError::db)
}

pub async fn query_count<C: ConnectionTrait>(
    db: &C,
    sql: &str,
    values: Vec<sea_orm::Value>,
) -> Result<i64, AppError> {
    let row = query_one(db, sql, values).await?;
    Ok(row.and_then(|r| r.try_get("", "cnt").ok()).unwrap_or(0))
}

pub fn map_tx_error(err: TransactionError<AppError>) -> AppError {
    match err {
        TransactionError::Connection(e) => AppError::db(e),
        TransactionError::Transaction(app) => app,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sql_skips_comments_and_blank_statements() {
        let stmts = split_sql("-- header\nCREATE TABLE a (id INTEGER);\n\n-- x\nCREATE INDEX i ON a(id);\n");
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("CREATE TABLE a"));
        assert!(stmts[1].starts_with("CREATE INDEX i"));
    }
}
