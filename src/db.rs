use anyhow::{Context, Result};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Create a SeaORM connection.
pub async fn create_orm_conn(database_url: &str) -> Result<DatabaseConnection> {
    let conn = Database::connect(database_url).await?;
    Ok(conn)
}

/// Splits a migration file into single statements. Postgres prepared
/// statements cannot contain multiple commands. Chunks holding only
/// `--` comments are dropped.
fn statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| {
            stmt.lines()
                .map(str::trim)
                .any(|line| !line.is_empty() && !line.starts_with("--"))
        })
        .map(|stmt| format!("{stmt};"))
        .collect()
}

/// Executes the `.sql` files in `dir` in filename order. Every statement is
/// idempotent, so the whole set is replayed on each start.
pub async fn run_migrations(conn: &DatabaseConnection, dir: &Path) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("reading migrations from {}", dir.display()))?;
    let mut files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();

    let backend = conn.get_database_backend();
    for file in files {
        let sql = fs::read_to_string(&file).await?;
        let stmts = statements(&sql);
        for stmt in &stmts {
            conn.execute(Statement::from_string(backend, stmt.clone()))
                .await
                .with_context(|| format!("applying {}", file.display()))?;
        }
        tracing::info!(file = %file.display(), statements = stmts.len(), "migration applied");
    }

    Ok(())
}
