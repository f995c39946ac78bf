use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::PgConnection;
use std::time::Duration;

use crate::core::config::DatabaseConfig;
use crate::core::shared::error::DeskError;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<PgConnection>>;

pub fn create_conn(config: &DatabaseConfig) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(&config.url);
    Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .build(manager)
}

/// Pool that does not open any connection until first use.
pub fn create_lazy_conn(config: &DatabaseConfig) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(&config.url);
    Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .build_unchecked(manager)
}

/// Run database migrations
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS).map_err(
        |e| -> Box<dyn std::error::Error + Send + Sync> {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Migration error: {}", e),
            ))
        },
    )?;
    for version in applied {
        log::info!("Applied migration {}", version);
    }
    Ok(())
}

/// Run blocking diesel work on the blocking pool with a pooled connection.
pub async fn with_conn<T, F>(pool: &DbPool, f: F) -> Result<T, DeskError>
where
    T: Send + 'static,
    F: FnOnce(&mut DbConn) -> Result<T, DeskError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

pub fn format_ticket_number(sequence: i64) -> String {
    format!("TKT-{:06}", sequence)
}

/// Trim, and treat an all-whitespace value as absent.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_number_format() {
        assert_eq!(format_ticket_number(1), "TKT-000001");
        assert_eq!(format_ticket_number(123456), "TKT-123456");
    }

    #[test]
    fn test_normalize_optional() {
        assert_eq!(normalize_optional(Some("  Lab  ".into())), Some("Lab".into()));
        assert_eq!(normalize_optional(Some("   ".into())), None);
        assert_eq!(normalize_optional(None), None);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\KRS 2024.pdf"), "KRS_2024.pdf");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "file");
    }
}
