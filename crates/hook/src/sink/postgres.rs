//! PostgreSQL 싱크 (`postgres` feature)
//!
//! 기본 스키마:
//! ```sql
//! CREATE TABLE logs (
//!     level        SMALLINT    NOT NULL,
//!     message      TEXT        NOT NULL,
//!     message_data JSONB,
//!     created_at   TIMESTAMPTZ NOT NULL
//! );
//! ```
//!
//! 테이블명은 인스턴스 설정값이며, 삽입 SQL은 생성 시 한 번만 만들어집니다.
//! 커넥션 풀의 수명(연결/종료)은 호출자가 관리합니다. 동기 훅과 비동기 훅이
//! 같은 풀을 공유할 수 있습니다.

use sqlx::Postgres;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;

use logvault_core::config::StorageConfig;
use logvault_core::error::SinkError;
use logvault_core::types::Entry;

use super::LogSink;

/// PostgreSQL 싱크
#[derive(Debug, Clone)]
pub struct PostgresSink {
    pool: PgPool,
    table: String,
    insert_sql: String,
}

impl PostgresSink {
    /// 기존 커넥션 풀로 싱크를 생성합니다.
    ///
    /// `table`은 SQL 문에 그대로 삽입되므로 검증된 식별자여야 합니다
    /// ([`StorageConfig`] 검증 참고).
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        let table = table.into();
        let insert_sql = format!(
            "INSERT INTO {table} (level, message, message_data, created_at) VALUES ($1, $2, $3, $4)"
        );
        Self {
            pool,
            table,
            insert_sql,
        }
    }

    /// 설정으로 커넥션 풀을 열고 싱크를 생성합니다.
    pub async fn connect(config: &StorageConfig) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.postgres_url)
            .await
            .map_err(|e| SinkError::Connection(e.to_string()))?;
        tracing::info!(table = %config.table, "connected to postgres log store");
        Ok(Self::new(pool, config.table.clone()))
    }

    /// 로그 테이블이 없으면 생성합니다.
    pub async fn ensure_schema(&self) -> Result<(), SinkError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             level SMALLINT NOT NULL, \
             message TEXT NOT NULL, \
             message_data JSONB, \
             created_at TIMESTAMPTZ NOT NULL)",
            self.table
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| SinkError::Connection(format!("schema setup failed: {e}")))?;
        Ok(())
    }

    /// 커넥션 풀을 반환합니다.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl LogSink for PostgresSink {
    type Transaction = sqlx::Transaction<'static, Postgres>;

    async fn insert(&self, entry: &Entry) -> Result<(), SinkError> {
        let data = entry.fields_json()?;
        sqlx::query(&self.insert_sql)
            .bind(entry.level.as_i16())
            .bind(entry.message.as_str())
            .bind(Json(data))
            .bind(entry.timestamp)
            .execute(&self.pool)
            .await
            .map_err(insert_error)?;
        Ok(())
    }

    async fn begin(&self) -> Result<Self::Transaction, SinkError> {
        self.pool
            .begin()
            .await
            .map_err(|e| SinkError::Begin(e.to_string()))
    }

    async fn insert_batched(
        &self,
        tx: &mut Self::Transaction,
        entry: &Entry,
    ) -> Result<(), SinkError> {
        let data = entry.fields_json()?;
        sqlx::query(&self.insert_sql)
            .bind(entry.level.as_i16())
            .bind(entry.message.as_str())
            .bind(Json(data))
            .bind(entry.timestamp)
            .execute(&mut **tx)
            .await
            .map_err(insert_error)?;
        Ok(())
    }

    async fn commit(&self, tx: Self::Transaction) -> Result<(), SinkError> {
        tx.commit()
            .await
            .map_err(|e| SinkError::Commit(e.to_string()))
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.pool.close().await;
        Ok(())
    }
}

fn insert_error(e: sqlx::Error) -> SinkError {
    if is_transient_error(&e) {
        SinkError::Connection(format!("database error: {e}"))
    } else {
        SinkError::Insert(format!("database error: {e}"))
    }
}

fn is_transient_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_) => true,
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message().to_lowercase();
            msg.contains("timeout") || msg.contains("too many connections")
        }
        _ => false,
    }
}
