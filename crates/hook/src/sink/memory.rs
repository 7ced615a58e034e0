//! 인메모리 싱크
//!
//! 커밋된 행만 보관하며, 트랜잭션 단위 원자성을 흉내냅니다.
//! 커밋 전에는 행이 보이지 않고, 커밋이 실패하면 배치 전체가 버려집니다.
//! 장애 주입 기능으로 트랜잭션 시작/커밋 실패와 느린 삽입을 재현할 수 있습니다.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use logvault_core::error::SinkError;
use logvault_core::types::{Entry, Level};

use super::LogSink;

/// 저장된 행 (level, message, fields, timestamp)
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    /// 레벨
    pub level: Level,
    /// 메시지
    pub message: String,
    /// JSON 인코딩된 필드
    pub fields: serde_json::Value,
    /// 타임스탬프
    pub timestamp: DateTime<Utc>,
}

impl StoredRow {
    fn encode(entry: &Entry) -> Result<Self, SinkError> {
        Ok(Self {
            level: entry.level,
            message: entry.message.clone(),
            fields: entry.fields_json()?,
            timestamp: entry.timestamp,
        })
    }
}

/// [`MemorySink`]의 트랜잭션
#[derive(Debug, Default)]
pub struct MemoryTransaction {
    rows: Vec<StoredRow>,
}

impl MemoryTransaction {
    /// 아직 커밋되지 않은 행 수를 반환합니다.
    pub fn pending(&self) -> usize {
        self.rows.len()
    }
}

/// 인메모리 싱크
#[derive(Debug, Default)]
pub struct MemorySink {
    /// 커밋된 행
    rows: Mutex<Vec<StoredRow>>,
    /// 다음 N번의 begin을 실패시킴
    fail_begins: AtomicUsize,
    /// 다음 N번의 삽입을 실패시킴
    fail_inserts: AtomicUsize,
    /// 모든 commit을 실패시킴
    fail_commits: AtomicBool,
    /// 삽입마다 대기할 시간 (밀리초)
    insert_delay_ms: AtomicU64,
    /// close 호출 여부
    closed: AtomicBool,
    /// 성공한 begin 횟수
    begins: AtomicUsize,
    /// 시도된 commit 횟수
    commits: AtomicUsize,
    /// 시도된 삽입 횟수
    insert_attempts: AtomicUsize,
}

impl MemorySink {
    /// 빈 싱크를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 다음 `count`번의 트랜잭션 시작을 실패시킵니다.
    pub fn fail_next_begins(&self, count: usize) {
        self.fail_begins.store(count, Ordering::SeqCst);
    }

    /// 다음 `count`번의 삽입(직접/배치)을 실패시킵니다.
    pub fn fail_next_inserts(&self, count: usize) {
        self.fail_inserts.store(count, Ordering::SeqCst);
    }

    /// 커밋 실패 여부를 설정합니다.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// 삽입마다 지연을 설정합니다 (느린 저장소 재현).
    pub fn set_insert_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.insert_delay_ms.store(ms, Ordering::SeqCst);
    }

    /// 커밋된 행의 사본을 반환합니다.
    pub fn rows(&self) -> Vec<StoredRow> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 커밋된 행 수를 반환합니다.
    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// 성공한 트랜잭션 시작 횟수를 반환합니다.
    pub fn begin_count(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    /// 시도된 커밋 횟수를 반환합니다.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// 시도된 삽입 횟수를 반환합니다 (실패 포함).
    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    /// close 호출 여부를 반환합니다.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        Ok(())
    }

    async fn encode_slowly(&self, entry: &Entry) -> Result<StoredRow, SinkError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = self.insert_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if take_one(&self.fail_inserts) {
            return Err(SinkError::Insert("row rejected".to_owned()));
        }
        StoredRow::encode(entry)
    }
}

impl LogSink for MemorySink {
    type Transaction = MemoryTransaction;

    async fn insert(&self, entry: &Entry) -> Result<(), SinkError> {
        self.ensure_open()?;
        let row = self.encode_slowly(entry).await?;
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(row);
        Ok(())
    }

    async fn begin(&self) -> Result<MemoryTransaction, SinkError> {
        self.ensure_open()?;
        if take_one(&self.fail_begins) {
            return Err(SinkError::Begin("store unavailable".to_owned()));
        }
        self.begins.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryTransaction::default())
    }

    async fn insert_batched(
        &self,
        tx: &mut MemoryTransaction,
        entry: &Entry,
    ) -> Result<(), SinkError> {
        self.ensure_open()?;
        let row = self.encode_slowly(entry).await?;
        tx.rows.push(row);
        Ok(())
    }

    async fn commit(&self, tx: MemoryTransaction) -> Result<(), SinkError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(SinkError::Commit(format!(
                "rolled back {} rows",
                tx.rows.len()
            )));
        }
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(tx.rows);
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// 남은 실패 횟수를 하나 소비합니다. 남은 횟수가 없으면 false.
fn take_one(remaining: &AtomicUsize) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use logvault_core::types::FieldValue;

    #[derive(Debug, thiserror::Error)]
    #[error("opaque")]
    struct Opaque;

    #[tokio::test]
    async fn rows_invisible_until_commit() {
        let sink = MemorySink::new();
        let mut tx = sink.begin().await.unwrap();
        sink.insert_batched(&mut tx, &Entry::new(Level::Info, "a"))
            .await
            .unwrap();
        assert_eq!(tx.pending(), 1);
        assert_eq!(sink.row_count(), 0);

        sink.commit(tx).await.unwrap();
        assert_eq!(sink.row_count(), 1);
        assert_eq!(sink.commit_count(), 1);
    }

    #[tokio::test]
    async fn failed_commit_drops_batch() {
        let sink = MemorySink::new();
        sink.set_fail_commits(true);
        let mut tx = sink.begin().await.unwrap();
        sink.insert_batched(&mut tx, &Entry::new(Level::Info, "a"))
            .await
            .unwrap();
        assert!(matches!(sink.commit(tx).await, Err(SinkError::Commit(_))));
        assert_eq!(sink.row_count(), 0);
    }

    #[tokio::test]
    async fn fail_next_begins_counts_down() {
        let sink = MemorySink::new();
        sink.fail_next_begins(2);
        assert!(sink.begin().await.is_err());
        assert!(sink.begin().await.is_err());
        assert!(sink.begin().await.is_ok());
        assert_eq!(sink.begin_count(), 1);
    }

    #[tokio::test]
    async fn fail_next_inserts_rejects_only_that_many_rows() {
        let sink = MemorySink::new();
        sink.fail_next_inserts(1);
        let mut tx = sink.begin().await.unwrap();
        assert!(matches!(
            sink.insert_batched(&mut tx, &Entry::new(Level::Info, "a")).await,
            Err(SinkError::Insert(_))
        ));
        sink.insert_batched(&mut tx, &Entry::new(Level::Info, "b"))
            .await
            .unwrap();
        sink.commit(tx).await.unwrap();

        assert_eq!(sink.insert_attempts(), 2);
        assert_eq!(sink.rows()[0].message, "b");
    }

    #[tokio::test]
    async fn opaque_error_field_fails_insert() {
        let sink = MemorySink::new();
        let entry = Entry::new(Level::Error, "e").with_field("error", FieldValue::error(Opaque));
        assert!(matches!(
            sink.insert(&entry).await,
            Err(SinkError::Encode(_))
        ));
        assert_eq!(sink.insert_attempts(), 1);
        assert_eq!(sink.row_count(), 0);
    }

    #[tokio::test]
    async fn closed_sink_rejects_writes() {
        let sink = MemorySink::new();
        sink.close().await.unwrap();
        assert!(sink.is_closed());
        assert!(matches!(
            sink.insert(&Entry::new(Level::Info, "a")).await,
            Err(SinkError::Closed)
        ));
        assert!(matches!(sink.begin().await, Err(SinkError::Closed)));
    }

    #[tokio::test]
    async fn direct_insert_stores_encoded_fields() {
        let sink = MemorySink::new();
        let entry = Entry::new(Level::Warn, "w").with_field("k", "v");
        sink.insert(&entry).await.unwrap();
        let rows = sink.rows();
        assert_eq!(rows[0].level, Level::Warn);
        assert_eq!(rows[0].fields, serde_json::json!({"k": "v"}));
        assert_eq!(rows[0].timestamp, entry.timestamp);
    }
}
