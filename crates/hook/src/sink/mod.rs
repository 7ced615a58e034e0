//! 싱크 -- 엔트리를 영속 저장소에 기록하는 외부 협력자
//!
//! [`LogSink`]은 훅과 저장소 사이의 유일한 경계입니다.
//! 동기 훅은 [`LogSink::insert`]를, 비동기 커미터는
//! `begin -> insert_batched* -> commit` 트랜잭션 흐름을 사용합니다.
//!
//! # 구현체
//! - [`MemorySink`]: 인메모리 저장소 (테스트, 임베딩용)
//! - `PostgresSink`: PostgreSQL 저장소 (`postgres` feature)

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{MemorySink, StoredRow};
#[cfg(feature = "postgres")]
pub use postgres::PostgresSink;

use logvault_core::error::SinkError;
use logvault_core::types::Entry;

/// 로그 저장소 trait
///
/// `Send + Sync + 'static` 바운드로 커미터 태스크와 생산자 사이에서
/// `Arc`로 공유할 수 있습니다.
///
/// 저장 시 필드 매핑은 [`Entry::fields_json`]으로 인코딩합니다.
/// 인코딩 실패는 해당 엔트리의 삽입 실패로 보고합니다.
pub trait LogSink: Send + Sync + 'static {
    /// 배치 트랜잭션 핸들
    type Transaction: Send;

    /// 엔트리 하나를 즉시 기록합니다 (동기 훅 경로).
    fn insert(&self, entry: &Entry) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// 배치 트랜잭션을 시작합니다.
    ///
    /// # Errors
    /// 저장소에 연결할 수 없거나 busy인 경우 `SinkError::Begin`
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction, SinkError>> + Send;

    /// 열린 트랜잭션에 엔트리를 추가합니다.
    fn insert_batched(
        &self,
        tx: &mut Self::Transaction,
        entry: &Entry,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// 트랜잭션을 커밋합니다.
    fn commit(&self, tx: Self::Transaction) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// 저장소 연결을 해제합니다.
    fn close(&self) -> impl Future<Output = Result<(), SinkError>> + Send;
}
