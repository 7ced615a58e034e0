//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 훅 구현은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않았으면 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logvault_hook_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 로그 레벨 레이블 키
pub const LABEL_LEVEL: &str = "level";

/// 훅 모드 레이블 키 (sync, async)
pub const LABEL_MODE: &str = "mode";

// ─── Hook 메트릭 ───────────────────────────────────────────────────

/// 큐에 적재된 엔트리 수 (counter)
pub const HOOK_ENTRIES_ENQUEUED_TOTAL: &str = "logvault_hook_entries_enqueued_total";

/// 필터 체인에서 폐기된 엔트리 수 (counter, label: mode)
pub const HOOK_ENTRIES_DISCARDED_TOTAL: &str = "logvault_hook_entries_discarded_total";

/// 커밋(또는 커밋 시도)된 엔트리 수 (counter)
pub const HOOK_ENTRIES_COMMITTED_TOTAL: &str = "logvault_hook_entries_committed_total";

/// 동기 훅에서 직접 기록된 엔트리 수 (counter)
pub const HOOK_ENTRIES_WRITTEN_TOTAL: &str = "logvault_hook_entries_written_total";

/// 엔트리 단위 삽입 실패 수 (counter)
pub const HOOK_INSERT_ERRORS_TOTAL: &str = "logvault_hook_insert_errors_total";

/// 커밋 실패 수 (counter)
pub const HOOK_COMMIT_ERRORS_TOTAL: &str = "logvault_hook_commit_errors_total";

/// 트랜잭션 시작 실패 수 (counter)
pub const HOOK_BEGIN_ERRORS_TOTAL: &str = "logvault_hook_begin_errors_total";

/// 아직 커밋되지 않은 엔트리 수 (gauge)
pub const HOOK_OUTSTANDING_ENTRIES: &str = "logvault_hook_outstanding_entries";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        HOOK_ENTRIES_ENQUEUED_TOTAL,
        "Total number of log entries accepted onto the batch queue"
    );
    describe_counter!(
        HOOK_ENTRIES_DISCARDED_TOTAL,
        "Total number of log entries discarded by the filter chain"
    );
    describe_counter!(
        HOOK_ENTRIES_COMMITTED_TOTAL,
        "Total number of queued log entries whose batch was committed or attempted"
    );
    describe_counter!(
        HOOK_ENTRIES_WRITTEN_TOTAL,
        "Total number of log entries written by the synchronous hook"
    );
    describe_counter!(
        HOOK_INSERT_ERRORS_TOTAL,
        "Total number of per-entry insert failures"
    );
    describe_counter!(
        HOOK_COMMIT_ERRORS_TOTAL,
        "Total number of batch commit failures"
    );
    describe_counter!(
        HOOK_BEGIN_ERRORS_TOTAL,
        "Total number of transaction begin failures"
    );
    describe_gauge!(
        HOOK_OUTSTANDING_ENTRIES,
        "Number of accepted log entries not yet committed"
    );
}
