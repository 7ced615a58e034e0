//! 에러 타입 -- 도메인별 에러 정의

/// Logvault 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogvaultError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 싱크(저장소) 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// 훅 처리 에러
    #[error("hook error: {0}")]
    Hook(String),

    /// tracing 구독자 초기화 실패
    #[error("logging init failed: {0}")]
    Logging(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 싱크 에러
///
/// 비동기 훅에서는 모든 싱크 에러가 에러 스트림(tracing)으로만 보고되며
/// 호출자에게 전파되지 않습니다. 동기 훅은 호출자에게 그대로 반환합니다.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 트랜잭션 시작 실패 (저장소 연결 불가, busy 등)
    #[error("transaction begin failed: {0}")]
    Begin(String),

    /// 단일 엔트리 삽입 실패
    #[error("insert failed: {0}")]
    Insert(String),

    /// 커밋 실패
    #[error("commit failed: {0}")]
    Commit(String),

    /// 필드 인코딩 실패
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// 연결 에러
    #[error("connection failed: {0}")]
    Connection(String),

    /// 이미 닫힌 싱크
    #[error("sink closed")]
    Closed,
}

impl SinkError {
    /// 재시도로 회복될 수 있는 에러인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Begin(_) | Self::Connection(_))
    }
}
