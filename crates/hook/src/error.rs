//! 훅 에러 타입
//!
//! [`HookError`]는 훅 공개 API가 반환하는 에러입니다.
//! `From<HookError> for LogvaultError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 비동기 커미터 내부의 싱크 에러는 이 타입으로 전파되지 않고
//! tracing 에러 스트림으로만 보고됩니다.

use logvault_core::error::{LogvaultError, SinkError};

/// 훅 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// 싱크 에러 (동기 훅, close)
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// 커미터가 이미 종료됨
    #[error("hook closed: committer has terminated")]
    Closed,

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 커미터 태스크 join 실패 (패닉 등)
    #[error("committer task failed: {0}")]
    Task(String),
}

impl From<HookError> for LogvaultError {
    fn from(err: HookError) -> Self {
        match err {
            HookError::Sink(e) => LogvaultError::Sink(e),
            other => LogvaultError::Hook(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_error_keeps_variant_when_converted() {
        let err = HookError::Sink(SinkError::Insert("bad row".to_owned()));
        let top: LogvaultError = err.into();
        assert!(matches!(top, LogvaultError::Sink(SinkError::Insert(_))));
    }

    #[test]
    fn closed_converts_to_hook_error() {
        let top: LogvaultError = HookError::Closed.into();
        assert!(matches!(top, LogvaultError::Hook(_)));
        assert!(top.to_string().contains("terminated"));
    }

    #[test]
    fn config_error_display() {
        let err = HookError::Config {
            field: "flush_interval".to_owned(),
            reason: "must be greater than 0".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "config error: flush_interval: must be greater than 0"
        );
    }
}
