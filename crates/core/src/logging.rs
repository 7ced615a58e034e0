//! tracing 구독자 초기화
//!
//! `[general]` 설정을 기반으로 `tracing-subscriber`를 구성합니다.
//! 훅이 "에러 스트림"으로 보고하는 모든 실패(트랜잭션 시작, 삽입, 커밋)는
//! 이 구독자를 통해 출력됩니다.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::GeneralConfig;
use crate::error::LogvaultError;

/// 전역 tracing 구독자를 초기화합니다.
///
/// 프로세스당 한 번만 호출해야 합니다. `RUST_LOG`가 설정되어 있으면
/// `log_level`보다 우선합니다.
///
/// # Formats
///
/// * `"json"` - 기계 판독용 JSON lines
/// * `"pretty"` - 사람이 읽기 쉬운 출력 (개발용)
pub fn init_tracing(config: &GeneralConfig) -> Result<(), LogvaultError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| {
                LogvaultError::Logging(format!("failed to initialize JSON subscriber: {e}"))
            }),
        "pretty" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .map_err(|e| {
                LogvaultError::Logging(format!("failed to initialize pretty subscriber: {e}"))
            }),
        other => Err(LogvaultError::Logging(format!(
            "unknown log format '{other}', expected 'json' or 'pretty'"
        ))),
    }
}
