//! 설정 관리 -- logvault.toml 파싱 및 런타임 설정
//!
//! [`LogvaultConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`LOGVAULT_HOOK_QUEUE_CAPACITY=1024` 형식)
//! 2. 설정 파일 (`logvault.toml`)
//! 3. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logvault_core::error::LogvaultError> {
//! use logvault_core::config::LogvaultConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogvaultConfig::load("logvault.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogvaultConfig::parse("[hook]\nqueue_capacity = 1024")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogvaultError};
use crate::types::Level;

/// 큐 용량 상한
const MAX_QUEUE_CAPACITY: usize = 10_000_000;
/// 커밋 주기 상한 (1시간)
const MAX_INTERVAL_MS: u64 = 3_600_000;

/// Logvault 통합 설정
///
/// `logvault.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogvaultConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 훅 설정
    #[serde(default)]
    pub hook: LogHookConfig,
    /// 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
}

impl LogvaultConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogvaultError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogvaultError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogvaultError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogvaultError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogvaultError> {
        toml::from_str(toml_str).map_err(|e| {
            LogvaultError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGVAULT_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGVAULT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGVAULT_GENERAL_LOG_FORMAT");

        // Hook
        override_usize(&mut self.hook.queue_capacity, "LOGVAULT_HOOK_QUEUE_CAPACITY");
        override_u64(
            &mut self.hook.flush_interval_ms,
            "LOGVAULT_HOOK_FLUSH_INTERVAL_MS",
        );
        override_u64(
            &mut self.hook.flush_drain_interval_ms,
            "LOGVAULT_HOOK_FLUSH_DRAIN_INTERVAL_MS",
        );
        override_csv(&mut self.hook.levels, "LOGVAULT_HOOK_LEVELS");
        override_csv(&mut self.hook.blacklist, "LOGVAULT_HOOK_BLACKLIST");

        // Storage
        override_string(
            &mut self.storage.postgres_url,
            "LOGVAULT_STORAGE_POSTGRES_URL",
        );
        override_string(&mut self.storage.table, "LOGVAULT_STORAGE_TABLE");
        override_u32(
            &mut self.storage.max_connections,
            "LOGVAULT_STORAGE_MAX_CONNECTIONS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogvaultError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        self.hook.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// tracing 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// tracing 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 훅 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogHookConfig {
    /// 비동기 배치 큐 용량 (가득 차면 생산자가 대기)
    pub queue_capacity: usize,
    /// 주기적 커밋 간격 (밀리초)
    pub flush_interval_ms: u64,
    /// 종료 flush 중 사용하는 짧은 커밋 간격 (밀리초)
    pub flush_drain_interval_ms: u64,
    /// 저장할 로그 레벨 목록
    pub levels: Vec<String>,
    /// 저장에서 제외할 필드 키 목록
    pub blacklist: Vec<String>,
    /// 모든 엔트리에 병합되는 추가 필드
    pub extra_fields: BTreeMap<String, serde_json::Value>,
}

impl Default for LogHookConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 8192,
            flush_interval_ms: 1000,
            flush_drain_interval_ms: 100,
            levels: ["fatal", "error", "warn", "info", "debug"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            blacklist: Vec::new(),
            extra_fields: BTreeMap::new(),
        }
    }
}

impl LogHookConfig {
    /// 레벨 문자열 목록을 [`Level`]로 변환합니다.
    pub fn parsed_levels(&self) -> Result<Vec<Level>, ConfigError> {
        self.levels
            .iter()
            .map(|s| {
                s.parse::<Level>().map_err(|reason| ConfigError::InvalidValue {
                    field: "hook.levels".to_owned(),
                    reason,
                })
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::InvalidValue {
                field: "hook.queue_capacity".to_owned(),
                reason: format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            });
        }

        for (field, value) in [
            ("hook.flush_interval_ms", self.flush_interval_ms),
            ("hook.flush_drain_interval_ms", self.flush_drain_interval_ms),
        ] {
            if value == 0 || value > MAX_INTERVAL_MS {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: format!("must be 1-{MAX_INTERVAL_MS}"),
                });
            }
        }

        if self.levels.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "hook.levels".to_owned(),
                reason: "at least one level must be enabled".to_owned(),
            });
        }
        self.parsed_levels()?;

        Ok(())
    }
}

/// 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// PostgreSQL 연결 URL
    pub postgres_url: String,
    /// 로그 테이블명
    pub table: String,
    /// 커넥션 풀 최대 크기
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgresql://localhost:5432/logvault".to_owned(),
            table: "logs".to_owned(),
            max_connections: 5,
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        // 테이블명은 SQL 문에 그대로 삽입되므로 식별자 문자만 허용
        let valid_table = !self.table.is_empty()
            && !self.table.starts_with(|c: char| c.is_ascii_digit())
            && self
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !valid_table {
            return Err(ConfigError::InvalidValue {
                field: "storage.table".to_owned(),
                reason: format!("'{}' is not a valid table identifier", self.table),
            });
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "storage.max_connections".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = LogvaultConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.hook.queue_capacity, 8192);
        assert_eq!(config.hook.flush_interval_ms, 1000);
        assert_eq!(config.hook.flush_drain_interval_ms, 100);
        assert_eq!(config.storage.table, "logs");
    }

    #[test]
    fn default_config_passes_validation() {
        LogvaultConfig::default().validate().unwrap();
    }

    #[test]
    fn default_levels_exclude_panic_and_trace() {
        let levels = LogHookConfig::default().parsed_levels().unwrap();
        assert!(levels.contains(&Level::Debug));
        assert!(!levels.contains(&Level::Trace));
        assert!(!levels.contains(&Level::Panic));
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = LogvaultConfig::parse("").unwrap();
        assert_eq!(config.hook.queue_capacity, 8192);
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let config = LogvaultConfig::parse(
            r#"
            [hook]
            queue_capacity = 16
            blacklist = ["password", "token"]

            [hook.extra_fields]
            service = "billing"
            "#,
        )
        .unwrap();
        assert_eq!(config.hook.queue_capacity, 16);
        assert_eq!(config.hook.flush_interval_ms, 1000);
        assert_eq!(config.hook.blacklist, vec!["password", "token"]);
        assert_eq!(config.hook.extra_fields["service"], "billing");
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = LogvaultConfig::parse("[hook\nqueue_capacity = ").unwrap_err();
        assert!(matches!(
            err,
            LogvaultError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let mut config = LogvaultConfig::default();
        config.hook.queue_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = LogvaultConfig::default();
        config.hook.flush_drain_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("flush_drain_interval_ms"));
    }

    #[test]
    fn validate_rejects_unknown_level() {
        let mut config = LogvaultConfig::default();
        config.hook.levels = vec!["info".to_owned(), "loud".to_owned()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_table_name() {
        let mut config = LogvaultConfig::default();
        config.storage.table = "logs; drop table users".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage.table"));
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = LogvaultConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn env_override_applies_to_hook_section() {
        let mut config = LogvaultConfig::default();
        // SAFETY: serial 테스트로 실행되어 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe {
            std::env::set_var("LOGVAULT_HOOK_QUEUE_CAPACITY", "64");
            std::env::set_var("LOGVAULT_HOOK_BLACKLIST", "secret, token,");
        }
        config.apply_env_overrides();
        assert_eq!(config.hook.queue_capacity, 64);
        assert_eq!(config.hook.blacklist, vec!["secret", "token"]);
        unsafe {
            std::env::remove_var("LOGVAULT_HOOK_QUEUE_CAPACITY");
            std::env::remove_var("LOGVAULT_HOOK_BLACKLIST");
        }
    }

    #[test]
    #[serial]
    fn env_override_invalid_number_keeps_original() {
        let mut val = 10_u64;
        // SAFETY: serial 테스트로 실행되어 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_LOGVAULT_U64_BAD", "ten") };
        override_u64(&mut val, "TEST_LOGVAULT_U64_BAD");
        assert_eq!(val, 10);
        unsafe { std::env::remove_var("TEST_LOGVAULT_U64_BAD") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_LOGVAULT_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = LogvaultConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = LogvaultConfig::parse(&toml_str).unwrap();
        assert_eq!(config.hook.levels, parsed.hook.levels);
        assert_eq!(config.storage.postgres_url, parsed.storage.postgres_url);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = LogvaultConfig::from_file("/nonexistent/path/logvault.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LogvaultError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn from_file_reads_written_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logvault.toml");
        tokio::fs::write(&path, "[storage]\ntable = \"app_logs\"\n")
            .await
            .unwrap();
        let config = LogvaultConfig::from_file(&path).await.unwrap();
        assert_eq!(config.storage.table, "app_logs");
    }
}
