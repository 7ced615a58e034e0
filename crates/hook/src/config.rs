//! 훅 설정
//!
//! [`HookConfig`]는 core의 [`LogHookConfig`](logvault_core::config::LogHookConfig)를
//! 기반으로 훅 전용 설정을 제공합니다. 문자열/밀리초 값은 여기서
//! [`Level`], [`Duration`], [`Fields`]로 변환됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use logvault_core::config::LogvaultConfig;
//! use logvault_hook::config::HookConfig;
//!
//! let core_config = LogvaultConfig::default();
//! let config = HookConfig::from_core(&core_config.hook)?;
//! ```

use std::time::Duration;

use logvault_core::config::LogHookConfig;
use logvault_core::types::{Fields, Level};

use crate::error::HookError;

/// 큐 용량 상한
const MAX_QUEUE_CAPACITY: usize = 10_000_000;
/// 커밋 주기 상한 (1시간)
const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// 훅 설정
///
/// 큐 용량은 비동기 훅 생성 시점에 고정되며 이후 변경할 수 없습니다.
/// 커밋 주기는 실행 중 [`AsyncHook::flush_every`](crate::AsyncHook::flush_every)로
/// 변경할 수 있습니다.
#[derive(Debug, Clone)]
pub struct HookConfig {
    /// 배치 큐 용량
    pub queue_capacity: usize,
    /// 주기적 커밋 간격
    pub flush_interval: Duration,
    /// 종료 flush 중 사용하는 커밋 간격
    pub flush_drain_interval: Duration,
    /// 저장할 레벨
    pub levels: Vec<Level>,
    /// 저장에서 제외할 키
    pub blacklist: Vec<String>,
    /// 모든 엔트리에 병합되는 추가 필드
    pub extra_fields: Fields,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 8192,
            flush_interval: Duration::from_secs(1),
            flush_drain_interval: Duration::from_millis(100),
            levels: vec![
                Level::Fatal,
                Level::Error,
                Level::Warn,
                Level::Info,
                Level::Debug,
            ],
            blacklist: Vec::new(),
            extra_fields: Fields::new(),
        }
    }
}

impl HookConfig {
    /// core의 `LogHookConfig`에서 훅 설정을 생성합니다.
    pub fn from_core(core: &LogHookConfig) -> Result<Self, HookError> {
        let levels = core.parsed_levels().map_err(|e| HookError::Config {
            field: "levels".to_owned(),
            reason: e.to_string(),
        })?;

        let config = Self {
            queue_capacity: core.queue_capacity,
            flush_interval: Duration::from_millis(core.flush_interval_ms),
            flush_drain_interval: Duration::from_millis(core.flush_drain_interval_ms),
            levels,
            blacklist: core.blacklist.clone(),
            extra_fields: core
                .extra_fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().into()))
                .collect(),
        };
        config.validate()?;
        Ok(config)
    }

    /// 커밋 주기 값을 검증합니다.
    pub(crate) fn validate_interval(field: &str, interval: Duration) -> Result<(), HookError> {
        if interval.is_zero() || interval > MAX_INTERVAL {
            return Err(HookError::Config {
                field: field.to_owned(),
                reason: format!("must be between 1ms and {}s", MAX_INTERVAL.as_secs()),
            });
        }
        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), HookError> {
        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(HookError::Config {
                field: "queue_capacity".to_owned(),
                reason: format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            });
        }

        Self::validate_interval("flush_interval", self.flush_interval)?;
        Self::validate_interval("flush_drain_interval", self.flush_drain_interval)?;

        if self.levels.is_empty() {
            return Err(HookError::Config {
                field: "levels".to_owned(),
                reason: "at least one level must be enabled".to_owned(),
            });
        }

        Ok(())
    }
}

/// 훅 설정 빌더
#[derive(Default)]
pub struct HookConfigBuilder {
    config: HookConfig,
}

impl HookConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 배치 큐 용량을 설정합니다.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// 커밋 주기를 설정합니다.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    /// 종료 flush 중 커밋 주기를 설정합니다.
    pub fn flush_drain_interval(mut self, interval: Duration) -> Self {
        self.config.flush_drain_interval = interval;
        self
    }

    /// 저장할 레벨을 설정합니다.
    pub fn levels(mut self, levels: Vec<Level>) -> Self {
        self.config.levels = levels;
        self
    }

    /// 블랙리스트 키를 설정합니다.
    pub fn blacklist<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.config.blacklist = keys.into_iter().map(Into::into).collect();
        self
    }

    /// 추가 필드를 설정합니다.
    pub fn extra_fields(mut self, fields: Fields) -> Self {
        self.config.extra_fields = fields;
        self
    }

    /// 설정을 검증하고 `HookConfig`를 생성합니다.
    pub fn build(self) -> Result<HookConfig, HookError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
