//! 동기 훅
//!
//! 백그라운드 태스크 없이 호출자 컨텍스트에서 바로 엔트리를 처리하고
//! 싱크에 한 건씩 기록합니다. 싱크 에러는 `fire`의 반환값으로 전파됩니다.

use std::sync::Arc;

use tracing::debug;

use logvault_core::metrics as m;
use logvault_core::types::{Entry, Fields, Level};

use crate::config::HookConfig;
use crate::error::HookError;
use crate::filter::Filter;
use crate::processor::EntryProcessor;
use crate::sink::LogSink;

/// 동기 로그 훅
///
/// # 사용 예시
/// ```ignore
/// let hook = Hook::new(Arc::new(MemorySink::new()), Fields::new());
/// hook.blacklist(["password"]);
/// hook.fire(&Entry::new(Level::Info, "user logged in")).await?;
/// ```
#[derive(Debug)]
pub struct Hook<S: LogSink> {
    sink: Arc<S>,
    processor: EntryProcessor,
    levels: Vec<Level>,
}

impl<S: LogSink> Hook<S> {
    /// 기본 레벨(Fatal..=Debug)로 훅을 생성합니다.
    pub fn new(sink: Arc<S>, extra: Fields) -> Self {
        Self {
            sink,
            processor: EntryProcessor::new(extra),
            levels: HookConfig::default().levels,
        }
    }

    /// 설정으로 훅을 생성합니다.
    ///
    /// 레벨, 추가 필드, 블랙리스트가 적용됩니다. 큐/주기 설정은 무시됩니다.
    pub fn from_config(sink: Arc<S>, config: HookConfig) -> Result<Self, HookError> {
        config.validate()?;
        let hook = Self {
            sink,
            processor: EntryProcessor::new(config.extra_fields),
            levels: config.levels,
        };
        hook.processor.blacklist(config.blacklist);
        Ok(hook)
    }

    /// 훅이 받아들이는 레벨을 반환합니다.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// 해당 레벨을 받아들이는지 확인합니다.
    pub fn accepts(&self, level: Level) -> bool {
        self.levels.contains(&level)
    }

    /// 필터를 체인 끝에 등록합니다.
    pub fn add_filter(&self, filter: impl Filter + 'static) {
        self.processor.add_filter(Arc::new(filter));
    }

    /// 저장에서 제외할 키를 등록합니다.
    pub fn blacklist<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.processor.blacklist(keys);
    }

    /// 엔트리를 처리하고 싱크에 바로 기록합니다.
    ///
    /// 받아들이지 않는 레벨이거나 필터가 폐기한 엔트리는 `Ok(())`를 반환합니다.
    pub async fn fire(&self, entry: &Entry) -> Result<(), HookError> {
        let Some(entry) = self.prepare(entry, "sync") else {
            return Ok(());
        };
        self.sink.insert(&entry).await?;
        metrics::counter!(m::HOOK_ENTRIES_WRITTEN_TOTAL).increment(1);
        Ok(())
    }

    /// 싱크 연결을 해제합니다.
    pub async fn close(&self) -> Result<(), HookError> {
        self.sink.close().await?;
        Ok(())
    }

    /// 싱크를 반환합니다.
    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    /// 레벨 확인 후 프로세서를 실행합니다. 저장할 엔트리가 없으면 `None`.
    pub(crate) fn prepare(&self, raw: &Entry, mode: &'static str) -> Option<Entry> {
        if !self.accepts(raw.level) {
            return None;
        }
        let entry = self.processor.process(raw);
        if entry.is_none() {
            metrics::counter!(m::HOOK_ENTRIES_DISCARDED_TOTAL, m::LABEL_MODE => mode)
                .increment(1);
            debug!(level = %raw.level, mode, "log entry discarded by filter chain");
        }
        entry
    }
}
