//! 비동기 훅 -- 배치 큐, 커미터 태스크, flush 제어
//!
//! 생산자는 [`AsyncHook::fire`]로 엔트리를 큐에 적재하고 바로 반환합니다.
//! 큐가 가득 차면 빈 슬롯이 생길 때까지 대기합니다 (backpressure).
//! 저장은 백그라운드 커미터 태스크가 주기적으로 트랜잭션 단위로 수행합니다.
//!
//! # 종료
//! [`AsyncHook::flush`]는 다음 순서로 진행됩니다.
//! 1. 커밋 주기를 `flush_drain_interval`로 단축
//! 2. 미커밋 엔트리 수가 0이 될 때까지 대기
//! 3. stop 요청을 보내고 커미터의 응답을 대기
//! 4. 커미터 태스크 종료 대기
//!
//! flush에는 타임아웃이 없습니다. 저장소가 멈추면 호출자도 멈춥니다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::info;

use logvault_core::metrics as m;
use logvault_core::types::{Entry, Fields, Level};

use crate::committer::{Committer, FlushRequest};
use crate::config::HookConfig;
use crate::error::HookError;
use crate::filter::Filter;
use crate::hook::Hook;
use crate::outstanding::Outstanding;
use crate::sink::LogSink;

/// 비동기 배치 로그 훅
///
/// `AsyncHook`을 drop하면 큐가 닫히고, 커미터는 열린 배치를 커밋한 뒤 종료합니다.
#[derive(Debug)]
pub struct AsyncHook<S: LogSink> {
    hook: Hook<S>,
    queue_tx: mpsc::Sender<Entry>,
    flush_tx: mpsc::Sender<FlushRequest>,
    interval_tx: watch::Sender<Duration>,
    outstanding: Arc<Outstanding>,
    terminated: Arc<AtomicBool>,
    drain_interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: LogSink> AsyncHook<S> {
    /// 기본 설정으로 비동기 훅을 생성하고 커미터 태스크를 시작합니다.
    ///
    /// # Errors
    /// tokio 런타임 밖에서 호출하면 `HookError::Task`
    pub fn new(sink: Arc<S>, extra: Fields) -> Result<Self, HookError> {
        let config = HookConfig {
            extra_fields: extra,
            ..HookConfig::default()
        };
        Self::from_config(sink, config)
    }

    /// 설정으로 비동기 훅을 생성하고 커미터 태스크를 시작합니다.
    pub fn from_config(sink: Arc<S>, config: HookConfig) -> Result<Self, HookError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| HookError::Task(format!("no tokio runtime to spawn committer: {e}")))?;

        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let (flush_tx, flush_rx) = mpsc::channel(1);
        let (interval_tx, interval_rx) = watch::channel(config.flush_interval);
        let outstanding = Arc::new(Outstanding::new());
        let terminated = Arc::new(AtomicBool::new(false));

        let committer = Committer::new(
            Arc::clone(&sink),
            queue_rx,
            flush_rx,
            interval_rx,
            Arc::clone(&outstanding),
            Arc::clone(&terminated),
        );
        let task = runtime.spawn(committer.run());

        info!(
            queue_capacity = config.queue_capacity,
            flush_interval_ms = config.flush_interval.as_millis() as u64,
            "async log hook started"
        );

        let drain_interval = config.flush_drain_interval;
        Ok(Self {
            hook: Hook::from_config(sink, config)?,
            queue_tx,
            flush_tx,
            interval_tx,
            outstanding,
            terminated,
            drain_interval,
            task: Mutex::new(Some(task)),
        })
    }

    /// 훅이 받아들이는 레벨을 반환합니다.
    pub fn levels(&self) -> &[Level] {
        self.hook.levels()
    }

    /// 필터를 체인 끝에 등록합니다.
    pub fn add_filter(&self, filter: impl Filter + 'static) {
        self.hook.add_filter(filter);
    }

    /// 저장에서 제외할 키를 등록합니다.
    pub fn blacklist<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.hook.blacklist(keys);
    }

    /// 엔트리를 처리하고 배치 큐에 적재합니다.
    ///
    /// 큐가 가득 차면 슬롯이 생길 때까지 대기합니다. 저장 실패는 반환값이 아닌
    /// 에러 로그로만 보고됩니다. 취소해도 엔트리가 중복/누락 적재되지 않습니다.
    ///
    /// # Errors
    /// 커미터가 이미 종료된 경우 `HookError::Closed`
    pub async fn fire(&self, entry: &Entry) -> Result<(), HookError> {
        self.ensure_running()?;
        let Some(entry) = self.hook.prepare(entry, "async") else {
            return Ok(());
        };

        let permit = self
            .queue_tx
            .reserve()
            .await
            .map_err(|_| HookError::Closed)?;
        self.outstanding.add(1);
        permit.send(entry);
        metrics::counter!(m::HOOK_ENTRIES_ENQUEUED_TOTAL).increment(1);
        Ok(())
    }

    /// 런타임 밖의 스레드에서 엔트리를 적재합니다.
    ///
    /// 큐가 가득 차면 현재 스레드를 블록합니다.
    ///
    /// # Panics
    /// 비동기 컨텍스트 안에서 호출하면 패닉합니다 (`spawn_blocking` 사용).
    pub fn fire_blocking(&self, entry: &Entry) -> Result<(), HookError> {
        self.ensure_running()?;
        let Some(entry) = self.hook.prepare(entry, "async") else {
            return Ok(());
        };

        self.outstanding.add(1);
        if self.queue_tx.blocking_send(entry).is_err() {
            self.outstanding.done(1);
            return Err(HookError::Closed);
        }
        metrics::counter!(m::HOOK_ENTRIES_ENQUEUED_TOTAL).increment(1);
        Ok(())
    }

    /// 열린 배치를 즉시 커밋하고 응답을 기다립니다. 커미터는 계속 실행됩니다.
    ///
    /// 저장소에 트랜잭션을 열 수 없는 동안에는 커밋 없이 바로 응답합니다.
    pub async fn checkpoint(&self) -> Result<(), HookError> {
        self.request_flush(false).await
    }

    /// 남은 엔트리를 모두 커밋하고 커미터를 종료합니다.
    ///
    /// 반환 시점에 flush 이전에 적재된 모든 엔트리는 저장(또는 저장 시도)되었고
    /// 미커밋 카운트는 0입니다.
    ///
    /// # Errors
    /// 이미 종료된 경우 `HookError::Closed`, 커미터 태스크가 비정상 종료된 경우
    /// `HookError::Task`
    pub async fn flush(&self) -> Result<(), HookError> {
        self.ensure_running()?;
        info!(
            outstanding = self.outstanding(),
            drain_interval_ms = self.drain_interval.as_millis() as u64,
            "flushing async log hook"
        );

        self.interval_tx
            .send(self.drain_interval)
            .map_err(|_| HookError::Closed)?;
        self.outstanding.wait_zero().await;
        self.request_flush(true).await?;

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.await.map_err(|e| HookError::Task(e.to_string()))?;
        }

        info!("async log hook flushed");
        Ok(())
    }

    /// 커밋 주기를 변경합니다. 이미 적재된 엔트리에는 영향을 주지 않습니다.
    ///
    /// # Errors
    /// 0이거나 1시간을 넘는 주기는 `HookError::Config`
    pub fn flush_every(&self, interval: Duration) -> Result<(), HookError> {
        HookConfig::validate_interval("flush_interval", interval)?;
        self.ensure_running()?;
        self.interval_tx
            .send(interval)
            .map_err(|_| HookError::Closed)?;
        info!(interval_ms = interval.as_millis() as u64, "commit interval updated");
        Ok(())
    }

    /// 아직 커밋(또는 시도)되지 않은 엔트리 수를 반환합니다.
    pub fn outstanding(&self) -> usize {
        self.outstanding.get()
    }

    /// 커미터가 종료되었는지 확인합니다.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// 싱크 연결을 해제합니다. 보통 `flush` 후에 호출합니다.
    pub async fn close(&self) -> Result<(), HookError> {
        self.hook.close().await
    }

    /// 싱크를 반환합니다.
    pub fn sink(&self) -> &Arc<S> {
        self.hook.sink()
    }

    fn ensure_running(&self) -> Result<(), HookError> {
        if self.is_terminated() {
            return Err(HookError::Closed);
        }
        Ok(())
    }

    async fn request_flush(&self, stop: bool) -> Result<(), HookError> {
        self.ensure_running()?;
        let (ack, ack_rx) = oneshot::channel();
        self.flush_tx
            .send(FlushRequest { stop, ack })
            .await
            .map_err(|_| HookError::Closed)?;
        ack_rx.await.map_err(|_| HookError::Closed)
    }
}
