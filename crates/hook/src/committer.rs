//! 비동기 커미터 -- 배치 큐를 트랜잭션 단위로 저장소에 커밋하는 단일 태스크
//!
//! # 상태 전이
//! ```text
//!            begin 성공                 tick(processed > 0) / flush 요청
//!   Idle ──────────────> Draining ─────────────────────────────> Committing
//!    ^  │ begin 실패         │ ^                                     │
//!    │  └─> 다음 tick까지 대기 │ └ 엔트리 삽입, 주기 변경              │
//!    │                                                              │
//!    └──────────────────────── stop 아님 ───────────────────────────┤
//!                                                      stop 요청    v
//!                                                             Terminated
//! ```
//!
//! 커미터 측 에러는 현재 배치에만 영향을 주며 태스크를 종료시키지 않습니다.
//! 모든 에러는 tracing 에러 스트림으로 보고됩니다.
//!
//! 삽입/커밋 성공 여부와 관계없이 시도된 엔트리는 미커밋 카운트에서
//! 제거됩니다 (at-most-once).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use logvault_core::metrics as m;
use logvault_core::types::Entry;

use crate::outstanding::Outstanding;
use crate::sink::LogSink;

/// flush 요청 (2단계 핸드셰이크)
///
/// 커미터는 열린 배치를 커밋한 뒤 `ack`로 응답합니다.
/// `stop`이 true이면 응답 후 종료합니다.
#[derive(Debug)]
pub(crate) struct FlushRequest {
    pub(crate) stop: bool,
    pub(crate) ack: oneshot::Sender<()>,
}

/// 커미터 상태
enum CommitterState<T> {
    /// 트랜잭션 없음
    Idle,
    /// 열린 트랜잭션에 엔트리를 삽입하는 중
    Draining { tx: T, processed: usize },
    /// 열린 트랜잭션을 커밋해야 함
    Committing {
        tx: T,
        processed: usize,
        flush: Option<FlushRequest>,
        stop: bool,
    },
    /// 종료됨 (최종 상태)
    Terminated,
}

/// 커미터 태스크
pub(crate) struct Committer<S: LogSink> {
    sink: Arc<S>,
    queue: mpsc::Receiver<Entry>,
    flush_rx: mpsc::Receiver<FlushRequest>,
    interval_rx: watch::Receiver<Duration>,
    outstanding: Arc<Outstanding>,
    terminated: Arc<AtomicBool>,
}

impl<S: LogSink> Committer<S> {
    pub(crate) fn new(
        sink: Arc<S>,
        queue: mpsc::Receiver<Entry>,
        flush_rx: mpsc::Receiver<FlushRequest>,
        interval_rx: watch::Receiver<Duration>,
        outstanding: Arc<Outstanding>,
        terminated: Arc<AtomicBool>,
    ) -> Self {
        Self {
            sink,
            queue,
            flush_rx,
            interval_rx,
            outstanding,
            terminated,
        }
    }

    /// Terminated 상태에 도달할 때까지 상태 머신을 실행합니다.
    pub(crate) async fn run(mut self) {
        let period = *self.interval_rx.borrow_and_update();
        let mut ticker = new_ticker(period);
        info!(interval_ms = period.as_millis() as u64, "committer started");

        let mut state = CommitterState::Idle;
        loop {
            state = match state {
                CommitterState::Idle => self.begin(&mut ticker).await,
                CommitterState::Draining { tx, processed } => {
                    self.drain(tx, processed, &mut ticker).await
                }
                CommitterState::Committing {
                    tx,
                    processed,
                    flush,
                    stop,
                } => self.commit(tx, processed, flush, stop).await,
                CommitterState::Terminated => break,
            };
        }

        info!("committer terminated");
    }

    async fn begin(&mut self, ticker: &mut Interval) -> CommitterState<S::Transaction> {
        match self.sink.begin().await {
            Ok(tx) => CommitterState::Draining { tx, processed: 0 },
            Err(e) => {
                metrics::counter!(m::HOOK_BEGIN_ERRORS_TOTAL).increment(1);
                error!(
                    error = %e,
                    transient = e.is_transient(),
                    "failed to begin batch transaction, retrying on next tick"
                );
                self.wait_retry(ticker).await
            }
        }
    }

    /// begin 실패 후 다음 tick까지 대기합니다. 큐는 소비하지 않습니다.
    async fn wait_retry(&mut self, ticker: &mut Interval) -> CommitterState<S::Transaction> {
        loop {
            tokio::select! {
                biased;

                Some(req) = self.flush_rx.recv() => {
                    if req.stop {
                        return self.stop_without_batch(req).await;
                    }
                    // 열린 배치가 없으므로 바로 응답하고 재시도는 다음 tick까지 미룸
                    let _ = req.ack.send(());
                }
                Ok(()) = self.interval_rx.changed() => {
                    *ticker = self.next_ticker();
                }
                _ = ticker.tick() => {
                    if self.queue.is_closed() && self.queue.is_empty() {
                        warn!("batch queue closed while store unavailable, stopping committer");
                        return self.finish(None, true);
                    }
                    return CommitterState::Idle;
                }
            }
        }
    }

    async fn drain(
        &mut self,
        mut tx: S::Transaction,
        mut processed: usize,
        ticker: &mut Interval,
    ) -> CommitterState<S::Transaction> {
        loop {
            tokio::select! {
                biased;

                Some(req) = self.flush_rx.recv() => {
                    if req.stop {
                        // 이후 적재는 거부하고, 이미 수락된 엔트리는 모두 이번 배치에 포함
                        self.queue.close();
                        self.drain_closed(&mut tx, &mut processed).await;
                    } else {
                        // 요청 전에 큐에 들어온 엔트리는 이번 배치에 포함
                        self.drain_ready(&mut tx, &mut processed).await;
                    }
                    let stop = req.stop;
                    return CommitterState::Committing {
                        tx,
                        processed,
                        flush: Some(req),
                        stop,
                    };
                }
                Ok(()) = self.interval_rx.changed() => {
                    *ticker = self.next_ticker();
                }
                _ = ticker.tick() => {
                    if processed > 0 {
                        return CommitterState::Committing {
                            tx,
                            processed,
                            flush: None,
                            stop: false,
                        };
                    }
                }
                entry = self.queue.recv() => match entry {
                    Some(entry) => {
                        self.insert(&mut tx, &entry).await;
                        processed += 1;
                    }
                    None => {
                        debug!(entries = processed, "batch queue closed, committing final batch");
                        return CommitterState::Committing {
                            tx,
                            processed,
                            flush: None,
                            stop: true,
                        };
                    }
                },
            }
        }
    }

    /// 삽입 실패는 보고만 하고 엔트리는 처리된 것으로 간주합니다.
    async fn insert(&self, tx: &mut S::Transaction, entry: &Entry) {
        if let Err(e) = self.sink.insert_batched(tx, entry).await {
            metrics::counter!(m::HOOK_INSERT_ERRORS_TOTAL, m::LABEL_LEVEL => entry.level.as_str())
                .increment(1);
            error!(
                level = %entry.level,
                error = %e,
                transient = e.is_transient(),
                "failed to insert log entry into batch"
            );
        }
    }

    async fn drain_ready(&mut self, tx: &mut S::Transaction, processed: &mut usize) {
        while let Ok(entry) = self.queue.try_recv() {
            self.insert(tx, &entry).await;
            *processed += 1;
        }
    }

    /// 닫힌 큐를 끝까지 비웁니다. 예약된 슬롯의 엔트리도 포함됩니다.
    async fn drain_closed(&mut self, tx: &mut S::Transaction, processed: &mut usize) {
        while let Some(entry) = self.queue.recv().await {
            self.insert(tx, &entry).await;
            *processed += 1;
        }
    }

    /// 트랜잭션 없이 stop 요청을 받은 경우의 종료 처리
    ///
    /// 큐를 닫은 뒤 남은 엔트리가 있으면 한 번 더 트랜잭션을 시도합니다.
    /// 그래도 실패하면 남은 엔트리는 시도된 것으로 보고 버립니다.
    async fn stop_without_batch(&mut self, req: FlushRequest) -> CommitterState<S::Transaction> {
        self.queue.close();
        let Some(first) = self.queue.recv().await else {
            return self.finish(Some(req.ack), true);
        };

        match self.sink.begin().await {
            Ok(mut tx) => {
                self.insert(&mut tx, &first).await;
                let mut processed = 1;
                self.drain_closed(&mut tx, &mut processed).await;
                CommitterState::Committing {
                    tx,
                    processed,
                    flush: Some(req),
                    stop: true,
                }
            }
            Err(e) => {
                metrics::counter!(m::HOOK_BEGIN_ERRORS_TOTAL).increment(1);
                let mut dropped = 1;
                while self.queue.recv().await.is_some() {
                    dropped += 1;
                }
                error!(
                    entries = dropped,
                    error = %e,
                    transient = e.is_transient(),
                    "store unavailable at shutdown, dropping queued entries"
                );
                self.outstanding.done(dropped);
                self.finish(Some(req.ack), true)
            }
        }
    }

    async fn commit(
        &mut self,
        tx: S::Transaction,
        processed: usize,
        flush: Option<FlushRequest>,
        stop: bool,
    ) -> CommitterState<S::Transaction> {
        match self.sink.commit(tx).await {
            Ok(()) => debug!(entries = processed, "batch committed"),
            Err(e) => {
                metrics::counter!(m::HOOK_COMMIT_ERRORS_TOTAL).increment(1);
                error!(
                    entries = processed,
                    error = %e,
                    transient = e.is_transient(),
                    "failed to commit batch"
                );
            }
        }

        self.outstanding.done(processed);
        metrics::counter!(m::HOOK_ENTRIES_COMMITTED_TOTAL).increment(processed as u64);

        self.finish(flush.map(|req| req.ack), stop)
    }

    /// flush 요청에 응답하고 다음 상태를 결정합니다.
    ///
    /// 종료 플래그는 응답 전에 설정되어, flush가 반환된 시점에는
    /// 항상 종료 상태가 관측됩니다.
    fn finish(&self, ack: Option<oneshot::Sender<()>>, stop: bool) -> CommitterState<S::Transaction> {
        if stop {
            self.terminated.store(true, Ordering::Release);
        }
        if let Some(ack) = ack {
            // 요청자가 이미 사라졌으면 무시
            let _ = ack.send(());
        }
        if stop {
            CommitterState::Terminated
        } else {
            CommitterState::Idle
        }
    }

    fn next_ticker(&mut self) -> Interval {
        let period = *self.interval_rx.borrow_and_update();
        debug!(interval_ms = period.as_millis() as u64, "commit interval changed");
        new_ticker(period)
    }
}

/// 첫 tick이 한 주기 뒤에 발생하는 타이머를 만듭니다.
fn new_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
