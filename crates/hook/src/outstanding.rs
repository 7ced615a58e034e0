//! 미커밋 엔트리 카운터
//!
//! 생산자는 큐 적재 직전에 [`Outstanding::add`]를, 커미터는 커밋 시도 후
//! [`Outstanding::done`]을 호출합니다. flush는 [`Outstanding::wait_zero`]로
//! 카운트가 0이 될 때까지 대기합니다.

use tokio::sync::watch;

use logvault_core::metrics as m;

/// 미커밋 엔트리 카운터
#[derive(Debug)]
pub(crate) struct Outstanding {
    count: watch::Sender<usize>,
}

impl Outstanding {
    pub(crate) fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self { count }
    }

    /// 현재 미커밋 엔트리 수
    pub(crate) fn get(&self) -> usize {
        *self.count.borrow()
    }

    pub(crate) fn add(&self, n: usize) {
        self.count.send_modify(|c| *c += n);
        metrics::gauge!(m::HOOK_OUTSTANDING_ENTRIES).increment(n as f64);
    }

    pub(crate) fn done(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.count.send_modify(|c| *c = c.saturating_sub(n));
        metrics::gauge!(m::HOOK_OUTSTANDING_ENTRIES).decrement(n as f64);
    }

    /// 카운트가 0이 될 때까지 대기합니다.
    pub(crate) async fn wait_zero(&self) {
        let mut rx = self.count.subscribe();
        // sender가 self에 살아 있으므로 wait_for는 Err를 반환하지 않음
        let _ = rx.wait_for(|c| *c == 0).await;
    }
}
