//! 필터 -- 엔트리를 변환하거나 폐기하는 순수 함수
//!
//! [`Filter`]는 엔트리를 받아 변환된 엔트리(`Some`) 또는 폐기 표시(`None`)를
//! 반환합니다. 필터는 실패하지 않습니다. 변환 아니면 폐기뿐입니다.
//!
//! [`FilterChain`]은 등록 순서대로 필터를 실행하며, 첫 번째 `None`에서
//! 나머지 필터를 건너뛰고 전체 결과를 폐기로 확정합니다.

use std::collections::BTreeSet;
use std::sync::Arc;

use logvault_core::types::Entry;

/// 엔트리 변환/폐기 필터
///
/// 클로저 `Fn(Entry) -> Option<Entry>`에도 구현되어 있어
/// 간단한 필터는 클로저로 등록할 수 있습니다.
///
/// # 사용 예시
/// ```ignore
/// hook.add_filter(|entry: Entry| {
///     if entry.fields.contains_key("ignore") { None } else { Some(entry) }
/// });
/// ```
pub trait Filter: Send + Sync {
    /// 로깅에 사용되는 필터 이름
    fn name(&self) -> &str {
        "anonymous"
    }

    /// 엔트리를 변환하거나 폐기(`None`)합니다.
    fn apply(&self, entry: Entry) -> Option<Entry>;
}

impl<F> Filter for F
where
    F: Fn(Entry) -> Option<Entry> + Send + Sync,
{
    fn apply(&self, entry: Entry) -> Option<Entry> {
        self(entry)
    }
}

/// 순서가 있는 필터 목록
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    /// 빈 체인을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 체인 끝에 필터를 추가합니다.
    pub fn push(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    /// 등록된 필터 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// 체인이 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// 등록 순서대로 필터를 실행합니다.
    ///
    /// 각 필터는 이전 필터의 결과를 받습니다.
    /// 어느 필터든 `None`을 반환하면 즉시 `None`을 반환합니다.
    pub fn apply(&self, mut entry: Entry) -> Option<Entry> {
        for filter in &self.filters {
            entry = match filter.apply(entry) {
                Some(next) => next,
                None => {
                    tracing::trace!(filter = filter.name(), "entry discarded by filter");
                    return None;
                }
            };
        }
        Some(entry)
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}

/// 블랙리스트 필터 -- 지정된 키를 필드 매핑에서 제거합니다.
///
/// 엔트리를 폐기하지 않으며, 프로세서가 사용자 필터 체인 뒤에서
/// 마지막으로 실행합니다. 따라서 추가 필드나 필터가 넣은 키도 제거됩니다.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    keys: BTreeSet<String>,
}

impl Blacklist {
    /// 빈 블랙리스트를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 키를 추가합니다.
    pub fn extend<I, K>(&mut self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
    }

    /// 키가 블랙리스트에 있는지 확인합니다.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// 블랙리스트 키 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// 블랙리스트가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Filter for Blacklist {
    fn name(&self) -> &str {
        "blacklist"
    }

    fn apply(&self, mut entry: Entry) -> Option<Entry> {
        if !self.keys.is_empty() {
            entry.fields.retain(|key, _| !self.keys.contains(key));
        }
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logvault_core::types::Level;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl Filter for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn apply(&self, entry: Entry) -> Option<Entry> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(entry)
        }
    }

    fn drop_ignored(entry: Entry) -> Option<Entry> {
        if entry.fields.contains_key("ignore") {
            None
        } else {
            Some(entry)
        }
    }

    #[test]
    fn filters_run_in_registration_order() {
        let mut chain = FilterChain::new();
        chain.push(Arc::new(|e: Entry| Some(e.with_field("step", "first"))));
        chain.push(Arc::new(|e: Entry| {
            let prev = e.fields["step"].as_json().cloned();
            Some(e.with_field("prev", prev.unwrap_or_default()).with_field("step", "second"))
        }));

        let out = chain.apply(Entry::new(Level::Info, "msg")).unwrap();
        assert_eq!(out.fields["prev"].as_json().unwrap(), "first");
        assert_eq!(out.fields["step"].as_json().unwrap(), "second");
    }

    #[test]
    fn discard_halts_subsequent_filters() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut chain = FilterChain::new();
        chain.push(Arc::new(drop_ignored));
        chain.push(Arc::new(Counting {
            calls: Arc::clone(&calls),
        }));

        let dropped = chain.apply(Entry::new(Level::Info, "msg").with_field("ignore", "me"));
        assert!(dropped.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let kept = chain.apply(Entry::new(Level::Info, "msg"));
        assert!(kept.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_chain_passes_entry_through() {
        let chain = FilterChain::new();
        assert!(chain.is_empty());
        let out = chain.apply(Entry::new(Level::Warn, "msg").with_field("k", "v"));
        assert_eq!(out.unwrap().fields.len(), 1);
    }

    #[test]
    fn blacklist_removes_keys_and_never_discards() {
        let mut blacklist = Blacklist::new();
        blacklist.extend(["filterMe", "secret"]);

        let entry = Entry::new(Level::Info, "msg")
            .with_field("filterMe", "1")
            .with_field("secret", "hunter2")
            .with_field("withField", "2");
        let out = blacklist.apply(entry).unwrap();
        assert!(!out.fields.contains_key("filterMe"));
        assert!(!out.fields.contains_key("secret"));
        assert!(out.fields.contains_key("withField"));
    }

    #[test]
    fn chain_debug_lists_filter_names() {
        let mut chain = FilterChain::new();
        chain.push(Arc::new(Blacklist::new()));
        chain.push(Arc::new(drop_ignored));
        assert_eq!(format!("{chain:?}"), r#"["blacklist", "anonymous"]"#);
    }
}
