//! 엔트리 프로세서 -- 추가 필드 병합과 필터 체인 실행
//!
//! [`EntryProcessor`]는 생산자 측에서 큐 적재 전에 실행됩니다.
//!
//! # 처리 순서
//! ```text
//! extras 복사 -> 원본 필드 덮어쓰기(에러 값 변환) -> FilterChain -> Blacklist
//! ```
//!
//! 원본 엔트리는 읽기만 하며, 항상 새 엔트리를 만들어 반환합니다.
//! 같은 이벤트를 여러 훅이 받아도 서로의 사본에 영향을 주지 않습니다.

use std::sync::{Arc, PoisonError, RwLock};

use logvault_core::types::{Entry, Fields};

use crate::filter::{Blacklist, Filter, FilterChain};

/// 읽기/쓰기 락으로 보호되는 필터 상태
#[derive(Debug, Default)]
struct FilterState {
    /// 사용자 필터 (등록 순서)
    chain: FilterChain,
    /// 마지막에 실행되는 블랙리스트
    blacklist: Blacklist,
}

/// 엔트리 프로세서
///
/// 엔트리 생성(`process`)은 공유 락만 잡으므로 생산자끼리 서로 막지 않습니다.
/// 필터/블랙리스트 등록은 배타 락을 잡습니다.
#[derive(Debug)]
pub struct EntryProcessor {
    /// 모든 엔트리에 병합되는 추가 필드 (생성 후 불변)
    extra: Fields,
    /// 필터 상태
    state: RwLock<FilterState>,
}

impl EntryProcessor {
    /// 추가 필드로 프로세서를 생성합니다.
    pub fn new(extra: Fields) -> Self {
        let extra = extra
            .into_iter()
            .map(|(k, v)| (k, v.into_serializable()))
            .collect();
        Self {
            extra,
            state: RwLock::new(FilterState::default()),
        }
    }

    /// 추가 필드를 반환합니다.
    pub fn extra(&self) -> &Fields {
        &self.extra
    }

    /// 필터를 체인 끝에 등록합니다.
    pub fn add_filter(&self, filter: Arc<dyn Filter>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(filter = filter.name(), position = state.chain.len(), "filter registered");
        state.chain.push(filter);
    }

    /// 블랙리스트에 키를 추가합니다.
    pub fn blacklist<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.blacklist.extend(keys);
    }

    /// 등록된 필터 수를 반환합니다 (블랙리스트 제외).
    pub fn filter_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .chain
            .len()
    }

    /// 원본 엔트리로부터 저장용 엔트리를 만듭니다.
    ///
    /// 필터 체인이 폐기하면 `None`을 반환합니다.
    /// 원본의 필드가 추가 필드와 같은 키를 가지면 원본 값이 우선합니다.
    pub fn process(&self, raw: &Entry) -> Option<Entry> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        let mut fields = self.extra.clone();
        for (key, value) in &raw.fields {
            fields.insert(key.clone(), value.clone().into_serializable());
        }

        let entry = Entry {
            level: raw.level,
            message: raw.message.clone(),
            fields,
            timestamp: raw.timestamp,
            caller: raw.caller.clone(),
        };

        let entry = state.chain.apply(entry)?;
        state.blacklist.apply(entry)
    }
}

impl Default for EntryProcessor {
    fn default() -> Self {
        Self::new(Fields::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logvault_core::types::{Caller, FieldValue, Level};

    #[derive(Debug, thiserror::Error)]
    #[error("permission denied")]
    struct Denied;

    fn extras() -> Fields {
        let mut extra = Fields::new();
        extra.insert("service".to_owned(), "billing".into());
        extra.insert("user".to_owned(), "system".into());
        extra
    }

    #[test]
    fn merges_extras_and_own_fields_win() {
        let processor = EntryProcessor::new(extras());
        let raw = Entry::new(Level::Info, "msg").with_field("user", "123");

        let out = processor.process(&raw).unwrap();
        assert_eq!(out.fields["service"].as_json().unwrap(), "billing");
        assert_eq!(out.fields["user"].as_json().unwrap(), "123");
    }

    #[test]
    fn original_entry_is_never_mutated() {
        let processor = EntryProcessor::new(extras());
        processor.blacklist(["secret"]);
        processor.add_filter(Arc::new(|e: Entry| Some(e.with_field("added", true))));

        let raw = Entry::new(Level::Info, "msg").with_field("secret", "x");
        let out = processor.process(&raw).unwrap();

        assert_eq!(raw.fields.len(), 1);
        assert!(raw.fields.contains_key("secret"));
        assert!(!out.fields.contains_key("secret"));
        assert!(out.fields.contains_key("added"));
    }

    #[test]
    fn copies_level_message_timestamp_and_caller() {
        let processor = EntryProcessor::default();
        let raw = Entry::new(Level::Error, "first\nsecond").with_caller(Caller::new("somefunc"));
        let out = processor.process(&raw).unwrap();
        assert_eq!(out.level, Level::Error);
        assert_eq!(out.message, "first\nsecond");
        assert_eq!(out.timestamp, raw.timestamp);
        assert_eq!(out.caller, raw.caller);
    }

    #[test]
    fn opaque_errors_are_wrapped() {
        let processor = EntryProcessor::default();
        let raw = Entry::new(Level::Error, "failed").with_field("error", FieldValue::error(Denied));
        assert!(raw.fields_json().is_err());

        let out = processor.process(&raw).unwrap();
        let json = out.fields_json().unwrap();
        assert_eq!(json["error"]["error"], "permission denied");
    }

    #[test]
    fn discarding_filter_yields_none() {
        let processor = EntryProcessor::default();
        processor.add_filter(Arc::new(|e: Entry| {
            if e.fields.contains_key("ignore") {
                None
            } else {
                Some(e)
            }
        }));
        assert!(
            processor
                .process(&Entry::new(Level::Info, "m").with_field("ignore", "me"))
                .is_none()
        );
        assert!(processor.process(&Entry::new(Level::Info, "m")).is_some());
        assert_eq!(processor.filter_count(), 1);
    }

    #[test]
    fn blacklist_applies_to_extras_and_filter_output() {
        let processor = EntryProcessor::new(extras());
        processor.add_filter(Arc::new(|e: Entry| Some(e.with_field("token", "abc"))));
        processor.blacklist(["service", "token"]);

        let out = processor.process(&Entry::new(Level::Info, "m")).unwrap();
        assert!(!out.fields.contains_key("service"));
        assert!(!out.fields.contains_key("token"));
        assert!(out.fields.contains_key("user"));
    }

    #[test]
    fn concurrent_readers_do_not_block_each_other() {
        let processor = Arc::new(EntryProcessor::new(extras()));
        processor.blacklist(["user"]);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let processor = Arc::clone(&processor);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let raw = Entry::new(Level::Info, format!("{i}-{j}")).with_field("user", "u");
                        let out = processor.process(&raw).unwrap();
                        assert!(!out.fields.contains_key("user"));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn blacklisted_key_never_survives(
                keys in prop::collection::btree_set("[a-z]{1,6}", 1..6),
                fields in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,8}", 0..12),
            ) {
                let processor = EntryProcessor::new(extras());
                processor.blacklist(keys.iter().cloned());

                let raw = Entry::new(Level::Info, "m").with_fields(fields.clone());
                let out = processor.process(&raw).unwrap();

                for key in &keys {
                    prop_assert!(!out.fields.contains_key(key));
                }
                for (key, value) in &fields {
                    if !keys.contains(key) {
                        prop_assert_eq!(out.fields[key].as_json().unwrap(), value.as_str());
                    }
                }
            }
        }
    }
}
