#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`filter`]: 필터 trait, 필터 체인, 블랙리스트
//! - [`processor`]: 추가 필드 병합 및 필터 실행
//! - [`sink`]: 저장소 trait과 구현체 (인메모리, PostgreSQL)
//! - [`hook`]: 동기 훅 (호출자 컨텍스트에서 바로 기록)
//! - [`async_hook`]: 비동기 배치 훅 (큐 + 커미터 태스크)
//! - [`config`]: 훅 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! fire -> EntryProcessor -> BatchQueue -> Committer -> LogSink
//!            |                  |             |
//!     extras + filters     backpressure   begin/insert/commit
//! ```

pub mod async_hook;
pub mod config;
pub mod error;
pub mod filter;
pub mod hook;
pub mod processor;
pub mod sink;

mod committer;
mod outstanding;

// --- 주요 타입 re-export ---

// 훅
pub use async_hook::AsyncHook;
pub use hook::Hook;

// 설정
pub use config::{HookConfig, HookConfigBuilder};

// 에러
pub use error::HookError;

// 필터
pub use filter::{Blacklist, Filter, FilterChain};
pub use processor::EntryProcessor;

// 싱크
pub use sink::{LogSink, MemorySink, StoredRow};
#[cfg(feature = "postgres")]
pub use sink::PostgresSink;
