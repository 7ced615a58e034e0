//! 도메인 타입 -- 로그 엔트리와 그 구성 요소
//!
//! [`Entry`]는 훅이 받아 저장소까지 전달하는 단일 구조화 로그 레코드입니다.
//! 필드 값은 [`FieldValue`]로 표현되며, 직렬화 능력이 없는 에러 값을
//! 담을 수 있다는 점이 일반 JSON 값과 다릅니다.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// 로그 레벨
///
/// 숫자 값이 작을수록 심각합니다 (`Panic = 0` ... `Trace = 6`).
/// 저장소에는 [`Level::as_i16`] 값이 small integer로 기록됩니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// 패닉 -- 로깅 직후 프로세스가 중단되는 수준
    Panic,
    /// 치명적 에러
    Fatal,
    /// 에러
    Error,
    /// 경고
    Warn,
    /// 정보성 메시지
    #[default]
    Info,
    /// 디버그
    Debug,
    /// 트레이스
    Trace,
}

impl Level {
    /// 모든 레벨 (심각한 순)
    pub const ALL: [Level; 7] = [
        Level::Panic,
        Level::Fatal,
        Level::Error,
        Level::Warn,
        Level::Info,
        Level::Debug,
        Level::Trace,
    ];

    /// 저장소 컬럼에 기록되는 정수 값을 반환합니다.
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    /// 소문자 레벨 이름을 반환합니다.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Panic => "panic",
            Level::Fatal => "fatal",
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "panic" => Ok(Level::Panic),
            "fatal" => Ok(Level::Fatal),
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            "trace" => Ok(Level::Trace),
            other => Err(format!("unknown level '{other}'")),
        }
    }
}

/// 로그 호출 위치
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// 함수 이름
    pub function: String,
    /// 소스 파일 경로
    pub file: Option<String>,
    /// 소스 라인
    pub line: Option<u32>,
}

impl Caller {
    /// 함수 이름만으로 호출 위치를 생성합니다.
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            file: None,
            line: None,
        }
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{} ({}:{})", self.function, file, line),
            (Some(file), None) => write!(f, "{} ({})", self.function, file),
            _ => f.write_str(&self.function),
        }
    }
}

/// 엔트리 필드 값
///
/// `Error` 변형은 자체 직렬화 능력이 없는 불투명한 에러 값입니다.
/// 이 상태로 직렬화하면 실패하므로, 저장 전에 반드시
/// [`FieldValue::into_serializable`]로 변환해야 합니다.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// JSON 값
    Json(serde_json::Value),
    /// 불투명한 에러 값
    Error(Arc<dyn StdError + Send + Sync>),
}

impl FieldValue {
    /// 에러 값으로 필드를 생성합니다.
    pub fn error(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Error(Arc::new(err))
    }

    /// JSON 값이면 참조를 반환합니다.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Error(_) => None,
        }
    }

    /// 에러 값인지 확인합니다.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// 직렬화 가능한 형태로 변환합니다.
    ///
    /// 에러 값은 `{"error": <메시지>, "causes": [<source 체인>]}` 객체로 바뀝니다.
    /// JSON 값은 그대로 유지됩니다.
    pub fn into_serializable(self) -> Self {
        match self {
            Self::Json(v) => Self::Json(v),
            Self::Error(err) => {
                let mut causes = Vec::new();
                let mut source = err.source();
                while let Some(cause) = source {
                    causes.push(serde_json::Value::String(cause.to_string()));
                    source = cause.source();
                }
                Self::Json(serde_json::json!({
                    "error": err.to_string(),
                    "causes": causes,
                }))
            }
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Json(v) => v.serialize(serializer),
            Self::Error(err) => Err(serde::ser::Error::custom(format!(
                "opaque error value is not serializable: {err}"
            ))),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Json(serde_json::Value::String(v.to_owned()))
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Json(serde_json::Value::String(v))
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Json(serde_json::Value::from(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Json(serde_json::Value::Bool(v))
    }
}

/// 필드 매핑 (키 순서는 의미 없음)
pub type Fields = BTreeMap<String, FieldValue>;

/// 구조화 로그 엔트리
///
/// 훅에 전달된 원본 엔트리는 절대 수정되지 않습니다.
/// 훅은 매 호출마다 병합된 사본을 새로 만들어 큐와 싱크에 넘깁니다.
#[derive(Debug, Clone)]
pub struct Entry {
    /// 레벨
    pub level: Level,
    /// 메시지 (여러 줄 가능)
    pub message: String,
    /// 필드 매핑
    pub fields: Fields,
    /// 생성 시각
    pub timestamp: DateTime<Utc>,
    /// 호출 위치
    pub caller: Option<Caller>,
}

impl Entry {
    /// 현재 시각으로 새 엔트리를 생성합니다.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            fields: Fields::new(),
            timestamp: Utc::now(),
            caller: None,
        }
    }

    /// 필드 하나를 추가합니다.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// 여러 필드를 추가합니다.
    pub fn with_fields<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// 호출 위치를 설정합니다.
    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }

    /// 타임스탬프를 설정합니다.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// 필드 매핑을 JSON 문서로 인코딩합니다.
    ///
    /// 변환되지 않은 에러 값이 남아 있으면 실패합니다.
    pub fn fields_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.fields)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} fields={}",
            self.level,
            self.message.lines().next().unwrap_or_default(),
            self.fields.len(),
        )
    }
}
