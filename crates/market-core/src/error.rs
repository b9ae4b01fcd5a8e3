use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable numeric error codes, grouped by family:
/// 1xx input validation, 2xx data, 3xx execution, 4xx state,
/// 5xx numeric, 9xx system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum ErrorCode {
    InvalidCapital = 101,
    InvalidDateRange = 102,
    UnknownEnum = 103,
    BadLotSize = 104,

    FetchFailed = 201,
    InsufficientData = 202,
    DataQuality = 203,
    SymbolDelisted = 204,
    SymbolNotFound = 205,
    RateLimited = 206,

    LimitUpBlocked = 301,
    LimitDownBlocked = 302,
    InsufficientMargin = 303,
    PositionNotFound = 304,
    InstrumentSuspended = 305,
    ShortSellRejected = 306,

    TerminalOrderRefill = 401,
    InvariantViolation = 402,

    DivisionByZero = 501,
    NumericOverflow = 502,
    NanInMoney = 503,
    DecimalFormat = 505,

    Internal = 901,
    NotImplemented = 902,
    Unknown = 903,
}

impl ErrorCode {
    /// The wire form, e.g. `BT301`.
    pub fn code(&self) -> String {
        format!("BT{}", *self as u16)
    }

    pub fn default_severity(&self) -> ErrorSeverity {
        match self {
            ErrorCode::NotImplemented => ErrorSeverity::Info,
            ErrorCode::DataQuality => ErrorSeverity::Warning,
            ErrorCode::InvariantViolation | ErrorCode::Internal => ErrorSeverity::Fatal,
            _ => ErrorSeverity::Error,
        }
    }

    pub fn recoverable(&self) -> bool {
        !matches!(
            self,
            ErrorCode::SymbolDelisted
                | ErrorCode::InvariantViolation
                | ErrorCode::Internal
                | ErrorCode::Unknown
        )
    }

    /// (English, Chinese) default messages.
    fn messages(&self) -> (&'static str, &'static str) {
        match self {
            ErrorCode::InvalidCapital => ("initial capital must be positive", "初始资金必须为正数"),
            ErrorCode::InvalidDateRange => ("end time must be after start time", "结束时间必须晚于开始时间"),
            ErrorCode::UnknownEnum => ("unrecognized enum value", "无法识别的枚举值"),
            ErrorCode::BadLotSize => ("order size is not a valid lot multiple", "委托数量不是有效的整手倍数"),
            ErrorCode::FetchFailed => ("failed to fetch market data", "行情数据获取失败"),
            ErrorCode::InsufficientData => ("not enough bars for the requested computation", "K线数据不足"),
            ErrorCode::DataQuality => ("market data failed an integrity check", "行情数据未通过完整性检查"),
            ErrorCode::SymbolDelisted => ("the instrument has been delisted", "该证券已退市"),
            ErrorCode::SymbolNotFound => ("unknown instrument symbol", "未找到该证券代码"),
            ErrorCode::RateLimited => ("data provider rate limit reached", "数据源触发限流"),
            ErrorCode::LimitUpBlocked => ("cannot buy at a limit-up price", "涨停无法买入"),
            ErrorCode::LimitDownBlocked => ("cannot sell at a limit-down price", "跌停无法卖出"),
            ErrorCode::InsufficientMargin => ("insufficient available funds", "可用资金不足"),
            ErrorCode::PositionNotFound => ("no such position", "持仓不存在"),
            ErrorCode::InstrumentSuspended => ("the instrument is suspended", "该证券已停牌"),
            ErrorCode::ShortSellRejected => ("short selling is not available in cash-equity mode", "现货模式不支持卖空"),
            ErrorCode::TerminalOrderRefill => ("order is already in a terminal state", "订单已处于终态"),
            ErrorCode::InvariantViolation => ("internal ledger invariant violated", "内部账本不变量被破坏"),
            ErrorCode::DivisionByZero => ("division by zero", "除数为零"),
            ErrorCode::NumericOverflow => ("decimal overflow", "数值溢出"),
            ErrorCode::NanInMoney => ("non-finite value in monetary arithmetic", "货币运算中出现非有限值"),
            ErrorCode::DecimalFormat => ("value is not a decimal number", "非法的十进制数值"),
            ErrorCode::Internal => ("internal error", "内部错误"),
            ErrorCode::NotImplemented => ("not implemented", "功能未实现"),
            ErrorCode::Unknown => ("unknown error", "未知错误"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Fatal,
}

/// The error value crossing every fallible boundary of the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    pub message_zh: String,
    pub severity: ErrorSeverity,
    pub recoverable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode) -> Self {
        let (en, zh) = code.messages();
        Self {
            code,
            message: en.to_string(),
            message_zh: zh.to_string(),
            severity: code.default_severity(),
            recoverable: code.recoverable(),
            suggested_action: None,
            details: None,
        }
    }

    /// Replace the English message, keeping the Chinese default.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.suggested_action = Some(action.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl std::error::Error for ErrorInfo {}

/// Failures inside `Money` arithmetic and parsing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MoneyError {
    #[error("not a decimal number: {0:?}")]
    Format(String),
    #[error("non-finite value cannot enter money arithmetic: {0}")]
    NotFinite(f64),
    #[error("division by zero")]
    DivisionByZero,
    #[error("decimal overflow")]
    Overflow,
}

impl From<MoneyError> for ErrorInfo {
    fn from(err: MoneyError) -> Self {
        let code = match err {
            MoneyError::Format(_) => ErrorCode::DecimalFormat,
            MoneyError::NotFinite(_) => ErrorCode::NanInMoney,
            MoneyError::DivisionByZero => ErrorCode::DivisionByZero,
            MoneyError::Overflow => ErrorCode::NumericOverflow,
        };
        ErrorInfo::new(code).with_message(err.to_string())
    }
}

/// Failures constructing or slicing a `KLineSeries`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("series has no bars")]
    Empty,
    #[error("bar {index}: {reason}")]
    BarIntegrity { index: usize, reason: String },
    #[error("bar {index}: timestamp is not strictly increasing")]
    NonMonotonicTime { index: usize },
    #[error("bar {index}: spacing is tighter than the declared timeframe")]
    TimeframeMismatch { index: usize },
    #[error("slice bounds {lo}..{hi} out of range for length {len}")]
    SliceOutOfRange { lo: usize, hi: usize, len: usize },
}

impl From<SeriesError> for ErrorInfo {
    fn from(err: SeriesError) -> Self {
        let code = match err {
            SeriesError::Empty => ErrorCode::InsufficientData,
            _ => ErrorCode::DataQuality,
        };
        ErrorInfo::new(code).with_message(err.to_string())
    }
}

/// Failures reported by a `DataProvider`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("symbol not found: {0}")]
    NotFound(String),
    #[error("rate limited")]
    RateLimited,
    #[error("data integrity: {0}")]
    Integrity(String),
}

impl From<DataError> for ErrorInfo {
    fn from(err: DataError) -> Self {
        let code = match &err {
            DataError::Network(_) => ErrorCode::FetchFailed,
            DataError::NotFound(_) => ErrorCode::SymbolNotFound,
            DataError::RateLimited => ErrorCode::RateLimited,
            DataError::Integrity(_) => ErrorCode::DataQuality,
        };
        ErrorInfo::new(code).with_message(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_renders_with_bt_prefix() {
        assert_eq!(ErrorCode::InvalidCapital.code(), "BT101");
        assert_eq!(ErrorCode::LimitUpBlocked.code(), "BT301");
        assert_eq!(ErrorCode::Internal.code(), "BT901");
    }

    #[test]
    fn delisted_is_not_recoverable() {
        let info = ErrorInfo::new(ErrorCode::SymbolDelisted);
        assert!(!info.recoverable);
        assert!(ErrorInfo::new(ErrorCode::FetchFailed).recoverable);
    }

    #[test]
    fn not_implemented_is_informational() {
        assert_eq!(
            ErrorInfo::new(ErrorCode::NotImplemented).severity,
            ErrorSeverity::Info
        );
    }

    #[test]
    fn carries_both_languages() {
        let info = ErrorInfo::new(ErrorCode::LimitUpBlocked);
        assert!(info.message.contains("limit-up"));
        assert!(!info.message_zh.is_empty());
    }

    #[test]
    fn serde_round_trip() {
        let info = ErrorInfo::new(ErrorCode::InsufficientMargin)
            .with_action("reduce order size")
            .with_details(serde_json::json!({"required": "1000.00"}));
        let json = serde_json::to_string(&info).unwrap();
        let back: ErrorInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
