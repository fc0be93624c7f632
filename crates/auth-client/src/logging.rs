//! tracing 기반 로그 싱크
//!
//! `LogSink` 포트를 `tracing` 이벤트로 내보낸다.

use std::fmt;

use auth_client_core::ports::log_sink::{LogField, LogSink};
use tracing::{error, info};

/// tracing 로그 싱크
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn info(&self, message: &str, fields: &[LogField<'_>]) {
        info!(fields = %DisplayFields(fields), "{message}");
    }

    fn error(&self, message: &str, fields: &[LogField<'_>]) {
        error!(fields = %DisplayFields(fields), "{message}");
    }
}

/// `key=value key=value` 형태로 출력
struct DisplayFields<'a, 'b>(&'a [LogField<'b>]);

impl fmt::Display for DisplayFields<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}
