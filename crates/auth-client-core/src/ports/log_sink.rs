//! 로그 싱크 포트.
//!
//! 구현: `auth-client` crate (`TracingLogSink`, tracing 기반)

/// 구조화 로그 필드 (키, 값)
pub type LogField<'a> = (&'a str, &'a str);

/// 라이프사이클 이벤트를 기록하는 로그 싱크
///
/// 전역 로거를 직접 참조하지 않고 설정을 통해 주입받는다.
pub trait LogSink: Send + Sync {
    /// 정보 로그
    fn info(&self, message: &str, fields: &[LogField<'_>]);

    /// 에러 로그
    fn error(&self, message: &str, fields: &[LogField<'_>]);
}
