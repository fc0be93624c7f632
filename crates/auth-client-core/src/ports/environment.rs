//! 실행 환경 포트.
//!
//! 구현: [`crate::config::AppEnv`]

/// 실행 환경 표시자
pub trait Environment: Send + Sync {
    /// 개발 환경 여부
    fn is_development(&self) -> bool;
}
