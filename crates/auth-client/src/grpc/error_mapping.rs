//! 인증 서비스 호출 실패 → `CoreError`
//!
//! ```rust,ignore
//! let claims = facade
//!     .jwt()
//!     .get_claims(GetClaimsRequest { token })
//!     .await
//!     .into_core(AuthService::Jwt)?;
//! ```

use std::fmt;

use auth_client_core::error::CoreError;
use tonic::{Code, Response, Status};

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
const RETRY_AFTER_KEYS: [&str; 2] = ["retry-after", "x-retry-after-seconds"];

/// facade가 노출하는 인증 서비스
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthService {
    Position,
    Staffs,
    Jwt,
}

impl AuthService {
    pub const ALL: [AuthService; 3] = [AuthService::Position, AuthService::Staffs, AuthService::Jwt];

    /// gRPC 서비스 전체 이름 (health check 대상 이름과 동일)
    pub const fn service_name(self) -> &'static str {
        match self {
            AuthService::Position => "services.v1.PositionService",
            AuthService::Staffs => "services.v1.StaffsService",
            AuthService::Jwt => "services.v1.JwtService",
        }
    }

    /// NotFound/Validation 에러에 쓰는 리소스 종류
    pub const fn resource_type(self) -> &'static str {
        match self {
            AuthService::Position => "position",
            AuthService::Staffs => "staff",
            AuthService::Jwt => "token",
        }
    }
}

impl fmt::Display for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

/// 서비스 호출 상태를 코어 에러로 변환
///
/// JWT 서비스의 Unauthenticated는 토큰 거부, 그 외 서비스는 호출자 인증 실패로 본다.
pub fn map_status(service: AuthService, status: Status) -> CoreError {
    let message = status.message();

    match status.code() {
        Code::Unauthenticated if service == AuthService::Jwt => {
            CoreError::Auth(format!("토큰 거부: {message}"))
        }
        Code::Unauthenticated => CoreError::Auth(format!("{service} 인증 실패: {message}")),
        Code::PermissionDenied => CoreError::Auth(format!("{service} 권한 없음: {message}")),
        Code::NotFound => CoreError::NotFound {
            resource_type: service.resource_type().to_string(),
            id: message.to_string(),
        },
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => {
            CoreError::Validation {
                field: service.resource_type().to_string(),
                message: message.to_string(),
            }
        }
        Code::ResourceExhausted => CoreError::RateLimit {
            retry_after_secs: retry_after_secs(&status),
        },
        // 서버에 서비스가 없거나 연결이 끊긴 경우
        Code::Unavailable | Code::Unimplemented => {
            CoreError::ServiceUnavailable(format!("{service}: {message}"))
        }
        code => CoreError::Network(format!("{service}: {message} ({code})")),
    }
}

fn retry_after_secs(status: &Status) -> u64 {
    RETRY_AFTER_KEYS
        .iter()
        .find_map(|key| {
            status
                .metadata()
                .get(*key)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
        })
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// 서비스 클라이언트 호출 결과 변환
pub trait ServiceResultExt<T> {
    /// 응답 본문을 꺼내고 실패는 [`map_status`]로 변환
    fn into_core(self, service: AuthService) -> Result<T, CoreError>;
}

impl<T> ServiceResultExt<T> for Result<Response<T>, Status> {
    fn into_core(self, service: AuthService) -> Result<T, CoreError> {
        self.map(Response::into_inner)
            .map_err(|status| map_status(service, status))
    }
}
