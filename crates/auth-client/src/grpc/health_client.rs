//! gRPC Health Check 클라이언트
//!
//! 표준 gRPC Health Check Protocol (grpc.health.v1)을 사용하여
//! facade가 연결된 서버와 각 인증 서비스의 상태를 확인합니다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! let facade = AuthFacade::connect(&options).await?;
//! let mut health = facade.health();
//!
//! // 전체 서버 상태 확인
//! let status = health.check("").await?;
//!
//! // 인증 서비스별 상태 확인
//! for service in health.check_auth_services().await {
//!     println!("{}: {}", service.service, service.status);
//! }
//! ```

use tonic::Code;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use tracing::{debug, error};

use auth_client_core::error::CoreError;

use super::channel::AuthChannel;
use super::error_mapping::AuthService;

/// facade가 노출하는 인증 서비스 이름
pub const AUTH_SERVICES: [&str; 3] = [
    AuthService::Position.service_name(),
    AuthService::Staffs.service_name(),
    AuthService::Jwt.service_name(),
];

/// gRPC 서비스 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingStatus {
    /// 알 수 없음
    Unknown,
    /// 서비스 중
    Serving,
    /// 서비스 중지
    NotServing,
    /// 서버가 모르는 서비스
    ServiceUnknown,
}

impl From<i32> for ServingStatus {
    fn from(value: i32) -> Self {
        match value {
            1 => ServingStatus::Serving,
            2 => ServingStatus::NotServing,
            3 => ServingStatus::ServiceUnknown,
            _ => ServingStatus::Unknown,
        }
    }
}

impl std::fmt::Display for ServingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServingStatus::Unknown => write!(f, "UNKNOWN"),
            ServingStatus::Serving => write!(f, "SERVING"),
            ServingStatus::NotServing => write!(f, "NOT_SERVING"),
            ServingStatus::ServiceUnknown => write!(f, "SERVICE_UNKNOWN"),
        }
    }
}

/// 서비스 상태 정보
#[derive(Debug, Clone)]
pub struct ServiceHealth {
    /// 서비스 이름 (빈 문자열이면 전체 서버)
    pub service: String,
    /// 서비스 상태
    pub status: ServingStatus,
}

/// gRPC Health Check 클라이언트
///
/// facade의 채널을 공유하므로 별도 연결을 만들지 않는다.
#[derive(Debug, Clone)]
pub struct GrpcHealthClient {
    client: HealthClient<AuthChannel>,
}

impl GrpcHealthClient {
    /// 기존 채널에 바인딩
    pub fn new(channel: AuthChannel) -> Self {
        Self {
            client: HealthClient::new(channel),
        }
    }

    /// 서비스 상태 확인
    ///
    /// `service`가 빈 문자열이면 전체 서버 상태를 확인한다.
    pub async fn check(&mut self, service: &str) -> Result<ServingStatus, CoreError> {
        let name = if service.is_empty() { "<server>" } else { service };
        debug!(service = %name, "Health check");

        let request = tonic::Request::new(HealthCheckRequest {
            service: service.to_string(),
        });

        let response = match self.client.check(request).await {
            Ok(response) => response,
            // 서버가 모르는 서비스는 NOT_FOUND로 응답한다
            Err(status) if status.code() == Code::NotFound => {
                debug!(service = %name, "Health check 대상 서비스 미등록");
                return Ok(ServingStatus::ServiceUnknown);
            }
            Err(status) => {
                error!(service = %name, error = %status, "Health check 실패");
                return Err(match status.code() {
                    Code::Unavailable => CoreError::ServiceUnavailable(format!(
                        "health check {name}: {}",
                        status.message()
                    )),
                    code => CoreError::Network(format!(
                        "health check {name}: {} ({code})",
                        status.message()
                    )),
                });
            }
        };

        let status = ServingStatus::from(response.into_inner().status);
        debug!(service = %name, status = %status, "Health check 결과");

        Ok(status)
    }

    /// 여러 서비스 상태 일괄 확인 (실패한 항목은 Unknown)
    pub async fn check_all(&mut self, services: &[&str]) -> Vec<ServiceHealth> {
        let mut results = Vec::with_capacity(services.len());

        for service in services {
            let status = self.check(service).await.unwrap_or(ServingStatus::Unknown);
            results.push(ServiceHealth {
                service: service.to_string(),
                status,
            });
        }

        results
    }

    /// 전체 서버 + 인증 서비스(Position, Staffs, Jwt) 상태 확인
    pub async fn check_auth_services(&mut self) -> Vec<ServiceHealth> {
        let mut services = vec![""];
        services.extend(AUTH_SERVICES);
        self.check_all(&services).await
    }

    /// 서버가 SERVING 상태인지 확인
    pub async fn is_healthy(&mut self) -> bool {
        matches!(self.check("").await, Ok(ServingStatus::Serving))
    }
}
