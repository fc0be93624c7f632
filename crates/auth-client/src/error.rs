//! auth-client 에러 타입

use auth_client_core::error::CoreError;
use thiserror::Error;

use crate::grpc::{BoxError, CredentialError};

/// 연결 facade 에러
///
/// 모두 해당 호출에서 즉시 반환되며 내부에서 재시도하지 않는다.
#[derive(Debug, Error)]
pub enum ClientError {
    /// 디스커버리 자격증명 생성 실패
    #[error("xDS 자격증명 생성 실패: {0}")]
    CredentialSetup(#[source] CredentialError),

    /// 연결 실패
    #[error("인증 서비스 연결 실패 ({target}): {source}")]
    Connection {
        /// 연결 대상 주소
        target: String,
        #[source]
        source: BoxError,
    },

    /// 연결 해제 실패
    #[error("연결 해제 실패: {0}")]
    Close(#[source] BoxError),

    /// 코어 에러 (설정 검증 등)
    #[error(transparent)]
    Core(#[from] CoreError),
}
