//! Proto 메시지 및 gRPC 클라이언트 정의
//!
//! `proto/services/v1/*.proto`에서 생성된 Protobuf 메시지와 gRPC 클라이언트를 포함합니다.
//! 생성 코드는 커밋되어 있으며 `scripts/regenerate-protos.sh`로 갱신합니다.

/// 인증 서비스 도메인 (Position, Staffs, Jwt)
pub mod services {
    #![allow(clippy::all)]
    #![allow(warnings)]
    include!("generated/services.v1.rs");
}
