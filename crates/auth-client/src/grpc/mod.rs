//! gRPC 연결 모듈
//!
//! 인증 서비스(Position, Staffs, Jwt)에 대한 단일 채널 facade.
//!
//! ## 연결 흐름
//!
//! 1. [`Target`] — 명시적 주소 또는 기본 디스커버리 주소, 주소 형태 분류
//! 2. [`TransportCredentials`] — 개발/일반 주소는 insecure, 그 외 xDS 자격증명
//! 3. [`Dialer`] — 라운드 로빈 서비스 설정으로 [`AuthChannel`] 하나 수립
//! 4. [`AuthFacade`] — 같은 채널에 바인딩된 클라이언트 3종
//!
//! 호출 실패는 [`ServiceResultExt::into_core`]로 `CoreError`로 바꿀 수 있다.
//!
//! ```rust,ignore
//! let options = ClientOptions::new(Arc::new(TracingLogSink)).with_address("localhost:9000");
//! let facade = AuthFacade::connect(&options).await?;
//! let mut jwt = facade.jwt();
//! facade.close()?;
//! ```

mod channel;
mod config;
mod credentials;
mod dialer;
mod error_mapping;
mod facade;
mod health_client;
mod target;

pub use channel::{AuthChannel, ChannelError};
pub use config::ClientOptions;
pub use credentials::{
    BootstrapSource, CredentialError, DiscoveryCredentials, DiscoveryOptions, FallbackCredentials,
    TlsMaterial, TransportCredentials,
};
pub use dialer::{
    BoxError, DialOptions, Dialer, LoadBalancingPolicy, ServiceConfig, TonicDialer,
    DEFAULT_RESOLVE_INTERVAL,
};
pub use error_mapping::{map_status, AuthService, ServiceResultExt};
pub use facade::AuthFacade;
pub use health_client::{GrpcHealthClient, ServiceHealth, ServingStatus, AUTH_SERVICES};
pub use target::{AddressScheme, Target, TargetError, FALLBACK_TARGET, XDS_SCHEME_PREFIX};
