//! # auth-client
//!
//! 인증 서비스 gRPC 연결 facade.
//! 대상 주소와 전송 자격증명을 고른 뒤 채널 하나를 열고,
//! 그 채널에 바인딩된 Position/Staffs/Jwt 서비스 클라이언트를 제공한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use auth_client::grpc::{AuthFacade, ClientOptions};
//! use auth_client::logging::TracingLogSink;
//! use auth_client_core::config::AppEnv;
//!
//! let options = ClientOptions::new(Arc::new(TracingLogSink))
//!     .with_address("xds:///auth.svc.cluster.local:8443")
//!     .with_env(Arc::new(AppEnv::Production));
//!
//! let facade = AuthFacade::connect(&options).await?;
//! let mut staffs = facade.staffs();
//! // ...
//! facade.close()?;
//! ```

pub mod error;
pub mod grpc;
pub mod logging;
pub mod proto;

pub use error::ClientError;
pub use grpc::{AuthFacade, ClientOptions};
