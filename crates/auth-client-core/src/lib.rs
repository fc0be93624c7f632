//! # auth-client-core
//!
//! auth-client 설정 구조체, 포트(trait) 정의, 에러 타입.
//! 어댑터 crate(`auth-client`)가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`ports`] — 주입받는 협력자 인터페이스 (로그 싱크, 실행 환경)
//! - [`error`] — 핵심 에러 타입 (thiserror)
//! - [`config`] — 클라이언트 설정 구조체 (serde, 파일/환경변수 로드)

pub mod config;
pub mod error;
pub mod ports;
