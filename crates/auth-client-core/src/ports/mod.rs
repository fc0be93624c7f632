//! 포트 인터페이스 (trait).
//!
//! 클라이언트가 전역 상태 대신 생성 시점에 주입받는 협력자들.
//! 호출 측은 `Arc<dyn T>`로 구현체를 넘긴다.

pub mod environment;
pub mod log_sink;
