//! 인증 서비스 연결 점검
//!
//! 설정 파일(선택)과 환경변수로 facade를 만들고 서비스 상태를 출력한다.
//!
//! 실행:
//!   cargo run -p auth-client --example connect_check -- ./auth-client.json
//!
//! 환경변수:
//!   AUTH_CLIENT_ADDRESS=localhost:50051 APP_ENV=dev cargo run -p auth-client --example connect_check
//!   AUTH_CLIENT_TOKEN=<jwt> 지정 시 토큰 검증까지 수행

use std::path::PathBuf;
use std::sync::Arc;

use auth_client::grpc::{AuthFacade, AuthService, ServiceResultExt};
use auth_client::logging::TracingLogSink;
use auth_client::proto::services::ValidateTokenRequest;
use auth_client::ClientOptions;
use auth_client_core::config::AuthClientConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => AuthClientConfig::load_from_file(&path)?,
        None => AuthClientConfig::default(),
    };
    config.apply_env_overrides()?;

    println!("============================================================");
    println!("인증 서비스 연결 점검");
    println!(
        "주소: {}",
        if config.address_name.is_empty() {
            "<기본 디스커버리 주소>"
        } else {
            config.address_name.as_str()
        }
    );
    println!(
        "환경: {}",
        config
            .env
            .map(|env| env.to_string())
            .unwrap_or_else(|| "<미지정>".to_string())
    );
    println!("============================================================");

    let options = ClientOptions::from_config(&config, Arc::new(TracingLogSink))?;
    let facade = AuthFacade::connect(&options).await?;

    let mut health = facade.health();
    for service in health.check_auth_services().await {
        let name = if service.service.is_empty() {
            "<server>"
        } else {
            service.service.as_str()
        };
        println!("  {name:<32} {}", service.status);
    }

    if let Ok(token) = std::env::var("AUTH_CLIENT_TOKEN") {
        let result = facade
            .jwt()
            .validate_token(ValidateTokenRequest { token })
            .await
            .into_core(AuthService::Jwt);
        match result {
            Ok(response) => println!("토큰 검증: valid={}", response.valid),
            Err(e) => println!("토큰 검증 실패: {e}"),
        }
    }

    facade.close()?;
    println!("연결 종료");

    Ok(())
}
