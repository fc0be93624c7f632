//! 연결 facade 생성 옵션
//!
//! `auth-client-core`의 `AuthClientConfig`에 주입 협력자(로그 싱크, 실행 환경)를 더한다.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use auth_client_core::config::AuthClientConfig;
use auth_client_core::ports::environment::Environment;
use auth_client_core::ports::log_sink::LogSink;

use super::credentials::{BootstrapSource, DiscoveryOptions, TransportCredentials};
use super::dialer::DialOptions;
use crate::error::ClientError;

/// 연결 facade 생성 옵션
#[derive(Clone)]
pub struct ClientOptions {
    /// 명시적 서버 주소 (비어 있으면 기본 디스커버리 주소)
    pub address_name: String,
    /// 실행 환경 (없으면 비개발 환경)
    pub env: Option<Arc<dyn Environment>>,
    /// 라이프사이클 이벤트 로그 싱크
    pub log: Arc<dyn LogSink>,
    /// 연결 타임아웃
    pub connect_timeout: Option<Duration>,
    /// 요청 타임아웃
    pub request_timeout: Option<Duration>,
    /// 생성 시점에 연결 수립까지 대기할지 여부
    pub block_on_connect: bool,
    /// 백엔드 주소 재해석 주기 (없으면 기본값)
    pub resolve_interval: Option<Duration>,
    /// xDS bootstrap 위치 (없으면 gRPC 표준 환경변수 조회)
    pub xds_bootstrap: Option<BootstrapSource>,
}

impl ClientOptions {
    /// 로그 싱크만 지정한 기본 옵션
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        Self {
            address_name: String::new(),
            env: None,
            log,
            connect_timeout: None,
            request_timeout: None,
            block_on_connect: false,
            resolve_interval: None,
            xds_bootstrap: None,
        }
    }

    /// 설정 파일 값으로 옵션 생성
    pub fn from_config(config: &AuthClientConfig, log: Arc<dyn LogSink>) -> Result<Self, ClientError> {
        config.validate()?;

        Ok(Self {
            address_name: config.address_name.clone(),
            env: config
                .env
                .map(|env| Arc::new(env) as Arc<dyn Environment>),
            log,
            connect_timeout: config.connect_timeout_secs.map(Duration::from_secs),
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
            block_on_connect: config.block_on_connect,
            resolve_interval: config.resolve_interval_secs.map(Duration::from_secs),
            xds_bootstrap: config
                .xds_bootstrap_path
                .as_ref()
                .map(|path| BootstrapSource::File(PathBuf::from(path))),
        })
    }

    /// 명시적 주소 지정
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address_name = address.into();
        self
    }

    /// 실행 환경 지정
    pub fn with_env(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = Some(env);
        self
    }

    /// 연결 수립 대기 여부 지정
    pub fn with_block_on_connect(mut self, block: bool) -> Self {
        self.block_on_connect = block;
        self
    }

    /// 연결 타임아웃 지정
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// 백엔드 주소 재해석 주기 지정
    pub fn with_resolve_interval(mut self, interval: Duration) -> Self {
        self.resolve_interval = Some(interval);
        self
    }

    /// xDS bootstrap 위치 지정
    pub fn with_xds_bootstrap(mut self, source: BootstrapSource) -> Self {
        self.xds_bootstrap = Some(source);
        self
    }

    pub(crate) fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            bootstrap: self.xds_bootstrap.clone().or_else(BootstrapSource::from_env),
            ..Default::default()
        }
    }

    pub(crate) fn dial_options(&self, credentials: TransportCredentials) -> DialOptions {
        let defaults = DialOptions::new(credentials);
        DialOptions {
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            block: self.block_on_connect,
            resolve_interval: self.resolve_interval.unwrap_or(defaults.resolve_interval),
            ..defaults
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("address_name", &self.address_name)
            .field(
                "is_development",
                &self.env.as_ref().map(|env| env.is_development()),
            )
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("block_on_connect", &self.block_on_connect)
            .field("resolve_interval", &self.resolve_interval)
            .field("xds_bootstrap", &self.xds_bootstrap)
            .finish_non_exhaustive()
    }
}
