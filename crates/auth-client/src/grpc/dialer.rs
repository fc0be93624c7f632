//! 연결 수립 (다이얼)
//!
//! `Dialer`는 전송 라이브러리와의 경계다. 기본 구현 `TonicDialer`는 DNS로
//! 백엔드 주소를 해석해 백엔드마다 tonic 채널을 두는 [`AuthChannel`]을 만들고,
//! 채널이 살아 있는 동안 주기적으로 다시 해석해 백엔드 목록을 갱신한다.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info, warn};

use super::channel::{AuthChannel, BackendUpdater};
use super::credentials::TransportCredentials;
use super::target::Target;

/// 전송 계층에서 올라오는 에러
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 백엔드 주소 재해석 기본 주기
pub const DEFAULT_RESOLVE_INTERVAL: Duration = Duration::from_secs(30);

/// 로드 밸런싱 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingPolicy {
    /// 해석된 모든 백엔드에 차례로 분배
    #[default]
    RoundRobin,
}

/// gRPC 서비스 설정 (`{"loadBalancingPolicy":"round_robin"}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub load_balancing_policy: LoadBalancingPolicy,
}

impl fmt::Display for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// 다이얼 옵션
#[derive(Debug, Clone)]
pub struct DialOptions {
    /// 서비스 설정 (로드 밸런싱)
    pub service_config: ServiceConfig,
    /// 전송 자격증명
    pub credentials: TransportCredentials,
    /// 연결 타임아웃
    pub connect_timeout: Option<Duration>,
    /// 요청 타임아웃
    pub request_timeout: Option<Duration>,
    /// 연결 수립까지 대기 여부 (false면 주소 해석과 연결을 뒤로 미룬다)
    pub block: bool,
    /// 백엔드 주소 재해석 주기
    pub resolve_interval: Duration,
}

impl DialOptions {
    /// 라운드 로빈 서비스 설정을 포함한 기본 옵션
    pub fn new(credentials: TransportCredentials) -> Self {
        Self {
            service_config: ServiceConfig::default(),
            credentials,
            connect_timeout: None,
            request_timeout: None,
            block: false,
            resolve_interval: DEFAULT_RESOLVE_INTERVAL,
        }
    }
}

/// 연결 수립/해제 인터페이스
#[async_trait]
pub trait Dialer: Send + Sync {
    /// 대상에 대한 채널 하나를 연다
    async fn dial(&self, target: &Target, options: &DialOptions) -> Result<AuthChannel, BoxError>;

    /// 채널 해제
    ///
    /// 모든 복제본이 공유하는 백엔드 연결을 끊는다.
    fn release(&self, channel: AuthChannel) -> Result<(), BoxError> {
        channel.shutdown();
        Ok(())
    }
}

/// tonic 기반 기본 다이얼러
#[derive(Debug, Clone, Copy, Default)]
pub struct TonicDialer;

impl TonicDialer {
    fn build_endpoint(
        addr: SocketAddr,
        host: &str,
        options: &DialOptions,
    ) -> Result<Endpoint, BoxError> {
        let tls = options.credentials.tls();
        let scheme = if tls.is_some() { "https" } else { "http" };

        let mut endpoint = Endpoint::from_shared(format!("{scheme}://{addr}"))?;

        if let Some(timeout) = options.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }
        if let Some(timeout) = options.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }
        if let Some(tls) = tls {
            endpoint = endpoint.tls_config(tls.client_tls_config(host))?;
        }

        Ok(endpoint)
    }

    /// 중복 없는 백엔드 주소 목록
    async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, BoxError> {
        let mut addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port)).await?.collect();
        addrs.sort();
        addrs.dedup();

        if addrs.is_empty() {
            return Err(format!("주소 해석 결과 없음: {host}:{port}").into());
        }
        Ok(addrs)
    }

    /// 모든 백엔드에 연결 (하나도 연결되지 않으면 마지막 에러)
    async fn connect_all(
        addrs: &[SocketAddr],
        host: &str,
        options: &DialOptions,
    ) -> Result<Vec<(SocketAddr, Channel)>, BoxError> {
        let mut connected = Vec::with_capacity(addrs.len());
        let mut last_error = None;

        for addr in addrs {
            let endpoint = Self::build_endpoint(*addr, host, options)?;
            match endpoint.connect().await {
                Ok(channel) => connected.push((*addr, channel)),
                Err(e) => {
                    debug!(addr = %addr, error = %e, "백엔드 연결 실패, 다음 주소 시도");
                    last_error = Some(e);
                }
            }
        }

        if connected.is_empty() {
            return Err(match last_error {
                Some(e) => e.into(),
                None => "연결할 백엔드 없음".into(),
            });
        }
        Ok(connected)
    }

    /// 채널이 살아 있는 동안 주소를 다시 해석해 백엔드 목록 갱신
    async fn refresh_backends(
        updater: BackendUpdater,
        host: String,
        port: u16,
        options: DialOptions,
        resolve_now: bool,
    ) {
        if !resolve_now {
            tokio::time::sleep(options.resolve_interval).await;
        }

        loop {
            let alive = match Self::resolve(&host, port).await {
                Ok(addrs) => updater.update(&addrs, |addr| {
                    Ok(Self::build_endpoint(addr, &host, &options)?.connect_lazy())
                }),
                Err(e) => {
                    warn!(host = %host, port, error = %e, "백엔드 주소 해석 실패");
                    updater.resolution_failed()
                }
            };

            if !alive {
                debug!(host = %host, "채널 종료, 주소 갱신 중단");
                break;
            }

            tokio::time::sleep(options.resolve_interval).await;
        }
    }
}

#[async_trait]
impl Dialer for TonicDialer {
    async fn dial(&self, target: &Target, options: &DialOptions) -> Result<AuthChannel, BoxError> {
        let (host, port) = target.host_port()?;

        info!(
            target = %target,
            policy = ?options.service_config.load_balancing_policy,
            block = options.block,
            "gRPC 채널 생성"
        );

        let channel = if options.block {
            let addrs = Self::resolve(host, port).await?;
            let backends = Self::connect_all(&addrs, host, options).await?;
            debug!(target = %target, backends = backends.len(), "백엔드 연결 완료");
            AuthChannel::connected(backends)
        } else {
            AuthChannel::unresolved()
        };

        let refresher = tokio::spawn(Self::refresh_backends(
            channel.updater(),
            host.to_string(),
            port,
            options.clone(),
            !options.block,
        ));
        channel.attach_refresher(refresher);

        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grpc::credentials::{BootstrapSource, DiscoveryCredentials, DiscoveryOptions};
    use crate::grpc::health_client::{GrpcHealthClient, ServingStatus};
    use tokio::net::TcpListener;
    use tokio_stream::wrappers::TcpListenerStream;

    const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
    const CHECKED_SERVICE: &str = "services.v1.JwtService";

    fn discovery_credentials(mutual: bool) -> TransportCredentials {
        let mut config = serde_json::json!({
            "ca_certificate_file": format!("{FIXTURES}/ca.pem"),
        });
        if mutual {
            config["certificate_file"] = format!("{FIXTURES}/client.pem").into();
            config["private_key_file"] = format!("{FIXTURES}/client.key").into();
        }
        let bootstrap = serde_json::json!({
            "certificate_providers": {
                "default": { "plugin_name": "file_watcher", "config": config }
            }
        });

        let creds = DiscoveryCredentials::new(DiscoveryOptions {
            bootstrap: Some(BootstrapSource::Inline(bootstrap.to_string())),
            ..Default::default()
        })
        .unwrap();
        TransportCredentials::Discovery(creds)
    }

    async fn health_server(status: tonic_health::ServingStatus) -> SocketAddr {
        let (mut reporter, service) = tonic_health::server::health_reporter();
        reporter.set_service_status(CHECKED_SERVICE, status).await;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _reporter = reporter;
            tonic::transport::Server::builder()
                .add_service(service)
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
                .unwrap();
        });
        addr
    }

    async fn closed_port() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    #[test]
    fn service_config_requests_round_robin() {
        let config = ServiceConfig::default();
        assert_eq!(config.load_balancing_policy, LoadBalancingPolicy::RoundRobin);
        assert_eq!(
            config.to_string(),
            r#"{"loadBalancingPolicy":"round_robin"}"#
        );
    }

    #[test]
    fn dial_options_defaults() {
        let options = DialOptions::new(TransportCredentials::Insecure);
        assert_eq!(options.service_config, ServiceConfig::default());
        assert!(options.credentials.is_insecure());
        assert!(!options.block);
        assert!(options.connect_timeout.is_none());
        assert_eq!(options.resolve_interval, DEFAULT_RESOLVE_INTERVAL);
    }

    #[test]
    fn insecure_endpoint_uses_http() {
        let options = DialOptions {
            request_timeout: Some(Duration::from_secs(3)),
            ..DialOptions::new(TransportCredentials::Insecure)
        };
        let endpoint =
            TonicDialer::build_endpoint("127.0.0.1:50051".parse().unwrap(), "127.0.0.1", &options)
                .unwrap();
        assert!(endpoint
            .uri()
            .to_string()
            .starts_with("http://127.0.0.1:50051"));
    }

    #[test]
    fn discovery_tls_endpoint_uses_https() {
        for mutual in [false, true] {
            let credentials = discovery_credentials(mutual);
            assert_eq!(
                credentials.to_string(),
                if mutual { "xds(mtls)" } else { "xds(tls)" }
            );

            let options = DialOptions::new(credentials);
            let endpoint = TonicDialer::build_endpoint(
                "10.0.0.7:8443".parse().unwrap(),
                "auth.svc.cluster.local",
                &options,
            )
            .unwrap();
            assert!(endpoint.uri().to_string().starts_with("https://10.0.0.7:8443"));
        }
    }

    #[tokio::test]
    async fn lazy_dial_skips_name_resolution() {
        // 클러스터 밖에서 해석되지 않는 기본 주소도 생성은 성공
        let target = Target::resolve(None);
        let options = DialOptions::new(TransportCredentials::Insecure);

        let channel = TonicDialer.dial(&target, &options).await.unwrap();
        assert!(!channel.is_closed());

        TonicDialer.release(channel.clone()).unwrap();
        assert!(channel.is_closed());
    }

    #[tokio::test]
    async fn invalid_port_fails_before_dialing() {
        let target = Target::resolve(Some("localhost:http"));
        let options = DialOptions::new(TransportCredentials::Insecure);
        assert!(TonicDialer.dial(&target, &options).await.is_err());
    }

    #[tokio::test]
    async fn blocking_dial_to_closed_port_fails() {
        let addr = closed_port().await;
        let target = Target::resolve(Some(addr.to_string().as_str()));
        let options = DialOptions {
            block: true,
            connect_timeout: Some(Duration::from_secs(2)),
            ..DialOptions::new(TransportCredentials::Insecure)
        };
        assert!(TonicDialer.dial(&target, &options).await.is_err());
    }

    #[tokio::test]
    async fn blocking_dial_connects_resolved_backend() {
        let addr = health_server(tonic_health::ServingStatus::Serving).await;
        let target = Target::resolve(Some(addr.to_string().as_str()));
        let options = DialOptions {
            block: true,
            ..DialOptions::new(TransportCredentials::Insecure)
        };

        let channel = TonicDialer.dial(&target, &options).await.unwrap();
        assert_eq!(channel.backend_count(), 1);

        let mut health = GrpcHealthClient::new(channel);
        assert_eq!(
            health.check(CHECKED_SERVICE).await.unwrap(),
            ServingStatus::Serving
        );
    }

    #[tokio::test]
    async fn connected_backends_share_requests_round_robin() {
        let serving = health_server(tonic_health::ServingStatus::Serving).await;
        let not_serving = health_server(tonic_health::ServingStatus::NotServing).await;
        let options = DialOptions::new(TransportCredentials::Insecure);

        let backends = TonicDialer::connect_all(&[serving, not_serving], "127.0.0.1", &options)
            .await
            .unwrap();
        assert_eq!(backends.len(), 2);

        let mut health = GrpcHealthClient::new(AuthChannel::connected(backends));
        let first = health.check(CHECKED_SERVICE).await.unwrap();
        let second = health.check(CHECKED_SERVICE).await.unwrap();

        let statuses = [first, second];
        assert!(statuses.contains(&ServingStatus::Serving));
        assert!(statuses.contains(&ServingStatus::NotServing));
    }

    #[tokio::test]
    async fn connect_all_skips_unreachable_backends() {
        let live = health_server(tonic_health::ServingStatus::Serving).await;
        let dead = closed_port().await;
        let options = DialOptions {
            connect_timeout: Some(Duration::from_secs(2)),
            ..DialOptions::new(TransportCredentials::Insecure)
        };

        let backends = TonicDialer::connect_all(&[dead, live], "127.0.0.1", &options)
            .await
            .unwrap();
        assert_eq!(backends.len(), 1);
        assert_eq!(backends[0].0, live);

        assert!(TonicDialer::connect_all(&[dead], "127.0.0.1", &options)
            .await
            .is_err());
    }
}
