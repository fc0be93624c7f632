//! 인증 서비스 연결 facade
//!
//! 대상 주소 결정 → 자격증명 선택 → 채널 하나 수립 → 서비스 클라이언트 3종 생성.
//! 모든 클라이언트는 같은 채널을 공유한다.

use std::fmt;
use std::sync::Arc;

use auth_client_core::ports::log_sink::LogSink;
use tracing::debug;

use super::channel::AuthChannel;
use super::config::ClientOptions;
use super::credentials::TransportCredentials;
use super::dialer::{Dialer, TonicDialer};
use super::health_client::GrpcHealthClient;
use super::target::Target;
use crate::error::ClientError;
use crate::proto::services::jwt_service_client::JwtServiceClient;
use crate::proto::services::position_service_client::PositionServiceClient;
use crate::proto::services::staffs_service_client::StaffsServiceClient;

/// 인증 서비스 연결 facade
///
/// `close`는 facade를 소비하므로 열림 → 닫힘 전이는 한 번뿐이다.
/// 클라이언트 핸들은 복제해서 여러 태스크에서 동시에 사용할 수 있고,
/// `close` 이후 남은 핸들의 호출은 실패한다.
pub struct AuthFacade {
    channel: AuthChannel,
    target: Target,
    dialer: Arc<dyn Dialer>,

    position: PositionServiceClient<AuthChannel>,
    staffs: StaffsServiceClient<AuthChannel>,
    jwt: JwtServiceClient<AuthChannel>,
}

impl AuthFacade {
    /// tonic 기본 다이얼러로 연결
    pub async fn connect(options: &ClientOptions) -> Result<Self, ClientError> {
        Self::connect_with(options, Arc::new(TonicDialer)).await
    }

    /// 지정한 다이얼러로 연결
    ///
    /// 실패 시 부분적으로 만들어진 facade는 반환하지 않는다.
    pub async fn connect_with(
        options: &ClientOptions,
        dialer: Arc<dyn Dialer>,
    ) -> Result<Self, ClientError> {
        let target = Target::resolve(Some(options.address_name.as_str()));

        let credentials = TransportCredentials::select(
            options.env.as_deref(),
            &target,
            options.discovery_options(),
        )
        .map_err(ClientError::CredentialSetup)?;

        let dial_options = options.dial_options(credentials);
        debug!(
            target = %target,
            scheme = ?target.scheme(),
            credentials = %dial_options.credentials,
            service_config = %dial_options.service_config,
            "인증 서비스 연결 설정"
        );

        let channel = match dialer.dial(&target, &dial_options).await {
            Ok(channel) => channel,
            Err(source) => {
                let detail = source.to_string();
                options.log.error(
                    "인증 서비스 연결 실패",
                    &[("target", target.address()), ("error", detail.as_str())],
                );
                return Err(ClientError::Connection {
                    target: target.address().to_string(),
                    source,
                });
            }
        };

        options
            .log
            .info("인증 서비스 연결 완료", &[("target", target.address())]);

        Ok(Self {
            position: PositionServiceClient::new(channel.clone()),
            staffs: StaffsServiceClient::new(channel.clone()),
            jwt: JwtServiceClient::new(channel.clone()),
            channel,
            target,
            dialer,
        })
    }

    /// Position 서비스 클라이언트
    pub fn position(&self) -> PositionServiceClient<AuthChannel> {
        self.position.clone()
    }

    /// Staffs 서비스 클라이언트
    pub fn staffs(&self) -> StaffsServiceClient<AuthChannel> {
        self.staffs.clone()
    }

    /// Jwt 서비스 클라이언트
    pub fn jwt(&self) -> JwtServiceClient<AuthChannel> {
        self.jwt.clone()
    }

    /// 같은 채널을 쓰는 Health Check 클라이언트
    pub fn health(&self) -> GrpcHealthClient {
        GrpcHealthClient::new(self.channel.clone())
    }

    /// 연결 대상
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// 연결 해제
    ///
    /// 이 facade에서 꺼낸 모든 클라이언트 핸들이 같은 연결을 잃는다.
    pub fn close(self) -> Result<(), ClientError> {
        let Self {
            channel,
            target,
            dialer,
            position,
            staffs,
            jwt,
        } = self;

        drop((position, staffs, jwt));

        dialer.release(channel).map_err(|source| {
            debug!(target = %target, error = %source, "인증 서비스 연결 해제 실패");
            ClientError::Close(source)
        })?;

        debug!(target = %target, "인증 서비스 연결 해제");
        Ok(())
    }
}

impl fmt::Debug for AuthFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthFacade")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use auth_client_core::config::AppEnv;
    use auth_client_core::ports::log_sink::LogField;
    use tonic::transport::Endpoint;

    use crate::grpc::credentials::BootstrapSource;
    use crate::grpc::dialer::{BoxError, DialOptions};
    use crate::grpc::target::{AddressScheme, FALLBACK_TARGET};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct LogEntry {
        level: &'static str,
        message: String,
        fields: Vec<(String, String)>,
    }

    #[derive(Default)]
    struct RecordingLogSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    impl RecordingLogSink {
        fn record(&self, level: &'static str, message: &str, fields: &[LogField<'_>]) {
            self.entries.lock().unwrap().push(LogEntry {
                level,
                message: message.to_string(),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            });
        }

        fn entries(&self) -> Vec<LogEntry> {
            self.entries.lock().unwrap().clone()
        }
    }

    impl LogSink for RecordingLogSink {
        fn info(&self, message: &str, fields: &[LogField<'_>]) {
            self.record("info", message, fields);
        }

        fn error(&self, message: &str, fields: &[LogField<'_>]) {
            self.record("error", message, fields);
        }
    }

    /// 호출 기록용 다이얼러
    #[derive(Default)]
    struct FakeDialer {
        dials: AtomicUsize,
        releases: AtomicUsize,
        fail_dial: bool,
        fail_release: bool,
        seen: Mutex<Vec<(Target, String)>>,
        issued: Mutex<Option<AuthChannel>>,
    }

    #[async_trait]
    impl Dialer for FakeDialer {
        async fn dial(
            &self,
            target: &Target,
            options: &DialOptions,
        ) -> Result<AuthChannel, BoxError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((target.clone(), options.credentials.to_string()));
            if self.fail_dial {
                return Err("connection refused".into());
            }
            let channel = AuthChannel::from_channel(
                Endpoint::from_static("http://127.0.0.1:1").connect_lazy(),
            );
            *self.issued.lock().unwrap() = Some(channel.clone());
            Ok(channel)
        }

        fn release(&self, channel: AuthChannel) -> Result<(), BoxError> {
            channel.shutdown();
            self.releases.fetch_add(1, Ordering::SeqCst);
            if self.fail_release {
                return Err("release failed".into());
            }
            Ok(())
        }
    }

    fn options(address: &str, env: Option<AppEnv>, log: Arc<RecordingLogSink>) -> ClientOptions {
        let mut options = ClientOptions::new(log)
            .with_address(address)
            .with_xds_bootstrap(BootstrapSource::Inline("{}".to_string()));
        if let Some(env) = env {
            options = options.with_env(Arc::new(env));
        }
        options
    }

    #[tokio::test]
    async fn dev_with_empty_address_uses_fallback_and_insecure() {
        let log = Arc::new(RecordingLogSink::default());
        let dialer = Arc::new(FakeDialer::default());

        let facade = AuthFacade::connect_with(
            &options("", Some(AppEnv::Development), log.clone()),
            dialer.clone(),
        )
        .await
        .unwrap();

        assert_eq!(facade.target().address(), FALLBACK_TARGET);
        assert_eq!(facade.target().scheme(), AddressScheme::DefaultDiscovery);

        let seen = dialer.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, "insecure");
    }

    #[tokio::test]
    async fn plain_address_outside_dev_is_insecure() {
        let log = Arc::new(RecordingLogSink::default());
        let dialer = Arc::new(FakeDialer::default());

        let facade = AuthFacade::connect_with(
            &options("localhost:9000", Some(AppEnv::Production), log.clone()),
            dialer.clone(),
        )
        .await
        .unwrap();

        assert_eq!(facade.target().address(), "localhost:9000");
        assert_eq!(dialer.seen.lock().unwrap()[0].1, "insecure");
    }

    #[tokio::test]
    async fn xds_address_outside_dev_uses_discovery_credentials() {
        let log = Arc::new(RecordingLogSink::default());
        let dialer = Arc::new(FakeDialer::default());

        let facade = AuthFacade::connect_with(
            &options("xds://cluster/svc", Some(AppEnv::Production), log.clone()),
            dialer.clone(),
        )
        .await
        .unwrap();

        assert_eq!(facade.target().address(), "xds://cluster/svc");
        assert_eq!(dialer.seen.lock().unwrap()[0].1, "xds(fallback=insecure)");
    }

    #[tokio::test]
    async fn success_dials_once_and_logs_target() {
        let log = Arc::new(RecordingLogSink::default());
        let dialer = Arc::new(FakeDialer::default());

        let facade = AuthFacade::connect_with(
            &options("localhost:9000", None, log.clone()),
            dialer.clone(),
        )
        .await
        .unwrap();

        // 클라이언트 3종 + health 모두 같은 채널 → 다이얼은 한 번
        let _position = facade.position();
        let _staffs = facade.staffs();
        let _jwt = facade.jwt();
        let _health = facade.health();
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 1);

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, "info");
        assert_eq!(entries[0].message, "인증 서비스 연결 완료");
        assert_eq!(
            entries[0].fields,
            vec![("target".to_string(), "localhost:9000".to_string())]
        );
    }

    #[tokio::test]
    async fn dial_failure_returns_connection_error_and_logs() {
        let log = Arc::new(RecordingLogSink::default());
        let dialer = Arc::new(FakeDialer {
            fail_dial: true,
            ..Default::default()
        });

        let result = AuthFacade::connect_with(
            &options("localhost:9000", None, log.clone()),
            dialer.clone(),
        )
        .await;

        assert_matches!(
            result,
            Err(ClientError::Connection { ref target, ref source })
                if target == "localhost:9000" && source.to_string() == "connection refused"
        );
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 1);

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, "error");
        assert_eq!(
            entries[0].fields,
            vec![
                ("target".to_string(), "localhost:9000".to_string()),
                ("error".to_string(), "connection refused".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn credential_failure_skips_dial() {
        let log = Arc::new(RecordingLogSink::default());
        let dialer = Arc::new(FakeDialer::default());
        let options = ClientOptions::new(log.clone())
            .with_xds_bootstrap(BootstrapSource::Inline("{not json".to_string()));

        let result = AuthFacade::connect_with(&options, dialer.clone()).await;

        assert_matches!(result, Err(ClientError::CredentialSetup(_)));
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 0);
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn close_releases_connection() {
        let log = Arc::new(RecordingLogSink::default());
        let dialer = Arc::new(FakeDialer::default());

        let facade = AuthFacade::connect_with(
            &options("localhost:9000", None, log.clone()),
            dialer.clone(),
        )
        .await
        .unwrap();

        let mut health = facade.health();
        facade.close().unwrap();
        assert_eq!(dialer.releases.load(Ordering::SeqCst), 1);

        // 꺼내 둔 핸들도 같은 연결을 잃는다
        let issued = dialer.issued.lock().unwrap().clone().unwrap();
        assert!(issued.is_closed());
        assert_eq!(issued.backend_count(), 0);
        assert!(health.check("").await.is_err());

        // 종료는 주입된 로그 싱크에 기록하지 않는다
        assert_eq!(log.entries().len(), 1);
    }

    #[tokio::test]
    async fn close_failure_is_propagated() {
        let log = Arc::new(RecordingLogSink::default());
        let dialer = Arc::new(FakeDialer {
            fail_release: true,
            ..Default::default()
        });

        let facade = AuthFacade::connect_with(
            &options("localhost:9000", None, log.clone()),
            dialer.clone(),
        )
        .await
        .unwrap();

        assert_matches!(
            facade.close(),
            Err(ClientError::Close(source)) if source.to_string() == "release failed"
        );
        assert_eq!(log.entries().len(), 1);
    }
}
