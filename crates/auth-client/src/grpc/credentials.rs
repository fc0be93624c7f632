//! 전송 자격증명 선택
//!
//! 개발 환경이나 일반 명시적 주소는 insecure, 그 외에는 xDS bootstrap 기반
//! 디스커버리 자격증명(insecure fallback)을 사용한다.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use auth_client_core::config::ENV_XDS_BOOTSTRAP;
use auth_client_core::ports::environment::Environment;
use serde::Deserialize;
use thiserror::Error;
use tonic::transport::{Certificate, ClientTlsConfig, Identity};
use tracing::{debug, warn};

use super::target::{AddressScheme, Target};

/// xDS bootstrap 인라인 JSON 환경변수
pub const ENV_XDS_BOOTSTRAP_CONFIG: &str = "GRPC_XDS_BOOTSTRAP_CONFIG";

/// 지원하는 인증서 제공자 플러그인
const FILE_WATCHER_PLUGIN: &str = "file_watcher";

/// 기본 인증서 제공자 인스턴스 이름
const DEFAULT_PROVIDER_INSTANCE: &str = "default";

/// 자격증명 생성 에러
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("xDS bootstrap 읽기 실패: {path}: {source}")]
    BootstrapRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("xDS bootstrap 파싱 실패: {0}")]
    BootstrapParse(#[from] serde_json::Error),

    #[error("지원하지 않는 인증서 제공자 플러그인: {0}")]
    UnsupportedProvider(String),

    #[error("인증서 제공자 설정 불완전: {0}")]
    IncompleteIdentity(String),

    #[error("인증서 파일 읽기 실패: {path}: {source}")]
    CertificateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================
// xDS bootstrap
// ============================================================

/// xDS bootstrap 문서 위치
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapSource {
    /// 파일 경로
    File(PathBuf),
    /// 인라인 JSON
    Inline(String),
}

impl BootstrapSource {
    /// gRPC 표준 환경변수에서 bootstrap 위치 조회
    pub fn from_env() -> Option<Self> {
        if let Some(path) = non_empty_env(ENV_XDS_BOOTSTRAP) {
            return Some(BootstrapSource::File(PathBuf::from(path)));
        }
        non_empty_env(ENV_XDS_BOOTSTRAP_CONFIG).map(BootstrapSource::Inline)
    }

    fn load(&self) -> Result<Bootstrap, CredentialError> {
        let content = match self {
            BootstrapSource::File(path) => {
                fs::read_to_string(path).map_err(|source| CredentialError::BootstrapRead {
                    path: path.clone(),
                    source,
                })?
            }
            BootstrapSource::Inline(json) => json.clone(),
        };
        Ok(serde_json::from_str(&content)?)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// bootstrap 중 자격증명에 필요한 부분만 해석
#[derive(Debug, Deserialize)]
struct Bootstrap {
    #[serde(default)]
    certificate_providers: HashMap<String, CertificateProviderInstance>,
}

#[derive(Debug, Deserialize)]
struct CertificateProviderInstance {
    plugin_name: String,
    #[serde(default)]
    config: FileWatcherConfig,
}

#[derive(Debug, Default, Deserialize)]
struct FileWatcherConfig {
    #[serde(default)]
    certificate_file: Option<PathBuf>,
    #[serde(default)]
    private_key_file: Option<PathBuf>,
    #[serde(default)]
    ca_certificate_file: Option<PathBuf>,
}

impl Bootstrap {
    /// 사용할 인증서 제공자: `default` 인스턴스, 없으면 유일한 인스턴스
    fn provider(&self) -> Option<(&str, &CertificateProviderInstance)> {
        if let Some(provider) = self.certificate_providers.get(DEFAULT_PROVIDER_INSTANCE) {
            return Some((DEFAULT_PROVIDER_INSTANCE, provider));
        }
        if self.certificate_providers.len() == 1 {
            return self
                .certificate_providers
                .iter()
                .next()
                .map(|(name, provider)| (name.as_str(), provider));
        }
        None
    }
}

// ============================================================
// TLS 자료
// ============================================================

/// 디스커버리 자격증명에서 얻은 TLS 자료 (PEM)
#[derive(Clone, Default)]
pub struct TlsMaterial {
    ca_pem: Option<Vec<u8>>,
    identity: Option<(Vec<u8>, Vec<u8>)>,
}

impl TlsMaterial {
    fn from_file_watcher(name: &str, config: &FileWatcherConfig) -> Result<Self, CredentialError> {
        let ca_pem = config
            .ca_certificate_file
            .as_deref()
            .map(read_pem)
            .transpose()?;

        let identity = match (&config.certificate_file, &config.private_key_file) {
            (Some(cert), Some(key)) => Some((read_pem(cert)?, read_pem(key)?)),
            (None, None) => None,
            _ => {
                return Err(CredentialError::IncompleteIdentity(format!(
                    "{name}: certificate_file과 private_key_file은 함께 지정해야 함"
                )))
            }
        };

        Ok(Self { ca_pem, identity })
    }

    /// 상호 TLS 여부
    pub fn is_mutual(&self) -> bool {
        self.identity.is_some()
    }

    /// 호스트별 tonic TLS 설정 생성
    pub fn client_tls_config(&self, domain_name: &str) -> ClientTlsConfig {
        let mut tls = ClientTlsConfig::new().domain_name(domain_name.to_string());

        tls = match &self.ca_pem {
            Some(pem) => tls.ca_certificate(Certificate::from_pem(pem.clone())),
            None => tls.with_native_roots(),
        };

        if let Some((cert_pem, key_pem)) = &self.identity {
            tls = tls.identity(Identity::from_pem(cert_pem.clone(), key_pem.clone()));
        }

        tls
    }
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("custom_ca", &self.ca_pem.is_some())
            .field("mutual", &self.is_mutual())
            .finish()
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, CredentialError> {
    fs::read(path).map_err(|source| CredentialError::CertificateRead {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================
// 디스커버리 자격증명
// ============================================================

/// 제어 평면이 더 강한 자격증명을 제공하지 않을 때 사용할 자격증명
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackCredentials {
    #[default]
    Insecure,
}

/// 디스커버리 자격증명 생성 옵션
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// bootstrap 위치 (없으면 bootstrap 없이 fallback 사용)
    pub bootstrap: Option<BootstrapSource>,
    /// fallback 자격증명
    pub fallback: FallbackCredentials,
}

/// xDS 디스커버리 기반 자격증명
#[derive(Debug, Clone)]
pub struct DiscoveryCredentials {
    tls: Option<TlsMaterial>,
    fallback: FallbackCredentials,
}

impl DiscoveryCredentials {
    /// bootstrap의 인증서 제공자로 자격증명 생성
    pub fn new(options: DiscoveryOptions) -> Result<Self, CredentialError> {
        let Some(source) = options.bootstrap else {
            debug!("xDS bootstrap 없음, fallback 자격증명 사용");
            return Ok(Self {
                tls: None,
                fallback: options.fallback,
            });
        };

        let bootstrap = source.load()?;
        let tls = match bootstrap.provider() {
            Some((name, provider)) => {
                if provider.plugin_name != FILE_WATCHER_PLUGIN {
                    return Err(CredentialError::UnsupportedProvider(
                        provider.plugin_name.clone(),
                    ));
                }
                let material = TlsMaterial::from_file_watcher(name, &provider.config)?;
                debug!(
                    provider = %name,
                    mutual = material.is_mutual(),
                    "xDS 인증서 제공자 로드"
                );
                Some(material)
            }
            None => {
                debug!("xDS 인증서 제공자 없음, fallback 자격증명 사용");
                None
            }
        };

        Ok(Self {
            tls,
            fallback: options.fallback,
        })
    }

    /// 실제 사용할 TLS 자료 (없으면 fallback)
    pub fn tls(&self) -> Option<&TlsMaterial> {
        self.tls.as_ref()
    }

    /// fallback 사용 여부
    pub fn uses_fallback(&self) -> bool {
        self.tls.is_none()
    }

    /// fallback 자격증명
    pub fn fallback(&self) -> FallbackCredentials {
        self.fallback
    }
}

// ============================================================
// 선택
// ============================================================

/// 연결에 사용할 전송 자격증명
#[derive(Debug, Clone)]
pub enum TransportCredentials {
    /// 인증 없는 평문 전송
    Insecure,
    /// 디스커버리 기반 자격증명
    Discovery(DiscoveryCredentials),
}

impl TransportCredentials {
    /// 우선순위에 따라 자격증명 선택
    ///
    /// 1. 개발 환경 → insecure
    /// 2. `xds://`가 아닌 명시적 주소 → insecure
    /// 3. 그 외 → 디스커버리 자격증명 (insecure fallback)
    pub fn select(
        env: Option<&dyn Environment>,
        target: &Target,
        discovery: DiscoveryOptions,
    ) -> Result<Self, CredentialError> {
        if env.map(|env| env.is_development()).unwrap_or(false) {
            return Ok(TransportCredentials::Insecure);
        }

        if target.scheme() == AddressScheme::ExplicitPlain {
            warn!(
                target = %target,
                "xDS가 아닌 명시적 주소: 비개발 환경에서도 insecure 자격증명 사용"
            );
            return Ok(TransportCredentials::Insecure);
        }

        DiscoveryCredentials::new(discovery).map(TransportCredentials::Discovery)
    }

    /// 연결에 적용할 TLS 자료 (insecure/fallback이면 None)
    pub fn tls(&self) -> Option<&TlsMaterial> {
        match self {
            TransportCredentials::Insecure => None,
            TransportCredentials::Discovery(creds) => creds.tls(),
        }
    }

    /// insecure 자격증명 여부
    pub fn is_insecure(&self) -> bool {
        matches!(self, TransportCredentials::Insecure)
    }
}

impl fmt::Display for TransportCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportCredentials::Insecure => write!(f, "insecure"),
            TransportCredentials::Discovery(creds) if creds.uses_fallback() => {
                write!(f, "xds(fallback=insecure)")
            }
            TransportCredentials::Discovery(creds) if creds.tls().is_some_and(TlsMaterial::is_mutual) => {
                write!(f, "xds(mtls)")
            }
            TransportCredentials::Discovery(_) => write!(f, "xds(tls)"),
        }
    }
}
