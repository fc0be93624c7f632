//! 연결 대상 주소 결정
//!
//! 명시적 주소와 서비스 디스커버리 기본 주소 중 하나를 고르고,
//! 주소 형태를 한 번만 분류해 이후 단계(자격증명 선택, 다이얼)에서 재사용한다.

use std::fmt;

use thiserror::Error;

/// 명시적 주소가 없을 때 사용하는 운영 기본 주소 (디스커버리로 해석)
pub const FALLBACK_TARGET: &str = "todo-service.svc.cluster.local:8443";

/// xDS 디스커버리 주소 접두사
pub const XDS_SCHEME_PREFIX: &str = "xds://";

/// 포트가 생략된 경우의 기본 포트 (gRPC DNS resolver 기본값)
pub const DEFAULT_PORT: u16 = 443;

/// 주소 형태 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressScheme {
    /// 호출자가 지정한 일반 주소 (`host:port`, `http://host:port`)
    ExplicitPlain,
    /// 호출자가 지정한 `xds://` 주소
    ExplicitDiscovery,
    /// 주소 미지정 → 기본 디스커버리 주소
    DefaultDiscovery,
}

impl AddressScheme {
    /// 디스커버리 기반 주소 여부
    pub fn is_discovery(self) -> bool {
        matches!(
            self,
            AddressScheme::ExplicitDiscovery | AddressScheme::DefaultDiscovery
        )
    }
}

/// 주소 해석 에러
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("호스트가 비어 있는 주소: {0}")]
    EmptyHost(String),

    #[error("잘못된 포트: {0}")]
    InvalidPort(String),

    #[error("IPv6 주소는 대괄호로 감싸야 함 ([::1]:443): {0}")]
    UnbracketedIpv6(String),
}

/// 연결 대상
///
/// 생성 시 한 번 계산되며 저장되지 않는다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    address: String,
    scheme: AddressScheme,
}

impl Target {
    /// 주소 결정
    ///
    /// 비어 있지 않은 명시적 주소는 변형 없이(trim 없이) 그대로 사용한다.
    pub fn resolve(address_name: Option<&str>) -> Self {
        match address_name.filter(|address| !address.is_empty()) {
            Some(address) => {
                let scheme = if address.starts_with(XDS_SCHEME_PREFIX) {
                    AddressScheme::ExplicitDiscovery
                } else {
                    AddressScheme::ExplicitPlain
                };
                Self {
                    address: address.to_string(),
                    scheme,
                }
            }
            None => Self {
                address: FALLBACK_TARGET.to_string(),
                scheme: AddressScheme::DefaultDiscovery,
            },
        }
    }

    /// 대상 주소 원문
    pub fn address(&self) -> &str {
        &self.address
    }

    /// 주소 형태
    pub fn scheme(&self) -> AddressScheme {
        self.scheme
    }

    /// 이름 해석에 사용할 `host[:port]` 부분
    ///
    /// - `xds://authority/service` → `service`
    /// - `xds:///service:port` → `service:port`
    /// - `http(s)://host:port/` → `host:port`
    pub fn authority(&self) -> &str {
        match self.scheme {
            AddressScheme::ExplicitDiscovery => {
                let rest = self
                    .address
                    .strip_prefix(XDS_SCHEME_PREFIX)
                    .unwrap_or(&self.address);
                match rest.split_once('/') {
                    Some((_, service)) => service.trim_end_matches('/'),
                    None => rest,
                }
            }
            AddressScheme::ExplicitPlain => {
                let rest = self
                    .address
                    .strip_prefix("http://")
                    .or_else(|| self.address.strip_prefix("https://"))
                    .unwrap_or(&self.address);
                rest.trim_end_matches('/')
            }
            AddressScheme::DefaultDiscovery => &self.address,
        }
    }

    /// 호스트와 포트 분리
    pub fn host_port(&self) -> Result<(&str, u16), TargetError> {
        let authority = self.authority();

        let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
            // IPv6 리터럴: [::1]:9000
            match rest.split_once(']') {
                Some((host, "")) => (host, None),
                Some((host, port)) => (host, Some(port.trim_start_matches(':'))),
                None => return Err(TargetError::EmptyHost(self.address.clone())),
            }
        } else {
            if authority.matches(':').count() > 1 {
                return Err(TargetError::UnbracketedIpv6(self.address.clone()));
            }
            match authority.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };

        if host.is_empty() {
            return Err(TargetError::EmptyHost(self.address.clone()));
        }

        let port = match port {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| TargetError::InvalidPort(self.address.clone()))?,
            None => DEFAULT_PORT,
        };

        Ok((host, port))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}
