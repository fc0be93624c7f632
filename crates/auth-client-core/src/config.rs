//! 클라이언트 설정 구조체.
//!
//! JSON 설정 파일과 환경변수 오버라이드로 구성한다.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;
use crate::ports::environment::Environment;

/// 주소 오버라이드 환경변수
pub const ENV_ADDRESS: &str = "AUTH_CLIENT_ADDRESS";

/// 실행 환경 환경변수
pub const ENV_APP_ENV: &str = "APP_ENV";

/// xDS bootstrap 파일 경로 환경변수 (gRPC 표준)
pub const ENV_XDS_BOOTSTRAP: &str = "GRPC_XDS_BOOTSTRAP";

// ============================================================
// 실행 환경
// ============================================================

/// 실행 환경
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    /// 로컬 개발
    #[serde(alias = "dev", alias = "local")]
    Development,
    /// 스테이징
    #[serde(alias = "stage")]
    Staging,
    /// 운영
    #[serde(alias = "prod")]
    Production,
}

impl Environment for AppEnv {
    fn is_development(&self) -> bool {
        matches!(self, AppEnv::Development)
    }
}

impl FromStr for AppEnv {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(AppEnv::Development),
            "staging" | "stage" => Ok(AppEnv::Staging),
            "production" | "prod" => Ok(AppEnv::Production),
            other => Err(CoreError::Validation {
                field: "env".to_string(),
                message: format!("알 수 없는 실행 환경: {other}"),
            }),
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppEnv::Development => write!(f, "development"),
            AppEnv::Staging => write!(f, "staging"),
            AppEnv::Production => write!(f, "production"),
        }
    }
}

// ============================================================
// 클라이언트 설정
// ============================================================

/// 인증 서비스 클라이언트 설정
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClientConfig {
    /// 명시적 서버 주소 (비어 있으면 서비스 디스커버리 기본 주소 사용)
    #[serde(default)]
    pub address_name: String,

    /// 실행 환경 (없으면 비개발 환경으로 간주)
    #[serde(default)]
    pub env: Option<AppEnv>,

    /// 연결 타임아웃 (초)
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,

    /// 요청 타임아웃 (초)
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// 생성 시점에 연결 수립까지 대기할지 여부 (false면 첫 호출 때 연결)
    #[serde(default)]
    pub block_on_connect: bool,

    /// 백엔드 주소 재해석 주기 (초, 없으면 30초)
    #[serde(default)]
    pub resolve_interval_secs: Option<u64>,

    /// xDS bootstrap 파일 경로 (없으면 `GRPC_XDS_BOOTSTRAP` 사용)
    #[serde(default)]
    pub xds_bootstrap_path: Option<String>,
}

impl AuthClientConfig {
    /// 파일에서 설정 로드
    pub fn load_from_file(path: &Path) -> Result<Self, CoreError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("설정 파일 읽기 실패: {}: {}", path.display(), e))
        })?;

        let config: AuthClientConfig = serde_json::from_str(&content).map_err(|e| {
            CoreError::Config(format!("설정 파일 파싱 실패: {}: {}", path.display(), e))
        })?;

        config.validate()?;
        debug!("설정 파일 로드 완료: {}", path.display());
        Ok(config)
    }

    /// 프로세스 환경변수로 오버라이드
    pub fn apply_env_overrides(&mut self) -> Result<(), CoreError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// 조회 함수로 오버라이드 (테스트에서 환경변수 대신 사용)
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup(ENV_ADDRESS) {
            debug!(address = %address, "주소 오버라이드");
            self.address_name = address;
        }

        if let Some(env) = lookup(ENV_APP_ENV).filter(|value| !value.trim().is_empty()) {
            self.env = Some(env.parse()?);
        }

        if let Some(path) = lookup(ENV_XDS_BOOTSTRAP).filter(|value| !value.trim().is_empty()) {
            self.xds_bootstrap_path = Some(path);
        }

        self.validate()
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.connect_timeout_secs == Some(0) {
            return Err(CoreError::Config(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout_secs == Some(0) {
            return Err(CoreError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.resolve_interval_secs == Some(0) {
            return Err(CoreError::Config(
                "resolve_interval_secs must be greater than 0".to_string(),
            ));
        }

        if let Some(path) = self.xds_bootstrap_path.as_deref() {
            if path.trim().is_empty() {
                return Err(CoreError::Config(
                    "xds_bootstrap_path must not be blank".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// 개발 환경 여부
    pub fn is_development(&self) -> bool {
        self.env.map(|env| env.is_development()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_app_env_aliases() {
        assert_eq!("dev".parse::<AppEnv>().unwrap(), AppEnv::Development);
        assert_eq!("Production".parse::<AppEnv>().unwrap(), AppEnv::Production);
        assert_eq!(" stage ".parse::<AppEnv>().unwrap(), AppEnv::Staging);
        assert!("qa".parse::<AppEnv>().is_err());
    }

    #[test]
    fn load_config_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("auth-client.json");
        fs::write(
            &path,
            r#"{"address_name": "xds://cluster/svc", "env": "prod", "connect_timeout_secs": 5}"#,
        )
        .unwrap();

        let config = AuthClientConfig::load_from_file(&path).unwrap();
        assert_eq!(config.address_name, "xds://cluster/svc");
        assert_eq!(config.env, Some(AppEnv::Production));
        assert_eq!(config.connect_timeout_secs, Some(5));
        assert!(!config.block_on_connect);
        assert!(!config.is_development());
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = AuthClientConfig::load_from_file(&temp_dir.path().join("none.json"));
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = AuthClientConfig {
            address_name: "localhost:9000".to_string(),
            env: Some(AppEnv::Production),
            ..Default::default()
        };

        config
            .apply_overrides_from(lookup_from(&[
                (ENV_ADDRESS, ""),
                (ENV_APP_ENV, "dev"),
                (ENV_XDS_BOOTSTRAP, "/etc/xds/bootstrap.json"),
            ]))
            .unwrap();

        // 빈 주소 오버라이드는 기본 디스커버리 주소를 선택하기 위한 값
        assert!(config.address_name.is_empty());
        assert!(config.is_development());
        assert_eq!(
            config.xds_bootstrap_path.as_deref(),
            Some("/etc/xds/bootstrap.json")
        );
    }

    #[test]
    fn invalid_env_override_is_rejected() {
        let mut config = AuthClientConfig::default();
        let result = config.apply_overrides_from(lookup_from(&[(ENV_APP_ENV, "qa")]));
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let config = AuthClientConfig {
            connect_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AuthClientConfig {
            request_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AuthClientConfig {
            resolve_interval_secs: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
