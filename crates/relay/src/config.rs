//! # Relay設定・共有状態
//!
//! 環境変数からの設定読み込みと、ハンドラに注入する共有状態の定義。
//! 設定は起動時に一度だけ読み込む（ホットリロードなし）。

use std::time::Duration;

use anyhow::Context;

use crate::auth::{session_endpoint, SessionVerifier};
use crate::object_key::ContentTypePolicy;
use crate::storage::ObjectStorage;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5001";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000";
const DEFAULT_S3_ENDPOINT: &str = "https://storage.yandexcloud.net";
const DEFAULT_S3_REGION: &str = "ru-central1";
const DEFAULT_S3_BUCKET: &str = "zharpizza-bucket";
const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STORAGE_TIMEOUT_SECS: u64 = 60;

/// S3互換ストレージの接続設定。
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// `BUCKET_OWNER_ID`
    pub owner_id: String,
}

/// プロセス全体の設定。
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// 認証サービス（メインサービス）のベースURL
    pub main_service_url: String,
    pub listen_addr: String,
    /// CORSで許可するブラウザオリジン
    pub cors_allowed_origins: Vec<String>,
    /// 認証サービス呼び出しのタイムアウト
    pub auth_timeout: Duration,
    /// ストレージ書き込みのタイムアウト
    pub storage_timeout: Duration,
    pub content_type_policy: ContentTypePolicy,
    pub storage: StorageConfig,
}

impl RelayConfig {
    /// プロセスの環境変数から読み込む。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー参照関数から読み込む。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| -> anyhow::Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("環境変数 {key} が未設定です"))
        };
        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let secs = |key: &str, default: u64| -> anyhow::Result<Duration> {
            match lookup(key) {
                Some(v) => {
                    let n: u64 = v
                        .trim()
                        .parse()
                        .with_context(|| format!("{key} は秒数（整数）である必要があります: {v}"))?;
                    // 0秒ではすべてのリクエストが失敗する
                    anyhow::ensure!(n > 0, "{key} は1以上である必要があります: {v}");
                    Ok(Duration::from_secs(n))
                }
                None => Ok(Duration::from_secs(default)),
            }
        };

        let main_service_url = required("MAIN_SERVICE_URL")?;
        // 不正なURLは起動時点で拒否する
        session_endpoint(&main_service_url)?;

        let content_type_policy = match lookup("CONTENT_TYPE_MODE") {
            Some(mode) => ContentTypePolicy::parse(&mode).with_context(|| {
                format!("CONTENT_TYPE_MODE は fixed または extension である必要があります: {mode}")
            })?,
            None => ContentTypePolicy::default(),
        };

        let cors_allowed_origins = or_default("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ORIGINS)
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            main_service_url,
            listen_addr: or_default("LISTEN_ADDR", DEFAULT_LISTEN_ADDR),
            cors_allowed_origins,
            auth_timeout: secs("AUTH_TIMEOUT_SECS", DEFAULT_AUTH_TIMEOUT_SECS)?,
            storage_timeout: secs("STORAGE_TIMEOUT_SECS", DEFAULT_STORAGE_TIMEOUT_SECS)?,
            content_type_policy,
            storage: StorageConfig {
                endpoint: or_default("S3_ENDPOINT", DEFAULT_S3_ENDPOINT),
                region: or_default("S3_REGION", DEFAULT_S3_REGION),
                bucket: or_default("S3_BUCKET", DEFAULT_S3_BUCKET),
                access_key: required("AWS_ACCESS_KEY_ID")?,
                secret_key: required("AWS_SECRET_ACCESS_KEY")?,
                owner_id: required("BUCKET_OWNER_ID")?,
            },
        })
    }
}

/// ハンドラに注入する共有状態。
///
/// リクエスト間で可変状態は共有しない。
pub struct RelayState {
    /// セッション認証ゲート
    pub verifier: Box<dyn SessionVerifier>,
    /// アップロード先ストレージ
    pub storage: Box<dyn ObjectStorage>,
    pub content_type_policy: ContentTypePolicy,
    pub storage_timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        let mut map: HashMap<String, String> = [
            ("MAIN_SERVICE_URL", "http://main:8000"),
            ("BUCKET_OWNER_ID", "owner-1"),
            ("AWS_ACCESS_KEY_ID", "ak"),
            ("AWS_SECRET_ACCESS_KEY", "sk"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.to_string());
        }
        map
    }

    fn load(map: &HashMap<String, String>) -> anyhow::Result<RelayConfig> {
        RelayConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&env(&[])).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:5001");
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.auth_timeout, Duration::from_secs(10));
        assert_eq!(config.storage_timeout, Duration::from_secs(60));
        assert_eq!(config.content_type_policy, ContentTypePolicy::Fixed);
        assert_eq!(config.storage.bucket, "zharpizza-bucket");
        assert_eq!(config.storage.region, "ru-central1");
        assert_eq!(config.storage.owner_id, "owner-1");
    }

    #[test]
    fn test_overrides() {
        let config = load(&env(&[
            ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ("AUTH_TIMEOUT_SECS", "3"),
            ("CONTENT_TYPE_MODE", "extension"),
            ("S3_BUCKET", "other"),
        ]))
        .unwrap();
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.auth_timeout, Duration::from_secs(3));
        assert_eq!(config.content_type_policy, ContentTypePolicy::ByExtension);
        assert_eq!(config.storage.bucket, "other");
    }

    #[test]
    fn test_missing_required() {
        let mut map = env(&[]);
        map.remove("BUCKET_OWNER_ID");
        let err = load(&map).unwrap_err();
        assert!(err.to_string().contains("BUCKET_OWNER_ID"));

        let err = load(&env(&[("MAIN_SERVICE_URL", "")])).unwrap_err();
        assert!(err.to_string().contains("MAIN_SERVICE_URL"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(load(&env(&[("MAIN_SERVICE_URL", "::not-a-url")])).is_err());
        assert!(load(&env(&[("STORAGE_TIMEOUT_SECS", "soon")])).is_err());
        assert!(load(&env(&[("CONTENT_TYPE_MODE", "sniff")])).is_err());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let err = load(&env(&[("AUTH_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(err.to_string().contains("AUTH_TIMEOUT_SECS"));
        let err = load(&env(&[("STORAGE_TIMEOUT_SECS", " 0 ")])).unwrap_err();
        assert!(err.to_string().contains("STORAGE_TIMEOUT_SECS"));
        assert!(load(&env(&[("STORAGE_TIMEOUT_SECS", "1")])).is_ok());
    }
}
