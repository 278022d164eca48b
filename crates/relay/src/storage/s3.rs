//! # S3互換オブジェクトストレージ実装
//!
//! Yandex Object Storage, AWS S3, MinIO 等のS3互換APIを使用する実装。

use super::{ObjectStorage, PutObject};
use crate::config::StorageConfig;
use crate::error::RelayError;

/// バケット所有者の検証ヘッダー
const EXPECTED_BUCKET_OWNER_HEADER: &str = "x-amz-expected-bucket-owner";

/// S3互換ストレージへの書き込み実装。
pub struct S3ObjectStorage {
    bucket: s3::Bucket,
}

impl S3ObjectStorage {
    pub fn new(bucket: s3::Bucket) -> Self {
        Self { bucket }
    }

    /// 設定からS3互換バケットを初期化する。
    /// 所有者IDはすべてのリクエストに付与する。
    fn init_bucket(config: &StorageConfig) -> anyhow::Result<s3::Bucket> {
        let region = s3::Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let credentials = s3::creds::Credentials::new(
            Some(config.access_key.as_str()),
            Some(config.secret_key.as_str()),
            None,
            None,
            None,
        )?;

        axum::http::HeaderValue::from_str(&config.owner_id)
            .map_err(|e| anyhow::anyhow!("BUCKET_OWNER_IDがヘッダー値として不正です: {e}"))?;

        let mut bucket = *s3::Bucket::new(&config.bucket, region, credentials)?.with_path_style();
        bucket.add_header(EXPECTED_BUCKET_OWNER_HEADER, &config.owner_id);

        Ok(bucket)
    }

    /// 起動時に読み込んだ設定から構築する。
    pub fn from_config(config: &StorageConfig) -> anyhow::Result<Self> {
        tracing::info!(
            s3_endpoint = %config.endpoint,
            s3_bucket = %config.bucket,
            "S3互換ストレージを設定"
        );
        Ok(Self::new(Self::init_bucket(config)?))
    }
}

#[async_trait::async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn put(&self, object: PutObject) -> Result<(), RelayError> {
        let key = object.key();
        let response = self
            .bucket
            .put_object_with_content_type(&key, &object.bytes, &object.content_type)
            .await
            .map_err(|e| RelayError::Storage(format!("PUT送信失敗 ({key}): {e}")))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(RelayError::Storage(format!(
                "ストレージがエラーを返しました: HTTP {} ({key}) - {}",
                status,
                String::from_utf8_lossy(response.as_slice())
            )));
        }

        Ok(())
    }
}
