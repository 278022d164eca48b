//! # オブジェクトストレージ
//!
//! アップロード先ストレージの抽象インターフェース。
//! S3互換ストレージ実装は `s3` サブモジュールを参照。

#[cfg(feature = "vendor-s3")]
pub mod s3;

#[cfg(feature = "vendor-s3")]
pub use s3::S3ObjectStorage;

use axum::body::Bytes;

use crate::error::RelayError;

/// 1回分の書き込み内容。
#[derive(Debug, Clone)]
pub struct PutObject {
    pub content_type: String,
    /// `fileName.fileExt`
    pub file_name: String,
    /// 保存先プレフィックス
    pub destination: String,
    pub bytes: Bytes,
}

impl PutObject {
    /// 保存先とファイル名から導出したオブジェクトキー
    pub fn key(&self) -> String {
        crate::object_key::object_key(&self.destination, &self.file_name)
    }
}

/// オブジェクトストレージの抽象インターフェース。
///
/// 同一キーへの書き込みは重複排除しない。上書きの可否はバックエンドに従う。
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// オブジェクトを1回のPUTで書き込む。
    async fn put(&self, object: PutObject) -> Result<(), RelayError>;
}
