//! # Relay エラー型
//!
//! リクエスト処理で発生するエラーと、HTTPレスポンスへの変換。
//! クライアントには粗いステータスと `ok` フラグのみを返す。

use axum::http::StatusCode;
use axum::Json;

/// Relayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// リクエストボディ（ファイルバッファ）の読み取りに失敗
    #[error("リクエストボディの読み取りに失敗: {0}")]
    BodyRead(String),
    /// セッション認証の拒否、または認証サービスの障害（フェイルクローズ）
    #[error("認証されていません")]
    Unauthorized,
    /// ストレージへの書き込みに失敗
    #[error("ストレージ書き込みに失敗: {0}")]
    Storage(String),
    /// ストレージへの書き込みがタイムアウト
    #[error("ストレージ書き込みがタイムアウトしました ({0}秒)")]
    StorageTimeout(u64),
    /// 設定不備
    #[error("設定エラー: {0}")]
    Config(String),
}

impl axum::response::IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        match &self {
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            RelayError::Storage(_) | RelayError::StorageTimeout(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "ok": false })),
            )
                .into_response(),
            RelayError::BodyRead(_) | RelayError::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        }
    }
}
