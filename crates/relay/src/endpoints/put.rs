//! # POST /service/put
//!
//! セッション認証を通過したファイルをオブジェクトストレージへ中継する。

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::auth::AuthDecision;
use crate::config::RelayState;
use crate::error::RelayError;
use crate::object_key::UploadRequest;
use crate::storage::PutObject;

/// アップロード結果のレスポンスボディ
#[derive(Debug, serde::Serialize)]
pub struct PutResponse {
    pub ok: bool,
}

/// POST /service/put — 認証してからストレージへPUT。
///
/// 1. ボディ全体をメモリに読み込む（失敗時は500 + テキスト）
/// 2. `x-session-id` を認証サービスで検証（拒否・障害ともに401）
/// 3. `destination/fileName.fileExt` へ1回だけ書き込む（失敗時は500 `{"ok": false}`）
/// 4. 成功時は201 `{"ok": true}`
///
/// クライアントが切断するとこのFutureごと破棄され、読み込みと書き込みも中断される。
pub async fn handle_put(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<PutResponse>), RelayError> {
    let file_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| RelayError::BodyRead(e.to_string()))?;

    let request = UploadRequest::from_parts(&headers, file_bytes);

    match state.verifier.check_authorization(&request.session_id).await {
        AuthDecision::Authorized => {}
        AuthDecision::Denied => {
            tracing::info!("セッションが拒否されました");
            return Err(RelayError::Unauthorized);
        }
        AuthDecision::Unavailable(reason) => {
            tracing::warn!(error = %reason, "認証サービスに問い合わせできません（未認証として扱う）");
            return Err(RelayError::Unauthorized);
        }
    }

    let object = PutObject {
        content_type: state.content_type_policy.content_type(&request.file_ext),
        file_name: request.file_name_with_extension(),
        destination: request.destination,
        bytes: request.file_bytes,
    };
    let object_key = object.key();
    let size = object.bytes.len();

    let result = match tokio::time::timeout(state.storage_timeout, state.storage.put(object)).await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e @ RelayError::Storage(_))) => Err(e),
        Ok(Err(other)) => Err(RelayError::Storage(other.to_string())),
        Err(_) => Err(RelayError::StorageTimeout(state.storage_timeout.as_secs())),
    };
    if let Err(e) = result {
        tracing::error!(object_key = %object_key, error = %e, "ストレージ書き込みに失敗");
        return Err(e);
    }

    tracing::info!(object_key = %object_key, size, "アップロード完了");
    Ok((StatusCode::CREATED, Json(PutResponse { ok: true })))
}
