//! # Upload Relay
//!
//! ブラウザからのファイルをセッション認証の上でオブジェクトストレージへ中継するサーバー。
//!
//! ## 役割
//! - セッション認証（メインサービスへの問い合わせ、フェイルクローズ）
//! - 保存先キーとContent-Typeの導出
//! - S3互換ストレージへの単一PUT
//!
//! ## API エンドポイント
//! - `POST /service/put` — 認証してからストレージへ書き込み

mod auth;
mod config;
mod endpoints;
mod error;
mod object_key;
mod storage;

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::auth::HttpSessionVerifier;
use crate::config::{RelayConfig, RelayState};
use crate::endpoints::handle_put;
use crate::object_key::{DESTINATION_HEADER, FILE_EXT_HEADER, FILE_NAME_HEADER};
use crate::storage::ObjectStorage;

/// ルーターを構築する。
fn router(state: Arc<RelayState>) -> axum::Router {
    axum::Router::new()
        .route("/service/put", axum::routing::post(handle_put))
        .with_state(state)
}

/// 許可オリジン一覧からCORSレイヤーを構築する。
///
/// 資格情報付きリクエストを許可するため、メソッドとヘッダーは明示的に列挙する。
fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            if origin == "*" {
                anyhow::bail!("資格情報付きCORSではワイルドカードオリジンは使えません");
            }
            HeaderValue::from_str(origin)
                .map_err(|e| anyhow::anyhow!("不正なCORSオリジンです ({origin}): {e}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            HeaderName::from_static(FILE_NAME_HEADER),
            HeaderName::from_static(FILE_EXT_HEADER),
            HeaderName::from_static(DESTINATION_HEADER),
            HeaderName::from_static(auth::SESSION_HEADER),
        ]))
}

#[cfg(feature = "vendor-s3")]
fn build_storage(config: &RelayConfig) -> anyhow::Result<Box<dyn ObjectStorage>> {
    Ok(Box::new(storage::S3ObjectStorage::from_config(&config.storage)?))
}

#[cfg(not(feature = "vendor-s3"))]
fn build_storage(_config: &RelayConfig) -> anyhow::Result<Box<dyn ObjectStorage>> {
    anyhow::bail!("ストレージバックエンドが有効になっていません（feature \"vendor-s3\" が必要です）")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env はロガー初期化前に読む（RUST_LOG を含む場合があるため）
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), ".envを読み込みました"),
        Err(e) if e.not_found() => tracing::warn!(".envが見つかりません。環境変数のみを使用します"),
        Err(e) => return Err(e.into()),
    }

    let config = RelayConfig::from_env()?;

    // 認証サービス呼び出しにはタイムアウトを必ず設定する
    let http_client = reqwest::Client::builder()
        .timeout(config.auth_timeout)
        .build()?;
    let verifier = HttpSessionVerifier::new(http_client, &config.main_service_url)?;
    tracing::info!(endpoint = %verifier.endpoint(), "認証サービスを設定");

    let state = Arc::new(RelayState {
        verifier: Box::new(verifier),
        storage: build_storage(&config)?,
        content_type_policy: config.content_type_policy,
        storage_timeout: config.storage_timeout,
    });

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_allowed_origins)?);

    tracing::info!("Upload Relayを {} で起動します", config.listen_addr);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// テスト
// ---------------------------------------------------------------------------
