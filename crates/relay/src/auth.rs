//! # セッション認証ゲート
//!
//! 外部の認証サービス（メインサービス）にセッションIDを問い合わせ、
//! アップロードを許可するかどうかを判定する。
//!
//! 判定はリクエストごとに行い、キャッシュしない。
//! 通信失敗・レスポンス不正はすべて「未認証」として扱う（フェイルクローズ）。

use crate::error::RelayError;

/// 認証サービスのセッション確認エンドポイントのパス
pub const SESSION_ME_PATH: &str = "/api/v1/users/service/me";

/// セッションIDを運ぶHTTPヘッダー名
pub const SESSION_HEADER: &str = "x-session-id";

/// 認証判定の結果。
///
/// `Denied` と `Unavailable` はどちらも401になるが、
/// ログとテストで「拒否」と「認証サービス障害」を区別するために分けている。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// 認証サービスが `ok: true` を返した
    Authorized,
    /// 認証サービスが `ok: false` を返した、または `ok` が欠落していた
    Denied,
    /// 認証サービスへの問い合わせ自体が失敗した（通信失敗、タイムアウト、デコード失敗）
    Unavailable(String),
}

impl AuthDecision {
    /// アップロードを許可してよいか。`Authorized` のみ true。
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthDecision::Authorized)
    }
}

/// セッション認証の抽象インターフェース。
///
/// 本番では [`HttpSessionVerifier`]、テストではスクリプト化した実装を注入する。
#[async_trait::async_trait]
pub trait SessionVerifier: Send + Sync {
    /// セッションIDを検証する。空文字列もそのまま認証サービスに渡す。
    async fn check_authorization(&self, session_id: &str) -> AuthDecision;
}

/// 認証サービスのレスポンス。`ok` が無い場合は false とみなす。
#[derive(Debug, serde::Deserialize)]
struct AuthResponse {
    #[serde(default)]
    ok: bool,
}

/// HTTP経由でメインサービスに問い合わせる認証ゲート実装。
pub struct HttpSessionVerifier {
    /// HTTPクライアント（タイムアウト設定済み）
    http_client: reqwest::Client,
    /// `{MAIN_SERVICE_URL}/api/v1/users/service/me`
    endpoint: reqwest::Url,
}

impl HttpSessionVerifier {
    /// ベースURLから構築する。
    ///
    /// URLは起動時にここで検証する。不正なURLのままリクエストを送出することはない。
    pub fn new(http_client: reqwest::Client, main_service_url: &str) -> Result<Self, RelayError> {
        Ok(Self {
            http_client,
            endpoint: session_endpoint(main_service_url)?,
        })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

/// メインサービスのベースURLとセッション確認パスを結合する。
pub fn session_endpoint(main_service_url: &str) -> Result<reqwest::Url, RelayError> {
    let url = format!("{}{}", main_service_url.trim_end_matches('/'), SESSION_ME_PATH);
    reqwest::Url::parse(&url)
        .map_err(|e| RelayError::Config(format!("MAIN_SERVICE_URLが不正です ({url}): {e}")))
}

#[async_trait::async_trait]
impl SessionVerifier for HttpSessionVerifier {
    async fn check_authorization(&self, session_id: &str) -> AuthDecision {
        let response = match self
            .http_client
            .get(self.endpoint.clone())
            .header(SESSION_HEADER, session_id)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return AuthDecision::Unavailable(format!("HTTP送信失敗: {e}")),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return AuthDecision::Unavailable(format!("レスポンス読み取り失敗: {e}")),
        };

        match serde_json::from_str::<AuthResponse>(&body) {
            Ok(AuthResponse { ok: true }) => AuthDecision::Authorized,
            Ok(AuthResponse { ok: false }) => AuthDecision::Denied,
            Err(e) => AuthDecision::Unavailable(format!(
                "レスポンスのパースに失敗: HTTP {status} - {e}"
            )),
        }
    }
}
