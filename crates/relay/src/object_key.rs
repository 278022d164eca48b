//! # アップロード要求とオブジェクトキー導出
//!
//! リクエストヘッダーから `UploadRequest` を組み立て、
//! ストレージのオブジェクトキーとContent-Typeを導出する。

use axum::body::Bytes;
use axum::http::HeaderMap;

use crate::auth::SESSION_HEADER;

/// ファイル名（拡張子なし）を運ぶヘッダー
pub const FILE_NAME_HEADER: &str = "x-file-name";
/// 拡張子を運ぶヘッダー
pub const FILE_EXT_HEADER: &str = "x-file-ext";
/// 保存先プレフィックスを運ぶヘッダー
pub const DESTINATION_HEADER: &str = "x-destination";

/// 固定Content-Typeモードで使う値
pub const FIXED_CONTENT_TYPE: &str = "image/png";

/// 拡張子から判別できない場合のContent-Type
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// 1リクエスト分のアップロード要求。リクエスト終了とともに破棄される。
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// ファイル本体（空でもよい）
    pub file_bytes: Bytes,
    pub file_name: String,
    pub file_ext: String,
    /// 保存先のパス/プレフィックス
    pub destination: String,
    /// 認証サービスに渡す不透明なトークン
    pub session_id: String,
}

impl UploadRequest {
    /// ヘッダーとボディから組み立てる。
    ///
    /// 存在しないヘッダーのみ空文字列になる。非ASCIIの値はUTF-8として読み、
    /// 不正なバイト列は置換文字に置き換える。値の検証は行わない。
    pub fn from_parts(headers: &HeaderMap, file_bytes: Bytes) -> Self {
        Self {
            file_bytes,
            file_name: header_or_empty(headers, FILE_NAME_HEADER),
            file_ext: header_or_empty(headers, FILE_EXT_HEADER),
            destination: header_or_empty(headers, DESTINATION_HEADER),
            session_id: header_or_empty(headers, SESSION_HEADER),
        }
    }

    /// `fileName + "." + fileExt`。拡張子が空なら末尾がドットになる。
    pub fn file_name_with_extension(&self) -> String {
        format!("{}.{}", self.file_name, self.file_ext)
    }

    /// 保存先とファイル名を結合したオブジェクトキー
    pub fn object_key(&self) -> String {
        object_key(&self.destination, &self.file_name_with_extension())
    }
}

fn header_or_empty(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}

/// 保存先プレフィックスとファイル名を `/` で結合する。
///
/// プレフィックス末尾の `/` は取り除く。プレフィックスが空ならファイル名のみ。
pub fn object_key(destination: &str, file_name_with_extension: &str) -> String {
    let prefix = destination.trim_end_matches('/');
    if prefix.is_empty() {
        file_name_with_extension.to_string()
    } else {
        format!("{prefix}/{file_name_with_extension}")
    }
}

/// Content-Typeの決め方。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentTypePolicy {
    /// 拡張子に関係なく常に `image/png`（既存クライアントとの互換動作）
    #[default]
    Fixed,
    /// 拡張子から推定する
    ByExtension,
}

impl ContentTypePolicy {
    /// `CONTENT_TYPE_MODE` の値を解釈する。
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed" => Some(Self::Fixed),
            "extension" => Some(Self::ByExtension),
            _ => None,
        }
    }

    pub fn content_type(&self, file_ext: &str) -> String {
        match self {
            ContentTypePolicy::Fixed => FIXED_CONTENT_TYPE.to_string(),
            ContentTypePolicy::ByExtension => mime_guess::from_ext(file_ext)
                .first_raw()
                .unwrap_or(FALLBACK_CONTENT_TYPE)
                .to_string(),
        }
    }
}
