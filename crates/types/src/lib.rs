//! # CDP SQL Shim 共有型定義
//!
//! 呼び出し元・Shim・リモートクエリAPIの間でやり取りされるJSON構造を提供する。
//!
//! ## エンコーディング規則
//! - フィールド名: camelCase（`maxAgeMs` 等、リモートAPIの表記に合わせる）
//! - リモートAPIのレスポンス本体は型付けせず、バイト列のまま中継する

use serde::{Deserialize, Serialize};

/// キャッシュヒントを省略した場合の `maxAgeMs`（ミリ秒）
pub const DEFAULT_CACHE_MAX_AGE_MS: u64 = 5000;

/// 非JSONレスポンスのプレビューとして保持する最大文字数
pub const PREVIEW_MAX_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// 受信リクエスト
// ---------------------------------------------------------------------------

/// 呼び出し元から受け取るクエリリクエスト。
///
/// `sql` の欠落はデシリアライズ失敗ではなくクライアントエラーとして扱うため、
/// `Option` で受ける。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    /// 実行するSQL文
    #[serde(default)]
    pub sql: Option<String>,
    /// キャッシュ制御ヒント
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheHint>,
}

/// キャッシュ制御ヒント。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHint {
    /// 許容するキャッシュ結果の最大経過時間（ミリ秒）
    pub max_age_ms: u64,
}

impl Default for CacheHint {
    fn default() -> Self {
        Self {
            max_age_ms: DEFAULT_CACHE_MAX_AGE_MS,
        }
    }
}

impl QueryRequest {
    /// 空でないSQL文を返す。欠落・空文字列の場合は `None`。
    pub fn sql_text(&self) -> Option<&str> {
        self.sql.as_deref().filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// 送信リクエスト
// ---------------------------------------------------------------------------

/// リモートクエリAPIへ送信する本文。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundQuery {
    /// 実行するSQL文
    pub sql: String,
    /// キャッシュ制御ヒント（省略時はデフォルト値で補完済み）
    pub cache: CacheHint,
}

impl OutboundQuery {
    /// 受信リクエストから送信本文を組み立てる。`sql` が無ければ `None`。
    pub fn from_request(request: &QueryRequest) -> Option<Self> {
        let sql = request.sql_text()?;
        Some(Self {
            sql: sql.to_string(),
            cache: request.cache.unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// エラーエンベロープ
// ---------------------------------------------------------------------------

/// Shimが返す構造化エラー本文。
///
/// `error` 以外は状況に応じて付与される。鍵素材は決して含めない。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    /// エラーの概要
    pub error: String,
    /// 下位エラーのメッセージ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// 設定方法などの対処ヒント
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// リモートAPIが返したHTTPステータス
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// リモートAPIが返したContent-Type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// 非JSONレスポンス本文の先頭部分
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl ErrorEnvelope {
    /// `error` のみを持つエンベロープを作る。
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Default::default()
        }
    }
}

/// 文字列の先頭 `max_chars` 文字を返す（バイトではなく文字単位）。
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
