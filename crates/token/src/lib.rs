//! # CDP SQL Shim トークン署名
//!
//! リモートクエリAPIの呼び出しごとに短命のBearerトークンを発行する。
//!
//! ## 署名方式
//! | 方式 | `alg` | 鍵素材 | スコープクレーム |
//! |------|-------|--------|----------------|
//! | ECDSA P-256 | `ES256` | PEM（PKCS#8 または SEC1） | `uri`（文字列） |
//! | Ed25519 | `EdDSA` | Base64（seed 32 + 公開鍵 32 バイト） | `uris`（配列） |
//!
//! 方式は設定で静的に決まる。鍵素材の形から推測することはしない。
//!
//! ## トークン形式
//! `base64url(header) . base64url(claims) . base64url(signature)`（パディングなし）

use std::fmt;
use std::str::FromStr;

mod keys;
mod token;

pub use keys::{decode_ed25519_key, decode_es256_key};
pub use token::{
    decode_unverified, format_scope, generate_nonce, sign, sign_at, TokenClaims, TokenHeader,
};

/// `iss` クレームの固定値
pub const ISSUER: &str = "cdp";

/// トークンの有効期間（秒）。`exp - nbf` は常にこの値になる。
pub const TOKEN_LIFETIME_SECS: u64 = 120;

/// ヘッダの `typ`
pub const TOKEN_TYPE: &str = "JWT";

/// トークン署名のエラー型
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// 鍵素材を方式の期待する形にデコードできない
    #[error("鍵素材が不正です: {0}")]
    InvalidKeyMaterial(String),
    /// 署名処理そのものが失敗した
    #[error("トークンの署名に失敗しました: {0}")]
    SigningFailure(String),
    /// トークン文字列の構造が不正（デコード時のみ）
    #[error("トークンの形式が不正です: {0}")]
    MalformedToken(String),
}

/// 署名方式。デプロイごとに1つを設定で選ぶ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScheme {
    /// ECDSA P-256 + SHA-256
    Es256,
    /// Ed25519
    Ed25519,
}

impl KeyScheme {
    /// ヘッダの `alg` に入る値
    pub fn algorithm(&self) -> &'static str {
        match self {
            KeyScheme::Es256 => "ES256",
            KeyScheme::Ed25519 => "EdDSA",
        }
    }
}

impl fmt::Display for KeyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.algorithm())
    }
}

impl FromStr for KeyScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "es256" | "ecdsa" => Ok(KeyScheme::Es256),
            "eddsa" | "ed25519" => Ok(KeyScheme::Ed25519),
            other => Err(format!(
                "未知の署名方式です: {other}（es256 または ed25519 を指定してください）"
            )),
        }
    }
}
