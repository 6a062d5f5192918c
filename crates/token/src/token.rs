//! # トークンの組み立てと署名
//!
//! ヘッダとクレームをそれぞれJSON化してbase64url（パディングなし）でエンコードし、
//! `.` で連結したものを署名入力とする。

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::keys::{decode_ed25519_key, decode_es256_key};
use crate::{KeyScheme, TokenError, ISSUER, TOKEN_LIFETIME_SECS, TOKEN_TYPE};

/// nonceのバイト長（hexで32文字）
const NONCE_LEN: usize = 16;

/// base64urlエンジン（パディングなし）
fn b64url() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
}

/// トークンヘッダ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// 署名アルゴリズム（`ES256` / `EdDSA`）
    pub alg: String,
    /// 鍵識別子
    pub kid: String,
    /// 常に `JWT`
    pub typ: String,
    /// トークンごとの乱数（16バイト、小文字hex）
    pub nonce: String,
}

/// トークンのクレーム。
///
/// スコープは方式によって形が異なる。ES256は `uri`（文字列）、
/// EdDSAは `uris`（配列）を使い、もう一方は出力しない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// 主体（鍵識別子と同じ）
    pub sub: String,
    /// 発行者（常に `cdp`）
    pub iss: String,
    /// 有効開始時刻（UNIX秒）
    pub nbf: u64,
    /// 有効期限（UNIX秒）
    pub exp: u64,
    /// ES256のスコープ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// EdDSAのスコープ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uris: Option<Vec<String>>,
}

impl TokenClaims {
    fn new(
        scheme: KeyScheme,
        key_id: &str,
        scope: String,
        issued_at: u64,
    ) -> Result<Self, TokenError> {
        let exp = issued_at.checked_add(TOKEN_LIFETIME_SECS).ok_or_else(|| {
            TokenError::SigningFailure(format!("有効期限が範囲外です: nbf={issued_at}"))
        })?;
        let (uri, uris) = match scheme {
            KeyScheme::Es256 => (Some(scope), None),
            KeyScheme::Ed25519 => (None, Some(vec![scope])),
        };
        Ok(Self {
            sub: key_id.to_string(),
            iss: ISSUER.to_string(),
            nbf: issued_at,
            exp,
            uri,
            uris,
        })
    }
}

/// スコープ文字列 `"<METHOD> <host>/<path>"` を作る。
///
/// `target` は `host/path` 形式。`path` 側の先頭スラッシュの有無は問わない。
/// `path` が空なら末尾にスラッシュを付けず `"<METHOD> <host>"` になる。
pub fn format_scope(method: &str, host: &str, path: &str) -> String {
    let method = method.to_ascii_uppercase();
    let host = host.trim_end_matches('/');
    match path.trim_start_matches('/') {
        "" => format!("{method} {host}"),
        path => format!("{method} {host}/{path}"),
    }
}

/// 16バイトの暗号論的乱数を小文字hexで返す。
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)
        .map_err(|e| TokenError::SigningFailure(format!("JSONシリアライズに失敗: {e}")))?;
    Ok(b64url().encode(json))
}

/// 現在時刻でトークンを発行する。
///
/// `target` は `host/path`（例: `api.cdp.coinbase.com/platform/v2/data/query/run`）。
pub fn sign(
    key_id: &str,
    key_material: &str,
    scheme: KeyScheme,
    method: &str,
    target: &str,
) -> Result<String, TokenError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| TokenError::SigningFailure(format!("時刻取得失敗: {e}")))?
        .as_secs();
    sign_at(key_id, key_material, scheme, method, target, now)
}

/// 発行時刻を指定してトークンを発行する。
pub fn sign_at(
    key_id: &str,
    key_material: &str,
    scheme: KeyScheme,
    method: &str,
    target: &str,
    issued_at: u64,
) -> Result<String, TokenError> {
    let (host, path) = target.split_once('/').unwrap_or((target, ""));
    let scope = format_scope(method, host, path);

    let header = TokenHeader {
        alg: scheme.algorithm().to_string(),
        kid: key_id.to_string(),
        typ: TOKEN_TYPE.to_string(),
        nonce: generate_nonce(),
    };
    let claims = TokenClaims::new(scheme, key_id, scope, issued_at)?;

    let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&claims)?);

    let signature = match scheme {
        KeyScheme::Es256 => {
            use p256::ecdsa::signature::Signer;
            let key = decode_es256_key(key_material)?;
            // p256::ecdsa::Signature は固定長 R‖S（64バイト）。DER形式は DerSignature 側。
            let sig: p256::ecdsa::Signature = key
                .try_sign(signing_input.as_bytes())
                .map_err(|e| TokenError::SigningFailure(format!("ECDSA署名に失敗: {e}")))?;
            sig.to_bytes().to_vec()
        }
        KeyScheme::Ed25519 => {
            use ed25519_dalek::Signer;
            let key = decode_ed25519_key(key_material)?;
            let sig = key
                .try_sign(signing_input.as_bytes())
                .map_err(|e| TokenError::SigningFailure(format!("Ed25519署名に失敗: {e}")))?;
            sig.to_bytes().to_vec()
        }
    };

    Ok(format!("{signing_input}.{}", b64url().encode(signature)))
}

/// 署名を検証せずにヘッダとクレームを取り出す。
pub fn decode_unverified(token: &str) -> Result<(TokenHeader, TokenClaims), TokenError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    let [header, claims, signature] = segments.as_slice() else {
        return Err(TokenError::MalformedToken(format!(
            "セグメント数が3ではありません: {}",
            segments.len()
        )));
    };
    if signature.is_empty() {
        return Err(TokenError::MalformedToken("署名セグメントが空です".to_string()));
    }

    Ok((decode_segment(header)?, decode_segment(claims)?))
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = b64url()
        .decode(segment)
        .map_err(|e| TokenError::MalformedToken(format!("base64urlデコードに失敗: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::MalformedToken(format!("JSONパースに失敗: {e}")))
}
