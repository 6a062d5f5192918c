//! # Shim設定・共有状態
//!
//! 環境変数からの設定読み込みとShimの共有状態の定義。
//! 設定は起動時に1回だけ読み込み、以降は `Arc<ShimState>` で読み取り専用に共有する。

use std::fmt;
use std::time::Duration;

use anyhow::Context;
use cdp_shim_token::{KeyScheme, TOKEN_LIFETIME_SECS};

use crate::signer::{CdpTokenMinter, TokenMinter};

/// 鍵識別子の環境変数名
pub const ENV_KEY_ID: &str = "CDP_API_KEY_ID";
/// 鍵素材の環境変数名
pub const ENV_KEY_SECRET: &str = "CDP_API_KEY_SECRET";

const DEFAULT_API_BASE_URL: &str = "https://api.cdp.coinbase.com";
const DEFAULT_API_PATH: &str = "/platform/v2/data/query/run";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_ROUTE: &str = "/api/query";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Debug出力で中身を伏せる文字列。
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// API鍵（鍵識別子 + 鍵素材）。
#[derive(Debug, Clone)]
pub struct Credentials {
    /// 鍵識別子（`kid` / `sub` になる）
    pub key_id: String,
    /// 鍵素材（PEM または Base64）
    pub key_material: Secret,
}

/// Shimの設定。
#[derive(Debug, Clone)]
pub struct ShimConfig {
    /// リッスンアドレス
    pub listen_addr: String,
    /// 受信ルート
    pub route: String,
    /// リモートクエリAPIの完全なURL
    pub upstream_url: reqwest::Url,
    /// 署名方式
    pub scheme: KeyScheme,
    /// API鍵。未設定でも起動はし、リクエスト時に設定エラーを返す。
    pub credentials: Option<Credentials>,
    /// 受信リクエストに要求するBearerトークン（任意）
    pub access_token: Option<Secret>,
    /// リモート呼び出しのタイムアウト
    pub upstream_timeout: Duration,
}

impl ShimConfig {
    /// プロセス環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の参照関数から構築する。空文字列は未設定として扱う。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let scheme = match get("CDP_KEY_SCHEME") {
            Some(raw) => raw
                .parse::<KeyScheme>()
                .map_err(|e| anyhow::anyhow!("CDP_KEY_SCHEMEが不正です: {e}"))?,
            None => KeyScheme::Ed25519,
        };

        let base_url = get("CDP_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_path = get("CDP_API_PATH").unwrap_or_else(|| DEFAULT_API_PATH.to_string());
        let upstream_url = reqwest::Url::parse(&format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            api_path.trim_start_matches('/')
        ))
        .with_context(|| format!("CDP_API_BASE_URLが不正です: {base_url}"))?;
        if upstream_url.host_str().is_none() {
            anyhow::bail!("CDP_API_BASE_URLにホストが含まれていません: {base_url}");
        }

        let route = get("SHIM_ROUTE").unwrap_or_else(|| DEFAULT_ROUTE.to_string());
        if !route.starts_with('/') {
            anyhow::bail!("SHIM_ROUTEは / で始まる必要があります: {route}");
        }

        let upstream_timeout_secs = match get("UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("UPSTREAM_TIMEOUT_SECSが不正です: {raw}"))?,
            None => DEFAULT_UPSTREAM_TIMEOUT_SECS,
        };
        // トークンの有効期間内に完了しない呼び出しは意味がない
        if upstream_timeout_secs == 0 || upstream_timeout_secs >= TOKEN_LIFETIME_SECS {
            anyhow::bail!(
                "UPSTREAM_TIMEOUT_SECSは1以上{TOKEN_LIFETIME_SECS}未満である必要があります: {upstream_timeout_secs}"
            );
        }

        let credentials = match (get(ENV_KEY_ID), get(ENV_KEY_SECRET)) {
            (Some(key_id), Some(secret)) => Some(Credentials {
                key_id: key_id.trim().to_string(),
                key_material: Secret::new(secret),
            }),
            _ => None,
        };

        Ok(Self {
            listen_addr: get("SHIM_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            route,
            upstream_url,
            scheme,
            credentials,
            access_token: get("SHIM_ACCESS_TOKEN").map(Secret::new),
            upstream_timeout: Duration::from_secs(upstream_timeout_secs),
        })
    }

    /// トークンのスコープに入れる `host[:port]/path`。
    pub fn token_target(&self) -> String {
        let host = self.upstream_url.host_str().unwrap_or_default();
        match self.upstream_url.port() {
            Some(port) => format!("{host}:{port}{}", self.upstream_url.path()),
            None => format!("{host}{}", self.upstream_url.path()),
        }
    }
}

/// Shimの共有状態。
pub struct ShimState {
    /// 起動時に読み込んだ設定
    pub config: ShimConfig,
    /// HTTPクライアント（タイムアウト設定済み）
    pub http_client: reqwest::Client,
    /// トークン発行器。API鍵が未設定の場合は `None`。
    pub minter: Option<Box<dyn TokenMinter>>,
}

impl ShimState {
    /// 設定から共有状態を構築する。
    pub fn from_config(config: ShimConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .context("HTTPクライアントの構築に失敗")?;

        let minter = config.credentials.clone().map(|credentials| {
            Box::new(CdpTokenMinter::new(credentials, config.scheme)) as Box<dyn TokenMinter>
        });

        Ok(Self {
            config,
            http_client,
            minter,
        })
    }
}
