//! # CDP SQL Shim CLI
//!
//! 運用者向けのトークン確認ツール。
//!
//! ## コマンド
//! - `mint` — 環境変数（またはフラグ）のAPI鍵でトークンを1つ発行して標準出力に書く
//! - `decode` — トークンのヘッダとクレームを署名検証なしで表示する

use clap::{Parser, Subcommand};

use cdp_shim_token::KeyScheme;

const DEFAULT_TARGET: &str = "api.cdp.coinbase.com/platform/v2/data/query/run";

#[derive(Parser, Debug)]
#[command(name = "cdp-shim-cli", about = "CDP SQL Shim トークンツール", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// トークンを発行する
    Mint {
        /// 鍵識別子
        #[arg(long, env = "CDP_API_KEY_ID")]
        key_id: String,
        /// 鍵素材（PEM または Base64）
        #[arg(long, env = "CDP_API_KEY_SECRET", hide_env_values = true)]
        key_secret: String,
        /// 署名方式（es256 / ed25519）
        #[arg(long, env = "CDP_KEY_SCHEME", default_value = "ed25519")]
        scheme: KeyScheme,
        /// スコープのHTTPメソッド
        #[arg(long, default_value = "POST")]
        method: String,
        /// スコープの `host/path`
        #[arg(long, default_value = DEFAULT_TARGET)]
        target: String,
    },
    /// トークンを検証せずにデコードする
    Decode {
        /// デコードするトークン
        token: String,
    },
}

fn run(cli: Cli) -> anyhow::Result<String> {
    match cli.command {
        Command::Mint {
            key_id,
            key_secret,
            scheme,
            method,
            target,
        } => Ok(cdp_shim_token::sign(
            &key_id,
            &key_secret,
            scheme,
            &method,
            &target,
        )?),
        Command::Decode { token } => {
            let (header, claims) = cdp_shim_token::decode_unverified(&token)?;
            Ok(serde_json::to_string_pretty(&serde_json::json!({
                "header": header,
                "claims": claims,
            }))?)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let output = run(Cli::parse())?;
    println!("{output}");
    Ok(())
}
