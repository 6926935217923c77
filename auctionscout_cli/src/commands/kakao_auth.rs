//! The `kakao-auth` subcommand: one-time KakaoTalk authorization.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};

use super::{kakao_client, load_config};

#[derive(Args)]
pub struct KakaoAuthArgs {
    /// KakaoTalk token file
    #[arg(long, global = true)]
    pub token_file: Option<PathBuf>,

    #[command(subcommand)]
    pub step: AuthStep,
}

#[derive(Subcommand)]
pub enum AuthStep {
    /// Print the URL to open in a browser to grant message access
    Url,
    /// Exchange the code from the redirect for a token pair
    Token {
        /// `code` query parameter of the redirect URL
        #[arg(long)]
        code: String,
    },
}

pub async fn run(args: &KakaoAuthArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let client = kakao_client(&config, args.token_file.as_deref())?;

    match &args.step {
        AuthStep::Url => {
            println!("{}", client.authorize_url()?);
            eprintln!("Open the URL, log in and copy the `code` parameter of the redirect.");
        }
        AuthStep::Token { code } => {
            let tokens = client.exchange_code(code).await?;
            eprintln!(
                "Tokens saved to {} (expires in {}s).",
                client.store().path().display(),
                tokens.expires_in.unwrap_or_default()
            );
        }
    }
    Ok(())
}
