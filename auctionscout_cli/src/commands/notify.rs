//! The `notify` subcommand: send a message or a digest of validated items.

use std::path::{Path, PathBuf};

use anyhow::Result;
use auctionscout_lib::DigestEntry;
use clap::Args;

use super::{kakao_client, load_config, open_db};

#[derive(Args)]
pub struct NotifyArgs {
    /// Send this text instead of a digest
    #[arg(long)]
    pub message: Option<String>,

    /// Link attached to the message
    #[arg(long)]
    pub link: Option<String>,

    /// Digest at most this many validated items
    #[arg(long)]
    pub limit: Option<i64>,

    /// SQLite database path
    #[arg(long, default_value = "auctionscout.db")]
    pub db: PathBuf,

    /// KakaoTalk token file
    #[arg(long)]
    pub token_file: Option<PathBuf>,
}

pub async fn run(args: &NotifyArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let client = kakao_client(&config, args.token_file.as_deref())?;

    if let Some(message) = &args.message {
        client.send(message, args.link.as_deref()).await?;
        eprintln!("Message sent.");
        return Ok(());
    }

    let db = open_db(&args.db)?;
    let entries: Vec<DigestEntry> = db
        .validated_items(args.limit)?
        .into_iter()
        .map(|r| DigestEntry {
            tid: r.item.tid,
            case_number: r.item.case_number,
        })
        .collect();
    client.send_digest(&entries, args.link.as_deref()).await?;
    eprintln!("Digest of {} items sent.", entries.len());
    Ok(())
}
