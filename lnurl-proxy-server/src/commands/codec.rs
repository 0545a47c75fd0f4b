//! Encode/decode commands - convert between URLs and LNURLs

use anyhow::{Context, Result};
use lnurl_proxy_lib::codec;

pub fn encode(url: &str) -> Result<()> {
    let lnurl = codec::encode(url).context("Failed to encode URL")?;
    println!("{}", lnurl);
    Ok(())
}

pub fn decode(lnurl: &str) -> Result<()> {
    let url = codec::decode(lnurl).context("Failed to decode LNURL")?;
    println!("{}", url);
    if let Some(id) = codec::withdraw_id_from_url(&url) {
        println!("withdraw id: {}", id);
    }
    Ok(())
}
