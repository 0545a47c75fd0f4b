//! Open command - act as an issuer against a running proxy

use anyhow::{Context, Result};
use lnurl_proxy_interactive::WithdrawClient;
use lnurl_proxy_lib::WithdrawParams;

pub async fn run(
    proxy: &str,
    id: &str,
    min_amount: i64,
    max_amount: i64,
    description: String,
    reject: Option<String>,
) -> Result<()> {
    let mut client = WithdrawClient::connect(proxy)
        .await
        .with_context(|| format!("Failed to connect to {}", proxy))?;

    let params = WithdrawParams {
        min_amount,
        max_amount,
        description,
    };
    let lnurl = client
        .open(id, &params)
        .await
        .context("Proxy refused the withdraw offer")?;
    println!("{}", lnurl);
    println!("Waiting for a wallet to submit an invoice...");

    let invoice = client
        .next_invoice()
        .await
        .context("Withdraw ended before an invoice arrived")?;
    println!("Invoice: {}", invoice);

    let outcome = match reject {
        Some(reason) => {
            println!("Rejecting: {}", reason);
            Err(reason)
        }
        None => {
            println!("Reporting payment as successful");
            Ok(())
        }
    };
    client.report(outcome).await?;
    client.close().await?;
    Ok(())
}
