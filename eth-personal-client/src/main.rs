use eth_personal_client::{config::Config, PersonalApi, RpcClient};
use eyre::{Result, WrapErr};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Smoke check against a node
///
/// This is the main function that:
/// 1. Sets up logging
/// 2. Loads configuration
/// 3. Connects to the Ethereum node
/// 4. Reports the chain id and the accounts in the node's keystore
#[tokio::main]
async fn main() -> Result<()> {
    // Keep our own logs at info and quieten the HTTP stack
    let filter = EnvFilter::from_default_env()
        .add_directive("eth_personal_client=info".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env().wrap_err("failed to load config")?;

    let client = RpcClient::http(&config.ethereum_rpc_url, config.client_config())?;
    let chain_id = match config.chain_id {
        Some(chain_id) => chain_id,
        None => client.chain_id().await.wrap_err("node did not report a chain id")?,
    };
    info!(url = %config.ethereum_rpc_url, chain_id, "connected");

    let accounts = PersonalApi::new(client).get_accounts().await?;
    info!(count = accounts.len(), "personal accounts");
    for account in accounts {
        info!("  {}", account.to_checksum(None));
    }
    Ok(())
}
