use {
    anyhow::{Context, Result, ensure},
    clap::Parser,
    deployer::{arguments::Arguments, artifacts, deploy_service::DeployService},
    std::sync::Arc,
    ton::wallet::Wallet,
    tonrpc::{ChainClient, HttpChainClient, RateLimiter},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arguments::parse();
    deployer::tracing::initialize("info,deployer=debug,tonrpc=debug");
    ensure!(
        args.funding_amount > ton::Nano::ZERO,
        "the funding amount must be positive"
    );
    tracing::info!("running deployer with validated arguments:\n{args}");

    // Units are loaded and validated before anything touches the network; a
    // broken build descriptor stops the run without a single RPC call.
    let units = artifacts::discover(&args.build_dir).context("discovering deployable units")?;
    if units.is_empty() {
        tracing::info!(build_dir = %args.build_dir.display(), "no deployable units found");
        return Ok(());
    }
    tracing::info!(count = units.len(), "found deployable units");

    let wallet = Wallet::from_mnemonic(&args.deployer_mnemonic, args.workchain)
        .context("generating the wallet key from DEPLOYER_MNEMONIC")?;
    tracing::info!(address = %wallet.address(), "deployer wallet");

    let client: Arc<dyn ChainClient> = Arc::new(HttpChainClient::new(
        args.endpoint.clone(),
        RateLimiter::new(args.requests_per_second)?,
    )?);

    let balance = client
        .balance(wallet.address())
        .await
        .context("fetching the wallet balance")?;
    tracing::info!(%balance, "wallet balance");
    ensure!(
        balance >= args.min_wallet_balance,
        "wallet {} holds {balance} TON, less than the required {}; please fund it",
        wallet.address(),
        args.min_wallet_balance,
    );

    let service = DeployService::new(
        client,
        wallet,
        args.workchain,
        args.funding_amount,
        args.min_wallet_balance,
        args.poll_interval,
        args.poll_attempts,
    );
    let report = service.deploy_all(&units).await?;
    print!("{report}");
    Ok(())
}
