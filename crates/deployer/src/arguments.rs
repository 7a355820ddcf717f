use {
    clap::Parser,
    std::{fmt, path::PathBuf, time::Duration},
    ton::Nano,
    url::Url,
};

#[derive(Parser)]
pub struct Arguments {
    /// 24-word mnemonic of the wallet funding the deployments.
    #[clap(long, env = "DEPLOYER_MNEMONIC", hide_env_values = true)]
    pub deployer_mnemonic: String,

    /// JSON-RPC endpoint of the chain node to deploy through.
    #[clap(long, env, default_value = "https://toncenter.com/api/v2/jsonRPC")]
    pub endpoint: Url,

    /// Workchain the contracts (and the deployer wallet) live in.
    #[clap(long, env, default_value = "-1", allow_hyphen_values = true)]
    pub workchain: i32,

    /// Directory holding the compiled build artifacts and deploy
    /// descriptors.
    #[clap(long, env, default_value = "build")]
    pub build_dir: PathBuf,

    /// TON sent along with every deployment to fund the new contract.
    #[clap(long, env, default_value = "0.02")]
    pub funding_amount: Nano,

    /// TON the wallet must hold on top of the funding amount before a
    /// transaction is submitted.
    #[clap(long, env, default_value = "0.2")]
    pub min_wallet_balance: Nano,

    /// Delay between two confirmation polls.
    #[clap(
        long,
        env,
        default_value = "2s",
        value_parser = humantime::parse_duration,
    )]
    pub poll_interval: Duration,

    /// Number of confirmation polls before giving up on a unit.
    #[clap(long, env, default_value = "10")]
    pub poll_attempts: usize,

    /// Global ceiling for outbound RPC calls, in requests per second.
    #[clap(long, env, default_value = "0.5")]
    pub requests_per_second: f64,
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            deployer_mnemonic: _,
            endpoint,
            workchain,
            build_dir,
            funding_amount,
            min_wallet_balance,
            poll_interval,
            poll_attempts,
            requests_per_second,
        } = self;

        writeln!(f, "deployer_mnemonic: SECRET")?;
        writeln!(f, "endpoint: {endpoint}")?;
        writeln!(f, "workchain: {workchain}")?;
        writeln!(f, "build_dir: {}", build_dir.display())?;
        writeln!(f, "funding_amount: {funding_amount}")?;
        writeln!(f, "min_wallet_balance: {min_wallet_balance}")?;
        writeln!(f, "poll_interval: {poll_interval:?}")?;
        writeln!(f, "poll_attempts: {poll_attempts}")?;
        writeln!(f, "requests_per_second: {requests_per_second}")?;
        Ok(())
    }
}
