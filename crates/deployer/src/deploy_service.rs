//! The deployment pipeline: resolve the address, check chain state, fund,
//! and confirm, strictly sequentially across all discovered units.
//!
//! Wallet seqno and balance are ordered, stateful resources, so units are
//! never processed concurrently. Collaborator failures are converted into
//! per-unit outcomes here; the only error that aborts a run mid-way is an
//! underfunded wallet.

use {
    crate::{
        artifacts::DeployableUnit,
        confirmation::ConfirmationPoller,
        report::{DeployStatus, DeploymentTarget, Report},
    },
    anyhow::{Result, ensure},
    std::{
        sync::Arc,
        time::{Duration, SystemTime, UNIX_EPOCH},
    },
    ton::{
        Address, Nano, boc,
        state_init::{contract_address, state_init},
        wallet::{SEND_MODE_IGNORE_ERRORS, SEND_MODE_PAY_GAS_SEPARATELY, Transfer, Wallet},
    },
    tonrpc::ChainClient,
};

/// How long a signed transfer stays valid after construction.
const TRANSFER_TTL: Duration = Duration::from_secs(60);

pub struct DeployService {
    client: Arc<dyn ChainClient>,
    wallet: Wallet,
    workchain: i32,
    funding_amount: Nano,
    min_wallet_balance: Nano,
    poller: ConfirmationPoller,
}

impl DeployService {
    pub fn new(
        client: Arc<dyn ChainClient>,
        wallet: Wallet,
        workchain: i32,
        funding_amount: Nano,
        min_wallet_balance: Nano,
        poll_interval: Duration,
        poll_attempts: usize,
    ) -> Self {
        Self {
            client,
            wallet,
            workchain,
            funding_amount,
            min_wallet_balance,
            poller: ConfirmationPoller::new(poll_interval, poll_attempts),
        }
    }

    /// Deploys all units in discovery order and reports every outcome.
    pub async fn deploy_all(&self, units: &[DeployableUnit]) -> Result<Report> {
        let mut report = Report::default();
        for unit in units {
            tracing::info!(unit = %unit.name, "processing deployable unit");
            report.record(self.deploy_unit(unit).await?);
        }
        Ok(report)
    }

    async fn deploy_unit(&self, unit: &DeployableUnit) -> Result<DeploymentTarget> {
        let address = match contract_address(self.workchain, &unit.code, &unit.init_data) {
            Ok(address) => address,
            Err(err) => {
                tracing::error!(unit = %unit.name, ?err, "deriving the contract address failed");
                return Ok(target(unit, None, DeployStatus::AddressError));
            }
        };
        tracing::info!(unit = %unit.name, %address, "calculated contract address");

        // Checked right before submission so that a unit deployed by an
        // earlier partial run or a concurrent process is never funded twice.
        match self.client.is_contract_deployed(&address).await {
            Ok(true) => {
                tracing::info!(unit = %unit.name, "contract already deployed, skipping");
                return Ok(target(unit, Some(address), DeployStatus::Skipped));
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(unit = %unit.name, ?err, "deployment check failed");
                return Ok(target(unit, Some(address), DeployStatus::Unconfirmed));
            }
        }

        let balance = match self.client.balance(self.wallet.address()).await {
            Ok(balance) => balance,
            Err(err) => {
                tracing::error!(unit = %unit.name, ?err, "fetching the wallet balance failed");
                return Ok(target(unit, Some(address), DeployStatus::Unconfirmed));
            }
        };
        let required = self.funding_amount.saturating_add(self.min_wallet_balance);
        ensure!(
            balance >= required,
            "wallet {} holds {balance} TON, below the required {required} TON; aborting the run",
            self.wallet.address(),
        );

        // The seqno is read immediately before building the transfer and
        // consumed exactly once by it.
        let seqno = match self.client.wallet_seqno(self.wallet.address()).await {
            Ok(seqno) => seqno,
            Err(err) => {
                tracing::error!(unit = %unit.name, ?err, "fetching the wallet seqno failed");
                return Ok(target(unit, Some(address), DeployStatus::Unconfirmed));
            }
        };

        let message = match self.funding_message(unit, &address, seqno) {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(unit = %unit.name, ?err, "building the deploy transaction failed");
                return Ok(target(unit, Some(address), DeployStatus::Unconfirmed));
            }
        };
        if let Err(err) = self.client.send_boc(message).await {
            tracing::error!(unit = %unit.name, ?err, "submitting the deploy transaction failed");
            return Ok(target(unit, Some(address), DeployStatus::Unconfirmed));
        }
        tracing::info!(unit = %unit.name, "deploy transaction sent");

        let advanced = self
            .poller
            .wait_for_seqno(self.client.as_ref(), self.wallet.address(), seqno)
            .await;
        if !advanced {
            tracing::warn!(
                unit = %unit.name,
                "wallet seqno did not advance within the polling window"
            );
        }

        // The polling outcome only shapes expectations; the terminal status
        // comes from asking the chain about the target directly.
        let deployed = match self.client.is_contract_deployed(&address).await {
            Ok(deployed) => deployed,
            Err(err) => {
                tracing::error!(unit = %unit.name, ?err, "final deployment check failed");
                false
            }
        };
        if !deployed {
            tracing::warn!(unit = %unit.name, %address, "contract still looks uninitialized");
            return Ok(target(unit, Some(address), DeployStatus::Unconfirmed));
        }
        if let Ok(balance) = self.client.balance(&address).await {
            tracing::info!(unit = %unit.name, %balance, "new contract balance");
        }
        tracing::info!(unit = %unit.name, %address, "contract deployed successfully");
        Ok(target(unit, Some(address), DeployStatus::Confirmed))
    }

    /// Builds the serialized external message funding and initializing the
    /// contract.
    fn funding_message(
        &self,
        unit: &DeployableUnit,
        address: &Address,
        seqno: u32,
    ) -> Result<Vec<u8>> {
        let init = state_init(unit.code.clone(), unit.init_data.clone())?;
        let transfer = Transfer {
            seqno,
            valid_until: transfer_deadline(),
            send_mode: SEND_MODE_PAY_GAS_SEPARATELY + SEND_MODE_IGNORE_ERRORS,
            dest: *address,
            value: self.funding_amount,
            bounce: false,
            state_init: Some(Arc::new(init)),
            body: unit.init_message.clone(),
        };
        let message = self.wallet.create_transfer(&transfer)?;
        Ok(boc::write(&message))
    }
}

fn target(unit: &DeployableUnit, address: Option<Address>, status: DeployStatus) -> DeploymentTarget {
    DeploymentTarget {
        unit: unit.name.clone(),
        address,
        status,
    }
}

fn transfer_deadline() -> u32 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    u32::try_from(now + TRANSFER_TTL.as_secs()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::{
            Mutex,
            atomic::{AtomicU32, Ordering},
        },
        ton::CellBuilder,
        tonrpc::MockChainClient,
    };

    const TEST_MNEMONIC: &str = "test test test test test test test test test test test test \
                                 test test test test test test test test test test test test";

    fn unit(name: &str, seed: u64) -> DeployableUnit {
        let mut code = CellBuilder::new();
        code.store_uint(seed, 32).unwrap();
        let mut data = CellBuilder::new();
        data.store_uint(seed + 1, 32).unwrap();
        DeployableUnit {
            name: name.into(),
            code: Arc::new(code.build().unwrap()),
            init_data: Arc::new(data.build().unwrap()),
            init_message: None,
        }
    }

    fn service(client: MockChainClient) -> DeployService {
        DeployService::new(
            Arc::new(client),
            Wallet::from_mnemonic(TEST_MNEMONIC, 0).unwrap(),
            0,
            Nano(20_000_000),
            Nano(200_000_000),
            Duration::ZERO,
            10,
        )
    }

    #[tokio::test]
    async fn skips_deployed_units_and_confirms_new_ones() {
        let deployed_unit = unit("counter", 1);
        let new_unit = unit("token", 7);
        let deployed_address =
            contract_address(0, &deployed_unit.code, &deployed_unit.init_data).unwrap();
        let new_address = contract_address(0, &new_unit.code, &new_unit.init_data).unwrap();

        let submitted = Arc::new(AtomicU32::new(0));
        let mut client = MockChainClient::new();
        {
            let submitted = submitted.clone();
            client
                .expect_is_contract_deployed()
                .returning(move |address| {
                    if *address == deployed_address {
                        Ok(true)
                    } else {
                        Ok(submitted.load(Ordering::SeqCst) > 0)
                    }
                });
        }
        client.expect_balance().returning(|_| Ok(Nano::from_ton(1)));
        {
            let submitted = submitted.clone();
            client
                .expect_wallet_seqno()
                .returning(move |_| Ok(5 + submitted.load(Ordering::SeqCst)));
        }
        {
            let submitted = submitted.clone();
            client.expect_send_boc().times(1).returning(move |_| {
                submitted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let report = service(client)
            .deploy_all(&[deployed_unit, new_unit])
            .await
            .unwrap();
        let statuses: Vec<_> = report.targets().iter().map(|t| t.status).collect();
        assert_eq!(statuses, [DeployStatus::Skipped, DeployStatus::Confirmed]);
        assert_eq!(report.targets()[0].address, Some(deployed_address));
        assert_eq!(report.targets()[1].address, Some(new_address));
    }

    #[tokio::test]
    async fn reports_unconfirmed_when_the_contract_never_initializes() {
        let mut client = MockChainClient::new();
        client
            .expect_is_contract_deployed()
            .returning(|_| Ok(false));
        client.expect_balance().returning(|_| Ok(Nano::from_ton(1)));
        // One read before submission plus the full polling window.
        client
            .expect_wallet_seqno()
            .times(11)
            .returning(|_| Ok(5));
        client.expect_send_boc().times(1).returning(|_| Ok(()));

        let report = service(client).deploy_all(&[unit("counter", 1)]).await.unwrap();
        assert_eq!(report.targets()[0].status, DeployStatus::Unconfirmed);
        assert_eq!(report.count(DeployStatus::Unconfirmed), 1);
    }

    #[tokio::test]
    async fn aborts_before_submitting_when_the_wallet_is_underfunded() {
        let mut client = MockChainClient::new();
        client
            .expect_is_contract_deployed()
            .returning(|_| Ok(false));
        client.expect_balance().returning(|_| Ok(Nano(1_000)));
        client.expect_send_boc().never();

        let error = service(client)
            .deploy_all(&[unit("counter", 1)])
            .await
            .unwrap_err();
        assert!(error.to_string().contains("aborting the run"));
    }

    #[tokio::test]
    async fn consumes_strictly_increasing_seqnos() {
        let first = unit("a", 1);
        let second = unit("b", 9);
        let first_address = contract_address(0, &first.code, &first.init_data).unwrap();
        let seqno = Arc::new(AtomicU32::new(5));
        let sent = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));

        let mut client = MockChainClient::new();
        {
            // Each contract turns up as deployed only after its own
            // submission went out.
            let seqno = seqno.clone();
            client
                .expect_is_contract_deployed()
                .returning(move |address| {
                    let submissions = seqno.load(Ordering::SeqCst) - 5;
                    if *address == first_address {
                        Ok(submissions >= 1)
                    } else {
                        Ok(submissions >= 2)
                    }
                });
        }
        client.expect_balance().returning(|_| Ok(Nano::from_ton(1)));
        {
            let seqno = seqno.clone();
            client
                .expect_wallet_seqno()
                .returning(move |_| Ok(seqno.load(Ordering::SeqCst)));
        }
        {
            let seqno = seqno.clone();
            let sent = sent.clone();
            client.expect_send_boc().times(2).returning(move |boc| {
                seqno.fetch_add(1, Ordering::SeqCst);
                sent.lock().unwrap().push(boc);
                Ok(())
            });
        }

        let report = service(client).deploy_all(&[first, second]).await.unwrap();
        assert_eq!(report.count(DeployStatus::Confirmed), 2);

        // The signed body carries the consumed seqno right after the
        // signature, the subwallet id, and the expiry.
        let consumed: Vec<u32> = sent
            .lock()
            .unwrap()
            .iter()
            .map(|bytes| {
                let message = boc::read(bytes).unwrap();
                let body = &message.references()[0];
                u32::from_be_bytes(body.data()[72..76].try_into().unwrap())
            })
            .collect();
        assert_eq!(consumed, [5, 6]);
    }

    #[tokio::test]
    async fn records_an_address_error_without_aborting_the_run() {
        let broken = DeployableUnit {
            name: "broken".into(),
            code: {
                // A cell tree one level deeper than a StateInit may nest.
                let mut deep = Arc::new(CellBuilder::new().build().unwrap());
                for _ in 0..ton::cell::MAX_DEPTH {
                    let mut builder = CellBuilder::new();
                    builder.store_reference(deep).unwrap();
                    deep = Arc::new(builder.build().unwrap());
                }
                deep
            },
            init_data: Arc::new(CellBuilder::new().build().unwrap()),
            init_message: None,
        };
        let fine = unit("fine", 3);

        let submitted = Arc::new(AtomicU32::new(0));
        let mut client = MockChainClient::new();
        {
            let submitted = submitted.clone();
            client
                .expect_is_contract_deployed()
                .returning(move |_| Ok(submitted.load(Ordering::SeqCst) > 0));
        }
        client.expect_balance().returning(|_| Ok(Nano::from_ton(1)));
        {
            let submitted = submitted.clone();
            client
                .expect_wallet_seqno()
                .returning(move |_| Ok(5 + submitted.load(Ordering::SeqCst)));
        }
        {
            let submitted = submitted.clone();
            client.expect_send_boc().times(1).returning(move |_| {
                submitted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let report = service(client).deploy_all(&[broken, fine]).await.unwrap();
        let statuses: Vec<_> = report.targets().iter().map(|t| t.status).collect();
        assert_eq!(statuses, [DeployStatus::AddressError, DeployStatus::Confirmed]);
        assert_eq!(report.targets()[0].address, None);
    }
}
