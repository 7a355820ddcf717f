use {std::time::Duration, ton::Address, tonrpc::ChainClient};

/// Bounded polling for the wallet seqno to advance past its pre-submission
/// value, the signal that the network accepted the transaction.
///
/// The interval is configuration, so tests run with a zero delay. The poll
/// never resubmits anything; running out of attempts only means the final
/// state check decides on its own.
pub struct ConfirmationPoller {
    interval: Duration,
    attempts: usize,
}

impl ConfirmationPoller {
    pub fn new(interval: Duration, attempts: usize) -> Self {
        Self { interval, attempts }
    }

    /// Returns whether the seqno advanced within the polling window.
    pub async fn wait_for_seqno(
        &self,
        client: &dyn ChainClient,
        wallet: &Address,
        seqno_before: u32,
    ) -> bool {
        for attempt in 0..self.attempts {
            tokio::time::sleep(self.interval).await;
            match client.wallet_seqno(wallet).await {
                Ok(seqno) if seqno > seqno_before => return true,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(?err, attempt, "seqno poll failed");
                }
            }
        }
        false
    }
}
