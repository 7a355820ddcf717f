use {std::fmt, ton::Address};

/// Terminal outcome of one unit's deployment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStatus {
    /// The contract was already deployed; nothing was submitted.
    Skipped,
    /// A funding transaction went out and the contract reports initialized.
    Confirmed,
    /// The pipeline could not confirm the contract as initialized, either
    /// because submission failed or because the polling window elapsed.
    Unconfirmed,
    /// Address derivation failed for the unit's code and init data.
    AddressError,
}

impl DeployStatus {
    fn label(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Confirmed => "confirmed",
            Self::Unconfirmed => "unconfirmed",
            Self::AddressError => "address error",
        }
    }
}

/// One unit's outcome: its name, derived address (when derivable), and
/// terminal status. Never mutated once recorded.
#[derive(Debug)]
pub struct DeploymentTarget {
    pub unit: String,
    pub address: Option<Address>,
    pub status: DeployStatus,
}

/// Aggregated per-unit outcomes of a deployment run.
#[derive(Debug, Default)]
pub struct Report {
    targets: Vec<DeploymentTarget>,
}

impl Report {
    pub fn record(&mut self, target: DeploymentTarget) {
        self.targets.push(target);
    }

    pub fn targets(&self) -> &[DeploymentTarget] {
        &self.targets
    }

    pub fn count(&self, status: DeployStatus) -> usize {
        self.targets
            .iter()
            .filter(|target| target.status == status)
            .count()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "deployment report: {} confirmed, {} skipped, {} unconfirmed, {} address errors",
            self.count(DeployStatus::Confirmed),
            self.count(DeployStatus::Skipped),
            self.count(DeployStatus::Unconfirmed),
            self.count(DeployStatus::AddressError),
        )?;
        for target in &self.targets {
            match &target.address {
                Some(address) => {
                    writeln!(f, "  {}: {} ({address})", target.unit, target.status.label())?
                }
                None => writeln!(f, "  {}: {}", target.unit, target.status.label())?,
            }
        }
        Ok(())
    }
}
