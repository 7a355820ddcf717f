use std::{fmt, str::FromStr};

const NANO_PER_TON: u64 = 1_000_000_000;

/// An amount of nanoton, the chain's minimal currency unit.
///
/// Parses from and displays as decimal TON, the format used on the
/// command line and in logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nano(pub u64);

impl Nano {
    pub const ZERO: Self = Self(0);

    pub fn from_ton(ton: u64) -> Self {
        Self(ton * NANO_PER_TON)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Nano {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / NANO_PER_TON;
        let fraction = self.0 % NANO_PER_TON;
        if fraction == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{fraction:09}");
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for Nano {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (whole, fraction) = match s.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (s, ""),
        };
        anyhow::ensure!(
            fraction.len() <= 9,
            "'{s}' has sub-nanoton precision (more than 9 fractional digits)"
        );
        let whole: u64 = if whole.is_empty() { 0 } else { whole.parse()? };
        let fraction: u64 = if fraction.is_empty() {
            0
        } else {
            format!("{fraction:0<9}").parse()?
        };
        Ok(Self(whole * NANO_PER_TON + fraction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_ton() {
        assert_eq!("0.02".parse::<Nano>().unwrap(), Nano(20_000_000));
        assert_eq!("1".parse::<Nano>().unwrap(), Nano::from_ton(1));
        assert_eq!("1.5".parse::<Nano>().unwrap(), Nano(1_500_000_000));
        assert_eq!("0.000000001".parse::<Nano>().unwrap(), Nano(1));
        assert!(".25".parse::<Nano>().is_ok());
    }

    #[test]
    fn rejects_sub_nanoton_precision() {
        assert!("0.0000000001".parse::<Nano>().is_err());
    }

    #[test]
    fn displays_without_trailing_zeros() {
        assert_eq!(Nano(20_000_000).to_string(), "0.02");
        assert_eq!(Nano::from_ton(3).to_string(), "3");
        assert_eq!(Nano(1_500_000_000).to_string(), "1.5");
    }
}
