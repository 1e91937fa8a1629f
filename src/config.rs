use std::env;

/// Settings for the demo node, read from the environment (and `.env` if present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Blocks the local miner seals before the demo stops (`DEMO_BLOCKS`).
    pub demo_blocks: usize,
    /// Amount sent per demo transfer (`TRANSFER_AMOUNT`).
    pub transfer_amount: u64,
    /// Whether incoming chains get ledger-wide transaction checks (`VALIDATE_TRANSACTIONS`).
    pub validate_transactions: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            demo_blocks: 3,
            transfer_amount: 25,
            validate_transactions: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            demo_blocks: lookup("DEMO_BLOCKS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.demo_blocks),
            transfer_amount: lookup("TRANSFER_AMOUNT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.transfer_amount),
            validate_transactions: lookup("VALIDATE_TRANSACTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.validate_transactions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn falls_back_to_defaults() {
        assert_eq!(Config::from_lookup(|_| None), Config::default());
    }

    #[test]
    fn reads_values_and_ignores_garbage() {
        let vars: HashMap<&str, &str> = [
            ("DEMO_BLOCKS", "7"),
            ("TRANSFER_AMOUNT", "not-a-number"),
            ("VALIDATE_TRANSACTIONS", "false"),
        ]
        .into_iter()
        .collect();
        let cfg = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.demo_blocks, 7);
        assert_eq!(cfg.transfer_amount, 25);
        assert!(!cfg.validate_transactions);
    }
}
