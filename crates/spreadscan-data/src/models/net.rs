//! Withdrawal/deposit network availability rows.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One `(coin, network)` availability entry for a venue, keyed by
/// `coin_exchange_network`.
#[derive(Debug, Clone, Serialize)]
pub struct NetRecord {
    pub coin_key: String,
    pub coin: String,
    pub exchange: String,
    pub network: String,
    pub network_name: String,
    pub deposit_enable: bool,
    pub withdraw_enable: bool,
    pub updated_at: DateTime<Utc>,
}

impl NetRecord {
    pub fn new(
        exchange: &str,
        coin: String,
        network: String,
        network_name: String,
        deposit_enable: bool,
        withdraw_enable: bool,
    ) -> Self {
        Self {
            coin_key: format!("{coin}_{exchange}_{network}"),
            coin,
            exchange: exchange.to_string(),
            network,
            network_name,
            deposit_enable,
            withdraw_enable,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_key_shape() {
        let record = NetRecord::new(
            "Binance",
            "BTC".to_string(),
            "BSC".to_string(),
            "BNB Smart Chain (BEP20)".to_string(),
            true,
            false,
        );

        assert_eq!(record.coin_key, "BTC_Binance_BSC");
        assert!(record.deposit_enable);
        assert!(!record.withdraw_enable);
    }
}
