//! CoinGecko spot price of USDC in the configured fiat currency.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use cwt_wallet::{PriceSource, WalletError};

pub const COINGECKO_API: &str = "https://api.coingecko.com/api/v3";

const PRICE_TIMEOUT: Duration = Duration::from_secs(15);
const COIN_ID: &str = "usd-coin";

/// `simple/price` response: coin id to fiat code to price.
type SimplePrice = HashMap<String, HashMap<String, f64>>;

pub struct CoinGeckoPriceSource {
    http: reqwest::Client,
    base_url: String,
    fiat: String,
}

impl CoinGeckoPriceSource {
    pub fn new(base_url: impl Into<String>, fiat: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(PRICE_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            fiat: fiat.into().to_lowercase(),
        })
    }
}

#[async_trait]
impl PriceSource for CoinGeckoPriceSource {
    async fn spot_rate(&self) -> Result<String, WalletError> {
        let url = format!("{}/simple/price", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("ids", COIN_ID), ("vs_currencies", self.fiat.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WalletError::upstream("failed to get rate", e))?;

        let prices: SimplePrice = response
            .json()
            .await
            .map_err(|e| WalletError::upstream("failed to decode rate", e))?;

        let rate = extract_rate(&prices, &self.fiat)?;
        debug!(fiat = %self.fiat, rate = %rate, "spot rate fetched");
        Ok(rate)
    }

    fn fiat(&self) -> &str {
        &self.fiat
    }
}

/// Picks the USDC price out of a `simple/price` body, rendered with two
/// fraction digits.
fn extract_rate(prices: &SimplePrice, fiat: &str) -> Result<String, WalletError> {
    let price = prices
        .get(COIN_ID)
        .and_then(|quotes| quotes.get(fiat))
        .copied()
        .filter(|p| p.is_finite() && *p >= 0.0)
        .ok_or_else(|| {
            WalletError::upstream(
                "failed to decode rate",
                format!("no {COIN_ID}/{fiat} quote in price response"),
            )
        })?;

    Ok(format!("{price:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> SimplePrice {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn rate_is_rendered_with_two_decimals() {
        let prices = body(r#"{"usd-coin":{"rub":95.1234}}"#);
        assert_eq!(extract_rate(&prices, "rub").unwrap(), "95.12");

        let prices = body(r#"{"usd-coin":{"eur":0.9}}"#);
        assert_eq!(extract_rate(&prices, "eur").unwrap(), "0.90");
    }

    #[test]
    fn missing_quote_is_an_upstream_failure() {
        let prices = body(r#"{"usd-coin":{"usd":1.0}}"#);
        assert!(matches!(
            extract_rate(&prices, "rub"),
            Err(WalletError::UpstreamUnavailable { .. })
        ));
        assert!(extract_rate(&body("{}"), "rub").is_err());
    }

    #[test]
    fn fiat_code_is_lowercased() {
        let source = CoinGeckoPriceSource::new("http://127.0.0.1:1/", "RUB").unwrap();
        assert_eq!(source.fiat(), "rub");
        assert_eq!(source.base_url, "http://127.0.0.1:1");
    }
}
