//! Jupiter Price API v3 客户端。

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::api::jupiter::{JupiterError, send_for_body, with_api_key};
use crate::config::JupiterConfig;
use crate::settlement::ports::PriceOracle;

/// 单次请求允许的最大 id 数。
const MAX_IDS_PER_REQUEST: usize = 50;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEntry {
    pub usd_price: Decimal,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub block_id: Option<u64>,
}

#[derive(Clone)]
pub struct PriceApiClient {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
    api_key: Option<String>,
}

impl PriceApiClient {
    pub fn new(client: reqwest::Client, config: &JupiterConfig) -> Self {
        Self {
            url: format!("{}/price/v3", config.price_base_url.trim_end_matches('/')),
            client,
            timeout: Duration::from_millis(config.timeout_ms),
            api_key: config.api_key().map(str::to_string),
        }
    }

    pub async fn prices(&self, mints: &[String]) -> Result<HashMap<String, Decimal>, JupiterError> {
        let unique: BTreeSet<&str> = mints
            .iter()
            .map(|mint| mint.trim())
            .filter(|mint| !mint.is_empty())
            .collect();
        let unique: Vec<&str> = unique.into_iter().collect();

        let mut prices = HashMap::with_capacity(unique.len());
        for chunk in unique.chunks(MAX_IDS_PER_REQUEST) {
            let ids = chunk.join(",");
            let builder = self.client.get(&self.url).query(&[("ids", ids.as_str())]);
            let body = send_for_body(
                with_api_key(builder, self.api_key.as_deref()),
                &self.url,
                self.timeout,
            )
            .await?;
            let entries: HashMap<String, Option<PriceEntry>> = serde_json::from_slice(&body)
                .map_err(|err| JupiterError::Schema(format!("解析价格响应失败: {err}")))?;
            prices.extend(
                entries
                    .into_iter()
                    .filter_map(|(mint, entry)| entry.map(|entry| (mint, entry.usd_price))),
            );
        }

        debug!(
            target: "jupiter::price",
            requested = unique.len(),
            priced = prices.len(),
            "价格查询完成"
        );
        Ok(prices)
    }
}

#[async_trait]
impl PriceOracle for PriceApiClient {
    async fn batch_price(&self, mints: &[String]) -> AnyResult<HashMap<String, Decimal>> {
        self.prices(mints)
            .await
            .map_err(|err| anyhow::anyhow!(err.describe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn price_entries_decode_numeric_usd_price() {
        let body = json!({
            "So11111111111111111111111111111111111111112": {
                "usdPrice": 147.4789340738,
                "blockId": 348004023u64,
                "decimals": 9,
                "priceChange24h": 1.29
            },
            "Unpriced11111111111111111111111111111111111": null
        });
        let entries: HashMap<String, Option<PriceEntry>> =
            serde_json::from_value(body).expect("decode");
        let sol = entries["So11111111111111111111111111111111111111112"]
            .as_ref()
            .expect("sol entry");
        assert!(sol.usd_price > Decimal::new(147, 0));
        assert_eq!(sol.decimals, Some(9));
        assert!(entries["Unpriced11111111111111111111111111111111111"].is_none());
    }

    #[tokio::test]
    async fn empty_request_skips_network() {
        let client = PriceApiClient::new(reqwest::Client::new(), &JupiterConfig::default());
        let prices = client.prices(&[" ".to_string()]).await.expect("prices");
        assert!(prices.is_empty());
    }
}
