//! 外部 HTTP 服务封装：Jupiter 报价与交易构建、价格查询。

use std::time::Duration;

pub mod jupiter;
pub mod price;
pub mod serde_helpers;

pub use jupiter::{JupiterApiClient, JupiterError};
pub use price::PriceApiClient;

const USER_AGENT: &str = concat!("swap-settler/", env!("CARGO_PKG_VERSION"));

/// Jupiter 客户端共用的 reqwest 连接池。
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
}
