//! Jupiter 聚合器 API 封装。

pub mod quote;
pub mod swap;

use std::fmt;
use std::time::{Duration, Instant};

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::value::RawValue;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::JupiterConfig;
use crate::settlement::fee_mint::normalize_native;
use crate::settlement::ports::QuoteAggregator;
use crate::settlement::types::{
    AggregatorQuote, AggregatorQuoteRequest, BuildTransactionRequest, BuiltTransaction,
};

pub use quote::{QuoteRequest, QuoteResponsePayload};
pub use swap::{SwapRequest, SwapResponse};

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Error)]
pub enum JupiterError {
    #[error("Jupiter API 请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("请求 {endpoint} 超时（{timeout_ms}ms）")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
        #[source]
        source: reqwest::Error,
    },
    #[error("响应解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("请求 {endpoint} 返回状态 {status}: {body}")]
    ApiStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("请求 {endpoint} 被限流，状态 {status}: {body}")]
    RateLimited {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("Jupiter 响应结构不符合预期: {0}")]
    Schema(String),
}

impl JupiterError {
    /// 展开完整的 cause 链，相邻重复的描述只保留一次。
    pub fn describe(&self) -> String {
        use std::error::Error as _;
        let mut parts = vec![self.to_string()];
        let mut current = self.source();
        while let Some(err) = current {
            let text = err.to_string();
            if parts.last() != Some(&text) {
                parts.push(text);
            }
            current = err.source();
        }
        parts.join(" | caused by: ")
    }
}

#[derive(Clone)]
pub struct JupiterApiClient {
    quote_url: String,
    swap_url: String,
    client: reqwest::Client,
    timeout: Duration,
    api_key: Option<String>,
}

impl fmt::Debug for JupiterApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JupiterApiClient")
            .field("quote_url", &self.quote_url)
            .field("swap_url", &self.swap_url)
            .field("timeout", &self.timeout)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl JupiterApiClient {
    pub fn new(client: reqwest::Client, config: &JupiterConfig) -> Self {
        let base = config.quote_base_url.trim_end_matches('/');
        Self {
            quote_url: format!("{base}/swap/v1/quote"),
            swap_url: format!("{base}/swap/v1/swap"),
            client,
            timeout: Duration::from_millis(config.timeout_ms),
            api_key: config.api_key().map(str::to_string),
        }
    }

    pub async fn quote(&self, request: &QuoteRequest) -> Result<(QuoteResponsePayload, Bytes), JupiterError> {
        let started = Instant::now();
        let params = request.to_query_params();
        trace!(
            target: "jupiter::quote",
            input_mint = %request.input_mint,
            output_mint = %request.output_mint,
            amount = request.amount,
            slippage_bps = request.slippage_bps,
            platform_fee_bps = ?request.platform_fee_bps,
            "开始请求 Jupiter 报价"
        );

        let builder = self.client.get(&self.quote_url).query(&params);
        let body = send_for_body(
            with_api_key(builder, self.api_key.as_deref()),
            &self.quote_url,
            self.timeout,
        )
        .await?;

        let payload: QuoteResponsePayload = serde_json::from_slice(&body).map_err(|err| {
            warn!(
                target: "jupiter::quote",
                endpoint = %self.quote_url,
                error = %err,
                "Jupiter 报价 schema 校验失败"
            );
            JupiterError::Schema(format!("解析报价响应失败: {err}"))
        })?;

        debug!(
            target: "jupiter::quote",
            elapsed_ms = format_args!("{:.3}", started.elapsed().as_secs_f64() * 1_000.0),
            in_amount = payload.in_amount,
            out_amount = payload.out_amount,
            legs = payload.route_plan.len(),
            "Jupiter 报价完成"
        );
        Ok((payload, body))
    }

    pub async fn swap(&self, request: &SwapRequest<'_>) -> Result<SwapResponse, JupiterError> {
        let started = Instant::now();
        let builder = self.client.post(&self.swap_url).json(request);
        let body = send_for_body(
            with_api_key(builder, self.api_key.as_deref()),
            &self.swap_url,
            self.timeout,
        )
        .await?;

        let response: SwapResponse = serde_json::from_slice(&body).map_err(|err| {
            warn!(
                target: "jupiter::swap",
                endpoint = %self.swap_url,
                error = %err,
                "Jupiter swap 响应 schema 校验失败"
            );
            JupiterError::Schema(format!("解析 swap 响应失败: {err}"))
        })?;

        debug!(
            target: "jupiter::swap",
            elapsed_ms = format_args!("{:.3}", started.elapsed().as_secs_f64() * 1_000.0),
            prioritization_fee_lamports = ?response.prioritization_fee_lamports,
            has_setup = response.setup_transaction.is_some(),
            has_cleanup = response.cleanup_transaction.is_some(),
            "Jupiter swap 交易构建完成"
        );
        Ok(response)
    }
}

#[async_trait]
impl QuoteAggregator for JupiterApiClient {
    async fn quote(&self, request: &AggregatorQuoteRequest) -> AnyResult<AggregatorQuote> {
        // Jupiter 不认识原生 SOL 哨兵地址
        let upstream = QuoteRequest {
            input_mint: normalize_native(request.input_mint),
            output_mint: normalize_native(request.output_mint),
            amount: request.amount,
            swap_mode: request.swap_mode,
            slippage_bps: request.slippage_bps,
            platform_fee_bps: (request.platform_fee_bps > 0).then_some(request.platform_fee_bps),
        };
        let (payload, raw) = JupiterApiClient::quote(self, &upstream)
            .await
            .map_err(|err| anyhow::anyhow!(err.describe()))?;
        Ok(payload.into_aggregator_quote(&upstream, raw))
    }

    async fn build_transaction(
        &self,
        request: &BuildTransactionRequest,
    ) -> AnyResult<BuiltTransaction> {
        let quote_response: &RawValue = serde_json::from_slice(&request.raw_payload)
            .map_err(|err| anyhow::anyhow!("报价载荷不是合法 JSON: {err}"))?;
        let swap_request = SwapRequest::new(quote_response, request.user_public_key, request.fee_account);
        let response = self
            .swap(&swap_request)
            .await
            .map_err(|err| anyhow::anyhow!(err.describe()))?;
        Ok(response.into_built_transaction())
    }
}

pub(crate) fn with_api_key(builder: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    match api_key {
        Some(key) => builder.header(API_KEY_HEADER, key),
        None => builder,
    }
}

/// 发送请求并读取完整响应体，非 2xx 映射为对应错误。
pub(crate) async fn send_for_body(
    builder: RequestBuilder,
    endpoint: &str,
    timeout: Duration,
) -> Result<Bytes, JupiterError> {
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    let classify = |err: reqwest::Error| {
        if err.is_timeout() {
            warn!(
                target: "jupiter::http",
                endpoint,
                timeout_ms,
                "Jupiter 请求超时"
            );
            JupiterError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms,
                source: err,
            }
        } else {
            warn!(
                target: "jupiter::http",
                endpoint,
                error = %err,
                "Jupiter 请求失败"
            );
            JupiterError::from(err)
        }
    };

    let response = builder.timeout(timeout).send().await.map_err(classify)?;
    let status = response.status();
    let body = response.bytes().await.map_err(classify)?;

    if status == StatusCode::TOO_MANY_REQUESTS {
        let summary = summarize_error_body(&body);
        warn!(
            target: "jupiter::http",
            endpoint,
            status = status.as_u16(),
            body = %summary,
            "Jupiter 请求命中限流"
        );
        return Err(JupiterError::RateLimited {
            endpoint: endpoint.to_string(),
            status,
            body: summary,
        });
    }
    if !status.is_success() {
        let summary = summarize_error_body(&body);
        warn!(
            target: "jupiter::http",
            endpoint,
            status = status.as_u16(),
            body = %summary,
            "Jupiter 返回非 200 状态"
        );
        return Err(JupiterError::ApiStatus {
            endpoint: endpoint.to_string(),
            status,
            body: summary,
        });
    }
    Ok(body)
}

fn summarize_error_body(body: &[u8]) -> String {
    const MAX_CHARS: usize = 512;
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }
    let single_line = trimmed.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= MAX_CHARS {
        return single_line;
    }
    let mut truncated: String = single_line.chars().take(MAX_CHARS).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_is_flattened_and_capped() {
        assert_eq!(summarize_error_body(b"  "), "(empty response body)");
        assert_eq!(summarize_error_body(b"line1\nline2"), "line1 line2");
        let long = "路".repeat(600);
        let summary = summarize_error_body(long.as_bytes());
        assert_eq!(summary.chars().count(), 513);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn describe_reports_schema_reason() {
        let err = JupiterError::Schema("缺少 outAmount".to_string());
        assert!(err.describe().contains("缺少 outAmount"));
    }
}
