use crate::auth::{canonical_query, sign_request};
use crate::error::ApiError;
use chrono::Utc;
use configuration::settings::Settings;
use core_types::OrderSide;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;

mod auth;
pub mod error;
pub mod responses;

// --- Public API ---
pub use responses::{
    ApiResponse, BalancesData, ListenKeyData, OrderData, RawKline, SpotBalance, SymbolInfo,
    SymbolsData,
};

const ORDER_ENDPOINT: &str = "/openApi/spot/v1/trade/order";
const SYMBOLS_ENDPOINT: &str = "/openApi/spot/v1/common/symbols";
const KLINE_ENDPOINT: &str = "/openApi/spot/v2/market/kline";
const BALANCE_ENDPOINT: &str = "/openApi/spot/v1/account/balance";
const LISTEN_KEY_ENDPOINT: &str = "/openApi/user/auth/userDataStream";

/// Signed REST client for the BingX spot API.
///
/// One instance is shared by every task in the process; `reqwest::Client`
/// multiplexes over a keep-alive connection pool internally.
#[derive(Clone)]
pub struct BingxClient {
    client: reqwest::Client,
    base_url: String,
    api_secret: String,
}

impl BingxClient {
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-BX-APIKEY",
            HeaderValue::from_str(&settings.api_key)
                .map_err(|e| ApiError::Deserialization(format!("invalid API key: {}", e)))?,
        );

        // Every task in the process shares this client against one host.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(200)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_secret: settings.secret_key.clone(),
        })
    }

    /// Signs and dispatches one request, decoding the body as `T`.
    ///
    /// The exchange signs the full query string: parameters (timestamp
    /// included) in key order, HMAC-SHA256 appended as `&signature=`.
    /// Successful bodies arrive as `application/json` or, on some
    /// endpoints, JSON served as `text/plain`; both are parsed the same.
    async fn send_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        mut params: BTreeMap<&str, String>,
    ) -> Result<T, ApiError> {
        params.insert("timestamp", Utc::now().timestamp_millis().to_string());

        let query_string = canonical_query(&params);
        let signature = sign_request(&self.api_secret, &query_string);

        let url = format!(
            "{}{}?{}&signature={}",
            self.base_url, endpoint, query_string, signature
        );

        let response = self.client.request(method, &url).send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let text = response.text().await?;

        if !status.is_success() {
            let context = params
                .get("symbol")
                .cloned()
                .unwrap_or_else(|| endpoint.to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                context,
                body: text,
            });
        }

        if !(content_type.starts_with("application/json") || content_type.starts_with("text/plain"))
        {
            return Err(ApiError::UnexpectedContentType(content_type));
        }

        serde_json::from_str::<T>(&text).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Places a MARKET order for `quantity` of the base asset.
    pub async fn place_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<ApiResponse<OrderData>, ApiError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", format!("{}-USDT", symbol));
        params.insert("type", "MARKET".to_string());
        params.insert("side", side.as_str().to_string());
        params.insert("quantity", quantity.to_string());

        self.send_request(Method::POST, ORDER_ENDPOINT, params).await
    }

    /// Fetches pair metadata; the engine only consumes `stepSize`.
    pub async fn symbol_info(&self, symbol: &str) -> Result<ApiResponse<SymbolsData>, ApiError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", format!("{}-USDT", symbol));

        self.send_request(Method::GET, SYMBOLS_ENDPOINT, params).await
    }

    /// Fetches up to `limit` candles, newest first.
    pub async fn kline(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<ApiResponse<Vec<RawKline>>, ApiError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", format!("{}-USDT", symbol));
        params.insert("interval", interval.to_string());
        params.insert("limit", limit.to_string());

        self.send_request(Method::GET, KLINE_ENDPOINT, params).await
    }

    /// Spot balances, used once at startup to seed the account store.
    pub async fn account_balances(&self) -> Result<ApiResponse<BalancesData>, ApiError> {
        self.send_request(Method::GET, BALANCE_ENDPOINT, BTreeMap::new())
            .await
    }

    /// Obtains a fresh private-stream session key.
    pub async fn create_listen_key(&self) -> Result<ListenKeyData, ApiError> {
        self.send_request(Method::POST, LISTEN_KEY_ENDPOINT, BTreeMap::new())
            .await
    }

    /// Extends the lifetime of an existing listen key.
    pub async fn extend_listen_key(&self, listen_key: &str) -> Result<(), ApiError> {
        let mut params = BTreeMap::new();
        params.insert("listenKey", listen_key.to_string());

        // The refresh reply body is not interesting, only its status.
        let _: serde_json::Value = self
            .send_request(Method::PUT, LISTEN_KEY_ENDPOINT, params)
            .await?;
        Ok(())
    }
}
