use rust_decimal::Decimal;
use serde::Deserialize;

// Using `#[serde(rename_all = "camelCase")]` to automatically map from JSON camelCase to Rust snake_case.

/// The `{code, msg, data}` envelope BingX wraps around every spot endpoint.
/// `data` is absent on rejection; `code` then explains why (e.g. 100202 for
/// insufficient funds).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Insufficient-funds rejection code on the spot order endpoint.
    pub const INSUFFICIENT_FUNDS: i64 = 100202;
}

/// Fill report from `POST /openApi/spot/v1/trade/order`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    pub symbol: String,
    pub order_id: i64,
    pub price: Decimal,
    pub orig_qty: Decimal,
    pub executed_qty: Decimal,
    #[serde(rename = "cummulativeQuoteQty")]
    pub cummulative_quote_qty: Decimal,
    /// Exchange transact timestamp, unix milliseconds.
    pub transact_time: i64,
}

/// Payload of `GET /openApi/spot/v1/common/symbols`.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolsData {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub step_size: Decimal,
    #[serde(default)]
    pub tick_size: Option<Decimal>,
}

/// One candle from `GET /openApi/spot/v2/market/kline`, served as a plain
/// array: `[open_time_ms, open, high, low, close, volume, close_time_ms,
/// quote_volume]`, newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct RawKline(
    pub i64,
    pub Decimal,
    pub Decimal,
    pub Decimal,
    pub Decimal,
    pub Decimal,
    pub i64,
    pub Decimal,
);

impl RawKline {
    pub fn open_time(&self) -> i64 {
        self.0
    }

    pub fn close(&self) -> Decimal {
        self.4
    }
}

/// `POST /openApi/user/auth/userDataStream` reply. This endpoint is not
/// wrapped in the usual envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenKeyData {
    pub listen_key: String,
}

/// Payload of `GET /openApi/spot/v1/account/balance`, used once at startup
/// before the private stream takes over.
#[derive(Debug, Clone, Deserialize)]
pub struct BalancesData {
    pub balances: Vec<SpotBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotBalance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_envelope_round_trips() {
        let body = r#"{
            "code": 0,
            "msg": "",
            "data": {
                "symbol": "ADA-USDT",
                "orderId": 170976,
                "price": "1.00",
                "origQty": "10",
                "executedQty": "10",
                "cummulativeQuoteQty": "10.0",
                "transactTime": 1700000000123
            }
        }"#;

        let resp: ApiResponse<OrderData> = serde_json::from_str(body).unwrap();
        assert_eq!(resp.code, 0);
        let data = resp.data.unwrap();
        assert_eq!(data.executed_qty, dec!(10));
        assert_eq!(data.cummulative_quote_qty, dec!(10.0));
        assert_eq!(data.transact_time, 1700000000123);
    }

    #[test]
    fn rejection_has_no_data() {
        let body = r#"{"code": 100202, "msg": "Insufficient balance", "data": null}"#;
        let resp: ApiResponse<OrderData> = serde_json::from_str(body).unwrap();
        assert!(resp.data.is_none());
        assert_eq!(resp.code, ApiResponse::<OrderData>::INSUFFICIENT_FUNDS);
    }

    #[test]
    fn kline_rows_parse_from_arrays() {
        let body = r#"{"code":0,"data":[
            [1700000060000, 1.25, 1.5, 1.0, 1.375, 1000.0, 1700000119999, 1012.5],
            [1700000000000, 1.0, 1.25, 0.75, 1.25, 900.0, 1700000059999, 905.5]
        ]}"#;

        let resp: ApiResponse<Vec<RawKline>> = serde_json::from_str(body).unwrap();
        let rows = resp.data.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].open_time(), 1700000060000);
        assert_eq!(rows[1].close(), dec!(1.25));
    }
}
