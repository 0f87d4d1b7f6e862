use crate::Engine;
use chrono::Utc;
use core_types::{BalanceUpdate, PriceTick};
use flate2::read::GzDecoder;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::io::Read;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const LISTEN_KEY_POLL: Duration = Duration::from_millis(300);

// --- WebSocket Deserialization Structs ---

/// `@lastPrice` ticker frame; only the last price is consumed.
#[derive(Debug, Deserialize)]
struct TickerFrame {
    data: Option<TickerData>,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    c: Decimal,
}

/// `ACCOUNT_UPDATE` frame; `e` marks an event frame, `a.B` carries the
/// balance batch.
#[derive(Debug, Deserialize)]
struct AccountFrame {
    e: Option<String>,
    a: Option<AccountData>,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    #[serde(rename = "B")]
    balances: Vec<BalanceUpdate>,
}

/// The exchange compresses every frame with gzip.
fn gunzip(bytes: &[u8]) -> std::io::Result<String> {
    let mut decoder = GzDecoder::new(bytes);
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;
    Ok(text)
}

/// Extracts the textual payload of a frame, decompressing binary frames.
fn frame_text(message: &Message) -> Option<String> {
    match message {
        Message::Binary(data) => match gunzip(data) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!(error = %e, "failed to decompress frame");
                None
            }
        },
        Message::Text(text) => Some(text.clone()),
        _ => None,
    }
}

/// One price subscriber per symbol. Runs until cancelled; any connection
/// failure is retried forever after a short delay. `stagger` spreads the
/// initial subscriptions so bootstrap does not trip the rate limiter.
pub async fn price_stream(engine: Engine, symbol: String, stagger: Duration) {
    tokio::time::sleep(stagger).await;

    let payload = json!({
        "id": "1",
        "reqType": "sub",
        "dataType": format!("{}-USDT@lastPrice", symbol),
    })
    .to_string();

    loop {
        match connect_async(engine.settings.url_ws.as_str()).await {
            Ok((mut ws, _)) => {
                tracing::info!(symbol, "price stream connected");

                if let Err(e) = ws.send(Message::Text(payload.clone())).await {
                    tracing::error!(symbol, error = %e, "price subscription failed");
                } else {
                    while let Some(message) = ws.next().await {
                        let message = match message {
                            Ok(m) => m,
                            Err(e) => {
                                tracing::error!(symbol, error = %e, "price stream read error");
                                break;
                            }
                        };

                        let Some(text) = frame_text(&message) else {
                            continue;
                        };
                        if text == "Ping" {
                            let _ = ws.send(Message::Text("Pong".to_string())).await;
                            continue;
                        }

                        match serde_json::from_str::<TickerFrame>(&text) {
                            Ok(TickerFrame { data: Some(data) }) => {
                                engine
                                    .prices
                                    .update(
                                        &symbol,
                                        PriceTick {
                                            ts: Utc::now().timestamp_millis(),
                                            price: data.c,
                                        },
                                    )
                                    .await;
                            }
                            // Subscription acks and heartbeats carry no data.
                            Ok(_) => {}
                            Err(e) => {
                                tracing::error!(symbol, error = %e, frame = %text, "unexpected price frame")
                            }
                        }
                    }
                }
            }
            Err(e) => tracing::error!(symbol, error = %e, "price stream connect failed"),
        }

        tracing::error!(symbol, "price stream ended, reconnecting in 5s");
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// The single private-stream subscriber. Waits until the listen-key task
/// has produced a key, then feeds balance batches into the account store.
/// The key is re-read on every reconnect so a refreshed key is picked up.
pub async fn account_stream(engine: Engine) {
    let payload = json!({
        "id": "1",
        "reqType": "sub",
        "dataType": "ACCOUNT_UPDATE",
    })
    .to_string();

    loop {
        let listen_key = loop {
            if let Some(key) = engine.account.listen_key().await {
                break key;
            }
            tokio::time::sleep(LISTEN_KEY_POLL).await;
        };

        let url = format!("{}?listenKey={}", engine.settings.url_ws, listen_key);
        match connect_async(url.as_str()).await {
            Ok((mut ws, _)) => {
                tracing::info!("account stream connected");

                if let Err(e) = ws.send(Message::Text(payload.clone())).await {
                    tracing::error!(error = %e, "account subscription failed");
                } else {
                    while let Some(message) = ws.next().await {
                        let message = match message {
                            Ok(m) => m,
                            Err(e) => {
                                tracing::error!(error = %e, "account stream read error");
                                break;
                            }
                        };

                        let Some(text) = frame_text(&message) else {
                            continue;
                        };
                        if text == "Ping" {
                            let _ = ws.send(Message::Text("Pong".to_string())).await;
                            continue;
                        }

                        match serde_json::from_str::<AccountFrame>(&text) {
                            Ok(AccountFrame {
                                e: Some(_),
                                a: Some(data),
                            }) => {
                                tracing::info!(updates = data.balances.len(), "balance update");
                                engine.account.update_balance_batch(data.balances).await;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::error!(error = %e, frame = %text, "unexpected account frame")
                            }
                        }
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "account stream connect failed"),
        }

        tracing::error!("account stream ended, reconnecting in 5s");
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn binary_frames_are_decompressed() {
        let message = Message::Binary(gzip(r#"{"data":{"c":"1.23"}}"#));
        assert_eq!(
            frame_text(&message).unwrap(),
            r#"{"data":{"c":"1.23"}}"#
        );
    }

    #[test]
    fn garbage_binary_frames_are_dropped() {
        let message = Message::Binary(vec![0x00, 0x01, 0x02]);
        assert!(frame_text(&message).is_none());
    }

    #[test]
    fn ticker_frame_parses_price() {
        let frame: TickerFrame =
            serde_json::from_str(r#"{"code":0,"data":{"e":"spot.lastPrice","c":"1.015"}}"#)
                .unwrap();
        assert_eq!(frame.data.unwrap().c, dec!(1.015));
    }

    #[test]
    fn subscription_ack_has_no_data() {
        let frame: TickerFrame =
            serde_json::from_str(r#"{"id":"1","code":0,"msg":"SUCCESS"}"#).unwrap();
        assert!(frame.data.is_none());
    }

    #[test]
    fn account_frame_parses_balance_batch() {
        let text = r#"{"e":"ACCOUNT_UPDATE","E":1700000000000,
            "a":{"B":[{"a":"USDT","wb":"120.5"},{"a":"ADA","wb":"30"}]}}"#;
        let frame: AccountFrame = serde_json::from_str(text).unwrap();
        let balances = frame.a.unwrap().balances;
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].asset, "USDT");
        assert_eq!(balances[0].wallet_balance, dec!(120.5));
    }
}
