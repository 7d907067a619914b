/// WebSocket stream of dashboard state

use axum::{
    extract::ws::{Message, WebSocket},
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::watch;
use tracing::debug;

use super::AppState;
use crate::core::DashboardState;

/// Sends the current dashboard state on connect, then every new snapshot
pub async fn ws_dashboard_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let rx = state.dashboard.clone();
    ws.on_upgrade(move |socket| handle_dashboard_websocket(socket, rx))
}

fn encode(state: &mut watch::Receiver<DashboardState>) -> Option<String> {
    let current = state.borrow_and_update().clone();
    serde_json::to_string(&current).ok()
}

async fn handle_dashboard_websocket(socket: WebSocket, mut rx: watch::Receiver<DashboardState>) {
    let (mut sender, mut receiver) = socket.split();

    if let Some(json) = encode(&mut rx) {
        if sender.send(Message::Text(json)).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                // Poller gone
                if changed.is_err() {
                    break;
                }
                if let Some(json) = encode(&mut rx) {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    debug!("dashboard websocket closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::canned_results;
    use crate::core::{DashboardPoller, FailurePolicy, PrometheusClient, QueryDispatcher};
    use crate::server::create_router;
    use crate::utils::constants::POLL_INTERVAL;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    async fn next_state<S>(stream: &mut S) -> serde_json::Value
    where
        S: futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("stream closed")
                .unwrap();
            if let WsMessage::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_dashboard_stream_sends_initial_and_updated_state() {
        let client = PrometheusClient::new("http://127.0.0.1:9").unwrap();
        let dispatcher = Arc::new(QueryDispatcher::new(client, FailurePolicy::FailFast));
        let poller = DashboardPoller::new(dispatcher.clone(), POLL_INTERVAL);
        let state = AppState {
            dispatcher,
            dashboard: poller.subscribe(),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state, false)).await.unwrap();
        });

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/dashboard", addr))
            .await
            .unwrap();

        let initial = next_state(&mut socket).await;
        assert_eq!(initial["loading"], true);

        poller.apply_snapshot(&canned_results());

        let updated = next_state(&mut socket).await;
        assert_eq!(updated["loading"], false);
        assert_eq!(updated["view"]["podCount"], 10.0);
        assert_eq!(updated["successes"], 1);
    }
}
