use axum::{routing::get, Router, Json, extract::{Path, Query, State, WebSocketUpgrade, ws::{Message, WebSocket}}, response::{IntoResponse, Response}};
use axum::http::{HeaderValue, Method, StatusCode};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tally_core::{AccountBalance, AccountId, Ledger, LedgerError, TokenId, TokenInfo, TopicId, TopicInfo, TopicMessage, TopicSubscription};
use thiserror::Error;
use tower_http::cors::{Any, AllowOrigin, CorsLayer};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub bind_addr: String,
    /// Browser origins ending in this suffix (plus localhost) may call the API.
    pub allowed_origin_suffix: String,
    /// Most messages returned by one page of `/topics/:id/messages`.
    pub page_limit: usize,
    /// Messages buffered per WebSocket before the forwarder waits.
    pub ws_buffer: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            allowed_origin_suffix: ".tally.dev".to_string(),
            page_limit: 100,
            ws_buffer: 64,
        }
    }
}

#[derive(Clone)]
pub struct SharedState {
    pub ledger: Ledger,
    pub config: RpcConfig,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Ledger(LedgerError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Ledger(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn parse<T>(raw: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ApiError::BadRequest(format!("{raw}: {e}")))
}

/// Wire form of a topic message; binary fields are hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub topic: TopicId,
    pub sequence_number: u64,
    pub consensus_timestamp: String,
    pub payload: String,
    pub running_hash: String,
}

impl From<&TopicMessage> for MessageView {
    fn from(message: &TopicMessage) -> Self {
        Self {
            topic: message.topic,
            sequence_number: message.sequence_number,
            consensus_timestamp: message.consensus_timestamp.to_string(),
            payload: hex::encode(&message.payload),
            running_hash: hex::encode(message.running_hash),
        }
    }
}

/// Wire form of a topic; the running hash is hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicView {
    pub topic: TopicId,
    pub memo: String,
    pub has_submit_key: bool,
    pub sequence_number: u64,
    pub running_hash: String,
}

impl From<TopicInfo> for TopicView {
    fn from(info: TopicInfo) -> Self {
        Self {
            topic: info.topic,
            memo: info.memo,
            has_submit_key: info.has_submit_key,
            sequence_number: info.sequence_number,
            running_hash: hex::encode(info.running_hash),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    from: Option<u64>,
    limit: Option<usize>,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn account(Path(id): Path<String>, State(state): State<SharedState>) -> Result<Json<AccountBalance>, ApiError> {
    let id: AccountId = parse(&id)?;
    Ok(Json(state.ledger.get_account_balances(&id).await?))
}

async fn account_token(
    Path((id, token)): Path<(String, String)>,
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id: AccountId = parse(&id)?;
    let token: TokenId = parse(&token)?;
    let balance = state.ledger.get_token_balance(&id, &token).await?;
    Ok(Json(json!({ "account": id, "token": token, "balance": balance })))
}

async fn token(Path(id): Path<String>, State(state): State<SharedState>) -> Result<Json<TokenInfo>, ApiError> {
    let id: TokenId = parse(&id)?;
    Ok(Json(state.ledger.get_token_info(&id).await?))
}

async fn topic(Path(id): Path<String>, State(state): State<SharedState>) -> Result<Json<TopicView>, ApiError> {
    let id: TopicId = parse(&id)?;
    Ok(Json(state.ledger.get_topic_info(&id).await?.into()))
}

async fn topic_messages(
    Path(id): Path<String>,
    Query(q): Query<MessageQuery>,
    State(state): State<SharedState>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let id: TopicId = parse(&id)?;
    let limit = q.limit.unwrap_or(state.config.page_limit).min(state.config.page_limit);
    let messages = state.ledger.get_topic_messages(&id, q.from.unwrap_or(1), limit).await?;
    Ok(Json(messages.iter().map(MessageView::from).collect()))
}

async fn topic_ws(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    Query(q): Query<MessageQuery>,
    State(state): State<SharedState>,
) -> Result<Response, ApiError> {
    let id: TopicId = parse(&id)?;
    // subscribe before upgrading so unknown topics are a plain 404
    let subscription = state.ledger.subscribe(&id, q.from.unwrap_or(1)).await?;
    let buffer = state.config.ws_buffer;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, subscription, buffer)))
}

async fn handle_socket(socket: WebSocket, subscription: TopicSubscription, buffer: usize) {
    let topic = subscription.topic();
    let (mut sender, mut receiver) = socket.split();
    let (mut rx, cancel) = subscription.spawn_forwarder(buffer);

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&MessageView::from(&message)) {
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    cancel.cancel();
    log::debug!("websocket for topic {topic} closed");
}

pub fn router(state: SharedState) -> Router {
    let suffix = state.config.allowed_origin_suffix.clone();
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any)
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            if let Ok(o) = origin.to_str() {
                o.starts_with("http://localhost") || o.ends_with(suffix.as_str())
            } else {
                false
            }
        }));
    Router::new()
        .route("/health", get(health))
        .route("/accounts/:id", get(account))
        .route("/accounts/:id/tokens/:token", get(account_token))
        .route("/tokens/:id", get(token))
        .route("/topics/:id", get(topic))
        .route("/topics/:id/messages", get(topic_messages))
        .route("/topics/:id/ws", get(topic_ws))
        .layer(cors)
        .with_state(state)
}

pub async fn run_api(state: SharedState) -> std::io::Result<()> {
    let bind_addr = state.config.bind_addr.clone();
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    log::info!("query API listening on {bind_addr}");
    axum::serve(listener, app).await
}
