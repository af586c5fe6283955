//! sponsor-rails library
//!
//! Axum-based HTTP service for sponsored transactions.
//!
//! # Features
//! - Sponsor-paid increments proven by a named prover identity
//! - Balancing and submission of client-built transactions
//! - Counter queries by prefixed, short, or hex address

pub mod config;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use sponsor_common::{
    encode_address, AddressFormat, BalancedTransaction, CoinInfo, CoinPublicKey, NetworkId,
    PipelineError, PipelineStage, ProvenTransaction, SponsorError, UnprovenTransaction,
    RAIL_ID_SPONSOR,
};
use sponsor_devnet::Devnet;
use sponsor_wallet::{
    CounterQuery, CounterReading, OverrideStore, SponsorSession, WalletProvider, WalletRuntime,
};

use crate::config::RailConfig;

/// Application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<RailContext>,
}

struct RailContext {
    session: SponsorSession,
    query: CounterQuery,
    provers: BTreeMap<String, Arc<dyn WalletRuntime>>,
    network: NetworkId,
    proof_server_url: String,
    /// Cancelled on shutdown; in-flight wallet waits end with `Cancelled`.
    shutdown: CancellationToken,
}

impl AppState {
    /// Wire the service to a local chain.
    pub async fn from_devnet(
        devnet: &Devnet,
        config: &RailConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, SponsorError> {
        let policy = config.sync_policy();
        let sponsor: Arc<dyn WalletRuntime> = devnet.sponsor().clone();
        let provider = WalletProvider::connect(sponsor, policy, &shutdown).await?;

        let session = SponsorSession::new(
            Arc::new(provider),
            Arc::new(OverrideStore::new(policy)),
            devnet.contract(),
            config.tx_ttl,
        );
        let query = CounterQuery::new(devnet.chain().clone(), devnet.contract(), config.network);
        let provers: BTreeMap<String, Arc<dyn WalletRuntime>> = devnet
            .provers()
            .map(|(name, wallet)| {
                let wallet: Arc<dyn WalletRuntime> = wallet.clone();
                (name.to_string(), wallet)
            })
            .collect();

        Ok(Self {
            inner: Arc::new(RailContext {
                session,
                query,
                provers,
                network: config.network,
                proof_server_url: config.proof_server_url.clone(),
                shutdown,
            }),
        })
    }

    pub fn network(&self) -> NetworkId {
        self.inner.network
    }

    fn address(&self, key: &CoinPublicKey) -> String {
        encode_address(key, AddressFormat::Prefixed, self.inner.network)
    }

    fn prover(&self, name: &str) -> Result<Arc<dyn WalletRuntime>, ApiError> {
        self.inner.provers.get(name).cloned().ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                "UNKNOWN_PROVER",
                format!("no prover registered as {name:?}"),
            )
        })
    }
}

/// Build the router.
pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/rails/sponsor/info", get(info))
        .route("/rails/sponsor/balance", post(balance))
        .route("/rails/sponsor/submit", post(submit))
        .route("/rails/sponsor/increment", post(increment))
        .route("/rails/sponsor/counter", get(own_counter))
        .route("/rails/sponsor/counter/:address", get(counter_of))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "rail_id": RAIL_ID_SPONSOR
    }))
}

/// Rail info endpoint.
async fn info(State(state): State<AppState>) -> impl IntoResponse {
    let ctx = &state.inner;
    let provider = ctx.session.provider();
    let sponsor = provider.sponsor_keys();
    let sponsor_state = provider.sponsor().current_state();

    Json(serde_json::json!({
        "rail_id": RAIL_ID_SPONSOR,
        "network": ctx.network.as_str(),
        "contract": ctx.session.contract().to_hex(),
        "sponsor": {
            "address": state.address(&sponsor.coin_public_key),
            "coin_public_key": sponsor.coin_public_key.to_hex(),
            "balance": sponsor_state.balance.to_string(),
            "synced": sponsor_state.sync.is_synced(),
        },
        "override_active": ctx.session.overrides().current().is_active(),
        "provers": ctx.provers.keys().collect::<Vec<_>>(),
        "proof_server_url": ctx.proof_server_url,
        "sync_timeout_secs": ctx.session.overrides().policy().timeout.as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Balance request.
#[derive(Debug, Deserialize)]
pub struct BalanceRequest {
    pub transaction: UnprovenTransaction,
    #[serde(default)]
    pub new_coins: Vec<CoinInfo>,
}

/// Attach the sponsor's fee coverage to a client-built transaction.
async fn balance(
    State(state): State<AppState>,
    Json(req): Json<BalanceRequest>,
) -> Result<Json<BalancedTransaction>, ApiError> {
    let balanced = state
        .inner
        .session
        .provider()
        .balance(req.transaction, req.new_coins)
        .await
        .map_err(PipelineError::at(PipelineStage::Balanced))?;
    Ok(Json(balanced))
}

/// Submit request.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub transaction: ProvenTransaction,
    /// Address of the identity that produced the proof, in any accepted form.
    pub signer: String,
}

/// Submit response.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub tx_id: String,
}

/// Submit a client-proven transaction through the sponsor.
async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let signer = state.inner.query.resolve(&req.signer)?;
    if req.transaction.proof.prover != signer {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "SIGNER_MISMATCH",
            format!(
                "proof was produced by {}, not {}",
                req.transaction.proof.prover, signer
            ),
        ));
    }

    let tx_id = state
        .inner
        .session
        .provider()
        .submit(req.transaction)
        .await
        .map_err(PipelineError::at(PipelineStage::Submitted))?;

    Ok(Json(SubmitResponse {
        success: true,
        tx_id: tx_id.to_string(),
    }))
}

/// Increment request.
#[derive(Debug, Default, Deserialize)]
pub struct IncrementRequest {
    /// Registered prover name; the sponsor proves when absent.
    #[serde(default)]
    pub prover: Option<String>,
}

/// Increment response.
#[derive(Debug, Serialize)]
pub struct IncrementResponse {
    pub tx_id: String,
    pub stage: PipelineStage,
    pub prover: String,
    pub payer: String,
    pub fee: String,
    pub count: u64,
}

/// Run one sponsored increment.
async fn increment(
    State(state): State<AppState>,
    Json(req): Json<IncrementRequest>,
) -> Result<Json<IncrementResponse>, ApiError> {
    let prover = req.prover.as_deref().map(|name| state.prover(name)).transpose()?;

    let cancel = state.inner.shutdown.child_token();
    let receipt = state.inner.session.increment(prover, &cancel).await?;
    let count = state.inner.query.query_counter(&receipt.prover).await?;

    Ok(Json(IncrementResponse {
        tx_id: receipt.tx_id.to_string(),
        stage: receipt.stage,
        prover: state.address(&receipt.prover),
        payer: state.address(&receipt.payer),
        fee: receipt.fee.to_string(),
        count,
    }))
}

/// Counter response.
#[derive(Debug, Serialize)]
pub struct CounterResponse {
    pub address: String,
    pub coin_public_key: String,
    pub count: u64,
}

impl CounterResponse {
    fn new(state: &AppState, reading: CounterReading) -> Self {
        Self {
            address: state.address(&reading.key),
            coin_public_key: reading.key.to_hex(),
            count: reading.count,
        }
    }
}

/// Counter of the sponsor's own identity.
async fn own_counter(State(state): State<AppState>) -> Result<Json<CounterResponse>, ApiError> {
    let ctx = &state.inner;
    let reading = ctx.session.own_counter(&ctx.query).await?;
    Ok(Json(CounterResponse::new(&state, reading)))
}

/// Counter of an arbitrary address.
async fn counter_of(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<CounterResponse>, ApiError> {
    let ctx = &state.inner;
    let reading = ctx
        .query
        .counter_for(Some(address.as_str()), ctx.session.provider(), ctx.session.overrides())
        .await?;
    Ok(Json(CounterResponse::new(&state, reading)))
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
    stage: Option<PipelineStage>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            stage: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut body = serde_json::json!({
            "error": self.message,
            "error_code": self.code,
        });
        if let Some(stage) = self.stage {
            body["stage"] = serde_json::json!(stage);
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<SponsorError> for ApiError {
    fn from(err: SponsorError) -> Self {
        let status = StatusCode::from_u16(err.suggested_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::warn!(error = %err, code = err.error_code(), "request failed");
        }
        ApiError::new(status, err.error_code(), err.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let mut api = ApiError::from(err.source);
        api.stage = Some(err.stage);
        api
    }
}
