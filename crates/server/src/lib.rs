use axum::{
    extract::{rejection::JsonRejection, FromRequest, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    routing::post,
    Json, Router,
};
use nationgrid_engine::catalog::{ResearchBranch, StructureKind, Technology, UnitKind};
use nationgrid_engine::{
    Country, Engine, GameError, NationEvent, NewNation, Research, Resources, Structure, Territory,
    Trade, Unit, User,
};
use nationgrid_protocol::{
    paths, ApiError, BuildStructureInput, Invalidation, LoginInput, ResearchInput, RevOutput,
    SignupInput, TradeInput, TrainUnitsInput, WsMessage,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod session;
pub mod ws;

pub use config::{Args, ServerConfig};
use session::SessionStore;
use ws::Relay;

pub struct AppState {
    pub engine: Engine,
    pub sessions: SessionStore,
    pub relay: Relay,
    pub allow_origins: Vec<String>,
}

impl AppState {
    pub fn new(engine: Engine, config: &ServerConfig) -> Self {
        Self {
            engine,
            sessions: SessionStore::new(config.session_ttl, config.secure_cookies),
            relay: Relay::default(),
            allow_origins: config.allow_origins.clone(),
        }
    }

    fn notify(&self, kinds: &[Invalidation]) {
        for &kind in kinds {
            self.relay.publish(&WsMessage::new(kind));
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.allow_origins.clone());
    Router::new()
        .route(paths::HEALTH, get(health))
        .route(paths::REV, get(api_rev))
        .route(paths::SIGNUP, post(api_signup))
        .route(paths::LOGIN, post(api_login))
        .route(paths::LOGOUT, post(api_logout))
        .route(paths::COUNTRY, get(api_country))
        .route(paths::COUNTRIES, get(api_countries))
        .route(paths::RESOURCES, get(api_resources))
        .route(paths::TERRITORIES, get(api_territories))
        .route(paths::STRUCTURES, get(api_structures).post(api_build_structure))
        .route(paths::UNITS, get(api_units).post(api_train_units))
        .route(paths::RESEARCH, get(api_research).post(api_complete_research))
        .route(paths::TRADES, get(api_trades).post(api_create_trade))
        .route(paths::EVENTS, get(api_events))
        .route(paths::WS, get(ws::ws_handler))
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
        // Session cookies ride along on cross-origin requests, so never `*`.
        .layer(cors)
}

/// An error response: status plus `{ "error": ... }`.
#[derive(Debug)]
pub struct ApiFailure(pub StatusCode, pub ApiError);

impl ApiFailure {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self(status, ApiError::new(msg))
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }
}

impl From<GameError> for ApiFailure {
    fn from(e: GameError) -> Self {
        let status = match &e {
            GameError::UsernameTaken
            | GameError::Insufficient(_)
            | GameError::InvalidInput(_)
            | GameError::AlreadyResearched(_) => StatusCode::BAD_REQUEST,
            GameError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            GameError::ForeignTerritory => StatusCode::FORBIDDEN,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::Allocation(_) => StatusCode::SERVICE_UNAVAILABLE,
            GameError::Storage(err) => {
                tracing::error!(error = ?err, "storage failure");
                return Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<JsonRejection> for ApiFailure {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiFailure>;

/// `Json` body extractor whose rejections use the `{ "error": ... }` shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiFailure))]
pub struct ApiJson<T>(pub T);

async fn health() -> &'static str {
    "ok"
}

async fn api_rev(State(state): State<Arc<AppState>>) -> ApiResult<RevOutput> {
    let rev = state.engine.get_rev().map_err(GameError::from)?;
    Ok(Json(RevOutput { rev }))
}

#[derive(Debug, Serialize)]
pub struct SignupOutput {
    pub user: User,
    pub country: Country,
}

#[derive(Debug, Serialize)]
pub struct LoginOutput {
    pub user: User,
}

fn with_cookie(cookie: HeaderValue) -> [(header::HeaderName, HeaderValue); 1] {
    [(header::SET_COOKIE, cookie)]
}

async fn api_signup(
    State(state): State<Arc<AppState>>,
    ApiJson(input): ApiJson<SignupInput>,
) -> Result<impl IntoResponse, ApiFailure> {
    let form = NewNation {
        username: &input.username,
        password: &input.password,
        country_name: &input.country_name,
        capital_city_name: &input.capital_city_name,
    };
    let nation = state.engine.found_nation(&form, &mut rand::thread_rng())?;

    let token = state.sessions.create(&nation.user.id);
    state.notify(&[Invalidation::TerritoryUpdate]);

    Ok((
        with_cookie(state.sessions.set_cookie(&token)),
        Json(SignupOutput {
            user: nation.user,
            country: nation.country,
        }),
    ))
}

async fn api_login(
    State(state): State<Arc<AppState>>,
    ApiJson(input): ApiJson<LoginInput>,
) -> Result<impl IntoResponse, ApiFailure> {
    if input.username.is_empty() || input.password.is_empty() {
        return Err(ApiFailure::new(StatusCode::BAD_REQUEST, "Missing credentials"));
    }
    let user = state.engine.authenticate(&input.username, &input.password)?;
    let token = state.sessions.create(&user.id);
    Ok((
        with_cookie(state.sessions.set_cookie(&token)),
        Json(LoginOutput { user }),
    ))
}

async fn api_logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = session::token_from_headers(&headers) {
        state.sessions.destroy(&token);
    }
    (
        with_cookie(state.sessions.clear_cookie()),
        Json(serde_json::json!({ "success": true })),
    )
}

fn require_user(state: &AppState, headers: &HeaderMap) -> Result<String, ApiFailure> {
    session::token_from_headers(headers)
        .and_then(|token| state.sessions.user_id(&token))
        .ok_or_else(ApiFailure::unauthorized)
}

fn require_country(state: &AppState, headers: &HeaderMap) -> Result<Country, ApiFailure> {
    let user_id = require_user(state, headers)?;
    let country = state
        .engine
        .country_for_user(&user_id)?
        .ok_or(GameError::NotFound("Country"))?;
    Ok(country)
}

async fn api_country(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Country> {
    Ok(Json(require_country(&state, &headers)?))
}

async fn api_countries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Vec<Country>> {
    require_user(&state, &headers)?;
    Ok(Json(state.engine.list_countries()?))
}

async fn api_resources(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Resources> {
    let country = require_country(&state, &headers)?;
    let resources = state
        .engine
        .resources_for_country(&country.id)?
        .ok_or(GameError::NotFound("Resources"))?;
    Ok(Json(resources))
}

async fn api_territories(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Vec<Territory>> {
    require_user(&state, &headers)?;
    Ok(Json(state.engine.list_territories()?))
}

async fn api_structures(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Vec<Structure>> {
    let country = require_country(&state, &headers)?;
    Ok(Json(state.engine.structures_for_country(&country.id)?))
}

async fn api_build_structure(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<BuildStructureInput>,
) -> ApiResult<Structure> {
    let country = require_country(&state, &headers)?;
    let kind: StructureKind = input.structure_type.parse().map_err(GameError::from)?;
    let structure = state
        .engine
        .build_structure(&country.id, &input.territory_id, kind)?;
    state.notify(&[Invalidation::StructureUpdate, Invalidation::ResourceUpdate]);
    Ok(Json(structure))
}

async fn api_units(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Vec<Unit>> {
    let country = require_country(&state, &headers)?;
    Ok(Json(state.engine.units_for_country(&country.id)?))
}

async fn api_train_units(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<TrainUnitsInput>,
) -> ApiResult<Unit> {
    let country = require_country(&state, &headers)?;
    let kind: UnitKind = input.unit_type.parse().map_err(GameError::from)?;
    let unit = state.engine.train_units(&country.id, kind, input.quantity)?;
    state.notify(&[Invalidation::UnitUpdate, Invalidation::ResourceUpdate]);
    Ok(Json(unit))
}

async fn api_research(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Vec<Research>> {
    let country = require_country(&state, &headers)?;
    Ok(Json(state.engine.research_for_country(&country.id)?))
}

async fn api_complete_research(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<ResearchInput>,
) -> ApiResult<Research> {
    let country = require_country(&state, &headers)?;
    let technology: Technology = input.technology.parse().map_err(GameError::from)?;
    let branch = input
        .branch
        .as_deref()
        .map(str::parse::<ResearchBranch>)
        .transpose()
        .map_err(GameError::from)?;
    let research = state
        .engine
        .complete_research(&country.id, branch, technology)?;
    state.notify(&[Invalidation::ResearchUpdate, Invalidation::ResourceUpdate]);
    Ok(Json(research))
}

async fn api_trades(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Vec<Trade>> {
    let country = require_country(&state, &headers)?;
    Ok(Json(state.engine.trades_for_country(&country.id)?))
}

async fn api_create_trade(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<TradeInput>,
) -> ApiResult<Trade> {
    let country = require_country(&state, &headers)?;
    let trade = state.engine.create_trade(
        &country.id,
        &input.to_country_id,
        &input.offer,
        &input.request,
    )?;
    // The recipient's client uses the payload to tell its own offers apart.
    state.relay.publish(
        &WsMessage::new(Invalidation::TradeUpdate).with_payload(serde_json::json!({
            "tradeId": trade.id,
            "fromCountryId": trade.from_country_id,
            "toCountryId": trade.to_country_id,
        })),
    );
    Ok(Json(trade))
}

async fn api_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Vec<NationEvent>> {
    let country = require_country(&state, &headers)?;
    Ok(Json(state.engine.events_for_country(&country.id)?))
}

pub async fn serve(config: ServerConfig, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_listener(listener, config, shutdown_signal()).await?;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    config: ServerConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let engine = Engine::new(&config.db_path).with_world(config.world);
    // Fail fast if the database cannot be opened or migrated.
    engine.open()?;

    let app = build_router(AppState::new(engine, &config));
    let addr = listener.local_addr()?;
    tracing::info!(%addr, db = %config.db_path.display(), "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(addr)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn cors_layer(extra_origins: Vec<String>) -> CorsLayer {
    use axum::http::Method;

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _req| {
            is_allowed_origin(origin, &extra_origins)
        }))
}

fn is_allowed_origin(origin: &HeaderValue, extra: &[String]) -> bool {
    let Ok(s) = origin.to_str() else {
        return false;
    };
    if extra.iter().any(|o| o == s) {
        return true;
    }
    is_http_origin_for_host(s, "localhost") || is_http_origin_for_host(s, "127.0.0.1")
}

fn is_http_origin_for_host(origin: &str, host: &str) -> bool {
    for scheme in ["http://", "https://"] {
        if let Some(rest) = origin.strip_prefix(scheme) {
            if let Some(after) = rest.strip_prefix(host) {
                // Origin is just scheme://host[:port]
                return after.is_empty() || after.starts_with(':');
            }
        }
    }
    false
}
