//!
//! Global Safety HTTP server
//! -------------------------
//! Axum application for the SHST platform. Every request passes the route authorizer
//! middleware before it reaches a handler.
//!
//! Responsibilities:
//! - Login (HTML form and JSON) backed by the `identity` provider; issues the signed session cookie.
//! - Logout by expiring the cookie; there is no server-side session state.
//! - Role gating of the section prefixes with redirects to `/login` or `/dashboard`.
//! - Sliding renewal of sessions older than half their lifetime.
//! - Placeholder section endpoints that expose the caller's claims to page logic.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Extension, Form, Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult, INVALID_CREDENTIALS_MESSAGE};
use crate::identity::{
    AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse, RequestContext, RouteTable, Session,
    SessionManager, StaticUserDirectory, DEFAULT_LANDING_PATH, LOGIN_PATH,
};
use crate::security;

pub const SESSION_COOKIE: &str = "globalsafety_session";

/// Pages outside every route rule; reachable without a session.
const PUBLIC_PAGES: &[&str] = &["/matriz-conformidade", "/politica-de-privacidade", "/politica-de-cookies"];

const LOGIN_ERROR_QUERY: &str = "CredentialsSignin";

/// Shared server state injected into all handlers and the authorizer middleware.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn AuthProvider>,
    pub sessions: SessionManager,
    pub routes: Arc<RouteTable>,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(provider: Arc<dyn AuthProvider>, sessions: SessionManager, routes: RouteTable, secure_cookies: bool) -> Self {
        Self { provider, sessions, routes: Arc::new(routes), secure_cookies }
    }

    /// Demo registry, default route table, signing key from config or a fresh random one.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let key = match &config.session_secret {
            Some(s) => s.as_bytes().to_vec(),
            None => {
                warn!("no session secret configured; using a random key, sessions will not survive a restart");
                security::random_bytes(32)?
            }
        };
        let sessions = SessionManager::new(&key, Duration::hours(config.session_ttl_hours));
        let directory = StaticUserDirectory::demo()?;
        info!(users = directory.len(), "user directory loaded");
        let provider = LocalAuthProvider::new(Arc::new(directory), sessions.clone());
        Ok(Self::new(Arc::new(provider), sessions, RouteTable::default(), config.secure_cookies))
    }
}

pub fn build_router(state: AppState) -> Router {
    let mut app: Router<AppState> = Router::new()
        .route("/", get(home))
        .route("/login", get(login_page).post(login_form))
        .route("/logout", get(logout).post(logout))
        .route("/api/auth/login", post(login_json))
        .route("/api/auth/session", get(session_info));
    for rule in state.routes.rules() {
        app = app
            .route(rule.prefix, get(section_page))
            .route(&format!("{}/{{*rest}}", rule.prefix), get(section_page));
    }
    for page in PUBLIC_PAGES {
        app = app.route(page, get(public_page));
    }
    app.fallback(not_found)
        .layer(from_fn_with_state(state.clone(), authorize_request))
        .with_state(state)
}

pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let addr = SocketAddr::new(config.bind, config.http_port);
    info!(
        "Starting server on {} (session_ttl_hours={}, secure_cookies={})",
        addr, config.session_ttl_hours, config.secure_cookies
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, state).await
}

// ---- cookies ----

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all("cookie") {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name { return Some(v.to_string()); }
            }
        }
    }
    None
}

fn cookie_attrs(secure: bool) -> &'static str {
    if secure { "HttpOnly; Secure; SameSite=Lax; Path=/" } else { "HttpOnly; SameSite=Lax; Path=/" }
}

fn set_session_cookie(session: &Session, secure: bool) -> AppResult<HeaderValue> {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    HeaderValue::from_str(&format!("{}={}; {}; Max-Age={}", SESSION_COOKIE, session.token, cookie_attrs(secure), max_age))
        .map_err(|e| AppError::internal("cookie_encoding".to_string(), e.to_string()))
}

fn clear_session_cookie(secure: bool) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}=deleted; {}; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
        SESSION_COOKIE, cookie_attrs(secure)
    ))
    .map_err(|e| AppError::internal("cookie_encoding".to_string(), e.to_string()))
}

// ---- route authorizer ----

async fn authorize_request(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let now = Utc::now();
    let session = parse_cookie(req.headers(), SESSION_COOKIE).and_then(|token| match state.sessions.decode_at(&token, now) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!(target: "authz", "session ignored: {}", e);
            None
        }
    });

    let decision = state.routes.decide(&path, session.as_ref().map(|s| &s.claims));
    if let Some(target) = decision.redirect_target() {
        info!(target: "authz", "redirect path={} to={} authenticated={}", path, target, session.is_some());
        return Redirect::to(target).into_response();
    }

    let renewed = match &session {
        Some(s) if state.sessions.needs_renewal(s, now) => state.sessions.issue_at(s.claims.clone(), now).ok(),
        _ => None,
    };
    let ctx = match &session {
        Some(s) => RequestContext::from_session(s),
        None => RequestContext::anonymous(),
    };
    req.extensions_mut().insert(ctx);

    let mut resp = next.run(req).await;
    if let Some(fresh) = renewed {
        // A handler that already set the cookie (login, logout) wins.
        if !resp.headers().contains_key(SET_COOKIE) {
            if let Ok(v) = set_session_cookie(&fresh, state.secure_cookies) {
                debug!(target: "authz", "session renewed user={}", fresh.claims.id);
                resp.headers_mut().append(SET_COOKIE, v);
            }
        }
    }
    resp
}

// ---- handlers ----

#[derive(Debug, Deserialize)]
struct LoginPayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPageQuery {
    error: Option<String>,
}

async fn run_login(state: &AppState, payload: LoginPayload) -> AppResult<Option<LoginResponse>> {
    let provider = state.provider.clone();
    let req = LoginRequest { email: payload.email, password: payload.password };
    // Argon2 is CPU-bound; keep it off the async workers.
    tokio::task::spawn_blocking(move || provider.login(&req))
        .await
        .map_err(|e| AppError::internal("login_task_failed".to_string(), e.to_string()))?
}

async fn home(Extension(ctx): Extension<RequestContext>) -> Redirect {
    if ctx.is_authenticated() { Redirect::to(DEFAULT_LANDING_PATH) } else { Redirect::to(LOGIN_PATH) }
}

async fn login_page(Query(q): Query<LoginPageQuery>) -> Html<String> {
    let error = if q.error.is_some() {
        format!("<p class=\"error\" role=\"alert\">{}</p>", INVALID_CREDENTIALS_MESSAGE)
    } else {
        String::new()
    };
    Html(format!(
        "<!doctype html><html lang=\"pt\"><head><meta charset=\"utf-8\"><title>Global Safety</title></head><body>\
         <h1>Global Safety</h1><p>Plataforma de Gestão SHST</p>{}\
         <form method=\"post\" action=\"/login\">\
         <label for=\"email\">Email</label><input type=\"email\" id=\"email\" name=\"email\" required>\
         <label for=\"password\">Palavra-passe</label><input type=\"password\" id=\"password\" name=\"password\" required>\
         <button type=\"submit\">Entrar</button></form></body></html>",
        error
    ))
}

async fn login_form(State(state): State<AppState>, Form(payload): Form<LoginPayload>) -> AppResult<Response> {
    match run_login(&state, payload).await? {
        Some(resp) => {
            let cookie = set_session_cookie(&resp.session, state.secure_cookies)?;
            Ok(([(SET_COOKIE, cookie)], Redirect::to(DEFAULT_LANDING_PATH)).into_response())
        }
        None => {
            warn!(target: "auth", "login failed (form)");
            Ok(Redirect::to(&format!("{}?error={}", LOGIN_PATH, LOGIN_ERROR_QUERY)).into_response())
        }
    }
}

async fn login_json(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> AppResult<Response> {
    let Some(resp) = run_login(&state, payload).await? else {
        warn!(target: "auth", "login failed (json)");
        return Err(AppError::invalid_credentials());
    };
    let cookie = set_session_cookie(&resp.session, state.secure_cookies)?;
    let body = serde_json::json!({
        "status": "ok",
        "user": resp.session.claims,
        "expires": resp.session.expires_at.to_rfc3339(),
    });
    Ok((StatusCode::OK, [(SET_COOKIE, cookie)], Json(body)).into_response())
}

async fn session_info(Extension(ctx): Extension<RequestContext>) -> Json<serde_json::Value> {
    match (ctx.claims, ctx.expires_at) {
        (Some(claims), Some(exp)) => Json(serde_json::json!({ "user": claims, "expires": exp.to_rfc3339() })),
        _ => Json(serde_json::json!({})),
    }
}

async fn logout(State(state): State<AppState>) -> AppResult<Response> {
    let cookie = clear_session_cookie(state.secure_cookies)?;
    Ok(([(SET_COOKIE, cookie)], Redirect::to(LOGIN_PATH)).into_response())
}

fn first_segment(path: &str) -> &str {
    path.trim_start_matches('/').split('/').next().unwrap_or("")
}

async fn section_page(Extension(ctx): Extension<RequestContext>, uri: Uri) -> AppResult<Json<serde_json::Value>> {
    // The authorizer only lets protected paths through with claims attached.
    let Some(claims) = ctx.claims else {
        return Err(AppError::auth("unauthenticated", "session required"));
    };
    Ok(Json(serde_json::json!({
        "section": first_segment(uri.path()),
        "path": uri.path(),
        "requestId": ctx.request_id,
        "user": claims,
    })))
}

async fn public_page(Extension(ctx): Extension<RequestContext>, uri: Uri) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "page": first_segment(uri.path()),
        "requestId": ctx.request_id,
        "user": ctx.claims,
    }))
}

async fn not_found(uri: Uri) -> AppError {
    AppError::not_found("not_found".to_string(), format!("no route for {}", uri.path()))
}
