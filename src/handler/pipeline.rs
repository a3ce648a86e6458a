//! Request pipeline
//!
//! Entry point for HTTP request processing. Every request passes the stages
//! in a fixed order:
//!
//! 1. rate limiting
//! 2. IP access control
//! 3. basic authentication
//! 4. CORS preflight
//! 5. method check
//! 6. path resolution
//! 7. cache negotiation and compression (static files)
//!
//! A stage that ends the request early returns a [`Termination`]; this
//! module is the only place that turns one into a response. Security, CORS
//! and `Server` headers are attached to every response, and one access log
//! line is written per request.

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Method, Request, Response, StatusCode, Version};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppState;
use crate::handler::resolve::ResolvedEntity;
use crate::handler::static_files::{self, ResolvedFile};
use crate::handler::{errors, listing};
use crate::http::{self, response::ALLOWED_METHODS, ConditionalHeaders, ServeError};
use crate::logger::{self, AccessLogEntry};
use crate::security::{self, AccessDecision, AuthOutcome, RateDecision};

/// Request context encapsulating information needed for request processing
#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    /// Raw (percent-encoded) request path
    pub path: String,
    pub query: Option<String>,
    pub version: Version,
    pub client_ip: IpAddr,
    pub is_head: bool,
    pub conditional: ConditionalHeaders,
    pub origin: Option<HeaderValue>,
    pub authorization: Option<String>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new<B>(req: &Request<B>, peer: SocketAddr, state: &AppState) -> Self {
        let headers = req.headers();
        let text = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            query: req.uri().query().map(ToString::to_string),
            version: req.version(),
            client_ip: security::resolve_client_ip(
                headers,
                peer.ip(),
                &state.config.security.trusted_proxies,
            ),
            is_head: *req.method() == Method::HEAD,
            conditional: ConditionalHeaders::from_headers(headers),
            origin: headers.get(header::ORIGIN).cloned(),
            authorization: text(header::AUTHORIZATION),
            referer: text(header::REFERER),
            user_agent: text(header::USER_AGENT),
        }
    }
}

/// Ways a request leaves the pipeline before a file or listing is served
#[derive(Debug)]
pub enum Termination {
    RateLimited { retry_after: u64 },
    Forbidden,
    Unauthorized,
    Preflight,
    MethodNotAllowed,
    NotModified(HeaderMap),
    NotFound,
    ServerError,
}

impl Termination {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Preflight => StatusCode::NO_CONTENT,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotModified(_) => StatusCode::NOT_MODIFIED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServeError> for Termination {
    fn from(err: ServeError) -> Self {
        match err {
            ServeError::NotFound => Self::NotFound,
            ServeError::Forbidden => Self::Forbidden,
            ServeError::Io(_) => Self::ServerError,
        }
    }
}

/// Main entry point for HTTP request handling.
///
/// The request body is never read.
pub async fn handle_request<B>(
    req: Request<B>,
    peer: SocketAddr,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let ctx = RequestContext::new(&req, peer, &state);
    drop(req);

    let cors = state.cors.apply(ctx.origin.as_ref(), &ctx.method);
    let mut response = match process(&ctx, &state, cors.preflight).await {
        Ok(response) => response,
        Err(termination) => terminate(termination, &ctx, &state).await,
    };

    apply_common_headers(response.headers_mut(), &cors.headers, &state);

    if state.config.logging.access_log {
        log_access(&ctx, &response, started, &state);
    }
    Ok(response)
}

/// Run the stages in order
async fn process(
    ctx: &RequestContext,
    state: &AppState,
    preflight: bool,
) -> Result<Response<Full<Bytes>>, Termination> {
    // 1. Rate limit
    if let RateDecision::Limited { retry_after } = state.rate_limiter.check(ctx.client_ip) {
        return Err(Termination::RateLimited {
            retry_after: security::retry_after_secs(retry_after),
        });
    }

    // 2. IP allow/deny
    if state.access.check(ctx.client_ip) == AccessDecision::Deny {
        logger::log_debug(&format!("Access denied for {}", ctx.client_ip));
        return Err(Termination::Forbidden);
    }

    // 3. Basic auth
    if let Some(auth) = &state.auth {
        if auth.authenticate(ctx.authorization.as_deref()) == AuthOutcome::Unauthorized {
            return Err(Termination::Unauthorized);
        }
    }

    // 4. CORS preflight
    if preflight {
        return Err(Termination::Preflight);
    }

    // 5. Method
    match ctx.method {
        Method::GET | Method::HEAD => {}
        Method::OPTIONS => return Ok(http::build_options_response()),
        _ => return Err(Termination::MethodNotAllowed),
    }

    // 6. Resolve and serve
    match state.resolver.resolve(&ctx.path).await {
        ResolvedEntity::RegularFile {
            path,
            size,
            modified,
        } => {
            let file = ResolvedFile {
                path: &path,
                size,
                modified,
            };
            static_files::serve_file(ctx, state, &file).await
        }
        ResolvedEntity::Directory {
            path,
            listable: true,
        } => {
            let display_path = percent_decode_str(&ctx.path).decode_utf8_lossy();
            Ok(listing::serve_listing(&path, &display_path, ctx.is_head).await?)
        }
        ResolvedEntity::Directory {
            listable: false, ..
        }
        | ResolvedEntity::NotFound => Err(Termination::NotFound),
        ResolvedEntity::Forbidden => Err(Termination::Forbidden),
    }
}

/// Turn an early exit into its response.
///
/// Success exits (preflight, 304) carry no body; every error status is
/// rendered by the error presenter.
async fn terminate(
    termination: Termination,
    ctx: &RequestContext,
    state: &AppState,
) -> Response<Full<Bytes>> {
    let status = termination.status();
    let mut headers = HeaderMap::new();
    match termination {
        Termination::Preflight => return http::build_preflight_response(headers),
        Termination::NotModified(cache_headers) => return http::build_304_response(cache_headers),
        Termination::RateLimited { retry_after } => {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        Termination::Unauthorized => {
            if let Some(challenge) = state
                .auth
                .as_ref()
                .and_then(|auth| HeaderValue::from_str(&auth.challenge()).ok())
            {
                headers.insert(header::WWW_AUTHENTICATE, challenge);
            }
        }
        Termination::MethodNotAllowed => {
            headers.insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        }
        Termination::Forbidden | Termination::NotFound | Termination::ServerError => {}
    }

    logger::log_debug(&format!(
        "{} {} from {} -> {}",
        ctx.method,
        ctx.path,
        ctx.client_ip,
        status.as_u16()
    ));

    let page = errors::render(status, state.config.error_pages()).await;
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(page.content_type),
    );
    http::build_response(status, headers, page.body, ctx.is_head)
}

/// Attach CORS, security and `Server` headers
fn apply_common_headers(headers: &mut HeaderMap, cors: &HeaderMap, state: &AppState) {
    for (name, value) in cors {
        if *name == header::VARY {
            headers.append(name.clone(), value.clone());
        } else {
            headers.insert(name.clone(), value.clone());
        }
    }
    for (name, value) in state.config.security_headers() {
        headers.insert(name.clone(), value.clone());
    }
    headers.insert(header::SERVER, state.server_header.clone());
}

fn log_access(
    ctx: &RequestContext,
    response: &Response<Full<Bytes>>,
    started: Instant,
    state: &AppState,
) {
    let http_version = match ctx.version {
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        _ => "1.1",
    };
    let entry = AccessLogEntry {
        client_ip: ctx.client_ip,
        time: chrono::Local::now(),
        method: ctx.method.to_string(),
        path: ctx.path.clone(),
        query: ctx.query.clone(),
        http_version: http_version.to_string(),
        status: response.status().as_u16(),
        body_bytes: response.body().size_hint().exact().unwrap_or(0),
        referer: ctx.referer.clone(),
        user_agent: ctx.user_agent.clone(),
        duration_us: u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
    };
    logger::log_access(&entry, &state.config.logging.access_log_format);
}
