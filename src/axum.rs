//! Axum integration utilities.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::book::DeleteConfirmation;
use crate::gate::{Decision, Gate};
use crate::permission::ActionKind;
use crate::types::{PrincipalId, ResourceType};

use ::axum::body::Body;
use ::http::{Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::tower::{Layer, Service};

/// Authentication context extracted from a request.
///
/// `principal` is `None` for anonymous requests; the gate denies those.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// Acting principal.
    pub principal: Option<PrincipalId>,
}

impl AuthContext {
    pub fn new(principal: PrincipalId) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Middleware layer that authorizes a request using [`Gate`].
#[derive(Debug)]
pub struct AuthorizeLayer<S> {
    gate: Arc<Gate<S>>,
    resource: ResourceType,
    action: ActionKind,
}

impl<S> Clone for AuthorizeLayer<S> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            resource: self.resource.clone(),
            action: self.action,
        }
    }
}

impl<S> AuthorizeLayer<S> {
    /// Creates a new authorization layer for `action` on `resource`.
    pub fn new(gate: Arc<Gate<S>>, resource: ResourceType, action: ActionKind) -> Self {
        Self {
            gate,
            resource,
            action,
        }
    }
}

impl<S, Inner> Layer<Inner> for AuthorizeLayer<S>
where
    S: crate::store::Store,
{
    type Service = AuthorizeService<Inner, S>;

    fn layer(&self, inner: Inner) -> Self::Service {
        AuthorizeService {
            inner,
            gate: self.gate.clone(),
            resource: self.resource.clone(),
            action: self.action,
        }
    }
}

/// Middleware service that enforces permission checks.
#[derive(Debug)]
pub struct AuthorizeService<Inner, S> {
    inner: Inner,
    gate: Arc<Gate<S>>,
    resource: ResourceType,
    action: ActionKind,
}

impl<Inner: Clone, S> Clone for AuthorizeService<Inner, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: self.gate.clone(),
            resource: self.resource.clone(),
            action: self.action,
        }
    }
}

impl<Inner, S> Service<Request<Body>> for AuthorizeService<Inner, S>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    S: crate::store::Store + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let gate = self.gate.clone();
        let resource = self.resource.clone();
        let action = self.action;

        Box::pin(async move {
            // Deletion needs an explicit confirmation request, never a retrieval.
            let confirmed = DeleteConfirmation::from_method(req.method().as_str()).is_some();
            if action == ActionKind::Delete && !confirmed {
                return Ok((StatusCode::METHOD_NOT_ALLOWED, "confirmation required").into_response());
            }

            let principal = req
                .extensions()
                .get::<AuthContext>()
                .and_then(|context| context.principal);

            match gate.authorize(principal.as_ref(), &resource, action).await {
                Ok(Decision::Allow) => {
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                // Same response for every reason so callers cannot enumerate accounts.
                Ok(Decision::Deny(_)) => Ok((StatusCode::FORBIDDEN, "forbidden").into_response()),
                Err(err) => {
                    tracing::error!(error = %err, "authorization failed");
                    Ok((StatusCode::INTERNAL_SERVER_ERROR, "auth error").into_response())
                }
            }
        })
    }
}

#[cfg(feature = "axum-jwt")]
pub mod jwt {
    use std::fmt;
    use std::future::poll_fn;
    use std::marker::PhantomData;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use jsonwebtoken::{DecodingKey, Validation, decode};
    use serde::de::DeserializeOwned;
    use thiserror::Error;

    use crate::axum::AuthContext;
    use crate::types::PrincipalId;

    use ::axum::body::Body;
    use ::axum::extract::FromRequestParts;
    use ::http::header::AUTHORIZATION;
    use ::http::request::Parts;
    use ::http::{HeaderMap, Request, StatusCode};
    use ::axum::response::{IntoResponse, Response};
    use ::tower::{Layer, Service};

    /// Errors returned by JWT auth helpers.
    #[derive(Debug, Error)]
    pub enum AuthError {
        /// Authorization header is missing.
        #[error("missing authorization header")]
        MissingAuthorization,
        /// Authorization header format is invalid.
        #[error("invalid authorization header")]
        InvalidAuthorization,
        /// JWT validation error.
        #[error("invalid token")]
        InvalidToken,
        /// Subject is not a principal id.
        #[error("invalid subject: {0}")]
        InvalidSubject(String),
    }

    /// Rejection type for axum extractors.
    #[derive(Debug)]
    pub struct AuthRejection {
        status: StatusCode,
        message: String,
    }

    impl From<AuthError> for AuthRejection {
        fn from(err: AuthError) -> Self {
            Self {
                status: StatusCode::UNAUTHORIZED,
                message: err.to_string(),
            }
        }
    }

    impl IntoResponse for AuthRejection {
        fn into_response(self) -> Response {
            (self.status, self.message).into_response()
        }
    }

    /// Claims type carrying the acting principal.
    pub trait JwtClaims: DeserializeOwned + Send + Sync + Clone + 'static {
        /// Returns the principal id string.
        fn principal_id(&self) -> &str;
    }

    /// Default JWT claims shape: `{ sub, exp }` with `sub` a principal id.
    #[derive(Debug, Clone, serde::Deserialize)]
    pub struct DefaultClaims {
        /// Principal id.
        pub sub: String,
        /// Standard JWT expiration.
        pub exp: Option<usize>,
    }

    impl JwtClaims for DefaultClaims {
        fn principal_id(&self) -> &str {
            &self.sub
        }
    }

    /// JWT auth state holding decoding settings.
    #[derive(Clone)]
    pub struct JwtAuthState<C: JwtClaims> {
        decoding_key: Arc<DecodingKey>,
        validation: Validation,
        _marker: PhantomData<fn() -> C>,
    }

    impl<C: JwtClaims> fmt::Debug for JwtAuthState<C> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("JwtAuthState")
                .field("decoding_key", &"<redacted>")
                .field("validation", &self.validation)
                .finish()
        }
    }

    impl<C: JwtClaims> JwtAuthState<C> {
        /// Creates a new JWT auth state.
        pub fn new(decoding_key: DecodingKey, validation: Validation) -> Self {
            Self {
                decoding_key: Arc::new(decoding_key),
                validation,
                _marker: PhantomData,
            }
        }

        fn decode_from_headers(&self, headers: &HeaderMap) -> Result<JwtAuth<C>, AuthError> {
            let token = bearer_token(headers)?;
            let data = decode::<C>(token, &self.decoding_key, &self.validation)
                .map_err(|_| AuthError::InvalidToken)?;
            JwtAuth::from_claims(data.claims)
        }
    }

    /// Provides access to [`JwtAuthState`] for extractors.
    pub trait JwtAuthProvider<C: JwtClaims> {
        /// Returns the JWT auth state for decoding.
        fn jwt_auth(&self) -> &JwtAuthState<C>;
    }

    /// Extracted JWT auth context plus claims.
    #[derive(Debug, Clone)]
    pub struct JwtAuth<C: JwtClaims> {
        /// Parsed auth context.
        pub context: AuthContext,
        /// Full claims.
        pub claims: C,
    }

    impl<C: JwtClaims> JwtAuth<C> {
        fn from_claims(claims: C) -> Result<Self, AuthError> {
            let principal: PrincipalId = claims
                .principal_id()
                .parse()
                .map_err(|err: crate::Error| AuthError::InvalidSubject(err.to_string()))?;
            Ok(Self {
                context: AuthContext::new(principal),
                claims,
            })
        }
    }

    impl<S, C> FromRequestParts<S> for JwtAuth<C>
    where
        S: Send + Sync + JwtAuthProvider<C>,
        C: JwtClaims,
    {
        type Rejection = AuthRejection;

        async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
            if let Some(existing) = parts.extensions.get::<JwtAuth<C>>() {
                return Ok(existing.clone());
            }
            let auth = state.jwt_auth().decode_from_headers(&parts.headers)?;
            parts.extensions.insert(auth.clone());
            parts.extensions.insert(auth.context.clone());
            Ok(auth)
        }
    }

    /// Middleware layer that decodes a bearer token when present and inserts
    /// [`AuthContext`]. Requests without a token continue as anonymous.
    #[derive(Debug, Clone)]
    pub struct JwtAuthLayer<C: JwtClaims> {
        state: Arc<JwtAuthState<C>>,
    }

    impl<C: JwtClaims> JwtAuthLayer<C> {
        /// Creates a new JWT auth layer.
        pub fn new(state: JwtAuthState<C>) -> Self {
            Self {
                state: Arc::new(state),
            }
        }
    }

    impl<S, C> Layer<S> for JwtAuthLayer<C>
    where
        C: JwtClaims,
    {
        type Service = JwtAuthService<S, C>;

        fn layer(&self, inner: S) -> Self::Service {
            JwtAuthService {
                inner,
                state: self.state.clone(),
            }
        }
    }

    /// Middleware service that decodes JWT and attaches [`AuthContext`].
    #[derive(Debug, Clone)]
    pub struct JwtAuthService<S, C: JwtClaims> {
        inner: S,
        state: Arc<JwtAuthState<C>>,
    }

    impl<S, C> Service<Request<Body>> for JwtAuthService<S, C>
    where
        S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
        S::Future: Send + 'static,
        C: JwtClaims,
    {
        type Response = Response;
        type Error = S::Error;
        type Future =
            Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, mut req: Request<Body>) -> Self::Future {
            let state = self.state.clone();
            let mut inner = self.inner.clone();

            Box::pin(async move {
                if !req.headers().contains_key(AUTHORIZATION) {
                    req.extensions_mut().insert(AuthContext::anonymous());
                } else {
                    match state.decode_from_headers(req.headers()) {
                        Ok(auth) => {
                            req.extensions_mut().insert(auth.context.clone());
                            req.extensions_mut().insert(auth);
                        }
                        Err(err) => return Ok(AuthRejection::from(err).into_response()),
                    }
                }
                poll_fn(|cx| inner.poll_ready(cx)).await?;
                inner.call(req).await
            })
        }
    }

    fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
        let value = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;
        let value = value
            .to_str()
            .map_err(|_| AuthError::InvalidAuthorization)?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthorization)?;
        if token.is_empty() {
            return Err(AuthError::InvalidAuthorization);
        }
        Ok(token)
    }

}
