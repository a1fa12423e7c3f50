use std::{
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use futures_core::ready;
use pin_project_lite::pin_project;
use uuid::Uuid;

use actix_service::{Service, Transform};
use actix_utils::future::{Ready, ready};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, HttpMessage, Result};

use crate::config::{ConfigError, LoggerConfig, has_text};
use crate::context::{self, ContextMap, WithContext};

/// Middleware that establishes the correlation id for every request.
///
/// The id is read from the configured header (`X-Correlation-Id` by
/// default) or generated when the header is missing or blank. It is then
///
/// - stored in the ambient context under the configured key while the
///   downstream service handles the request,
/// - inserted into request extensions as [`CorrelationIdValue`],
/// - echoed back on the response under the same header.
///
/// Handler errors are turned into responses before they reach this
/// middleware, so those responses carry the header too. Only an `Err` from
/// the service itself (an inner middleware failing) goes out without it.
///
/// The context belongs to the request future and is gone as soon as that
/// future completes or is dropped.
///
/// # Examples
/// ```rust
/// use actix_web::App;
/// use method_slogger::CorrelationId;
///
/// let app = App::new()
///     .wrap(CorrelationId::default());
/// ```
pub struct CorrelationId(Rc<Inner>);

#[derive(Debug, Clone)]
struct Inner {
    header: HeaderName,
    context_key: String,
}

impl CorrelationId {
    /// Create the middleware from the header name and context key in `config`.
    pub fn new(config: &LoggerConfig) -> Result<CorrelationId, ConfigError> {
        let header = HeaderName::try_from(config.correlation_id_header())
            .map_err(|_| ConfigError::InvalidHeaderName(config.correlation_id_header().to_string()))?;

        Ok(CorrelationId(Rc::new(Inner {
            header,
            context_key: config.correlation_id_key().to_string(),
        })))
    }
}

impl Default for CorrelationId {
    /// Header `X-Correlation-Id`, context key `correlationId`.
    fn default() -> Self {
        CorrelationId(Rc::new(Inner {
            header: HeaderName::from_static("x-correlation-id"),
            context_key: crate::config::DEFAULT_CORRELATION_ID_KEY.to_string(),
        }))
    }
}

impl<S, B> Transform<S, ServiceRequest> for CorrelationId
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = CorrelationIdMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorrelationIdMiddlewareService {
            service,
            inner: Rc::clone(&self.0),
        }))
    }
}

/// Correlation id attached to the request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationIdValue(pub String);

impl CorrelationIdValue {
    pub(crate) fn generate() -> Self {
        #[cfg(not(feature = "uuid_v7"))]
        {
            Self(Uuid::new_v4().as_hyphenated().to_string())
        }
        #[cfg(feature = "uuid_v7")]
        {
            Self(Uuid::now_v7().as_hyphenated().to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Correlation id middleware service.
pub struct CorrelationIdMiddlewareService<S> {
    inner: Rc<Inner>,
    service: S,
}

impl<S, B> Service<ServiceRequest> for CorrelationIdMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = CorrelationIdResponse<S>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let inbound = req
            .headers()
            .get(&self.inner.header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| has_text(v))
            .map(|v| CorrelationIdValue(v.to_string()));

        let id = match inbound {
            Some(id) => id,
            None => {
                let id = CorrelationIdValue::generate();
                log::debug!("No {} on request, generated {}", self.inner.header, id.as_str());
                id
            }
        };

        // Either the client's own valid header value or a generated uuid.
        let header_value = HeaderValue::from_str(id.as_str()).ok();

        req.extensions_mut().insert(id.clone());

        let mut map = ContextMap::new();
        map.insert(self.inner.context_key.clone(), id.0);

        // Synchronous work done by `call` sees the id as well.
        let fut = context::with_context(&mut map, || self.service.call(req));

        CorrelationIdResponse {
            fut: WithContext::new(fut, map),
            header: self.inner.header.clone(),
            header_value,
        }
    }
}

pin_project! {
    pub struct CorrelationIdResponse<S>
    where
        S: Service<ServiceRequest>,
    {
        #[pin]
        fut: WithContext<S::Future>,
        header: HeaderName,
        header_value: Option<HeaderValue>,
    }
}

impl<S, B> Future for CorrelationIdResponse<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
{
    type Output = Result<ServiceResponse<B>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let mut res = match ready!(this.fut.poll(cx)) {
            Ok(res) => res,
            Err(err) => return Poll::Ready(Err(err)),
        };

        if let Some(value) = this.header_value.take() {
            res.headers_mut().insert(this.header.clone(), value);
        }

        Poll::Ready(Ok(res))
    }
}
