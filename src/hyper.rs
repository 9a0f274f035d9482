//! Hyper integration.

use crate::context::Context;
use crate::errors::CallError;
use crate::service::PayloadDecoder;
use crate::transport::Dispatcher;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{header, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::Service;
use std::convert::Infallible;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Wraps [`Dispatcher`] to implement hyper [`Service`].
#[derive(Clone)]
pub struct HyperEndpoint(Dispatcher);

impl HyperEndpoint {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self(dispatcher)
    }
}

impl Service<Request<Incoming>> for HyperEndpoint {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let dispatcher = self.0.clone();
        Box::pin(async move { Ok(handle(dispatcher, req).await) })
    }
}

async fn handle(dispatcher: Dispatcher, req: Request<Incoming>) -> Response<Full<Bytes>> {
    if req.method() == Method::GET && req.uri().path() == "/health" {
        return response(StatusCode::OK, Bytes::new());
    }
    if req.method() != Method::POST {
        return response(StatusCode::METHOD_NOT_ALLOWED, Bytes::new());
    }

    let path = req.uri().path().to_owned();
    let Some((service, method)) = path
        .trim_start_matches('/')
        .rsplit_once('/')
        .filter(|(service, method)| !service.is_empty() && !method.is_empty())
    else {
        return error_response(CallError::BadPath(path.clone()));
    };

    if service.trim_matches('/') != dispatcher.service_name().trim_matches('/') {
        return error_response(CallError::UnknownService(service.to_owned()));
    }

    let cancellation = CancellationToken::new();
    let mut ctx = Context::new(service, method).with_cancellation(cancellation.clone());
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            ctx = ctx.with_metadata(name.as_str(), value);
        }
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Error reading request body: {e}");
            return response(StatusCode::BAD_REQUEST, Bytes::from(e.to_string()));
        }
    };

    // The call is cancelled if this future is dropped, i.e. when the connection goes away.
    let _guard = cancellation.drop_guard();
    let call = dispatcher.dispatch(ctx, &mut PayloadDecoder::new(body));

    match call.await {
        Ok(reply) => match reply.encode() {
            Ok(encoded) => {
                let mut res = response(StatusCode::OK, encoded);
                if let Ok(content_type) = HeaderValue::from_str(reply.content_type()) {
                    if !content_type.is_empty() {
                        res.headers_mut().insert(header::CONTENT_TYPE, content_type);
                    }
                }
                res
            }
            Err(source) => error_response(CallError::Encode {
                method: method.to_owned(),
                source,
            }),
        },
        Err(e) => error_response(e),
    }
}

fn error_response(err: CallError) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    response(status, Bytes::from(err.to_string()))
}

fn response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut res = Response::new(Full::new(body));
    *res.status_mut() = status;
    res
}
