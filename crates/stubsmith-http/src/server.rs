//! HTTP/1 listener serving stub responses.

use crate::request::{parse_query_string, IncomingRequest};
use crate::resolver::ResponseDescriptor;
use crate::service::StubService;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Serve stub requests from `listener` until `token` is cancelled.
pub async fn serve_stubs(
    listener: TcpListener,
    service: Arc<StubService>,
    token: CancellationToken,
) {
    accept_loop(listener, token, "stub", move |req| {
        let service = Arc::clone(&service);
        async move { handle_stub_request(req, service).await }
    })
    .await
}

/// Accept connections and serve each on its own task.
pub(crate) async fn accept_loop<H, Fut>(
    listener: TcpListener,
    token: CancellationToken,
    label: &'static str,
    handler: H,
) where
    H: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    let local = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "?".to_string());
    info!("{} listener on {}", label, local);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let handler = handler.clone();
                                async move { Ok::<_, Infallible>(handler(req).await) }
                            });
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                debug!("Connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error on {} listener: {}", label, e);
                    }
                }
            }
            _ = token.cancelled() => {
                info!("{} listener on {} shutting down", label, local);
                break;
            }
        }
    }
}

async fn handle_stub_request(req: Request<Incoming>, service: Arc<StubService>) -> Response<Full<Bytes>> {
    let incoming = match to_incoming(req).await {
        Ok(incoming) => incoming,
        Err(message) => return build_response(StatusCode::BAD_REQUEST, message),
    };
    let descriptor = service.resolve(incoming).await;
    to_response(descriptor)
}

async fn to_incoming(req: Request<Incoming>) -> Result<IncomingRequest, String> {
    let (parts, body) = req.into_parts();
    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();

    let bytes = body
        .collect()
        .await
        .map(|c| c.to_bytes())
        .map_err(|e| format!("Failed to read request body: {e}"))?;
    let body = (!bytes.is_empty()).then(|| String::from_utf8_lossy(&bytes).into_owned());

    Ok(IncomingRequest {
        method: parts.method.as_str().to_string(),
        url: parts.uri.path().to_string(),
        query: parse_query_string(parts.uri.query()),
        headers,
        body,
    })
}

fn to_response(descriptor: ResponseDescriptor) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(descriptor.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    build_response_with_headers(status, descriptor.headers, descriptor.body)
}

/// Build an HTTP response with the given status and body.
pub(crate) fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

/// Build an HTTP response with headers. Invalid header names or values
/// fall back to a bare 500.
pub(crate) fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder.body(Full::new(body.into())).unwrap_or_else(|_| {
        let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}
