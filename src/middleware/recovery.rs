// src/middleware/recovery.rs
use crate::problem;
use futures::future::{BoxFuture, FutureExt};
use hyper::{Body, Request, Response};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Turns a panic inside the wrapped service into a 500 problem response.
#[derive(Debug, Clone, Default)]
pub struct RecoveryLayer;

impl RecoveryLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RecoveryLayer {
    type Service = Recovery<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Recovery { inner }
    }
}

#[derive(Debug, Clone)]
pub struct Recovery<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for Recovery<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        // A panic can also escape `call` itself, before any future exists.
        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(req))) {
            Ok(future) => future,
            Err(panic) => {
                log_panic(&*panic, &method, &path);
                return Box::pin(async { Ok(internal_error()) });
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    log_panic(&*panic, &method, &path);
                    Ok(internal_error())
                }
            }
        })
    }
}

fn internal_error() -> Response<Body> {
    problem::internal_server_error("internal server error").into_response()
}

fn log_panic(panic: &(dyn Any + Send), method: &hyper::Method, path: &str) {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    tracing::error!(error = %message, %method, %path, "panic recovered");
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::StatusCode;
    use std::convert::Infallible;
    use tower::{service_fn, ServiceExt};

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let svc = RecoveryLayer::new().layer(service_fn(|_req: Request<Body>| async {
            if true {
                panic!("handler blew up");
            }
            Ok::<_, Infallible>(Response::new(Body::empty()))
        }));

        let response = svc
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[hyper::header::CONTENT_TYPE],
            problem::PROBLEM_CONTENT_TYPE
        );
    }

    #[tokio::test]
    async fn test_normal_response_untouched() {
        let svc = RecoveryLayer::new().layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::from("fine")))
        }));

        let response = svc
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
