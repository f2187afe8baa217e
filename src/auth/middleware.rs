use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, ResponseError};
use chrono::Utc;
use futures::future::{ready, LocalBoxFuture, Ready};
use tracing::warn;

use super::rate_limit::{Admission, RateLimiter};
use crate::error::{AppError, AuthError};

/// Wraps every route with the admission check.
///
/// Rejected requests are answered with 429 here and never reach the inner
/// service.
#[derive(Clone)]
pub struct AdmissionControl {
    limiter: Arc<RateLimiter>,
}

impl AdmissionControl {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

/// Throttling identity: the peer IP, without the port.
pub fn client_key(req: &ServiceRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl<S, B> Transform<S, ServiceRequest> for AdmissionControl
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AdmissionMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdmissionMiddleware {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct AdmissionMiddleware<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for AdmissionMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = self.limiter.clone();

        Box::pin(async move {
            let key = client_key(&req);

            match limiter.admit(&key, Utc::now()).await {
                Admission::Allowed => service
                    .call(req)
                    .await
                    .map(ServiceResponse::map_into_left_body),
                Admission::Rejected => {
                    warn!("Rate limit exceeded for {} on {}", key, req.path());
                    let response = AppError::AuthError(AuthError::RateLimited).error_response();
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RateLimitConfig;
    use actix_web::{test, web, App, HttpResponse};
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[actix_web::test]
    async fn test_rejected_requests_never_reach_handler() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            window_size: Duration::seconds(60),
            max_requests: 2,
            max_clients: 100,
        }));
        let hits = web::Data::new(AtomicUsize::new(0));

        let app = test::init_service(
            App::new()
                .wrap(AdmissionControl::new(limiter))
                .app_data(hits.clone())
                .route(
                    "/",
                    web::get().to(|hits: web::Data<AtomicUsize>| async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        HttpResponse::Ok().finish()
                    }),
                ),
        )
        .await;

        let peer = "192.168.1.10:40000".parse().unwrap();
        for _ in 0..2 {
            let resp = test::TestRequest::get().uri("/").peer_addr(peer).send_request(&app).await;
            assert_eq!(resp.status(), 200);
        }

        let resp = test::TestRequest::get().uri("/").peer_addr(peer).send_request(&app).await;
        assert_eq!(resp.status(), 429);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["message"], "Too many requests");
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // Another port on the same host shares the quota, another host does not
        let same_host = "192.168.1.10:40001".parse().unwrap();
        let resp = test::TestRequest::get().uri("/").peer_addr(same_host).send_request(&app).await;
        assert_eq!(resp.status(), 429);

        let other_host = "192.168.1.11:40000".parse().unwrap();
        let resp = test::TestRequest::get().uri("/").peer_addr(other_host).send_request(&app).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
