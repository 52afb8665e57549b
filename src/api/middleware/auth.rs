use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, ResponseError,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Requires `Authorization: Bearer <token>` matching the configured API token
pub struct ApiTokenAuth {
    pub token: Arc<str>,
}

impl<S, B> Transform<S, ServiceRequest> for ApiTokenAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ApiTokenAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ApiTokenAuthService {
            service: Rc::new(service),
            token: self.token.clone(),
        })
    }
}

pub struct ApiTokenAuthService<S> {
    service: Rc<S>,
    token: Arc<str>,
}

impl<S, B> Service<ServiceRequest> for ApiTokenAuthService<S>
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
        let service = self.service.clone();
        let expected = self.token.clone();

        Box::pin(async move {
            let presented = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "));

            let token = match presented {
                Some(token) => token,
                None => {
                    let response = AppError::Unauthorized("Missing or invalid authorization header".to_string())
                        .error_response();
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            if token_matches(token, &expected) {
                let res = service.call(req).await?;
                Ok(res.map_into_left_body())
            } else {
                tracing::warn!("Rejected request with invalid API token to {}", req.path());
                let response = AppError::Unauthorized("Invalid API token".to_string()).error_response();
                Ok(req.into_response(response).map_into_right_body())
            }
        })
    }
}

fn token_matches(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}
