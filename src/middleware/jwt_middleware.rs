/// JWT Authentication Middleware
///
/// Authenticates the bearer access token on every request it wraps and
/// injects the resolved `AuthenticatedPrincipal` into request extensions.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{authenticate, SessionManager};

/// JWT middleware for protecting routes
pub struct JwtMiddleware {
    sessions: web::Data<SessionManager>,
}

impl JwtMiddleware {
    pub fn new(sessions: web::Data<SessionManager>) -> Self {
        Self { sessions }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            sessions: self.sessions.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    sessions: web::Data<SessionManager>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let auth_header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        let sessions = self.sessions.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let principal = authenticate(
                auth_header.as_deref(),
                sessions.codec(),
                &**sessions.store(),
            )
            .await?;

            tracing::debug!(user_id = %principal.id, "Request authenticated");

            req.extensions_mut().insert(principal);
            service.call(req).await
        })
    }
}
