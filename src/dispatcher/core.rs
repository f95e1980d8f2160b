use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, info, info_span, warn};

use super::middleware::{parse_chain, MiddlewareStep};
use crate::capability::{BoundCapabilities, CapabilityTarget};
use crate::component::ComponentKind;
use crate::context::{exchange, FinalResponse, RequestContext, RequestParts, ResponseContext};
use crate::error::{panic_message, MiddlewareError};
use crate::framework::Framework;
use crate::resolver::BundleResolver;
use crate::router::{HandlerDescriptor, RouteMatch, RouteTable, RouteTarget};
use crate::static_files::StaticFiles;

/// Terminal state a dispatch reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A handler method ran; it owns the response.
    Handler,
    /// A static asset was written with status 200.
    Static,
    /// No route, or no usable method bucket: 404.
    RouteMiss,
    /// Static route matched but no regular file exists: 404.
    StaticMiss,
    /// A middleware step failed: 500, empty body.
    MiddlewareAbort(MiddlewareError),
    /// Handler resolution or invocation failed: 500.
    HandlerFailed(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Handler => f.write_str("handler"),
            Outcome::Static => f.write_str("static"),
            Outcome::RouteMiss => f.write_str("route_miss"),
            Outcome::StaticMiss => f.write_str("static_miss"),
            Outcome::MiddlewareAbort(_) => f.write_str("middleware_abort"),
            Outcome::HandlerFailed(_) => f.write_str("handler_failed"),
        }
    }
}

/// Runs the per-request pipeline against a booted framework.
///
/// Immutable after construction; one instance serves every request.
pub struct Dispatcher {
    framework: Arc<Framework>,
    routes: Arc<RouteTable>,
    middlewares: Vec<MiddlewareStep>,
    static_files: StaticFiles,
}

impl Dispatcher {
    /// Build from a framework and a compiled route table. The middleware
    /// chain, asset root and MIME map come from the framework configuration.
    pub fn new(framework: Arc<Framework>, routes: Arc<RouteTable>) -> Self {
        let config = framework.config();
        let middlewares = parse_chain(&config.middlewares());
        let static_files = StaticFiles::new(config.asset_root(), config.mime_types());

        let registries = framework.registries();
        for handler in routes.handlers() {
            if !registries.contains(handler.kind, &handler.name) {
                warn!(handler = %handler, "Route handler refers to an unregistered controller");
            }
        }
        for step in &middlewares {
            if !registries.contains(ComponentKind::Service, step.service()) {
                warn!(middleware = %step.entry(), "Middleware refers to an unregistered service");
            }
        }

        info!(
            routes = routes.len(),
            middlewares = middlewares.len(),
            asset_root = %static_files.base_dir().display(),
            "Dispatcher ready"
        );
        Self {
            framework,
            routes,
            middlewares,
            static_files,
        }
    }

    /// Compile the route table from the framework configuration and build.
    pub fn from_config(framework: Arc<Framework>) -> Self {
        let routes = Arc::new(RouteTable::from_config(framework.config()));
        Self::new(framework, routes)
    }

    #[must_use]
    pub fn framework(&self) -> &Arc<Framework> {
        &self.framework
    }

    #[must_use]
    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    #[must_use]
    pub fn middlewares(&self) -> &[MiddlewareStep] {
        &self.middlewares
    }

    /// Run the pipeline for one request.
    ///
    /// Every failure path ends the response except [`Outcome::Handler`],
    /// where the handler method is responsible for ending it.
    pub fn dispatch(&self, request: &RequestContext, response: &ResponseContext) -> Outcome {
        let span = info_span!(
            "dispatch",
            request_id = %request.id(),
            method = %request.method(),
            path = %request.path()
        );
        let _enter = span.enter();

        self.bind(request, response);
        let resolver = BundleResolver::new(
            Arc::clone(&self.framework),
            request.clone(),
            response.clone(),
        );

        if let Err(err) = self.run_middlewares(&resolver) {
            error!(error = %err, "Middleware chain aborted");
            response.terminate(500);
            return Outcome::MiddlewareAbort(err);
        }

        let Some(matched) = self.routes.lookup(request.method(), request.path()) else {
            debug!("No route matched");
            response.not_found(Value::Null);
            return Outcome::RouteMiss;
        };
        let RouteMatch {
            pattern,
            target,
            params,
            splats,
            ..
        } = matched;
        request.set_route_params(params, splats);
        debug!(pattern = %pattern, target = %target, "Route matched");

        match target {
            RouteTarget::Static => self.serve_static(request, response),
            RouteTarget::Handler(handler) => self.invoke_handler(&resolver, &handler),
        }
    }

    /// Run the pipeline for a transport request and wait for the response.
    ///
    /// A response that every handle dropped without ending becomes a 500.
    pub fn handle(&self, parts: RequestParts) -> FinalResponse {
        let started = Instant::now();
        let (request, response, receiver) = exchange(parts);
        let request_id = request.id();
        let method = request.method().clone();
        let path = request.path().to_string();

        let outcome = catch_unwind(AssertUnwindSafe(|| self.dispatch(&request, &response)))
            .unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                error!(request_id = %request_id, panic = %reason, "Dispatch panicked");
                response.terminate(500);
                Outcome::HandlerFailed(reason)
            });
        drop(request);
        drop(response);

        let reply = receiver.wait().unwrap_or_else(|| {
            error!(
                request_id = %request_id,
                outcome = %outcome,
                "Response dropped without being ended"
            );
            FinalResponse::empty(500)
        });
        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = reply.status,
            outcome = %outcome,
            duration_us = started.elapsed().as_micros() as u64,
            "Request complete"
        );
        reply
    }

    fn bind(&self, request: &RequestContext, response: &ResponseContext) {
        let registries = self.framework.registries();
        response.bind_formatters(Arc::clone(registries.formatters()));
        request.bind_capabilities(BoundCapabilities {
            table: Arc::clone(registries.capabilities(CapabilityTarget::Request)),
            framework: Arc::clone(&self.framework),
        });
        response.bind_capabilities(BoundCapabilities {
            table: Arc::clone(registries.capabilities(CapabilityTarget::Response)),
            framework: Arc::clone(&self.framework),
        });
    }

    fn run_middlewares(&self, resolver: &BundleResolver) -> Result<(), MiddlewareError> {
        for step in &self.middlewares {
            step.run(resolver)?;
        }
        Ok(())
    }

    fn serve_static(&self, request: &RequestContext, response: &ResponseContext) -> Outcome {
        match self.static_files.load(request.path()) {
            Ok(asset) => {
                response
                    .set_status(200)
                    .set_header("Content-Type", &asset.content_type)
                    .write(&asset.bytes)
                    .end();
                Outcome::Static
            }
            Err(err) => {
                debug!(error = %err, "Static asset not found");
                response.not_found(Value::Null);
                Outcome::StaticMiss
            }
        }
    }

    fn invoke_handler(&self, resolver: &BundleResolver, handler: &HandlerDescriptor) -> Outcome {
        let response = resolver.response();
        let result = resolver
            .try_get_or_create(handler.kind, &handler.name)
            .map_err(|err| err.to_string())
            .and_then(|instance| instance.invoke(&handler.method).map_err(|err| err.to_string()));

        match result {
            Ok(()) => Outcome::Handler,
            Err(reason) => {
                error!(handler = %handler, error = %reason, "Handler failed");
                if !response.is_ended() {
                    response.server_error(Value::Null);
                }
                Outcome::HandlerFailed(reason)
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes.len())
            .field("middlewares", &self.middlewares)
            .field("static_files", &self.static_files)
            .finish()
    }
}
