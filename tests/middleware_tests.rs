//! Middleware chain behaviour: declared order, waiting on the continuation,
//! short-circuit on failure and hand-off of request locals.

mod common;

use bundlerouter::component::{ComponentClass, ComponentKind};
use bundlerouter::context::{exchange, RequestParts};
use bundlerouter::dispatcher::Outcome;
use bundlerouter::error::{ComponentError, MiddlewareError};
use bundlerouter::registry::Registries;
use common::app::TestApp;
use common::components::{echo_controller, middleware, Recorder, Step};
use common::dispatch::dispatcher;
use common::test_server::setup_may_runtime;
use http::Method;
use serde_json::json;

const CHAIN: &str = r#"
http:
  middlewares:
    - A.handle
    - " B.handle "
    - C.handle
routes:
  home: { path: /, handler: Home.show }
"#;

fn chain(recorder: &Recorder, a: Step, b: Step, c: Step) -> Registries {
    let mut registries = Registries::new();
    registries.register(middleware("A", recorder, a)).unwrap();
    registries.register(middleware("B", recorder, b)).unwrap();
    registries.register(middleware("C", recorder, c)).unwrap();
    registries.register(echo_controller("Home", recorder)).unwrap();
    registries
}

fn get_root() -> RequestParts {
    RequestParts::new(Method::GET, "/")
}

#[test]
fn test_chain_runs_in_declared_order() {
    setup_may_runtime();
    let app = TestApp::with_config(&[]);
    let recorder = Recorder::default();
    let dispatcher = dispatcher(
        app.path(),
        CHAIN,
        chain(&recorder, Step::Proceed, Step::Proceed, Step::Proceed),
    );

    let reply = dispatcher.handle(get_root());
    assert_eq!(reply.status, 200);
    assert_eq!(
        recorder.events(),
        vec![
            "A:start", "A:proceed", "B:start", "B:proceed", "C:start", "C:proceed", "Home.show"
        ]
    );
}

#[test]
fn test_next_step_waits_for_deferred_signal() {
    setup_may_runtime();
    let app = TestApp::with_config(&[]);
    let recorder = Recorder::default();
    let dispatcher = dispatcher(
        app.path(),
        CHAIN,
        chain(&recorder, Step::ProceedLater, Step::Proceed, Step::Proceed),
    );

    let reply = dispatcher.handle(get_root());
    assert_eq!(reply.status, 200);
    let events = recorder.events();
    assert_eq!(&events[..3], &["A:start", "A:proceed", "B:start"]);
}

#[test]
fn test_failing_step_stops_the_chain() {
    setup_may_runtime();
    let app = TestApp::with_config(&[]);
    let recorder = Recorder::default();
    let dispatcher = dispatcher(
        app.path(),
        CHAIN,
        chain(&recorder, Step::Proceed, Step::Fail, Step::Proceed),
    );

    let reply = dispatcher.handle(get_root());
    assert_eq!(reply.status, 500);
    assert!(reply.body.is_empty());
    let events = recorder.events();
    assert!(events.contains(&"B:start".to_string()));
    assert!(!events.iter().any(|e| e.starts_with('C')));
    assert!(!events.contains(&"Home.show".to_string()));
}

#[test]
fn test_step_errors_and_drops_abort() {
    setup_may_runtime();
    for failing in [Step::Error, Step::Drop] {
        let app = TestApp::with_config(&[]);
        let recorder = Recorder::default();
        let dispatcher = dispatcher(
            app.path(),
            CHAIN,
            chain(&recorder, failing, Step::Proceed, Step::Proceed),
        );

        let (request, response, _receiver) = exchange(get_root());
        let outcome = dispatcher.dispatch(&request, &response);
        match (failing, outcome) {
            (Step::Error, Outcome::MiddlewareAbort(MiddlewareError::Failed { step, .. })) => {
                assert_eq!(step, "A.handle");
            }
            (Step::Drop, Outcome::MiddlewareAbort(MiddlewareError::Dropped(step))) => {
                assert_eq!(step, "A.handle");
            }
            (step, outcome) => panic!("{step:?} produced {outcome:?}"),
        }
        assert_eq!(response.status(), 500);
        assert!(!recorder.events().contains(&"B:start".to_string()));
    }
}

#[test]
fn test_unknown_middleware_aborts() {
    setup_may_runtime();
    let app = TestApp::with_config(&[]);
    let recorder = Recorder::default();
    let mut registries = Registries::new();
    registries.register(echo_controller("Home", &recorder)).unwrap();
    let yaml = "http:\n  middlewares: [Missing.handle]\nroutes:\n  home: { path: /, handler: Home.show }\n";
    let dispatcher = dispatcher(app.path(), yaml, registries);

    let (request, response, _receiver) = exchange(get_root());
    assert_eq!(
        dispatcher.dispatch(&request, &response),
        Outcome::MiddlewareAbort(MiddlewareError::UnknownMiddleware("Missing".to_string()))
    );
    assert!(recorder.events().is_empty());
}

#[test]
fn test_malformed_entries_are_skipped() {
    setup_may_runtime();
    let app = TestApp::with_config(&[]);
    let recorder = Recorder::default();
    let mut registries = Registries::new();
    registries.register(middleware("A", &recorder, Step::Proceed)).unwrap();
    registries.register(echo_controller("Home", &recorder)).unwrap();
    let yaml = r#"
http:
  middlewares: [NoMethod, 42, A.handle, "a.b.c"]
routes:
  home: { path: /, handler: Home.show }
"#;
    let dispatcher = dispatcher(app.path(), yaml, registries);

    let steps: Vec<&str> = dispatcher.middlewares().iter().map(|s| s.entry()).collect();
    assert_eq!(steps, vec!["A.handle"]);
    assert_eq!(dispatcher.handle(get_root()).status, 200);
}

#[test]
fn test_middleware_runs_before_route_miss() {
    setup_may_runtime();
    let app = TestApp::with_config(&[]);
    let recorder = Recorder::default();
    let dispatcher = dispatcher(
        app.path(),
        CHAIN,
        chain(&recorder, Step::Proceed, Step::Proceed, Step::Proceed),
    );

    let reply = dispatcher.handle(RequestParts::new(Method::GET, "/missing"));
    assert_eq!(reply.status, 404);
    assert!(recorder.events().contains(&"C:proceed".to_string()));
}

#[test]
fn test_locals_and_services_flow_to_handler() {
    setup_may_runtime();
    let app = TestApp::with_config(&[]);
    let mut registries = Registries::new();
    registries
        .register(
            ComponentClass::builder(ComponentKind::Service, "Auth", |_bundle| {
                Ok(parking_lot::Mutex::new(0u32))
            })
            .method("check", |checks: &parking_lot::Mutex<u32>, instance| {
                *checks.lock() += 1;
                let next = instance
                    .next()
                    .ok_or_else(|| ComponentError::failed("no continuation"))?;
                match instance.request().header("authorization") {
                    Some(token) => {
                        instance.request().set_local("user", json!(token));
                        next.proceed();
                    }
                    None => {
                        next.fail("missing token");
                    }
                }
                Ok(())
            })
            .build(),
        )
        .unwrap();
    registries
        .register(
            ComponentClass::builder(ComponentKind::Controller, "Me", |_bundle| Ok(()))
                .method("show", |_: &(), instance| {
                    // Same chain, so the service the middleware used is cached.
                    let auth = instance
                        .bundle()
                        .service("Auth")
                        .ok_or_else(|| ComponentError::failed("no auth"))?;
                    let checks = *auth
                        .state::<parking_lot::Mutex<u32>>()
                        .ok_or_else(|| ComponentError::failed("bad state"))?
                        .lock();
                    instance.response().ok(json!({
                        "user": instance.request().local("user"),
                        "checks": checks,
                    }));
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    let yaml = "http:\n  middlewares: [Auth.check]\nroutes:\n  me: { path: /me, handler: Me.show }\n";
    let dispatcher = dispatcher(app.path(), yaml, registries);

    let reply = dispatcher.handle(
        RequestParts::new(Method::GET, "/me").header("Authorization", "Bearer abc"),
    );
    assert_eq!(reply.status, 200);
    let body: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(body, json!({ "user": "Bearer abc", "checks": 1 }));

    let denied = dispatcher.handle(RequestParts::new(Method::GET, "/me"));
    assert_eq!(denied.status, 500);
}
