use std::hint::black_box;

use bundlerouter::context::RequestParts;
use bundlerouter::router::RouteTable;
use bundlerouter::{AppConfig, ComponentClass, ComponentKind, Dispatcher, Framework, Registries};
use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;

const ROUTES: &str = r#"
root: { path: /, method: get, handler: Zoo.index }
animals: { path: /zoo/animals, method: get, handler: Zoo.index }
create_animal: { path: /zoo/animals, method: post, handler: Zoo.index }
animal: { path: /zoo/animals/:id, method: get, handler: Zoo.index }
update_animal: { path: /zoo/animals/:id, handler: Zoo.index }
new_animal: { path: /zoo/animals/new, method: get, handler: Zoo.index }
keeper: { path: "/zoo/keepers/{keeper}/animals/{id}", handler: Zoo.index }
assets: { path: /assets/*, static: true }
raw: { path: /files/*/raw, static: true }
"#;

fn table() -> RouteTable {
    RouteTable::build(&serde_yaml::from_str(ROUTES).unwrap())
}

fn bench_lookup(c: &mut Criterion) {
    let table = table();
    let cases = [
        (Method::GET, "/"),
        (Method::GET, "/zoo/animals/new"),
        (Method::DELETE, "/zoo/animals/42"),
        (Method::GET, "/zoo/keepers/7/animals/42"),
        (Method::GET, "/assets/css/deep/site.css"),
        (Method::GET, "/files/a/b/c/raw"),
        (Method::GET, "/does/not/exist"),
    ];
    for (method, path) in cases {
        c.bench_function(&format!("lookup {method} {path}"), |b| {
            b.iter(|| table.lookup(black_box(&method), black_box(path)))
        });
    }
}

fn bench_dispatch(c: &mut Criterion) {
    let config = AppConfig::from_yaml_str(".", &format!("routes:\n{}", indent(ROUTES))).unwrap();
    let mut registries = Registries::new();
    registries
        .register(
            ComponentClass::builder(ComponentKind::Controller, "Zoo", |_bundle| Ok(()))
                .method("index", |_: &(), instance| {
                    instance.response().ok("ok");
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    let dispatcher = Dispatcher::from_config(Framework::new(config, registries));

    c.bench_function("handle GET /zoo/animals/42", |b| {
        b.iter(|| dispatcher.handle(RequestParts::new(Method::GET, black_box("/zoo/animals/42"))))
    });
}

fn indent(yaml: &str) -> String {
    yaml.lines().map(|l| format!("  {l}\n")).collect()
}

criterion_group!(benches, bench_lookup, bench_dispatch);
criterion_main!(benches);
