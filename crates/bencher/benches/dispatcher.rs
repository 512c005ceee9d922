use bencher::{API_ROUTES, TestCase};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use futures::FutureExt;
use http::Method;
use rill_web::{Handler, RouteOptions, UrlDispatcher, handler_fn};
use std::hint::black_box;

fn create_dispatcher() -> UrlDispatcher {
    let mut dispatcher = UrlDispatcher::new();
    for (method, path) in API_ROUTES {
        let handler = Handler::new(handler_fn(|_req, _writer| async { Ok(()) }.boxed()));
        dispatcher.add_route(method, path, handler, RouteOptions::new()).expect("benchmark routes should be valid");
    }
    dispatcher
}

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("plain_first", "GET", "/"),
        TestCase::small("not_found", "GET", "/favicon.ico"),
        TestCase::normal("dynamic", "GET", "/api/v1/users/1234"),
        TestCase::normal("method_not_allowed", "PATCH", "/api/v1/users/1234"),
        TestCase::normal("percent_encoded", "GET", "/api/v1/users/42/posts/hello%20world"),
        TestCase::large("deep_dynamic", "GET", "/api/v1/orgs/rill-rs/repos/rill/issues/128"),
        TestCase::large("any_method_last", "OPTIONS", "/api/v1/echo?verbose=1"),
    ]
}

fn benchmark_resolve(criterion: &mut Criterion) {
    let dispatcher = create_dispatcher();
    let mut group = criterion.benchmark_group("resolve");

    for case in create_test_cases() {
        let method = case.method().parse::<Method>().expect("benchmark methods should be valid");
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| black_box(dispatcher.resolve(&method, black_box(case.path())).is_matched()));
        });
    }

    group.finish();
}

criterion_group!(dispatcher, benchmark_resolve);
criterion_main!(dispatcher);
