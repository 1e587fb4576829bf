use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use spire_cel_composer::env::composer_environment;
use spire_cel_composer::schema::{ATTRIBUTES_TYPE, RESPONSE_TYPE};
use spire_cel_composer::{
    compile, ComposeWorkloadJwtSvidRequest, ComposerConfig, CredentialComposer,
    CredentialComposerService,
};

fn expression() -> String {
    format!(
        "{}{{attributes: {}{{claims: request.attributes.claims.mapOverrideEntries({{'jti': uuidgen(), 'iss': spiffe_trust_domain}})}}}}",
        RESPONSE_TYPE, ATTRIBUTES_TYPE
    )
}

fn request() -> ComposeWorkloadJwtSvidRequest {
    serde_json::from_value(json!({
        "spiffe_id": "spiffe://example.org/web",
        "attributes": {"claims": {"sub": "spiffe://example.org/web", "aud": ["api"], "exp": 1700000000}}
    }))
    .unwrap()
}

fn bench_compile(c: &mut Criterion) {
    let env = Arc::new(composer_environment().unwrap());
    let source = expression();
    c.bench_function("compile jwt expression", |b| {
        b.iter(|| compile(env.clone(), black_box(&source)).unwrap())
    });
}

fn bench_compose(c: &mut Criterion) {
    let composer = CredentialComposer::new();
    composer
        .configure("example.org", &ComposerConfig::inline(expression()))
        .unwrap();
    let request = request();
    c.bench_function("compose workload jwt svid", |b| {
        b.iter(|| composer.compose_workload_jwt_svid(black_box(&request)).unwrap())
    });
}

criterion_group!(benches, bench_compile, bench_compose);
criterion_main!(benches);
