mod composer_tests;
mod concurrency_tests;
mod property_tests;

use serde_json::json;
use spire_cel_composer::schema::{ATTRIBUTES_TYPE, RESPONSE_TYPE};
use spire_cel_composer::ComposeWorkloadJwtSvidRequest;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

pub fn workload_request(path: &str) -> ComposeWorkloadJwtSvidRequest {
    serde_json::from_value(json!({
        "spiffe_id": format!("spiffe://example.org/{}", path),
        "attributes": {"claims": {
            "sub": format!("spiffe://example.org/{}", path),
            "aud": ["api"],
            "exp": 1700000000
        }}
    }))
    .expect("valid request")
}

/// A response expression that keeps the request claims and overrides them
/// with the map literal `overrides`.
pub fn override_claims(overrides: &str) -> String {
    format!(
        "{}{{\n  attributes: {}{{\n    claims: request.attributes.claims.mapOverrideEntries({})\n  }}\n}}",
        RESPONSE_TYPE, ATTRIBUTES_TYPE, overrides
    )
}
