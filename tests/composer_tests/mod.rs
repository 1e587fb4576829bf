use std::io::Write;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use regex::Regex;
use serde_json::json;
use spire_cel_composer::program::IssueKind;
use spire_cel_composer::schema::{ATTRIBUTES_TYPE, RESPONSE_TYPE};
use spire_cel_composer::{
    ComposerConfig, ComposerError, ConfigError, CredentialComposer, CredentialComposerService,
    JwtConfig, StatusCode,
};

use super::{override_claims, workload_request};

fn configured(expression: &str) -> CredentialComposer {
    let composer = CredentialComposer::new();
    composer
        .configure("example.org", &ComposerConfig::inline(expression))
        .expect("configure");
    composer
}

#[test]
fn test_identity_expression() {
    let composer = configured(&override_claims("{}"));
    let request = workload_request("web");
    let response = composer.compose_workload_jwt_svid(&request).unwrap();
    assert_eq!(response.attributes, request.attributes);
}

#[test]
fn test_override_precedence() {
    let composer = configured(&override_claims(
        "{'aud': ['a', 'b'], 'iss': spiffe_trust_domain}",
    ));
    let response = composer
        .compose_workload_jwt_svid(&workload_request("web"))
        .unwrap();
    assert_eq!(
        serde_json::to_value(response.attributes.unwrap().claims).unwrap(),
        json!({
            "sub": "spiffe://example.org/web",
            "aud": ["a", "b"],
            "exp": 1700000000,
            "iss": "spiffe://example.org"
        })
    );
}

#[test]
fn test_uuid_claims_are_fresh_and_canonical() {
    let composer = configured(&override_claims("{'jti': uuidgen(), 'nonce': uuidgen()}"));
    let canonical =
        Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap();

    let first = composer
        .compose_workload_jwt_svid(&workload_request("web"))
        .unwrap()
        .attributes
        .unwrap()
        .claims;
    let second = composer
        .compose_workload_jwt_svid(&workload_request("web"))
        .unwrap()
        .attributes
        .unwrap()
        .claims;

    let jti = first["jti"].as_str().unwrap();
    let nonce = first["nonce"].as_str().unwrap();
    assert!(canonical.is_match(jti), "{}", jti);
    assert!(canonical.is_match(nonce), "{}", nonce);
    assert_ne!(jti, nonce);
    assert_ne!(first["jti"], second["jti"]);
}

#[test]
fn test_conditional_rewrite_per_workload() {
    let expression = format!(
        "request.spiffe_id.endsWith('/db') ? {} : {}",
        override_claims("{'aud': ['db']}"),
        override_claims("{}")
    );
    let composer = configured(&expression);
    let db = composer
        .compose_workload_jwt_svid(&workload_request("db"))
        .unwrap();
    let web = composer
        .compose_workload_jwt_svid(&workload_request("web"))
        .unwrap();
    assert_eq!(db.attributes.unwrap().claims["aud"], json!(["db"]));
    assert_eq!(web.attributes.unwrap().claims["aud"], json!(["api"]));
}

#[test]
fn test_claims_filtered_with_two_variable_comprehension() {
    let composer = configured(&format!(
        "{}{{attributes: {}{{claims: request.attributes.claims.transformMap(k, v, k != 'exp', v)}}}}",
        RESPONSE_TYPE, ATTRIBUTES_TYPE
    ));
    let response = composer
        .compose_workload_jwt_svid(&workload_request("web"))
        .unwrap();
    let claims = response.attributes.unwrap().claims;
    assert!(!claims.contains_key("exp"));
    assert!(claims.contains_key("sub"));
}

#[test]
fn test_expression_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "// rewrite audience").unwrap();
    writeln!(file, "{}", override_claims("{'aud': [trust_domain]}")).unwrap();

    let config = ComposerConfig {
        jwt: JwtConfig {
            expression_string: None,
            expression_path: Some(file.path().to_path_buf()),
        },
        cost_limit: None,
    };
    let composer = CredentialComposer::new();
    composer.configure("example.org", &config).unwrap();
    let response = composer
        .compose_workload_jwt_svid(&workload_request("web"))
        .unwrap();
    assert_eq!(
        response.attributes.unwrap().claims["aud"],
        json!(["example.org"])
    );
}

#[test]
fn test_configure_from_json_document() {
    let composer = CredentialComposer::new();
    let document = json!({"jwt": {"expression_string": override_claims("{}")}, "cost_limit": 1000});
    let configuration = composer
        .configure_json("example.org", &document.to_string())
        .unwrap();
    assert_eq!(configuration.spiffe_trust_domain(), "spiffe://example.org");
}

#[test]
fn test_missing_expression_leaves_store_untouched() {
    let composer = CredentialComposer::new();
    let err = composer
        .configure("example.org", &ComposerConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ComposerError::Config(ConfigError::MissingExpression)
    ));
    assert_eq!(err.code(), StatusCode::InvalidArgument);
    assert!(matches!(
        composer.compose_workload_jwt_svid(&workload_request("web")),
        Err(ComposerError::NotConfigured)
    ));
}

#[test]
fn test_bad_reload_keeps_previous_configuration() {
    let composer = configured(&override_claims("{'v': 1}"));
    let before = composer.store().current().unwrap();

    let err = composer
        .configure("other.org", &ComposerConfig::inline("request.attributes +"))
        .unwrap_err();
    assert_eq!(err.stage(), "compile");

    let after = composer.store().current().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    let response = composer
        .compose_workload_jwt_svid(&workload_request("web"))
        .unwrap();
    assert_eq!(response.attributes.unwrap().claims["v"], json!(1));
}

#[test]
fn test_compile_error_collects_issues() {
    let composer = CredentialComposer::new();
    let err = composer
        .configure(
            "example.org",
            &ComposerConfig::inline("mapOverrideEntries(trust_domain, {}) + missing"),
        )
        .unwrap_err();
    let ComposerError::Compile(compile) = &err else {
        panic!("expected compile error, got {}", err);
    };
    assert_eq!(compile.issues.len(), 2);
    assert!(compile.issues.iter().all(|i| i.kind == IssueKind::Type));
    assert!(err.to_string().starts_with("Failed to compile cel expression"));
}

#[test]
fn test_oversized_expressions_are_rejected_at_configure() {
    let composer = configured(&override_claims("{}"));
    let before = composer.store().current().unwrap();

    let nested = format!(
        "{}{}{}",
        "(".repeat(1000),
        override_claims("{}"),
        ")".repeat(1000)
    );
    let chain = format!(
        "{} == trust_domain",
        vec!["trust_domain"; 5000].join(" + ")
    );
    for expression in [nested, chain] {
        let err = composer
            .configure("example.org", &ComposerConfig::inline(expression))
            .unwrap_err();
        let ComposerError::Compile(compile) = &err else {
            panic!("expected compile error, got {}", err);
        };
        assert_eq!(compile.issues[0].kind, IssueKind::Syntax);
        assert_eq!(err.code(), StatusCode::InvalidArgument);
    }

    assert!(Arc::ptr_eq(&before, &composer.store().current().unwrap()));
}

#[test]
fn test_cost_limit_from_config() {
    let composer = CredentialComposer::new();
    let config = ComposerConfig {
        jwt: JwtConfig {
            expression_string: Some(
                "{'attributes': {'claims': {'n': lists.range(1000).map(x, x * x).size()}}}"
                    .to_string(),
            ),
            expression_path: None,
        },
        cost_limit: Some(100),
    };
    composer.configure("example.org", &config).unwrap();
    let err = composer
        .compose_workload_jwt_svid(&workload_request("web"))
        .unwrap_err();
    assert_eq!(err.stage(), "evaluation");
}

#[test]
fn test_x509_paths() {
    let composer = configured(&override_claims("{}"));
    let err = composer.compose_workload_x509_svid().unwrap_err();
    assert_eq!(err.code(), StatusCode::Unimplemented);
}
