use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use spire_cel_composer::{ComposerConfig, CredentialComposer, CredentialComposerService};

use super::{override_claims, workload_request};

const TRUST_DOMAINS: [&str; 2] = ["old.example.org", "new.example.org"];

fn config() -> ComposerConfig {
    ComposerConfig::inline(override_claims(
        "{'td': trust_domain, 'iss': spiffe_trust_domain}",
    ))
}

/// Every response carries the trust domain and the derived SPIFFE identifier
/// from one and the same installed configuration.
#[test]
fn test_compose_during_reloads_sees_whole_snapshots() {
    let composer = Arc::new(CredentialComposer::new());
    composer.configure(TRUST_DOMAINS[0], &config()).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|i| {
            let composer = composer.clone();
            let done = done.clone();
            thread::spawn(move || {
                let request = workload_request(&format!("worker-{}", i));
                let mut seen = 0usize;
                while !done.load(Ordering::Acquire) || seen == 0 {
                    let claims = composer
                        .compose_workload_jwt_svid(&request)
                        .expect("compose")
                        .attributes
                        .expect("attributes")
                        .claims;
                    let td = claims["td"].as_str().expect("td").to_string();
                    assert!(TRUST_DOMAINS.contains(&td.as_str()), "{}", td);
                    assert_eq!(claims["iss"], format!("spiffe://{}", td));
                    seen += 1;
                }
                seen
            })
        })
        .collect();

    for round in 0..50 {
        composer
            .configure(TRUST_DOMAINS[round % 2], &config())
            .unwrap();
        // Rejected reloads in between must never become visible.
        assert!(composer
            .configure("broken.org", &ComposerConfig::inline("trust_domain +"))
            .is_err());
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.join().expect("reader panicked") > 0);
    }
    assert_eq!(
        composer.store().current().unwrap().trust_domain(),
        TRUST_DOMAINS[1]
    );
}

#[test]
fn test_program_shared_across_threads() {
    let composer = Arc::new(CredentialComposer::new());
    composer
        .configure("example.org", &ComposerConfig::inline(override_claims("{'jti': uuidgen()}")))
        .unwrap();
    let configuration = composer.store().current().unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let configuration = configuration.clone();
            thread::spawn(move || {
                let request = workload_request("web");
                let context = configuration.context(&request);
                configuration
                    .jwt_program()
                    .evaluate(&context.activation())
                    .map(|v| v.to_string())
            })
        })
        .collect();

    let mut results: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    results.sort();
    results.dedup();
    assert_eq!(results.len(), 8);
}
