//! Integration tests for the Hetzner provider against a mock API server

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use certsync_core::{DeployConfig, SslDeployer, SslManager, SyncError};
use certsync_providers::HetznerProvider;

/// Mint a self-signed certificate + key for the given domains
fn issue_cert(domains: &[&str]) -> (String, String) {
    let mut params =
        rcgen::CertificateParams::new(domains.iter().map(|d| d.to_string()).collect::<Vec<_>>())
            .unwrap();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, domains[0]);
    params.not_before = rcgen::date_time_ymd(2026, 1, 1);
    params.not_after = rcgen::date_time_ymd(2027, 1, 1);
    let key = rcgen::KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();
    (cert.pem(), key.serialize_pem())
}

fn provider(server: &MockServer) -> Arc<HetznerProvider> {
    Arc::new(
        HetznerProvider::new("test-token", Some(&server.uri()), Duration::from_secs(5)).unwrap(),
    )
}

fn certificate_json(id: u64, name: &str, cert_pem: &str, domains: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "certificate": cert_pem,
        "domain_names": domains,
    })
}

#[tokio::test]
async fn upload_reuses_matching_remote_certificate() {
    let server = MockServer::start().await;
    let (cert_pem, key_pem) = issue_cert(&["example.com"]);

    Mock::given(method("GET"))
        .and(path("/certificates"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "certificates": [certificate_json(101, "existing", &cert_pem, &["example.com"])],
            "meta": {"pagination": {"next_page": null}},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/certificates/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "certificate": certificate_json(101, "existing", &cert_pem, &["example.com"]),
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/certificates"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let manager = SslManager::new(provider(&server));
    let result = manager.upload(&cert_pem, &key_pem).await.unwrap();
    assert_eq!(result.cert_id, "101");
    assert_eq!(result.cert_name, "existing");
}

#[tokio::test]
async fn listing_follows_next_page_to_the_match() {
    let server = MockServer::start().await;
    let (cert_pem, key_pem) = issue_cert(&["example.com"]);
    let (other_pem, _) = issue_cert(&["other.example.net"]);

    Mock::given(method("GET"))
        .and(path("/certificates"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "certificates": [certificate_json(1, "other", &other_pem, &["other.example.net"])],
            "meta": {"pagination": {"next_page": 2}},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/certificates"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "certificates": [certificate_json(2, "wanted", &cert_pem, &["example.com"])],
            "meta": {"pagination": {"next_page": null}},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/certificates/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "certificate": certificate_json(2, "wanted", &cert_pem, &["example.com"]),
        })))
        .mount(&server)
        .await;

    let manager = SslManager::new(provider(&server));
    let result = manager.upload(&cert_pem, &key_pem).await.unwrap();
    assert_eq!(result.cert_id, "2");
}

#[tokio::test]
async fn upload_creates_when_nothing_matches() {
    let server = MockServer::start().await;
    let (cert_pem, key_pem) = issue_cert(&["new.example.com"]);

    Mock::given(method("GET"))
        .and(path("/certificates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "certificates": [],
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/certificates"))
        .and(body_partial_json(serde_json::json!({"type": "uploaded"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "certificate": {"id": 202, "name": "certsync-upload"},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = SslManager::new(provider(&server));
    let result = manager.upload(&cert_pem, &key_pem).await.unwrap();
    assert_eq!(result.cert_id, "202");
}

#[tokio::test]
async fn rejected_token_is_an_authentication_error() {
    let server = MockServer::start().await;
    let (cert_pem, key_pem) = issue_cert(&["example.com"]);

    Mock::given(method("GET"))
        .and(path("/certificates"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"code": "unauthorized"},
        })))
        .mount(&server)
        .await;

    let manager = SslManager::new(provider(&server));
    let err = manager.upload(&cert_pem, &key_pem).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Provider(certsync_core::ProviderError::Authentication(_))
    ));
}

#[tokio::test]
async fn listener_deploy_swaps_the_default_certificate() {
    let server = MockServer::start().await;
    let (cert_pem, key_pem) = issue_cert(&["example.com"]);

    Mock::given(method("GET"))
        .and(path("/certificates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "certificates": [],
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/certificates"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "certificate": {"id": 900, "name": "certsync-upload"},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/load_balancers/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "load_balancer": {
                "id": 42,
                "services": [
                    {"listen_port": 443, "protocol": "https", "http": {"certificates": [7]}},
                ],
            },
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/load_balancers/42/actions/update_service"))
        .and(body_partial_json(serde_json::json!({
            "listen_port": 443,
            "http": {"certificates": [900]},
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "action": {"id": 1, "status": "running"},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config: DeployConfig =
        serde_json::from_str(r#"{"resourceType": "listener", "listenerId": "42:443"}"#).unwrap();
    let deployer = SslDeployer::new(provider(&server), config);
    deployer.deploy(&cert_pem, &key_pem).await.unwrap();
}

#[tokio::test]
async fn load_balancer_deploy_skips_plain_http_services() {
    let server = MockServer::start().await;
    let (cert_pem, key_pem) = issue_cert(&["example.com"]);

    Mock::given(method("GET"))
        .and(path("/certificates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "certificates": [],
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/certificates"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "certificate": {"id": 55, "name": "certsync-upload"},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/load_balancers/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "load_balancer": {
                "id": 42,
                "services": [
                    {"listen_port": 80, "protocol": "http"},
                    {"listen_port": 443, "protocol": "https", "http": {"certificates": [7]}},
                ],
            },
        })))
        .mount(&server)
        .await;
    // Only the https service gets an update
    Mock::given(method("POST"))
        .and(path("/load_balancers/42/actions/update_service"))
        .and(body_partial_json(serde_json::json!({"listen_port": 443})))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "action": {"id": 2, "status": "running"},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config: DeployConfig =
        serde_json::from_str(r#"{"resourceType": "loadbalancer", "loadbalancerId": "42"}"#)
            .unwrap();
    let deployer = SslDeployer::new(provider(&server), config);
    deployer.deploy(&cert_pem, &key_pem).await.unwrap();
}

#[tokio::test]
async fn missing_load_balancer_is_a_not_found_error() {
    let server = MockServer::start().await;
    let (cert_pem, key_pem) = issue_cert(&["example.com"]);

    Mock::given(method("GET"))
        .and(path("/certificates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "certificates": [],
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/certificates"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "certificate": {"id": 3, "name": "certsync-upload"},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/load_balancers/9999"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": "not_found"},
        })))
        .mount(&server)
        .await;

    let config: DeployConfig =
        serde_json::from_str(r#"{"resourceType": "listener", "listenerId": "9999:443"}"#).unwrap();
    let deployer = SslDeployer::new(provider(&server), config);
    let err = deployer.deploy(&cert_pem, &key_pem).await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn provider_config_with_credentials_file() {
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("hetzner.token");
    std::fs::write(&token_path, "file-token\n").unwrap();

    let config: certsync_providers::ProviderConfig = serde_json::from_value(serde_json::json!({
        "provider": "hetzner",
        "credentialsFile": token_path,
    }))
    .unwrap();
    let provider = certsync_providers::create_provider(&config).unwrap();
    assert_eq!(provider.name(), "hetzner");
}
