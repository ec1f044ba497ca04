//! End-to-end tests for `GeocodeResolver` tier ordering, against one mock
//! server per provider.

use geocrm_geocode::{
    GeocodeError, GeocodeResolver, Geocoder, PostalClient, PreciseProvider, PublicCallPolicy,
    PublicProvider,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CANONICAL: &str = "Rua A, Centro, Maceió, AL, 57000000, Brasil";
const RAW: &str = "Rua A, 10, Centro, Maceió, AL, 57000000, Brasil";

struct Servers {
    postal: MockServer,
    precise: MockServer,
    public: MockServer,
}

impl Servers {
    async fn start() -> Self {
        Self {
            postal: MockServer::start().await,
            precise: MockServer::start().await,
            public: MockServer::start().await,
        }
    }

    fn resolver(&self, with_precise: bool) -> GeocodeResolver {
        let postal =
            PostalClient::new(&format!("{}/ws", self.postal.uri()), 5, "geocrm-test", 2, 0)
                .unwrap();
        let precise = with_precise.then(|| {
            PreciseProvider::new(&format!("{}/geocode/json", self.precise.uri()), "k", 5)
                .unwrap()
        });
        let public = PublicProvider::new(
            &[self.public.uri()],
            "geocrm-test",
            "br",
            5,
            PublicCallPolicy {
                politeness_delay_ms: 0,
                backoff_ms: 0,
                max_attempts: 2,
            },
        )
        .unwrap();
        GeocodeResolver::new(postal, precise, public)
    }

    async fn postal_found(&self) {
        Mock::given(method("GET"))
            .and(path("/ws/57000000/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "logradouro": "Rua A",
                "bairro": "Centro",
                "localidade": "Maceió",
                "uf": "AL"
            })))
            .mount(&self.postal)
            .await;
    }
}

fn hit(lat: &str, lon: &str) -> serde_json::Value {
    serde_json::json!([{"lat": lat, "lon": lon}])
}

#[tokio::test]
async fn keyed_provider_wins_when_configured() {
    let servers = Servers::start().await;
    servers.postal_found().await;
    Mock::given(method("GET"))
        .and(query_param("address", CANONICAL))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "results": [{"geometry": {"location": {"lat": -9.5, "lng": -35.5}}}]
        })))
        .expect(1)
        .mount(&servers.precise)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hit("1", "1")))
        .expect(0)
        .mount(&servers.public)
        .await;

    let result = servers
        .resolver(true)
        .resolve(RAW, Some("57000-000"))
        .await
        .unwrap()
        .unwrap();

    assert!((result.lat + 9.5).abs() < 1e-9);
    // Region and postal code are filled in from the registry.
    assert_eq!(result.normalized_region(), Some("AL"));
}

#[tokio::test]
async fn public_provider_uses_postal_canonical_address() {
    let servers = Servers::start().await;
    servers.postal_found().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", CANONICAL))
        .respond_with(ResponseTemplate::new(200).set_body_json(hit("-9.7", "-35.7")))
        .expect(1)
        .mount(&servers.public)
        .await;

    let result = servers
        .resolver(false)
        .resolve(RAW, Some("57000000"))
        .await
        .unwrap()
        .unwrap();
    assert!((result.lat + 9.7).abs() < 1e-9);
}

#[tokio::test]
async fn unknown_postal_code_skips_keyed_provider_and_uses_raw_text() {
    let servers = Servers::start().await;
    Mock::given(method("GET"))
        .and(path("/ws/57000000/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"erro": "true"})))
        .expect(1)
        .mount(&servers.postal)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "results": [{"geometry": {"location": {"lat": 0.0, "lng": 0.0}}}]
        })))
        .expect(0)
        .mount(&servers.precise)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", RAW))
        .respond_with(ResponseTemplate::new(200).set_body_json(hit("-9.8", "-35.8")))
        .expect(1)
        .mount(&servers.public)
        .await;

    let result = servers
        .resolver(true)
        .resolve(RAW, Some("57000000"))
        .await
        .unwrap()
        .unwrap();
    assert!((result.lng + 35.8).abs() < 1e-9);
}

#[tokio::test]
async fn rate_limit_then_success_returns_coordinates() {
    let servers = Servers::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&servers.public)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hit("-9.9", "-35.9")))
        .mount(&servers.public)
        .await;

    let result = servers
        .resolver(false)
        .resolve(RAW, None)
        .await
        .unwrap()
        .unwrap();
    assert!((result.lat + 9.9).abs() < 1e-9);
}

#[tokio::test]
async fn unavailable_public_provider_is_fatal() {
    let servers = Servers::start().await;
    servers.postal_found().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&servers.public)
        .await;

    let err = servers
        .resolver(false)
        .resolve(RAW, Some("57000000"))
        .await
        .unwrap_err();
    assert!(err.is_fatal(), "got: {err:?}");
}

#[tokio::test]
async fn keyed_provider_failure_falls_through_to_public() {
    let servers = Servers::start().await;
    servers.postal_found().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&servers.precise)
        .await;
    Mock::given(method("GET"))
        .and(query_param("q", CANONICAL))
        .respond_with(ResponseTemplate::new(200).set_body_json(hit("-9.6", "-35.6")))
        .expect(1)
        .mount(&servers.public)
        .await;

    let result = servers.resolver(true).resolve(RAW, Some("57000000")).await;
    assert!(result.unwrap().is_some());
}

#[tokio::test]
async fn short_raw_address_without_postal_code_is_none() {
    let servers = Servers::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hit("1", "1")))
        .expect(0)
        .mount(&servers.public)
        .await;

    let result = servers.resolver(false).resolve("Ipu", None).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn postal_registry_failure_is_scoped_to_the_entry() {
    let servers = Servers::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&servers.postal)
        .await;

    let err = servers
        .resolver(false)
        .resolve(RAW, Some("57000000"))
        .await
        .unwrap_err();
    assert!(!err.is_fatal());
    assert!(matches!(err, GeocodeError::Postal { .. }));
}

#[tokio::test]
async fn rejected_public_query_resolves_to_none() {
    let servers = Servers::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&servers.public)
        .await;

    let result = servers.resolver(false).resolve(RAW, None).await.unwrap();
    assert!(result.is_none());
}
