// Flight search client.
// Talks to the Amadeus self-service API: client-credentials token, city code
// lookup and cheapest round-trip offer search. The only hard failures are
// authentication and the transport itself; everything else degrades to an
// empty code or an N/A quote.

use crate::config::AmadeusConfig;
use crate::flight_data::{FlightQuote, RoundTripQuery, SearchOutcome};
use crate::offers::{select_cheapest, FlightOffersResponse};
use crate::retry::{send_with_backoff, RetryOutcome};
use crate::transport::{ApiError, HttpRequest, Transport};
use async_trait::async_trait;
use serde::Deserialize;

pub const TOKEN_PATH: &str = "/v1/security/oauth2/token";
pub const LOCATIONS_PATH: &str = "/v1/reference-data/locations";
pub const FLIGHT_OFFERS_PATH: &str = "/v2/shopping/flight-offers";

const ADULTS: u32 = 1;
const CURRENCY: &str = "USD";
const MAX_OFFERS: u32 = 30;

#[async_trait]
pub trait FlightSearch: Send + Sync {
    /// City-level IATA code for `city_name`, or an empty string when unknown.
    async fn resolve_city_code(&self, city_name: &str) -> Result<String, ApiError>;

    /// Cheapest round trip for `query`; an N/A quote when nothing usable came back.
    async fn search_cheapest_round_trip(
        &self,
        query: &RoundTripQuery,
    ) -> Result<FlightQuote, ApiError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LocationsResponse {
    #[serde(default)]
    data: Vec<LocationMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationMatch {
    #[serde(default)]
    iata_code: Option<String>,
}

pub struct FlightSearchClient<T> {
    transport: T,
    config: AmadeusConfig,
    access_token: String,
}

impl<T: Transport> FlightSearchClient<T> {
    /// Authenticate and return a client holding the bearer token.
    pub async fn connect(config: AmadeusConfig, transport: T) -> Result<Self, ApiError> {
        let access_token = Self::authenticate(&transport, &config).await?;
        Ok(Self {
            transport,
            config,
            access_token,
        })
    }

    async fn authenticate(transport: &T, config: &AmadeusConfig) -> Result<String, ApiError> {
        let request = HttpRequest::post(format!("{}{TOKEN_PATH}", config.base_url)).with_form(&[
            ("grant_type", "client_credentials"),
            ("client_id", config.api_key.as_str()),
            ("client_secret", config.api_secret.as_str()),
        ]);

        let response = transport.send(&request).await?;
        if !response.is_success() {
            return Err(ApiError::AuthenticationFailed {
                status: response.status,
                message: response.body,
            });
        }

        let token: TokenResponse =
            response
                .json()
                .map_err(|e| ApiError::AuthenticationFailed {
                    status: response.status,
                    message: e.to_string(),
                })?;
        if token.access_token.is_empty() {
            return Err(ApiError::AuthenticationFailed {
                status: response.status,
                message: "response carried no access_token".to_string(),
            });
        }

        tracing::info!(expires_in = ?token.expires_in, "authenticated against flight API");
        Ok(token.access_token)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Run one offer search and classify what came back.
    pub async fn search_offers(&self, query: &RoundTripQuery) -> Result<SearchOutcome, ApiError> {
        let route = format!("{}->{}", query.origin_code, query.destination_code);
        // no nonStop filter: connections are allowed
        let request = HttpRequest::get(self.url(FLIGHT_OFFERS_PATH))
            .with_bearer(&self.access_token)
            .with_query("originLocationCode", &query.origin_code)
            .with_query("destinationLocationCode", &query.destination_code)
            .with_query("departureDate", &query.departure_date)
            .with_query("returnDate", &query.return_date)
            .with_query("adults", ADULTS)
            .with_query("currencyCode", CURRENCY)
            .with_query("max", MAX_OFFERS);

        let label = format!("offers {route}");
        let response =
            match send_with_backoff(&self.transport, &request, &self.config.retry, &label).await? {
                RetryOutcome::Completed { response, .. } => response,
                RetryOutcome::Exhausted { attempts } => {
                    return Ok(SearchOutcome::RateLimited { attempts })
                }
            };

        if !response.is_success() {
            tracing::warn!(status = response.status, "Offer search for {route} failed");
            return Ok(SearchOutcome::Rejected {
                status: response.status,
            });
        }

        let offers: FlightOffersResponse = match response.json() {
            Ok(offers) => offers,
            Err(e) => {
                tracing::warn!("Offer search for {route} returned an unreadable body: {e}");
                return Ok(SearchOutcome::Malformed(e.to_string()));
            }
        };

        let outcome = select_cheapest(&offers, query);
        match &outcome {
            SearchOutcome::NoOffers => tracing::info!("No offers found for {route}"),
            SearchOutcome::Malformed(reason) => {
                tracing::warn!("Cheapest offer for {route} could not be read: {reason}")
            }
            _ => {}
        }
        Ok(outcome)
    }
}

#[async_trait]
impl<T: Transport> FlightSearch for FlightSearchClient<T> {
    async fn resolve_city_code(&self, city_name: &str) -> Result<String, ApiError> {
        let request = HttpRequest::get(self.url(LOCATIONS_PATH))
            .with_bearer(&self.access_token)
            .with_query("keyword", city_name)
            .with_query("subType", "CITY");

        let label = format!("IATA {city_name}");
        let response =
            match send_with_backoff(&self.transport, &request, &self.config.retry, &label).await? {
                RetryOutcome::Completed { response, .. } => response,
                RetryOutcome::Exhausted { .. } => return Ok(String::new()),
            };

        if !response.is_success() {
            tracing::warn!(status = response.status, "City lookup for {city_name} failed");
            return Ok(String::new());
        }

        let code = response
            .json::<LocationsResponse>()
            .ok()
            .and_then(|locations| locations.data.into_iter().next())
            .and_then(|first| first.iata_code)
            .unwrap_or_default();

        if code.is_empty() {
            tracing::warn!("No IATA code found for {city_name}");
        }
        Ok(code)
    }

    async fn search_cheapest_round_trip(
        &self,
        query: &RoundTripQuery,
    ) -> Result<FlightQuote, ApiError> {
        Ok(self.search_offers(query).await?.into_quote(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight_data::NOT_AVAILABLE;
    use crate::retry::RetryConfig;
    use crate::transport::{mock_server::MockServer, HttpResponse};
    use serde_json::json;
    use std::sync::Arc;

    fn config() -> AmadeusConfig {
        AmadeusConfig {
            base_url: "https://amadeus.test".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            retry: RetryConfig::default(),
        }
    }

    async fn server() -> Arc<MockServer> {
        let server = Arc::new(MockServer::new());
        server
            .set_default(
                TOKEN_PATH,
                HttpResponse::ok(r#"{"access_token":"tok-123","expires_in":1799}"#),
            )
            .await;
        server
    }

    async fn client(server: &Arc<MockServer>) -> FlightSearchClient<Arc<MockServer>> {
        FlightSearchClient::connect(config(), server.clone())
            .await
            .unwrap()
    }

    fn query() -> RoundTripQuery {
        RoundTripQuery::new("ORD", "TYO", "2026-10-15", "2027-04-13")
            .with_origin_city("Chicago")
            .with_destination_city("Tokyo")
    }

    fn offers_body(prices: &[&str]) -> String {
        let data: Vec<_> = prices
            .iter()
            .map(|p| {
                json!({
                    "price": { "total": p },
                    "itineraries": [
                        { "segments": [{
                            "departure": { "iataCode": "ORD", "at": "2026-11-02T08:00:00" },
                            "arrival": { "iataCode": "HND", "at": "2026-11-03T12:00:00" }
                        }]},
                        { "segments": [{
                            "departure": { "iataCode": "HND", "at": "2026-11-20T17:05:00" },
                            "arrival": { "iataCode": "ORD", "at": "2026-11-20T15:00:00" }
                        }]}
                    ]
                })
            })
            .collect();
        json!({
            "data": data,
            "dictionaries": { "locations": { "ORD": { "countryCode": "us" } } }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_connect_sends_client_credentials() {
        let server = server().await;
        client(&server).await;

        let sent = server.requests_to(TOKEN_PATH).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].form_value("grant_type"), Some("client_credentials"));
        assert_eq!(sent[0].form_value("client_id"), Some("key"));
        assert_eq!(sent[0].form_value("client_secret"), Some("secret"));
    }

    #[tokio::test]
    async fn test_connect_fails_on_rejected_credentials() {
        let server = Arc::new(MockServer::new());
        server
            .set_default(TOKEN_PATH, HttpResponse::new(401, r#"{"error":"invalid_client"}"#))
            .await;

        let res = FlightSearchClient::connect(config(), server.clone()).await;
        assert!(matches!(
            res,
            Err(ApiError::AuthenticationFailed { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_fails_without_token() {
        let server = Arc::new(MockServer::new());
        server
            .set_default(TOKEN_PATH, HttpResponse::ok(r#"{"state":"approved"}"#))
            .await;

        let res = FlightSearchClient::connect(config(), server.clone()).await;
        assert!(matches!(res, Err(ApiError::AuthenticationFailed { .. })));
    }

    #[tokio::test]
    async fn test_resolve_city_code() {
        let server = server().await;
        server
            .enqueue(
                LOCATIONS_PATH,
                HttpResponse::ok(r#"{"data":[{"iataCode":"PAR","name":"PARIS"},{"iataCode":"PAX"}]}"#),
            )
            .await;
        let client = client(&server).await;

        let code = client.resolve_city_code("Paris").await.unwrap();
        assert_eq!(code, "PAR");

        let sent = server.requests_to(LOCATIONS_PATH).await;
        assert_eq!(sent[0].query_value("keyword"), Some("Paris"));
        assert_eq!(sent[0].query_value("subType"), Some("CITY"));
        assert_eq!(sent[0].bearer.as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn test_resolve_city_code_soft_failures() {
        let server = server().await;
        server
            .enqueue(LOCATIONS_PATH, HttpResponse::new(400, "bad keyword"))
            .await;
        server
            .enqueue(LOCATIONS_PATH, HttpResponse::ok(r#"{"data":[]}"#))
            .await;
        server
            .enqueue(LOCATIONS_PATH, HttpResponse::ok("<html>"))
            .await;
        let client = client(&server).await;

        for _ in 0..3 {
            assert_eq!(client.resolve_city_code("Atlantis").await.unwrap(), "");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_city_code_exhausted_is_empty() {
        let server = server().await;
        server.rate_limit_next(LOCATIONS_PATH, 5).await;
        let client = client(&server).await;

        assert_eq!(client.resolve_city_code("Paris").await.unwrap(), "");
        assert_eq!(server.requests_to(LOCATIONS_PATH).await.len(), 5);
    }

    #[tokio::test]
    async fn test_search_sends_fixed_parameters() {
        let server = server().await;
        server
            .enqueue(FLIGHT_OFFERS_PATH, HttpResponse::ok(offers_body(&["500.00"])))
            .await;
        let client = client(&server).await;

        client.search_cheapest_round_trip(&query()).await.unwrap();

        let sent = server.requests_to(FLIGHT_OFFERS_PATH).await;
        let req = &sent[0];
        assert_eq!(req.query_value("originLocationCode"), Some("ORD"));
        assert_eq!(req.query_value("destinationLocationCode"), Some("TYO"));
        assert_eq!(req.query_value("departureDate"), Some("2026-10-15"));
        assert_eq!(req.query_value("returnDate"), Some("2027-04-13"));
        assert_eq!(req.query_value("adults"), Some("1"));
        assert_eq!(req.query_value("currencyCode"), Some("USD"));
        assert_eq!(req.query_value("max"), Some("30"));
        assert_eq!(req.query_value("nonStop"), None);
    }

    #[tokio::test]
    async fn test_search_picks_cheapest() {
        let server = server().await;
        server
            .enqueue(
                FLIGHT_OFFERS_PATH,
                HttpResponse::ok(offers_body(&["100.00", "99.99", "450.00"])),
            )
            .await;
        let client = client(&server).await;

        let quote = client.search_cheapest_round_trip(&query()).await.unwrap();
        assert_eq!(quote.price, "99.99");
        assert_eq!(quote.origin_city, "Chicago, US");
        assert_eq!(quote.destination_city, "Tokyo");
        assert_eq!(quote.origin_airport, "ORD");
        assert_eq!(quote.destination_airport, "HND");
        assert_eq!(quote.out_date, "2026-11-02");
        assert_eq!(quote.return_date, "2026-11-20");
        assert_eq!(quote.total_segments, 2);
    }

    #[tokio::test]
    async fn test_search_empty_offers_is_placeholder() {
        let server = server().await;
        server
            .enqueue(FLIGHT_OFFERS_PATH, HttpResponse::ok(r#"{"data":[]}"#))
            .await;
        let client = client(&server).await;

        let quote = client.search_cheapest_round_trip(&query()).await.unwrap();
        assert_eq!(quote, FlightQuote::unavailable("Chicago", "Tokyo"));
    }

    #[tokio::test]
    async fn test_search_http_error_is_placeholder_with_code_fallback() {
        let server = server().await;
        server
            .enqueue(FLIGHT_OFFERS_PATH, HttpResponse::new(400, r#"{"errors":[]}"#))
            .await;
        let client = client(&server).await;
        let bare = RoundTripQuery::new("ORD", "", "2026-10-15", "2027-04-13");

        let outcome = client.search_offers(&bare).await.unwrap();
        assert_eq!(outcome, SearchOutcome::Rejected { status: 400 });

        let quote = outcome.into_quote(&bare);
        assert_eq!(quote.price, NOT_AVAILABLE);
        assert_eq!(quote.origin_city, "ORD");
        assert_eq!(quote.total_segments, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_succeeds_after_three_429() {
        let server = server().await;
        server.rate_limit_next(FLIGHT_OFFERS_PATH, 3).await;
        server
            .enqueue(FLIGHT_OFFERS_PATH, HttpResponse::ok(offers_body(&["612.10"])))
            .await;
        let client = client(&server).await;

        let quote = client.search_cheapest_round_trip(&query()).await.unwrap();
        assert_eq!(quote.price, "612.10");
        assert_eq!(server.requests_to(FLIGHT_OFFERS_PATH).await.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_five_429_is_placeholder() {
        let server = server().await;
        server.rate_limit_next(FLIGHT_OFFERS_PATH, 5).await;
        server
            .enqueue(FLIGHT_OFFERS_PATH, HttpResponse::ok(offers_body(&["612.10"])))
            .await;
        let client = client(&server).await;

        let outcome = client.search_offers(&query()).await.unwrap();
        assert_eq!(outcome, SearchOutcome::RateLimited { attempts: 5 });
        assert_eq!(
            outcome.into_quote(&query()),
            FlightQuote::unavailable("Chicago", "Tokyo")
        );
    }

    #[tokio::test]
    async fn test_search_transport_failure_propagates() {
        let server = server().await;
        let client = client(&server).await;
        server.set_outage(true);

        let res = client.search_cheapest_round_trip(&query()).await;
        assert!(matches!(res, Err(ApiError::NetworkError(_))));
    }
}
