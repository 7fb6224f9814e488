use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::{Config, API_KEY_HEADER, HTTP_TIMEOUT_SECS, RESPONSE_SNIPPET_CHARS};
use crate::error::FetchError;
use crate::telemetry::{Stage, StageEvent};

pub fn build_client() -> Result<reqwest::Client, FetchError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?)
}

/// Fetch the season standings in a single GET. No retry and no pagination:
/// the provider returns every team in one array.
pub async fn fetch_standings(
    client: &reqwest::Client,
    cfg: &Config,
) -> Result<Vec<Value>, FetchError> {
    let url = cfg.standings_url();
    StageEvent::info(
        Stage::Fetch,
        format!("Fetching data from API: {url} (season {})", cfg.season),
    )
    .emit();

    let before = Instant::now();
    let resp = client
        .get(&url)
        .header(API_KEY_HEADER, &cfg.api_key)
        .send()
        .await?;
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            snippet: snippet(&body),
        });
    }

    let records = parse_records(status.as_u16(), &body)?;
    StageEvent::info(
        Stage::Fetch,
        format!("Successfully fetched data in {:.2?}", before.elapsed()),
    )
    .records(records.len())
    .emit();
    Ok(records)
}

/// The body must be a JSON array; element shape is checked later by the transformer.
fn parse_records(status: u16, body: &str) -> Result<Vec<Value>, FetchError> {
    let malformed = |reason: String| FetchError::Malformed {
        status,
        reason,
        snippet: snippet(body),
    };

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => Err(malformed(format!(
            "expected a JSON array, got {}",
            json_type(&other)
        ))),
        Err(e) => Err(malformed(e.to_string())),
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(RESPONSE_SNIPPET_CHARS).collect()
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const STANDINGS_PATH: &str = "/scores/json/Standings/2024";

    async fn fetch_from(server: &MockServer) -> Result<Vec<Value>, FetchError> {
        let cfg = Config::for_tests(&server.uri());
        let client = build_client().unwrap();
        fetch_standings(&client, &cfg).await
    }

    #[tokio::test]
    async fn returns_every_record_and_sends_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STANDINGS_PATH))
            .and(header(API_KEY_HEADER, "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"TeamID": 1, "Name": "Lakers"},
                {"TeamID": 2, "Name": "Celtics"},
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let records = fetch_from(&server).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["Name"], "Celtics");
    }

    #[tokio::test]
    async fn empty_array_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STANDINGS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        assert!(fetch_from(&server).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_2xx_is_status_error_with_snippet() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STANDINGS_PATH))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(r#"{"message":"Access denied"}"#),
            )
            .mount(&server)
            .await;

        let err = fetch_from(&server).await.unwrap_err();
        match &err {
            FetchError::Status { status, snippet } => {
                assert_eq!(*status, 401);
                assert!(snippet.contains("Access denied"), "{snippet}");
            }
            other => panic!("expected Status, got {other:?}"),
        }
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn object_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STANDINGS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"teams": []})))
            .mount(&server)
            .await;

        match fetch_from(&server).await.unwrap_err() {
            FetchError::Malformed { status, reason, .. } => {
                assert_eq!(status, 200);
                assert!(reason.contains("an object"), "{reason}");
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_is_malformed_and_snippet_is_bounded() {
        let server = MockServer::start().await;
        let body = format!("<html>{}</html>", "x".repeat(1_000));
        Mock::given(method("GET"))
            .and(path(STANDINGS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        match fetch_from(&server).await.unwrap_err() {
            FetchError::Malformed { snippet, .. } => {
                assert_eq!(snippet.chars().count(), RESPONSE_SNIPPET_CHARS);
                assert!(snippet.starts_with("<html>"));
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_provider_is_request_error() {
        // Nothing listens on port 1.
        let cfg = Config::for_tests("http://127.0.0.1:1");
        let client = build_client().unwrap();
        let err = fetch_standings(&client, &cfg).await.unwrap_err();
        assert!(matches!(err, FetchError::Request(_)), "{err:?}");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let body = "é".repeat(RESPONSE_SNIPPET_CHARS + 10);
        assert_eq!(snippet(&body).chars().count(), RESPONSE_SNIPPET_CHARS);
    }
}
