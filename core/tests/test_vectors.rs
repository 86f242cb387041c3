//! Verify request building and response parsing against JSON test vectors
//! stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests or simulated
//! responses, and expected outcomes. JSON bodies are compared as parsed
//! values; a vector that also lists the raw `body` pins the exact bytes,
//! field order included.

use riddle_core::persistence::{render_clear_cookie, render_set_cookie};
use riddle_core::{
    ApiClient, ApiError, ApiResponse, BaseUrl, HttpMethod, HttpRequest, HttpResponse,
    RequestBody, RequestOptions, SessionStore, Transport, TransportError,
};
use serde_json::Value;

/// Never called: vectors only exercise the pure build/parse halves.
struct Offline;

impl Transport for Offline {
    fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Other("offline".into()))
    }
}

fn client(base_url: &Value, token: &Value) -> ApiClient<Offline> {
    let base = base_url.as_str().map(|raw| BaseUrl::parse(raw).unwrap());
    let session = SessionStore::new();
    if let Some(token) = token.as_str() {
        session.set_session(token);
    }
    ApiClient::new(base, session, Offline)
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            (
                arr[0].as_str().unwrap().to_string(),
                arr[1].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

fn options(case: &Value) -> RequestOptions {
    let mut options = RequestOptions::new(parse_method(case["method"].as_str().unwrap()));
    for (name, value) in pairs(&case["headers"]) {
        options = options.header(name, value);
    }
    if let Some(json) = case.get("json") {
        options = options.body(RequestBody::Json(json.clone()));
    } else if let Some(form) = case.get("form") {
        options = options.body(RequestBody::Form(pairs(form)));
    } else if let Some(text) = case.get("text") {
        options = options.body(RequestBody::Text(text.as_str().unwrap().to_string()));
    }
    options
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/request.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let c = client(&case["base_url"], &case["token"]);
        let expected = &case["expected_request"];

        let req = c
            .build_request(case["target"].as_str().unwrap(), &options(&case["options"]))
            .unwrap();
        assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, expected["url"].as_str().unwrap(), "{name}: url");
        assert_eq!(req.headers, pairs(&expected["headers"]), "{name}: headers");

        if let Some(json) = expected.get("json") {
            let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            assert_eq!(&body, json, "{name}: json body");
        }
        if expected.get("json").is_none() || expected["body"].is_string() {
            assert_eq!(req.body.as_deref(), expected["body"].as_str(), "{name}: exact body");
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/response.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client(&Value::String("http://localhost:3000".into()), &Value::Null);
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let sim = &case["response"];
        let response = HttpResponse {
            status: sim["status"].as_u64().unwrap() as u16,
            status_text: sim["status_text"].as_str().unwrap().to_string(),
            headers: pairs(&sim["headers"]),
            body: sim["body"].as_str().unwrap().to_string(),
        };
        let expected = &case["expected"];

        match (expected["kind"].as_str().unwrap(), c.parse_response(response)) {
            ("json", Ok(ApiResponse::Json(value))) => {
                assert_eq!(value, expected["value"], "{name}: json value");
            }
            ("text", Ok(ApiResponse::Text(text))) => {
                assert_eq!(text, expected["value"].as_str().unwrap(), "{name}: text value");
            }
            ("empty", Ok(ApiResponse::Empty)) => {}
            ("unauthorized", Err(err @ ApiError::Unauthorized(_))) => {
                assert_eq!(err.to_string(), expected["message"].as_str().unwrap(), "{name}: message");
            }
            ("http", Err(ApiError::Http { status, message, body })) => {
                assert_eq!(u64::from(status), expected["status"].as_u64().unwrap(), "{name}: status");
                assert_eq!(message, expected["message"].as_str().unwrap(), "{name}: message");
                assert_eq!(body.unwrap_or(Value::Null), expected["body"], "{name}: body");
            }
            ("deserialization", Err(ApiError::Deserialization(_))) => {}
            (kind, outcome) => panic!("{name}: expected {kind}, got {outcome:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Cookies
// ---------------------------------------------------------------------------

#[test]
fn cookie_test_vectors() {
    let raw = include_str!("../../test-vectors/cookie.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expires = case["expires"]
            .as_str()
            .map(|raw| raw.parse::<chrono::DateTime<chrono::Utc>>().unwrap());
        let line = render_set_cookie(
            case["cookie_name"].as_str().unwrap(),
            case["value"].as_str().unwrap(),
            expires,
        );
        assert_eq!(line, case["expected"].as_str().unwrap(), "{name}: set-cookie");
    }

    let clear = &vectors["clear"];
    assert_eq!(
        render_clear_cookie(clear["cookie_name"].as_str().unwrap()),
        clear["expected"].as_str().unwrap()
    );
}
