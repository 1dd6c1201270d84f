// Test assertions for HTTP responses

use crate::TestResponse;

/// Assert that a response has a specific status code
pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status();
    assert_eq!(
        actual,
        expected,
        "Expected status {}, got {}. Body: {}",
        expected,
        actual,
        response.body_string().unwrap_or_default()
    );
}

/// Assert that the JSON body deserializes to `expected`
pub fn assert_json<T>(response: &TestResponse, expected: &T)
where
    T: serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    let actual: T = match response.body_json() {
        Ok(actual) => actual,
        Err(e) => panic!(
            "Failed to deserialize response body: {}. Body: {}",
            e,
            response.body_string().unwrap_or_default()
        ),
    };
    assert_eq!(actual, *expected, "JSON bodies do not match");
}

/// Assert that a response has a specific header
pub fn assert_header(response: &TestResponse, key: &str, expected: &str) {
    let actual = response.header(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{}' to be '{}', got {:?}",
        key,
        expected,
        actual
    );
}

/// Assert that a response body contains a string
pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.body_string().unwrap_or_default();
    assert!(
        body.contains(expected),
        "Expected body to contain '{}', but it didn't. Body: {}",
        expected,
        body
    );
}

/// Assert that a response is successful (2xx status)
pub fn assert_success(response: &TestResponse) {
    assert!(
        response.is_success(),
        "Expected successful status (2xx), got {}",
        response.status()
    );
}

/// Assert that a response is a client error (4xx status)
pub fn assert_client_error(response: &TestResponse) {
    assert!(
        response.is_client_error(),
        "Expected client error status (4xx), got {}",
        response.status()
    );
}

/// Assert that a validation failure was reported for `field`
pub fn assert_validation_error(response: &TestResponse, field: &str) {
    assert_status(response, 400);
    let body: serde_json::Value = response.body_json().unwrap_or_default();
    assert_eq!(
        body["field"], field,
        "Expected validation error on '{}', got {}",
        field, body
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_core::HttpResponse;

    async fn response(res: HttpResponse) -> TestResponse {
        TestResponse::collect(res).await
    }

    #[tokio::test]
    async fn test_passing_assertions() {
        let res = response(HttpResponse::json(&json!({"ok": true})).unwrap()).await;
        assert_status(&res, 200);
        assert_success(&res);
        assert_header(&res, "Content-Type", "application/json");
        assert_json(&res, &json!({"ok": true}));
        assert_body_contains(&res, "ok");
    }

    #[tokio::test]
    async fn test_validation_error_body() {
        let body = json!({"error": "too short", "field": "name", "status": 400});
        let res = response(HttpResponse::json(&body).unwrap().with_status(400)).await;
        assert_client_error(&res);
        assert_validation_error(&res, "name");
    }

    #[tokio::test]
    #[should_panic(expected = "Expected status 201")]
    async fn test_status_mismatch_panics() {
        let res = response(HttpResponse::ok()).await;
        assert_status(&res, 201);
    }
}
