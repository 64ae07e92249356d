//! Public API.
//! Serves /in-memory (key-value get/set) and /mongo (record query) with JSON.

use super::AppState;
use crate::access;
use crate::kv::KvError;
use crate::metrics;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{body::to_bytes, Body, Method, Request, Response, StatusCode};
use recordgate_shared::{Entry, QueryFilter, QueryResult};
use serde::Serialize;

pub const KEY_PARAM_MISSING: &str = "key request Parameter not Provided";
pub const NO_REQUEST_CONTENT: &str = "No request content to process";
pub const METHOD_NOT_SUPPORTED: &str = "http Method not supported";

fn text_response(body: impl Into<String>, status: StatusCode) -> Response<Body> {
    let mut res = Response::new(Body::from(body.into()));
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    res
}

fn json_response<T: Serialize>(value: &T, status: StatusCode) -> Response<Body> {
    match serde_json::to_string(value) {
        Ok(body) => {
            let mut res = Response::new(Body::from(body));
            *res.status_mut() = status;
            res.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            res
        }
        Err(e) => text_response(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Collect every decoded value of the `key` query parameter, in order.
fn key_params(req: &Request<Body>) -> Vec<String> {
    let Some(query) = req.uri().query() else {
        return Vec::new();
    };
    form_urlencoded::parse(query.as_bytes())
        .filter(|(k, _)| k == "key")
        .map(|(_, v)| v.into_owned())
        .collect()
}

fn record_kv(op: &str, outcome: Result<(), &KvError>) {
    let status = match outcome {
        Ok(()) => "ok",
        Err(e) => e.label(),
    };
    metrics::KV_OPS_TOTAL.with_label_values(&[op, status]).inc();
}

pub async fn handle_api(
    req: Request<Body>,
    state: &AppState,
) -> Result<Response<Body>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match path.as_str() {
        "/in-memory" if method == Method::GET => get_entry(&req, state),
        "/in-memory" if method == Method::POST => set_entry(req, state).await,
        "/in-memory" => text_response(METHOD_NOT_SUPPORTED, StatusCode::METHOD_NOT_ALLOWED),
        "/mongo" if method == Method::POST => query_records(req, state).await,
        "/mongo" => json_response(
            &QueryResult::error(METHOD_NOT_SUPPORTED),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
        _ => text_response("not found", StatusCode::NOT_FOUND),
    };

    access::http_request(method.as_str(), &path, response.status().as_u16());
    Ok(response)
}

fn get_entry(req: &Request<Body>, state: &AppState) -> Response<Body> {
    let keys = key_params(req);
    let key = match keys.as_slice() {
        [] => return text_response(KEY_PARAM_MISSING, StatusCode::FORBIDDEN),
        [key] => key,
        _ => return text_response(KEY_PARAM_MISSING, StatusCode::BAD_REQUEST),
    };

    match state.kv.get(key) {
        Ok(entry) => {
            record_kv("get", Ok(()));
            json_response(&entry, StatusCode::ACCEPTED)
        }
        Err(e) => {
            record_kv("get", Err(&e));
            let status = match e {
                KvError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                KvError::InvalidKey | KvError::KeyNotFound => StatusCode::NOT_FOUND,
            };
            text_response(e.to_string(), status)
        }
    }
}

async fn set_entry(req: Request<Body>, state: &AppState) -> Response<Body> {
    let body = match to_bytes(req.into_body()).await {
        Ok(b) => b,
        Err(e) => return text_response(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    };
    if body.is_empty() {
        return text_response(NO_REQUEST_CONTENT, StatusCode::INTERNAL_SERVER_ERROR);
    }
    let entry: Entry = match serde_json::from_slice(&body) {
        Ok(entry) => entry,
        Err(e) => return text_response(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    };

    match state.kv.set(&entry.key, &entry.value) {
        Ok(()) => {
            record_kv("set", Ok(()));
            json_response(&entry, StatusCode::CREATED)
        }
        Err(e) => {
            record_kv("set", Err(&e));
            text_response(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn query_records(req: Request<Body>, state: &AppState) -> Response<Body> {
    let body = match to_bytes(req.into_body()).await {
        Ok(b) => b,
        Err(e) => {
            return json_response(
                &QueryResult::error(e.to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    };
    if body.is_empty() {
        return json_response(
            &QueryResult::error(NO_REQUEST_CONTENT),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
    }
    let filter: QueryFilter = match serde_json::from_slice(&body) {
        Ok(f) => f,
        Err(e) => {
            return json_response(
                &QueryResult::error(e.to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    };

    let result = state.engine.query(&filter).await;
    let status = if result.is_success() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::NOT_FOUND
    };
    json_response(&result, status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::RedbKvStore;
    use crate::query::QueryEngine;
    use crate::storage::memory::InMemoryCollection;
    use recordgate_shared::QueryStatus;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(
            Arc::new(RedbKvStore::in_memory().unwrap()),
            Arc::new(QueryEngine::new(Arc::new(InMemoryCollection::new()))),
        )
    }

    fn request(method: Method, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(res: Response<Body>) -> String {
        let bytes = to_bytes(res.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_key_params() {
        let req = request(Method::GET, "/in-memory?key=a&other=1&key=b&key", "");
        assert_eq!(key_params(&req), vec!["a", "b", ""]);
        let req = request(Method::GET, "/in-memory", "");
        assert!(key_params(&req).is_empty());
        let req = request(Method::GET, "/in-memory?key=a%20b&key=c+d&key=x%26y%3Dz", "");
        assert_eq!(key_params(&req), vec!["a b", "c d", "x&y=z"]);
    }

    #[tokio::test]
    async fn test_get_percent_encoded_key() {
        let state = state();
        let res = handle_api(
            request(Method::POST, "/in-memory", r#"{"key":"a b","value":"v"}"#),
            &state,
        )
        .await
        .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = handle_api(request(Method::GET, "/in-memory?key=a%20b", ""), &state)
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        let entry: Entry = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(entry, Entry::new("a b", "v"));
    }

    #[tokio::test]
    async fn test_get_without_key_param() {
        let res = handle_api(request(Method::GET, "/in-memory", ""), &state()).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_string(res).await, KEY_PARAM_MISSING);
    }

    #[tokio::test]
    async fn test_get_with_repeated_key_param() {
        let res = handle_api(request(Method::GET, "/in-memory?key=a&key=b", ""), &state())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_unknown_key() {
        let res = handle_api(request(Method::GET, "/in-memory?key=test", ""), &state())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(res).await, "Key not found");
    }

    #[tokio::test]
    async fn test_get_existing_key() {
        let state = state();
        state.kv.set("test", "testValue").unwrap();
        let res = handle_api(request(Method::GET, "/in-memory?key=test", ""), &state)
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        let entry: Entry = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(entry, Entry::new("test", "testValue"));
    }

    #[tokio::test]
    async fn test_post_empty_key() {
        let res = handle_api(
            request(Method::POST, "/in-memory", r#"{"key":"","value":"testValue"}"#),
            &state(),
        )
        .await
        .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(res).await, "Key cannot be empty");
    }

    #[tokio::test]
    async fn test_post_without_body() {
        let res = handle_api(request(Method::POST, "/in-memory", ""), &state())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(res).await, NO_REQUEST_CONTENT);
    }

    #[tokio::test]
    async fn test_post_malformed_json() {
        let res = handle_api(request(Method::POST, "/in-memory", "{\"key\":"), &state())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(res).await.contains("EOF"));
    }

    #[tokio::test]
    async fn test_post_stores_entry() {
        let state = state();
        let res = handle_api(
            request(Method::POST, "/in-memory", r#"{"key":"test","value":"testValue"}"#),
            &state,
        )
        .await
        .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let echoed: Entry = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(echoed, Entry::new("test", "testValue"));
        assert_eq!(state.kv.get("test").unwrap().value, "testValue");
    }

    #[tokio::test]
    async fn test_other_method_on_in_memory() {
        let res = handle_api(request(Method::DELETE, "/in-memory?key=a", ""), &state())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_query_wrong_method() {
        let res = handle_api(request(Method::PUT, "/mongo", ""), &state()).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let result: QueryResult = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(result.status, QueryStatus::Error);
        assert_eq!(result.message, METHOD_NOT_SUPPORTED);
        assert!(result.records.is_empty());
    }

    #[tokio::test]
    async fn test_query_without_body() {
        let res = handle_api(request(Method::POST, "/mongo", ""), &state()).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let result: QueryResult = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(result.message, NO_REQUEST_CONTENT);
    }

    #[tokio::test]
    async fn test_query_bad_date() {
        let body = r#"{"startDate":"2016-01-32","endDate":"2016-03-02","minCount":3100,"maxCount":3000}"#;
        let res = handle_api(request(Method::POST, "/mongo", body), &state()).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let raw = body_string(res).await;
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["code"], 400);
        assert_eq!(value["msg"], "parsing time \"2016-01-32\": day out of range");
        assert_eq!(value["records"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_query_no_data() {
        let body = r#"{"startDate":"2016-01-02","endDate":"2016-03-02","minCount":3100,"maxCount":3000}"#;
        let res = handle_api(request(Method::POST, "/mongo", body), &state()).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let value: serde_json::Value = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(value["code"], 204);
        assert_eq!(value["msg"], "No Data Found");
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let res = handle_api(request(Method::GET, "/nope", ""), &state()).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
