use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{AppendHeaders, IntoResponse, Redirect},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

pub const MULTIPART_BOUNDARY: &str = "mock-boundary";

/// What `/echo` reports back about the request it received.
#[derive(Debug, Serialize)]
pub struct Echo {
    pub method: String,
    pub query: Option<String>,
    pub headers: Map<String, Value>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/text", get(text))
        .route("/json", get(json_body))
        .route("/missing", get(missing))
        .route("/echo", any(echo))
        .route("/cookies", get(cookies))
        .route("/status/{code}", get(status))
        .route("/binary", get(binary))
        .route("/form", get(form))
        .route("/redirect", get(redirect))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    tracing::info!(addr = ?listener.local_addr().ok(), "mock server listening");
    axum::serve(listener, app()).await
}

async fn text() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "ok")
}

async fn json_body() -> Json<Value> {
    Json(json!({"hello": "world", "items": [1, 2, 3]}))
}

async fn missing() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({"error": "not found"})))
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.as_str().to_string(), Value::String(value))
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    })
}

async fn cookies() -> impl IntoResponse {
    let session = format!("session={}; Path=/; HttpOnly", Uuid::new_v4());
    (
        AppendHeaders([
            (header::SET_COOKIE, session),
            (
                header::SET_COOKIE,
                "theme=dark; Expires=Wed, 09 Jun 2021 10:18:14 GMT; SameSite=Lax".to_string(),
            ),
        ]),
        "cookies set",
    )
}

async fn status(Path(code): Path<u16>) -> impl IntoResponse {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {code}"))
}

async fn binary() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Bytes::from_static(&[0x00, 0xff, 0x10]),
    )
}

async fn form() -> impl IntoResponse {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nhello\r\n--{b}--\r\n",
        b = MULTIPART_BOUNDARY
    );
    let content_type = format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}");
    ([(header::CONTENT_TYPE, content_type)], body)
}

async fn redirect() -> Redirect {
    Redirect::temporary("/text")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_serializes_to_json() {
        let echo = Echo {
            method: "GET".to_string(),
            query: Some("a=1".to_string()),
            headers: Map::new(),
            body: String::new(),
        };
        let value = serde_json::to_value(&echo).unwrap();
        assert_eq!(value["method"], "GET");
        assert_eq!(value["query"], "a=1");
        assert!(value["headers"].as_object().unwrap().is_empty());
    }

    #[test]
    fn echo_without_query_serializes_null() {
        let echo = Echo {
            method: "DELETE".to_string(),
            query: None,
            headers: Map::new(),
            body: String::new(),
        };
        let value = serde_json::to_value(&echo).unwrap();
        assert!(value["query"].is_null());
    }
}
