//! End-to-end pipeline tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port and drives the `Client` through a
//! `Transport` backed by ureq, so resolution, header assembly, decoding,
//! cookie extraction and classification all run over real HTTP.

use std::sync::{Arc, Mutex};

use serde_json::json;
use unifetch_core::{
    Client, ClientConfig, ErrorKind, HeaderSet, HttpMethod, HttpRequest, QueryParams, RawResponse, RequestBody,
    ResponseBody, ResponseType, StatusTrigger, Transport, TransportError,
};
use ureq::ResponseExt;

/// Executes `HttpRequest`s with ureq.
///
/// Status codes are returned as data rather than `Err`, leaving status
/// interpretation to the core.
struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &HeaderSet) -> ureq::RequestBuilder<B> {
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    builder
}

impl Transport for UreqTransport {
    fn dispatch(&self, req: &HttpRequest) -> Result<RawResponse, TransportError> {
        let url = req.url.as_str();
        let body = req.body.as_ref().map(RequestBody::to_bytes);

        let result = match req.method {
            HttpMethod::Get => with_headers(self.agent.get(url), &req.headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), &req.headers).call(),
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch => {
                let builder = match req.method {
                    HttpMethod::Post => self.agent.post(url),
                    HttpMethod::Put => self.agent.put(url),
                    _ => self.agent.patch(url),
                };
                let builder = with_headers(builder, &req.headers);
                match &body {
                    Some(bytes) => builder.send(&bytes[..]),
                    None => builder.send_empty(),
                }
            }
        };
        let mut response = result.map_err(|e| Box::new(e) as TransportError)?;

        let final_url = response.get_uri().to_string();
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let body = response.body_mut().read_to_vec().map_err(|e| Box::new(e) as TransportError)?;

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            redirected: final_url != url,
            final_url,
            response_type: ResponseType::Basic,
            body: body.into(),
        })
    }
}

/// Start the mock server on a random port and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}/")
}

fn client(base: &str) -> Client {
    let mut config = ClientConfig::new(base);
    config.default_headers = HeaderSet::new().with("X-Client", "integration");
    config.log_errors = false;
    Client::builder(config).transport(UreqTransport::new()).build().unwrap()
}

#[test]
fn get_text_plain() {
    let base = start_server();
    let env = client(&base).get("text", None).unwrap();
    assert_eq!(env.body, ResponseBody::Text("ok".to_string()));
    assert_eq!(env.status, 200);
    assert_eq!(env.header("content-type"), Some("text/plain; charset=utf-8"));
    assert!(!env.meta.redirected);
}

#[test]
fn get_json_body() {
    let base = start_server();
    let env = client(&base).get("/json", None).unwrap();
    assert_eq!(env.body.as_json().unwrap()["items"], json!([1, 2, 3]));
}

#[test]
fn query_and_headers_reach_the_server() {
    let base = start_server();
    let query = QueryParams::new().with("tag", vec!["a", "b"]).with("page", 2);
    let env = client(&base).get("echo?stale=1", Some(&query)).unwrap();
    let echo = env.body.as_json().unwrap();
    assert_eq!(echo["method"], "GET");
    assert_eq!(echo["query"], "tag=a&tag=b&page=2");
    assert_eq!(echo["headers"]["x-client"], "integration");
}

#[test]
fn every_verb_is_dispatched() {
    let base = start_server();
    let c = client(&base);
    let payload = || Some(RequestBody::from(json!({"n": 1})));

    let cases = [
        (HttpMethod::Get, c.get("echo", None)),
        (HttpMethod::Delete, c.delete("echo", None)),
        (HttpMethod::Post, c.post("echo", payload(), None)),
        (HttpMethod::Put, c.put("echo", payload(), None)),
        (HttpMethod::Patch, c.patch("echo", payload(), None)),
    ];
    for (method, result) in cases {
        let env = result.unwrap();
        let echo = env.body.as_json().unwrap().clone();
        assert_eq!(echo["method"], method.as_str());
        if matches!(method, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch) {
            assert_eq!(echo["headers"]["content-type"], "application/json");
            assert_eq!(echo["body"], r#"{"n":1}"#);
        }
    }
}

#[test]
fn not_found_json_is_http_status_error() {
    let base = start_server();
    let err = client(&base).get("missing", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HttpStatus);
    assert_eq!(err.status(), 404);
    assert_eq!(err.details().unwrap()["body"], json!({"error": "not found"}));
    assert_eq!(err.details().unwrap()["statusText"], "Not Found");
}

#[test]
fn cookies_are_parsed_from_repeated_headers() {
    let base = start_server();
    let env = client(&base).get("cookies", None).unwrap();
    assert_eq!(env.cookies.len(), 2);
    assert_eq!(env.cookies[0].name, "session");
    assert_eq!(env.cookies[0].http_only, Some(true));
    assert_eq!(env.cookies[1].name, "theme");
    assert_eq!(env.cookies[1].same_site.as_deref(), Some("Lax"));
    assert!(env.cookies[1].expires.is_some());
}

#[test]
fn binary_and_form_bodies() {
    let base = start_server();
    let c = client(&base);

    let env = c.get("binary", None).unwrap();
    match env.body {
        ResponseBody::Binary(bytes) => assert_eq!(bytes.as_ref(), &[0x00, 0xff, 0x10]),
        other => panic!("expected binary, got {other:?}"),
    }

    let env = c.get("form", None).unwrap();
    match env.body {
        ResponseBody::Form(form) => assert_eq!(form.get("title"), Some("hello")),
        other => panic!("expected form, got {other:?}"),
    }
}

#[test]
fn redirects_are_reported_in_meta() {
    let base = start_server();
    let env = client(&base).get("redirect", None).unwrap();
    assert_eq!(env.body, ResponseBody::Text("ok".to_string()));
    assert!(env.meta.redirected);
    assert!(env.meta.url.ends_with("/text"));
}

#[test]
fn rate_limit_hook_fires() {
    let base = start_server();
    let hits = Arc::new(Mutex::new(Vec::new()));
    let sink = hits.clone();
    let mut config = ClientConfig::new(&base);
    config.log_errors = false;
    let c = Client::builder(config)
        .transport(UreqTransport::new())
        .on_status(StatusTrigger::RateLimited, move |e| sink.lock().unwrap().push(e.status()))
        .build()
        .unwrap();

    let err = c.get("status/429", None).unwrap_err();
    assert!(err.is_retriable());
    assert_eq!(err.message(), "HTTP Error 429");
    assert_eq!(*hits.lock().unwrap(), vec![429]);
}

#[test]
fn unreachable_host_is_network_error() {
    // Bind then drop to get a port nobody listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let base = format!("http://127.0.0.1:{port}/");
    let err = client(&base).get("text", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(err.status(), 0);
    assert!(err.is_network_error());
}
