//! Request orchestration: resolve, assemble, dispatch, normalize, classify.
//!
//! # Design
//! `Client` holds only configuration and carries no mutable state between
//! calls, so one instance can be shared across threads. Each call is a linear
//! pipeline with a single transport call in the middle.
//!
//! Hosts that own their I/O (the C ABI, webview bridges) skip the transport
//! and drive the two halves themselves: `build_request` produces an
//! `HttpRequest`, the host executes it, and `parse_response` (or
//! `transport_failure`) finishes the call with the same normalization and
//! classification the one-shot path uses.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::classify::{ErrorClassifier, ErrorLogger, RawFailure, StatusTrigger};
use crate::config::ClientConfig;
use crate::error::FetchError;
use crate::headers::{HeaderAssembler, HeaderSet};
use crate::http::{HttpMethod, HttpRequest, RawResponse, RequestBody, RequestOptions, Transport, TransportError};
use crate::resolve::{QueryParams, UrlResolver};
use crate::response::{normalize, ResponseEnvelope};

/// Stateless request pipeline bound to one configuration.
#[derive(Clone)]
pub struct Client {
    base_url: Option<String>,
    resolver: UrlResolver,
    headers: HeaderAssembler,
    classifier: ErrorClassifier,
    transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("resolver", &self.resolver)
            .field("headers", &self.headers)
            .field("classifier", &self.classifier)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

impl Client {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Client without a transport, for hosts that execute requests
    /// themselves.
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        ClientBuilder::new(config).build()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn get(&self, path: &str, query: Option<&QueryParams>) -> Result<ResponseEnvelope, FetchError> {
        self.request(HttpMethod::Get, path, None, query, None)
    }

    pub fn delete(&self, path: &str, query: Option<&QueryParams>) -> Result<ResponseEnvelope, FetchError> {
        self.request(HttpMethod::Delete, path, None, query, None)
    }

    pub fn post(
        &self,
        path: &str,
        payload: Option<RequestBody>,
        query: Option<&QueryParams>,
    ) -> Result<ResponseEnvelope, FetchError> {
        self.request(HttpMethod::Post, path, payload, query, None)
    }

    pub fn put(
        &self,
        path: &str,
        payload: Option<RequestBody>,
        query: Option<&QueryParams>,
    ) -> Result<ResponseEnvelope, FetchError> {
        self.request(HttpMethod::Put, path, payload, query, None)
    }

    pub fn patch(
        &self,
        path: &str,
        payload: Option<RequestBody>,
        query: Option<&QueryParams>,
    ) -> Result<ResponseEnvelope, FetchError> {
        self.request(HttpMethod::Patch, path, payload, query, None)
    }

    /// Full pipeline for one call.
    pub fn request(
        &self,
        method: HttpMethod,
        path: &str,
        payload: Option<RequestBody>,
        query: Option<&QueryParams>,
        overrides: Option<&HeaderSet>,
    ) -> Result<ResponseEnvelope, FetchError> {
        let request = self.build_request(method, path, payload, query, overrides)?;
        self.send_request(&request)
    }

    /// Send to an already resolved URL with already assembled headers.
    pub fn send(
        &self,
        url: Url,
        method: HttpMethod,
        headers: HeaderSet,
        body: Option<RequestBody>,
    ) -> Result<ResponseEnvelope, FetchError> {
        let options = RequestOptions {
            method: None,
            headers,
            body,
        };
        self.send_with(url, method, options)
    }

    /// Like `send`, starting from caller options. `method` replaces any
    /// method set on `options`.
    pub fn send_with(
        &self,
        url: Url,
        method: HttpMethod,
        options: RequestOptions,
    ) -> Result<ResponseEnvelope, FetchError> {
        let request = options.into_request(url, method);
        self.send_request(&request)
    }

    pub fn send_request(&self, request: &HttpRequest) -> Result<ResponseEnvelope, FetchError> {
        let Some(transport) = &self.transport else {
            return Err(self.classifier.handle(RawFailure::Typed(FetchError::Application {
                message: "no transport configured; use build_request/parse_response".to_string(),
                source: None,
            })));
        };

        tracing::debug!(method = %request.method, url = %request.url, "dispatching request");
        match transport.dispatch(request) {
            Ok(raw) => self.parse_response(raw),
            Err(err) => Err(self.transport_failure(err)),
        }
    }

    /// Resolve the URL, assemble headers and attach the payload.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        payload: Option<RequestBody>,
        query: Option<&QueryParams>,
        overrides: Option<&HeaderSet>,
    ) -> Result<HttpRequest, FetchError> {
        let url = self
            .resolver
            .resolve(path, self.base_url.as_deref(), query)
            .map_err(|e| self.classifier.handle(e.into()))?;
        let mut headers = self
            .headers
            .create(overrides)
            .map_err(|e| self.classifier.handle(e.into()))?;

        if let Some(content_type) = payload.as_ref().and_then(RequestBody::implied_content_type) {
            if !headers.contains("content-type") {
                headers.set("Content-Type", content_type);
            }
        }

        Ok(HttpRequest {
            method,
            url,
            headers,
            body: payload,
        })
    }

    /// Finish a call from the response the host received.
    pub fn parse_response(&self, raw: RawResponse) -> Result<ResponseEnvelope, FetchError> {
        tracing::debug!(status = raw.status, url = %raw.final_url, "normalizing response");
        normalize(raw).map_err(|e| self.classifier.handle(e.into()))
    }

    /// Finish a call whose transport failed. Always a `Network` error.
    pub fn transport_failure(&self, err: TransportError) -> FetchError {
        self.classifier.handle(FetchError::network(err).into())
    }

    /// Run an arbitrary failure through the classifier.
    pub fn classify(&self, raw: RawFailure) -> FetchError {
        self.classifier.handle(raw)
    }
}

/// Attaches callbacks and a transport to a `ClientConfig`.
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    assembler_hooks: Vec<Box<dyn FnOnce(&mut HeaderAssembler)>>,
    classifier: ErrorClassifier,
    logger: Option<ErrorLogger>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            assembler_hooks: Vec::new(),
            classifier: ErrorClassifier::default(),
            logger: None,
        }
    }

    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Extra header check run after the grammar check, in registration order.
    pub fn header_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&HeaderSet) -> Result<(), String> + Send + Sync + 'static,
    {
        self.assembler_hooks
            .push(Box::new(move |assembler: &mut HeaderAssembler| assembler.add_validator(validator)));
        self
    }

    pub fn on_status<F>(mut self, trigger: StatusTrigger, hook: F) -> Self
    where
        F: Fn(&FetchError) + Send + Sync + 'static,
    {
        self.classifier = self.classifier.on_status(trigger, hook);
        self
    }

    /// Replace the default `tracing` logger.
    pub fn logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(&crate::classify::ErrorLogEntry) + Send + Sync + 'static,
    {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Fails when the default headers are invalid.
    pub fn build(self) -> Result<Client, FetchError> {
        let ClientConfig {
            base_url,
            default_headers,
            status_messages,
            log_errors,
            query_merge,
        } = self.config;

        let mut headers = HeaderAssembler::new(default_headers)?;
        for hook in self.assembler_hooks {
            hook(&mut headers);
        }

        let logger = match (log_errors, self.logger) {
            (false, _) => None,
            (true, Some(custom)) => Some(custom),
            (true, None) => Some(crate::classify::tracing_logger()),
        };
        let classifier = self
            .classifier
            .with_status_messages(status_messages)
            .with_logger(logger);

        Ok(Client {
            base_url,
            resolver: UrlResolver::new(query_merge),
            headers,
            classifier,
            transport: self.transport,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::response::ResponseBody;
    use serde_json::json;
    use std::sync::Mutex;

    const BASE: &str = "https://api.example.com/v1/";

    fn config() -> ClientConfig {
        let mut config = ClientConfig::new(BASE);
        config.default_headers = HeaderSet::new().with("Accept", "*/*");
        config.log_errors = false;
        config
    }

    /// Records every request and answers with a fixed response.
    fn recording(
        respond: impl Fn(&HttpRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    ) -> (Arc<Mutex<Vec<HttpRequest>>>, impl Transport) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let transport = move |req: &HttpRequest| {
            sink.lock().unwrap().push(req.clone());
            respond(req)
        };
        (seen, transport)
    }

    #[test]
    fn get_text_end_to_end() {
        let (seen, transport) = recording(|req| {
            Ok(RawResponse::new(200, req.url.as_str(), "ok").with_header("Content-Type", "text/plain"))
        });
        let client = Client::builder(config()).transport(transport).build().unwrap();

        let query = QueryParams::new().with("verbose", true);
        let env = client.get("status", Some(&query)).unwrap();
        assert_eq!(env.body, ResponseBody::Text("ok".to_string()));
        assert_eq!(env.meta.url, "https://api.example.com/v1/status?verbose=true");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].method, HttpMethod::Get);
        assert_eq!(seen[0].headers.get("accept"), Some("*/*"));
        assert!(seen[0].body.is_none());
    }

    #[test]
    fn post_json_sets_content_type_once() {
        let (seen, transport) = recording(|req| Ok(RawResponse::new(201, req.url.as_str(), "")));
        let client = Client::builder(config()).transport(transport).build().unwrap();

        client.post("items", Some(json!({"name": "x"}).into()), None).unwrap();
        let overrides = HeaderSet::new().with("content-type", "application/merge-patch+json");
        client
            .request(HttpMethod::Patch, "items/1", Some(json!({}).into()), None, Some(&overrides))
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].headers.get("Content-Type"), Some("application/json"));
        assert_eq!(seen[1].method, HttpMethod::Patch);
        assert_eq!(seen[1].headers.get("Content-Type"), Some("application/merge-patch+json"));
        assert_eq!(seen[1].headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case("content-type")).count(), 1);
    }

    #[test]
    fn method_argument_wins_over_options() {
        let (seen, transport) = recording(|req| Ok(RawResponse::new(204, req.url.as_str(), "")));
        let client = Client::builder(config()).transport(transport).build().unwrap();
        let options = RequestOptions {
            method: Some(HttpMethod::Delete),
            ..Default::default()
        };
        let url = Url::parse("https://api.example.com/x").unwrap();
        client.send_with(url, HttpMethod::Put, options).unwrap();
        assert_eq!(seen.lock().unwrap()[0].method, HttpMethod::Put);
    }

    #[test]
    fn transport_failure_becomes_network_error() {
        let transport = |_: &HttpRequest| -> Result<RawResponse, TransportError> { Err("dns lookup failed".into()) };
        let client = Client::builder(config()).transport(transport).build().unwrap();
        let err = client.get("x", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.status(), 0);
        assert!(err.message().contains("dns lookup failed"));
    }

    #[test]
    fn any_transport_failure_text_is_network() {
        let transport = |_: &HttpRequest| -> Result<RawResponse, TransportError> { Err("something odd".into()) };
        let client = Client::builder(config()).transport(transport).build().unwrap();
        assert!(client.get("x", None).unwrap_err().is_network_error());
    }

    #[test]
    fn status_404_is_classified_with_table_message() {
        let (_, transport) = recording(|req| {
            Ok(RawResponse::new(404, req.url.as_str(), r#"{"error":"not found"}"#)
                .with_header("content-type", "application/json"))
        });
        let client = Client::builder(config()).transport(transport).build().unwrap();
        let err = client.get("missing", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HttpStatus);
        assert_eq!(err.status(), 404);
        assert!(err.message().starts_with("Not Found"));
        assert_eq!(err.details().unwrap()["body"], json!({"error": "not found"}));
    }

    #[test]
    fn invalid_url_fails_before_dispatch() {
        let (seen, transport) = recording(|req| Ok(RawResponse::new(200, req.url.as_str(), "")));
        let mut cfg = config();
        cfg.base_url = None;
        let client = Client::builder(cfg).transport(transport).build().unwrap();
        let err = client.get("/relative", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn invalid_header_fails_before_dispatch() {
        let (seen, transport) = recording(|req| Ok(RawResponse::new(200, req.url.as_str(), "")));
        let client = Client::builder(config()).transport(transport).build().unwrap();
        let overrides = HeaderSet::new().with("Bad Header", "x");
        let err = client
            .request(HttpMethod::Get, "x", None, None, Some(&overrides))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHeader);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn builder_validators_and_hooks_are_applied() {
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        let (_, transport) = recording(|req| Ok(RawResponse::new(401, req.url.as_str(), "")));
        let client = Client::builder(config())
            .transport(transport)
            .header_validator(|h| if h.contains("X-Api-Key") { Ok(()) } else { Err("missing key".into()) })
            .on_status(StatusTrigger::Unauthorized, move |_| *counter.lock().unwrap() += 1)
            .build()
            .unwrap();

        assert_eq!(client.get("x", None).unwrap_err().kind(), ErrorKind::InvalidHeader);

        let key = HeaderSet::new().with("X-Api-Key", "k");
        let err = client.request(HttpMethod::Get, "x", None, None, Some(&key)).unwrap_err();
        assert_eq!(err.status(), 401);
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn custom_logger_sees_failures() {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let sink = entries.clone();
        let mut cfg = config();
        cfg.log_errors = true;
        let client = Client::builder(cfg)
            .logger(move |e| sink.lock().unwrap().push(e.status))
            .build()
            .unwrap();
        let raw = RawResponse::new(500, "https://api.example.com/x", "");
        assert!(client.parse_response(raw).is_err());
        assert_eq!(*entries.lock().unwrap(), vec![500]);
    }

    #[test]
    fn split_api_without_transport() {
        let client = Client::new(config()).unwrap();
        let req = client
            .build_request(HttpMethod::Delete, "items/9", None, None, None)
            .unwrap();
        assert_eq!(req.url.as_str(), "https://api.example.com/v1/items/9");

        let env = client
            .parse_response(RawResponse::new(204, req.url.as_str(), ""))
            .unwrap();
        assert_eq!(env.status, 204);

        let err = client.send_request(&req).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Application);
    }

    #[test]
    fn invalid_default_headers_fail_build() {
        let mut cfg = config();
        cfg.default_headers = HeaderSet::new().with("a b", "c");
        assert_eq!(Client::new(cfg).unwrap_err().kind(), ErrorKind::InvalidHeader);
    }

    #[test]
    fn status_message_overrides_from_config() {
        let mut cfg = config();
        cfg.status_messages.insert(503, "maintenance".to_string());
        let client = Client::new(cfg).unwrap();
        let err = client
            .parse_response(RawResponse::new(503, "https://api.example.com/x", ""))
            .unwrap_err();
        assert_eq!(err.message(), "maintenance");
    }
}
