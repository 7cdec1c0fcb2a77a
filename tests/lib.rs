// Shared fixtures for the behaviour suites: a scripted transport and config helpers

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use ai_balance_core::{
    parse_config_str, ConfigDocument, EnvSnapshot, FetchOptions, HttpClient, HttpError,
    HttpRequest, HttpResponse, Lang, MetricFetcher, PlatformFetcher,
};
use serde_json::Value;

/// Scripted transport: answers by URL prefix and records every request.
pub struct RecordingHttpClient {
    routes: Vec<(String, Result<HttpResponse, HttpError>)>,
    fallback: Result<HttpResponse, HttpError>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingHttpClient {
    pub fn responding(data: Value) -> Self {
        Self {
            routes: Vec::new(),
            fallback: Ok(HttpResponse::ok_json(data)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: HttpError) -> Self {
        Self {
            routes: Vec::new(),
            fallback: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_route(
        mut self,
        url_prefix: impl Into<String>,
        response: Result<HttpResponse, HttpError>,
    ) -> Self {
        self.routes.push((url_prefix.into(), response));
        self
    }

    pub fn recorded_requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.recorded_requests().len()
    }
}

impl HttpClient for RecordingHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = self
            .routes
            .iter()
            .find(|(prefix, _)| request.url.starts_with(prefix.as_str()))
            .map_or_else(|| self.fallback.clone(), |(_, response)| response.clone());
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .push(request);
        Box::pin(async move { response })
    }
}

pub fn document(text: &str) -> ConfigDocument {
    document_with_env(text, &EnvSnapshot::empty())
}

pub fn document_with_env(text: &str, env: &EnvSnapshot) -> ConfigDocument {
    parse_config_str(text, "test.json", env).expect("test config should be valid")
}

pub fn english() -> FetchOptions {
    FetchOptions::default().with_lang(Lang::En)
}

pub fn platform_fetcher(client: &Arc<RecordingHttpClient>, options: FetchOptions) -> PlatformFetcher {
    PlatformFetcher::new(client.clone(), options)
}

pub fn metric_fetcher(client: &Arc<RecordingHttpClient>, options: FetchOptions) -> MetricFetcher {
    MetricFetcher::new(client.clone(), options)
}
