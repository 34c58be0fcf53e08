use std::error::Error;
use std::sync::OnceLock;
use std::time::Instant;

use eyre::Context;
use http::header::CONTENT_TYPE;
use http::{Method, Request};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;

/// Posts a JSON payload to a webhook URL.
///
/// An empty response means the payload was accepted, anything else is a
/// description of what went wrong.
pub trait WebhookTransport: Send + Sync {
    fn post(&self, url: &str, payload: &Value) -> String;
}

type HttpsClient = Client<HttpsConnector<HttpConnector>, String>;

/// [`WebhookTransport`] backed by a hyper client.
///
/// The client and the current-thread runtime driving it are created on the
/// first post. There are no retries and no timeouts.
#[derive(Default)]
pub struct HyperTransport {
    inner: OnceLock<Result<Inner, String>>,
}

struct Inner {
    runtime: Option<tokio::runtime::Runtime>,
    client: HttpsClient,
}

impl Inner {
    fn build() -> eyre::Result<Self> {
        let now = Instant::now();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed building webhook runtime")?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .context("Failed loading native root certificates")?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();

        let client = Client::builder(TokioExecutor::new()).build(connector);
        tracing::debug!(target: "lumber", "webhook client created in {:?}", now.elapsed());

        Ok(Self {
            runtime: Some(runtime),
            client,
        })
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Plain drop panics when the last logger goes away inside an async context.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl HyperTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> Result<&Inner, String> {
        self.inner
            .get_or_init(|| Inner::build().map_err(|e| format!("{:#}", e)))
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl WebhookTransport for HyperTransport {
    fn post(&self, url: &str, payload: &Value) -> String {
        let inner = match self.inner() {
            Ok(inner) => inner,
            Err(reason) => return reason,
        };
        let Some(runtime) = inner.runtime.as_ref() else {
            return "webhook runtime is shut down".to_string();
        };

        let request = send(&inner.client, url, payload.to_string());

        // `block_on` must not run on a thread that is already driving a runtime.
        let result = if tokio::runtime::Handle::try_current().is_ok() {
            std::thread::scope(|scope| {
                scope
                    .spawn(|| runtime.block_on(request))
                    .join()
                    .unwrap_or_else(|_| Err("webhook request panicked".to_string()))
            })
        } else {
            runtime.block_on(request)
        };

        match result {
            Ok(()) => String::new(),
            Err(reason) => reason,
        }
    }
}

async fn send(client: &HttpsClient, url: &str, body: String) -> Result<(), String> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .map_err(|e| format!("invalid webhook request: {}", e))?;

    let response = client
        .request(request)
        .await
        .map_err(|e| error_chain(&e))?;

    let status = response.status();
    tracing::debug!(target: "lumber", "webhook responded with {}", status);

    if status.is_success() {
        Ok(())
    } else {
        Err(format!("webhook responded with status {}", status))
    }
}

/// Joins an error and all of its sources, hyper's top-level errors alone say very little.
fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut next = err.source();
    while let Some(source) = next {
        message.push_str(": ");
        message.push_str(&source.to_string());
        next = source.source();
    }
    message
}
