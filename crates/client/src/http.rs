//! The single chokepoint for outbound calls.
//!
//! Credential and branch header are derived from storage on every request and
//! never captured ahead of time.
use std::sync::Arc;

use api_types::envelope::Envelope;
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::{
    branch::{BRANCH_HEADER, effective_branch},
    config::ClientConfig,
    error::{ClientError, Result},
    session::{AuthStatus, SessionStorage, SignOutReason},
};

/// Query parameters of a request.
pub type Params = Vec<(String, String)>;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
    storage: Arc<dyn SessionStorage>,
    auth: Arc<watch::Sender<AuthStatus>>,
}

impl Client {
    pub fn new(config: &ClientConfig, storage: Arc<dyn SessionStorage>) -> Result<Self> {
        let mut raw = config.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw)
            .map_err(|err| ClientError::Config(format!("invalid base_url: {err}")))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| ClientError::Config(format!("failed to build http client: {err}")))?;

        let (auth, _) = watch::channel(AuthStatus::Unknown);

        Ok(Self {
            base_url,
            http,
            storage,
            auth: Arc::new(auth),
        })
    }

    pub fn storage(&self) -> &dyn SessionStorage {
        self.storage.as_ref()
    }

    pub fn auth_status(&self) -> AuthStatus {
        *self.auth.borrow()
    }

    /// Receiver notified on every sign-in and sign-out.
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.auth.subscribe()
    }

    pub(crate) fn set_auth_status(&self, status: AuthStatus) {
        self.auth.send_replace(status);
    }

    /// Clears every persisted key and signals that the login entry point must
    /// be shown.
    pub(crate) fn teardown(&self, reason: SignOutReason) {
        if let Err(err) = self.storage.clear() {
            tracing::error!("failed to clear persisted session: {err}");
        }
        self.set_auth_status(AuthStatus::SignedOut(reason));
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ClientError::Config(format!("invalid path {path}: {err}")))
    }

    /// `path` followed by `value` as exactly one escaped path segment.
    fn value_url(&self, path: &str, value: &str) -> Result<Url> {
        let mut url = self.url(path)?;
        url.path_segments_mut()
            .map_err(|()| ClientError::Config(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .push(value);
        Ok(url)
    }

    /// Sends one request and returns the decoded envelope of a 2xx answer.
    ///
    /// No retries. A 401 tears the session down before returning
    /// [`ClientError::Unauthorized`].
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        params: &[(String, String)],
    ) -> Result<Envelope<Value>> {
        let endpoint = self.url(path)?;
        self.send(method, endpoint, body, params).await
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: Url,
        body: Option<&B>,
        params: &[(String, String)],
    ) -> Result<Envelope<Value>> {
        let path = endpoint.path().to_string();
        let session = self.storage.load()?;
        let branch = effective_branch(&session);

        let mut req = self.http.request(method.clone(), endpoint);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(token) = session.token.as_deref() {
            req = req.bearer_auth(token);
        }
        if let Some(branch) = branch {
            req = req.header(BRANCH_HEADER, branch.to_string());
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        tracing::debug!("{method} {path} branch={branch:?}");
        let res = req.send().await?;
        let status = res.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("{method} {path} answered 401, tearing down session");
            self.teardown(SignOutReason::Unauthorized);
            return Err(ClientError::Unauthorized);
        }

        if status.is_success() {
            let bytes = res.bytes().await?;
            if bytes.is_empty() {
                return Ok(Envelope {
                    success: true,
                    message: None,
                    data: None,
                });
            }
            return serde_json::from_slice::<Envelope<Value>>(&bytes)
                .map_err(|err| ClientError::UnexpectedShape(format!("envelope: {err}")));
        }

        let message = res
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message.or(body.error));
        tracing::debug!("{method} {path} failed with {status}");
        Err(ClientError::server(Some(status), message))
    }

    pub async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Envelope<Value>> {
        self.request::<()>(Method::GET, path, None, params).await
    }

    /// GET `<path>/<value>` where `value` is user input, such as a product
    /// code. Slashes, `?` and `#` in `value` are escaped, never interpreted.
    pub async fn get_value(&self, path: &str, value: &str) -> Result<Envelope<Value>> {
        let endpoint = self.value_url(path, value)?;
        self.send::<()>(Method::GET, endpoint, None, &[]).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<Value>> {
        self.request(Method::POST, path, Some(body), &[]).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<Value>> {
        self.request(Method::PUT, path, Some(body), &[]).await
    }

    pub async fn delete(&self, path: &str) -> Result<Envelope<Value>> {
        self.request::<()>(Method::DELETE, path, None, &[]).await
    }
}
