use crate::config::Vsphere;
use crate::datasource::wire::{self, RetrieveResult, ServiceContent};
use crate::domain::{ManagedObjectRef, ObjectContent, TelemetrySource};
use crate::error::RemoteQueryError;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::RwLock;
use std::time::Duration;

const SESSION_HEADER: &str = "vmware-api-session-id";

/// Session against the vSphere VI/JSON API (`/sdk/vim25/<release>`).
pub struct VsphereClient {
    http: Client,
    base: Url,
    host: String,
    content: ServiceContent,
    session: RwLock<Option<String>>,
}

impl VsphereClient {
    /// Fetches the service content and signs in.
    pub async fn login(config: &Vsphere) -> Result<Self, RemoteQueryError> {
        let base = base_url(&config.host, &config.api_release)?;
        let host = base.host_str().unwrap_or(&config.host).to_owned();

        let http = Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_millis(config.request_timeout))
            .build()?;

        let url = join(&base, &["ServiceInstance", "ServiceInstance", "content"])?;
        let content: ServiceContent = decode(check(http.get(url).send().await?).await?).await?;

        let url = join(&base, &["SessionManager", &content.session_manager.value, "Login"])?;
        let response = http
            .post(url)
            .json(&json!({
                "userName": config.username,
                "password": config.password,
            }))
            .send()
            .await?;

        let response = check(response).await?;
        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or(RemoteQueryError::MissingSession)?;

        tracing::info!(%host, user = %config.username, "Signed in to vSphere");

        Ok(Self {
            http,
            base,
            host,
            content,
            session: RwLock::new(Some(session)),
        })
    }

    pub async fn logout(&self) -> Result<(), RemoteQueryError> {
        let path = [
            "SessionManager",
            self.content.session_manager.value.as_str(),
            "Logout",
        ];
        self.invoke(&path, None).await?;

        self.session
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        tracing::info!(host = %self.host, "Signed out of vSphere");
        Ok(())
    }

    fn session(&self) -> Result<String, RemoteQueryError> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(RemoteQueryError::MissingSession)
    }

    /// Calls a managed-object method and returns its JSON result, `Null` for
    /// methods without one.
    async fn invoke(&self, path: &[&str], body: Option<Value>) -> Result<Value, RemoteQueryError> {
        let url = join(&self.base, path)?;
        let mut request: RequestBuilder = self
            .http
            .post(url)
            .header(SESSION_HEADER, self.session()?);

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = check(request.send().await?).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| RemoteQueryError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl TelemetrySource for VsphereClient {
    fn endpoint(&self) -> &str {
        &self.host
    }

    async fn create_container_view(
        &self,
        kinds: &[&str],
    ) -> Result<ManagedObjectRef, RemoteQueryError> {
        let path = [
            "ViewManager",
            self.content.view_manager.value.as_str(),
            "CreateContainerView",
        ];
        let body = json!({
            "container": wire::moref(&self.content.root_folder),
            "type": kinds,
            "recursive": true,
        });

        let view = self.invoke(&path, Some(body)).await?;
        serde_json::from_value(view).map_err(|e| RemoteQueryError::Decode(e.to_string()))
    }

    async fn destroy_view(&self, view: &ManagedObjectRef) -> Result<(), RemoteQueryError> {
        self.invoke(&[view.kind.as_str(), view.value.as_str(), "DestroyView"], None)
            .await?;
        Ok(())
    }

    async fn retrieve_properties(
        &self,
        view: &ManagedObjectRef,
        kind: &str,
        paths: &[String],
    ) -> Result<Vec<ObjectContent>, RemoteQueryError> {
        let collector = self.content.property_collector.value.as_str();

        let spec = wire::property_filter_spec(view, kind, paths);
        let mut page = self
            .invoke(&["PropertyCollector", collector, "RetrievePropertiesEx"], Some(spec))
            .await?;

        let mut objects = Vec::new();
        loop {
            let result: RetrieveResult = if page.is_null() {
                RetrieveResult::default()
            } else {
                serde_json::from_value(page).map_err(|e| RemoteQueryError::Decode(e.to_string()))?
            };

            objects.extend(result.objects.into_iter().map(ObjectContent::from));

            let Some(token) = result.token else {
                break;
            };

            page = self
                .invoke(
                    &["PropertyCollector", collector, "ContinueRetrievePropertiesEx"],
                    Some(json!({ "token": token })),
                )
                .await?;
        }

        tracing::trace!(kind, objects = objects.len(), "Retrieved properties");
        Ok(objects)
    }
}

fn base_url(host: &str, release: &str) -> Result<Url, RemoteQueryError> {
    let endpoint = if host.contains("://") {
        host.to_owned()
    } else {
        format!("https://{}", host)
    };

    let mut url =
        Url::parse(&endpoint).map_err(|e| RemoteQueryError::Decode(format!("{}: {}", host, e)))?;
    url.set_path("");
    url.set_query(None);

    join(&url, &["sdk", "vim25", release])
}

fn join(base: &Url, segments: &[&str]) -> Result<Url, RemoteQueryError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RemoteQueryError::Decode(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn check(response: Response) -> Result<Response, RemoteQueryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteQueryError::Api {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteQueryError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| RemoteQueryError::Decode(e.to_string()))
}
