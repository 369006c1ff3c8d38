// Cloud REST APIs (identity, core compute/block storage, telemetry) via reqwest,
// with signed requests, opc-next-page pagination and retry on 429/5xx.

pub mod credentials;
pub mod principal;
pub mod signer;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::cloud::{
    BlockStorageApi, CloudApi, ComputeApi, IdentityApi, ImageResolver, MetricRequest,
    MonitoringApi,
};
use crate::config::ApiConfig;
use crate::models::{
    AvailabilityDomain, BootVolumeAttachment, CompartmentRecord, Datapoint, Image, Instance,
    NamedResource, RegionSubscription, SummarizedMetric, Tenancy, Volume, VolumeAttachment,
};
use crate::version;
use credentials::Credentials;
use signer::SignableRequest;

const IDENTITY_API: &str = "20160918";
const CORE_API: &str = "20160918";
const TELEMETRY_API: &str = "20180401";
const NEXT_PAGE_HEADER: &str = "opc-next-page";
const REQUEST_ID_HEADER: &str = "opc-request-id";
const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_MAX_MS: u64 = 30_000;

/// Non-success response from a cloud API.
#[derive(Debug, thiserror::Error)]
#[error("{method} {path} failed with {status}: {code}: {message} (opc-request-id: {request_id})")]
pub struct ApiError {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub code: String,
    pub message: String,
    pub request_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Copy)]
enum Service {
    Identity,
    Core,
    Telemetry,
}

impl Service {
    fn base_url(self, region: &str) -> String {
        match self {
            Service::Identity => {
                format!("https://identity.{}.oraclecloud.com/{}", region, IDENTITY_API)
            }
            Service::Core => format!("https://iaas.{}.oraclecloud.com/{}", region, CORE_API),
            Service::Telemetry => {
                format!("https://telemetry.{}.oraclecloud.com/{}", region, TELEMETRY_API)
            }
        }
    }
}

/// RFC 7231 date for the `date` header.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn build_http_client(api: &ApiConfig) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(api.timeout_secs))
        .user_agent(version::user_agent())
        .build()?)
}

#[derive(Debug, Clone)]
pub struct OciRepo {
    http: reqwest::Client,
    credentials: Credentials,
    region: String,
    max_attempts: u32,
}

impl OciRepo {
    pub fn new(
        http: reqwest::Client,
        credentials: Credentials,
        region: &str,
        api: &ApiConfig,
    ) -> Self {
        Self {
            http,
            credentials,
            region: region.to_string(),
            max_attempts: api.max_attempts,
        }
    }

    fn url(&self, service: Service, path: &str, query: &[(&str, &str)]) -> anyhow::Result<Url> {
        let base = format!("{}{}", service.base_url(&self.region), path);
        Ok(if query.is_empty() {
            Url::parse(&base)?
        } else {
            Url::parse_with_params(&base, query)?
        })
    }

    /// Signs and sends one request, retrying transport errors, 429 and 5xx with
    /// exponential backoff. Any other non-success status becomes an `ApiError`.
    async fn execute(
        &self,
        method: Method,
        url: &Url,
        body: Option<Vec<u8>>,
    ) -> anyhow::Result<reqwest::Response> {
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("url without host: {}", url))?;
        let path_and_query = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let signer = self.credentials.signer().await?;
            let date = http_date(Utc::now());
            let headers = signer.sign(&SignableRequest {
                method: method.as_str(),
                host,
                path_and_query: &path_and_query,
                date: &date,
                body: body.as_deref(),
            });

            let mut request = self.http.request(method.clone(), url.clone());
            for (name, value) in headers {
                request = request.header(name, value);
            }
            if let Some(body) = &body {
                request = request.body(body.clone());
            }

            let retryable = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable(status) || attempt >= self.max_attempts {
                        return Err(api_error(&method, &path_and_query, response).await.into());
                    }
                    format!("status {}", status)
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        return Err(anyhow::Error::new(e)
                            .context(format!("{} {}", method, path_and_query)));
                    }
                    e.to_string()
                }
            };

            let delay = backoff(attempt);
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                reason = %retryable,
                path = %path_and_query,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> anyhow::Result<T> {
        let response = self.execute(Method::GET, &url, None).await?;
        Ok(response.json().await?)
    }

    /// Follows `opc-next-page` until the listing is exhausted.
    async fn list_all<T: DeserializeOwned>(&self, url: Url) -> anyhow::Result<Vec<T>> {
        let mut out = Vec::new();
        let mut page: Option<String> = None;
        loop {
            let mut page_url = url.clone();
            if let Some(token) = &page {
                page_url.query_pairs_mut().append_pair("page", token);
            }
            let response = self.execute(Method::GET, &page_url, None).await?;
            let next = response
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let items: Vec<T> = response.json().await?;
            out.extend(items);
            match next {
                Some(token) if !token.is_empty() => page = Some(token),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn get_image_here(&self, image_id: &str) -> anyhow::Result<Image> {
        self.get(self.url(Service::Core, &format!("/images/{}", image_id), &[])?)
            .await
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff(attempt: u32) -> Duration {
    let ms = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    Duration::from_millis(ms.min(BACKOFF_MAX_MS))
}

async fn api_error(method: &Method, path: &str, response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body: ErrorBody = response.json().await.unwrap_or_default();
    ApiError {
        method: method.to_string(),
        path: path.to_string(),
        status,
        code: body.code,
        message: body.message,
        request_id,
    }
}

#[async_trait]
impl IdentityApi for OciRepo {
    #[instrument(skip(self), fields(repo = "oci", operation = "get_tenancy"))]
    async fn get_tenancy(&self, tenancy_id: &str) -> anyhow::Result<Tenancy> {
        self.get(self.url(Service::Identity, &format!("/tenancies/{}", tenancy_id), &[])?)
            .await
    }

    #[instrument(skip(self), fields(repo = "oci", operation = "list_region_subscriptions"))]
    async fn list_region_subscriptions(
        &self,
        tenancy_id: &str,
    ) -> anyhow::Result<Vec<RegionSubscription>> {
        let path = format!("/tenancies/{}/regionSubscriptions", tenancy_id);
        self.get(self.url(Service::Identity, &path, &[])?).await
    }

    #[instrument(skip(self), fields(repo = "oci", operation = "get_compartment"))]
    async fn get_compartment(&self, compartment_id: &str) -> anyhow::Result<CompartmentRecord> {
        let path = format!("/compartments/{}", compartment_id);
        self.get(self.url(Service::Identity, &path, &[])?).await
    }

    #[instrument(skip(self), fields(repo = "oci", operation = "list_compartments"))]
    async fn list_compartments(&self, parent_id: &str) -> anyhow::Result<Vec<CompartmentRecord>> {
        let url = self.url(Service::Identity, "/compartments", &[("compartmentId", parent_id)])?;
        self.list_all(url).await
    }

    #[instrument(skip(self), fields(repo = "oci", operation = "list_availability_domains"))]
    async fn list_availability_domains(
        &self,
        compartment_id: &str,
    ) -> anyhow::Result<Vec<AvailabilityDomain>> {
        let url = self.url(
            Service::Identity,
            "/availabilityDomains",
            &[("compartmentId", compartment_id)],
        )?;
        self.get(url).await
    }
}

#[async_trait]
impl ComputeApi for OciRepo {
    #[instrument(skip(self), fields(repo = "oci", operation = "list_instances"))]
    async fn list_instances(&self, compartment_id: &str) -> anyhow::Result<Vec<Instance>> {
        let url = self.url(Service::Core, "/instances", &[("compartmentId", compartment_id)])?;
        self.list_all(url).await
    }

    #[instrument(skip(self), fields(repo = "oci", operation = "list_boot_volume_attachments"))]
    async fn list_boot_volume_attachments(
        &self,
        availability_domain: &str,
        compartment_id: &str,
    ) -> anyhow::Result<Vec<BootVolumeAttachment>> {
        let url = self.url(
            Service::Core,
            "/bootVolumeAttachments",
            &[
                ("availabilityDomain", availability_domain),
                ("compartmentId", compartment_id),
            ],
        )?;
        self.list_all(url).await
    }

    #[instrument(skip(self), fields(repo = "oci", operation = "list_volume_attachments"))]
    async fn list_volume_attachments(
        &self,
        availability_domain: &str,
        compartment_id: &str,
    ) -> anyhow::Result<Vec<VolumeAttachment>> {
        let url = self.url(
            Service::Core,
            "/volumeAttachments",
            &[
                ("availabilityDomain", availability_domain),
                ("compartmentId", compartment_id),
            ],
        )?;
        self.list_all(url).await
    }

    #[instrument(skip(self), fields(repo = "oci", operation = "get_capacity_reservation"))]
    async fn get_capacity_reservation(&self, id: &str) -> anyhow::Result<NamedResource> {
        let path = format!("/computeCapacityReservations/{}", id);
        self.get(self.url(Service::Core, &path, &[])?).await
    }

    #[instrument(skip(self), fields(repo = "oci", operation = "get_dedicated_vm_host"))]
    async fn get_dedicated_vm_host(&self, id: &str) -> anyhow::Result<NamedResource> {
        let path = format!("/dedicatedVmHosts/{}", id);
        self.get(self.url(Service::Core, &path, &[])?).await
    }
}

#[async_trait]
impl BlockStorageApi for OciRepo {
    #[instrument(skip(self), fields(repo = "oci", operation = "get_boot_volume"))]
    async fn get_boot_volume(&self, id: &str) -> anyhow::Result<Volume> {
        let path = format!("/bootVolumes/{}", id);
        self.get(self.url(Service::Core, &path, &[])?).await
    }

    #[instrument(skip(self), fields(repo = "oci", operation = "get_volume"))]
    async fn get_volume(&self, id: &str) -> anyhow::Result<Volume> {
        let path = format!("/volumes/{}", id);
        self.get(self.url(Service::Core, &path, &[])?).await
    }
}

#[async_trait]
impl ImageResolver for OciRepo {
    #[instrument(skip(self), fields(repo = "oci", operation = "get_image"))]
    async fn get_image(&self, image_id: &str, region: Option<&str>) -> anyhow::Result<Image> {
        match region {
            Some(r) if r != self.region => {
                debug!(origin_region = %r, "image lookup in origin region");
                self.with_region(r).get_image_here(image_id).await
            }
            _ => self.get_image_here(image_id).await,
        }
    }
}

#[async_trait]
impl MonitoringApi for OciRepo {
    #[instrument(skip(self, request), fields(repo = "oci", operation = "summarize_metrics_data", query = %request.query))]
    async fn summarize_metrics_data(
        &self,
        compartment_id: &str,
        request: &MetricRequest,
    ) -> anyhow::Result<Vec<Datapoint>> {
        let url = self.url(
            Service::Telemetry,
            "/metrics/actions/summarizeMetricsData",
            &[("compartmentId", compartment_id)],
        )?;
        let body = serde_json::to_vec(&serde_json::json!({
            "namespace": request.namespace,
            "query": request.query,
            "startTime": request.start_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            "endTime": request.end_time.to_rfc3339_opts(SecondsFormat::Millis, true),
        }))?;
        let response = self.execute(Method::POST, &url, Some(body)).await?;
        let streams: Vec<SummarizedMetric> = response.json().await?;
        Ok(streams
            .into_iter()
            .next()
            .map(|s| s.aggregated_datapoints)
            .unwrap_or_default())
    }
}

impl CloudApi for OciRepo {
    fn region(&self) -> &str {
        &self.region
    }

    fn with_region(&self, region: &str) -> Self {
        Self {
            region: region.to_string(),
            ..self.clone()
        }
    }
}
