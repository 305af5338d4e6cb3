//! Remote collaborators — identity and campaign services, with the HTTP
//! client used in production and an in-memory implementation for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

use campaign_core::types::{
    Campaign, Checkpoint, CheckpointsResponse, Customer, Environment, IdentifyRequest,
};
use campaign_core::{SdkError, SdkResult};

use crate::config::{validate_base_url, SdkConfig};

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn identify(&self, access_key: &str, request: &IdentifyRequest) -> SdkResult<Customer>;
}

#[async_trait]
pub trait CampaignService: Send + Sync {
    async fn get_live_campaign(
        &self,
        access_key: &str,
        environment: Environment,
        customer_id: &str,
    ) -> SdkResult<Campaign>;

    async fn get_campaign_checkpoints(
        &self,
        access_key: &str,
        campaign_id: &str,
    ) -> SdkResult<Vec<Checkpoint>>;

    async fn ping(&self, access_key: &str, campaign_id: &str) -> SdkResult<()>;
}

/// REST client for the campaign API. Every request is authorized with the
/// public access key; failures are reported once and never retried.
pub struct HttpCampaignApi {
    http: Client,
    base_url: String,
}

impl HttpCampaignApi {
    pub fn new(base_url: &str, timeout: Duration) -> SdkResult<Self> {
        validate_base_url("api_base_url", base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SdkError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SdkConfig) -> SdkResult<Self> {
        Self::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, access_key: &str, context: &str) -> SdkResult<Response> {
        let response = request
            .header("Authorization", access_key)
            .send()
            .await
            .map_err(|e| SdkError::network(context, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SdkError::Network(format!(
                "{context}: HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        debug!(context, status = status.as_u16(), "campaign API call succeeded");
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(response: Response, context: &str) -> SdkResult<T> {
        response
            .json()
            .await
            .map_err(|e| SdkError::network(format!("{context}: invalid response body"), e))
    }
}

#[async_trait]
impl IdentityService for HttpCampaignApi {
    async fn identify(&self, access_key: &str, request: &IdentifyRequest) -> SdkResult<Customer> {
        let context = "failed to identify customer";
        let builder = self.http.post(self.url("/customers/identify")).json(request);
        let response = self.send(builder, access_key, context).await?;
        Self::json(response, context).await
    }
}

#[async_trait]
impl CampaignService for HttpCampaignApi {
    async fn get_live_campaign(
        &self,
        access_key: &str,
        environment: Environment,
        customer_id: &str,
    ) -> SdkResult<Campaign> {
        let context = "failed to fetch campaign";
        let builder = self
            .http
            .get(self.url("/campaigns/live"))
            .query(&[("environment", environment.as_str()), ("customerId", customer_id)]);
        let response = self.send(builder, access_key, context).await?;
        Self::json(response, context).await
    }

    async fn get_campaign_checkpoints(
        &self,
        access_key: &str,
        campaign_id: &str,
    ) -> SdkResult<Vec<Checkpoint>> {
        let context = "failed to fetch campaign checkpoints";
        let builder = self
            .http
            .get(self.url("/campaign-checkpoints"))
            .query(&[("campaignId", campaign_id)]);
        let response = self.send(builder, access_key, context).await?;
        let envelope: CheckpointsResponse = Self::json(response, context).await?;
        Ok(envelope.data)
    }

    async fn ping(&self, access_key: &str, campaign_id: &str) -> SdkResult<()> {
        let path = format!("/campaigns/{}/ping", urlencoding::encode(campaign_id));
        let builder = self.http.post(self.url(&path)).body(Vec::new());
        self.send(builder, access_key, "campaign ping failed").await?;
        Ok(())
    }
}

/// Remote call kinds, used by [`StaticCampaignApi`] for call logs and
/// failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCall {
    Identify,
    LiveCampaign,
    Checkpoints,
    Ping,
}

/// In-memory campaign API for tests and offline hosts.
pub struct StaticCampaignApi {
    customer_id: String,
    campaign: Mutex<Option<Campaign>>,
    checkpoints: Mutex<Vec<Checkpoint>>,
    failures: Mutex<HashSet<ApiCall>>,
    calls: Mutex<Vec<(ApiCall, String)>>,
    identify_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl StaticCampaignApi {
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            campaign: Mutex::new(None),
            checkpoints: Mutex::new(Vec::new()),
            failures: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            identify_gate: Mutex::new(None),
        }
    }

    pub fn with_campaign(self, campaign: Campaign) -> Self {
        *self.campaign.lock() = Some(campaign);
        self
    }

    pub fn with_checkpoints(self, checkpoints: Vec<Checkpoint>) -> Self {
        *self.checkpoints.lock() = checkpoints;
        self
    }

    /// Make every subsequent `call` fail with a network error.
    pub fn fail(&self, call: ApiCall) {
        self.failures.lock().insert(call);
    }

    pub fn recover(&self, call: ApiCall) {
        self.failures.lock().remove(&call);
    }

    /// Calls made so far, with the access key each one carried.
    pub fn calls(&self) -> Vec<(ApiCall, String)> {
        self.calls.lock().clone()
    }

    /// Block identify calls until [`release_identify`](Self::release_identify).
    pub fn hold_identify(&self) {
        *self.identify_gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let one held identify call proceed.
    pub fn release_identify(&self) {
        if let Some(gate) = self.identify_gate.lock().as_ref() {
            gate.add_permits(1);
        }
    }

    fn record(&self, call: ApiCall, access_key: &str) -> SdkResult<()> {
        self.calls.lock().push((call, access_key.to_string()));
        if self.failures.lock().contains(&call) {
            return Err(SdkError::Network(format!("{call:?} failed: HTTP 503")));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityService for StaticCampaignApi {
    async fn identify(&self, access_key: &str, request: &IdentifyRequest) -> SdkResult<Customer> {
        let gate = self.identify_gate.lock().clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| SdkError::Internal(anyhow::anyhow!(e)))?;
            permit.forget();
        }

        self.record(ApiCall::Identify, access_key)?;
        Ok(Customer {
            id: self.customer_id.clone(),
            external_user_id: request.external_user_id.clone(),
            email: request.email.clone(),
            name: request.name.clone(),
            custom_properties: request.custom_properties.clone(),
        })
    }
}

#[async_trait]
impl CampaignService for StaticCampaignApi {
    async fn get_live_campaign(
        &self,
        access_key: &str,
        environment: Environment,
        _customer_id: &str,
    ) -> SdkResult<Campaign> {
        self.record(ApiCall::LiveCampaign, access_key)?;
        self.campaign
            .lock()
            .clone()
            .filter(|c| c.environment == environment)
            .ok_or_else(|| SdkError::Network(format!("no live campaign for {environment}: HTTP 404")))
    }

    async fn get_campaign_checkpoints(
        &self,
        access_key: &str,
        campaign_id: &str,
    ) -> SdkResult<Vec<Checkpoint>> {
        self.record(ApiCall::Checkpoints, access_key)?;
        Ok(self
            .checkpoints
            .lock()
            .iter()
            .filter(|c| c.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn ping(&self, access_key: &str, _campaign_id: &str) -> SdkResult<()> {
        self.record(ApiCall::Ping, access_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn campaign(environment: Environment) -> Campaign {
        Campaign {
            id: "c1".into(),
            name: "Referral".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            environment,
            is_live: true,
            campaign_pages: Vec::new(),
        }
    }

    fn request() -> IdentifyRequest {
        IdentifyRequest {
            external_user_id: "user_1".into(),
            email: "a@b.com".into(),
            name: "A".into(),
            custom_properties: None,
        }
    }

    #[test]
    fn test_http_api_rejects_bad_base_url() {
        assert!(HttpCampaignApi::new("::not a url", Duration::from_secs(5)).is_err());
        let api = HttpCampaignApi::new("https://api.example.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(api.url("/campaigns/live"), "https://api.example.com/campaigns/live");
    }

    #[tokio::test]
    async fn test_static_api_identify_echoes_request() {
        let api = StaticCampaignApi::new("cust_1");
        let customer = api.identify("pk_test", &request()).await.unwrap();
        assert_eq!(customer.id, "cust_1");
        assert_eq!(customer.email, "a@b.com");
        assert_eq!(api.calls(), vec![(ApiCall::Identify, "pk_test".to_string())]);
    }

    #[tokio::test]
    async fn test_static_api_filters_by_environment() {
        let api = StaticCampaignApi::new("cust_1").with_campaign(campaign(Environment::Production));
        assert!(api.get_live_campaign("k", Environment::Test, "cust_1").await.is_err());
        assert_eq!(
            api.get_live_campaign("k", Environment::Production, "cust_1").await.unwrap().id,
            "c1"
        );
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let api = StaticCampaignApi::new("cust_1");
        api.fail(ApiCall::Ping);
        assert!(matches!(api.ping("k", "c1").await, Err(SdkError::Network(_))));
        api.recover(ApiCall::Ping);
        assert!(api.ping("k", "c1").await.is_ok());
    }
}
