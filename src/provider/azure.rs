//! Azure translation backend. Text uses the v3 translate endpoint;
//! documents run as remote batch jobs: submit, poll until a terminal
//! status, then download the result.
use super::{
    ensure_document_args, ensure_text_args, poll_until_terminal, PollPolicy, ProviderError,
    TranslationProvider,
};
use crate::config::ProviderSettings;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AzureProvider {
    http: Client,
    endpoint: String,
    api_key: String,
    region: Option<String>,
    poll: PollPolicy,
}

impl fmt::Debug for AzureProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureProvider")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TextResp {
    translations: Vec<TextTranslation>,
}

#[derive(Debug, Deserialize)]
struct TextTranslation {
    text: String,
}

#[derive(Debug, Deserialize)]
struct SubmitJobResp {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatusResp {
    status: String,
}

#[derive(Debug, Deserialize)]
struct JobResultResp {
    content: String,
}

impl AzureProvider {
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        let http = Client::builder()
            .user_agent("lingo-batch/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            http,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            region: settings.region.clone(),
            poll: PollPolicy::from(settings),
        }
    }

    fn url(&self, path: &str) -> Result<Url, ProviderError> {
        let base = Url::parse(&self.endpoint).context("invalid Azure endpoint URL")?;
        Ok(base.join(path).context("invalid Azure endpoint path")?)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header("Ocp-Apim-Subscription-Key", &self.api_key);
        match &self.region {
            Some(region) => req.header("Ocp-Apim-Subscription-Region", region),
            None => req,
        }
    }

    async fn submit_document_job(
        &self,
        source: &[u8],
        target_language: &str,
    ) -> Result<String, ProviderError> {
        let url = self.url("translator/document/batches")?;
        let res = self
            .authorize(self.http.post(url))
            .json(&json!({
                "targetLanguage": target_language,
                "content": BASE64.encode(source),
            }))
            .send()
            .await
            .context("failed to submit Azure document job")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("azure job submission error {status}: {body}").into());
        }

        let payload: SubmitJobResp = res
            .json()
            .await
            .context("invalid Azure job submission response")?;
        debug!(job_id = %payload.id, "azure document job submitted");
        Ok(payload.id)
    }

    /// One status probe. `Ok(None)` while the job is still running; a
    /// `Failed`/`ValidationFailed` status is a hard vendor failure.
    async fn check_job(&self, job_id: &str) -> Result<Option<()>, ProviderError> {
        let url = self.url(&format!("translator/document/batches/{job_id}"))?;
        let res = self
            .authorize(self.http.get(url))
            .send()
            .await
            .context("failed to check Azure job status")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("azure status check error {status}: {body}").into());
        }

        let payload: JobStatusResp = res.json().await.context("invalid Azure status response")?;
        debug!(job_id, status = %payload.status, "azure job status");
        match payload.status.as_str() {
            s if s.eq_ignore_ascii_case("Succeeded") => Ok(Some(())),
            s if s.eq_ignore_ascii_case("Failed") || s.eq_ignore_ascii_case("ValidationFailed") => {
                Err(anyhow!("azure translation job failed with status: {s}").into())
            }
            _ => Ok(None),
        }
    }

    async fn download_result(&self, job_id: &str) -> Result<Vec<u8>, ProviderError> {
        let url = self.url(&format!("translator/document/batches/{job_id}/result"))?;
        let res = self
            .authorize(self.http.get(url))
            .send()
            .await
            .context("failed to download Azure job result")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("azure result download error {status}: {body}").into());
        }

        let payload: JobResultResp = res.json().await.context("invalid Azure result response")?;
        Ok(BASE64
            .decode(payload.content)
            .context("azure job result is not valid base64")?)
    }
}

#[async_trait]
impl TranslationProvider for AzureProvider {
    async fn translate_text(
        &self,
        source_text: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        ensure_text_args(source_text, target_language)?;

        let url = self.url("translate")?;
        let res = self
            .authorize(self.http.post(url))
            .query(&[("api-version", "3.0"), ("to", target_language)])
            .json(&json!([{ "Text": source_text }]))
            .send()
            .await
            .context("failed to reach Azure Translator")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("azure error {status}: {body}").into());
        }

        let payload: Vec<TextResp> = res
            .json()
            .await
            .context("invalid Azure Translator response JSON")?;
        payload
            .into_iter()
            .next()
            .and_then(|r| r.translations.into_iter().next())
            .map(|t| t.text)
            .ok_or_else(|| anyhow!("azure response contained no translations").into())
    }

    async fn translate_document(
        &self,
        source: &[u8],
        target_language: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        ensure_document_args(source, target_language)?;

        let job_id = self.submit_document_job(source, target_language).await?;
        poll_until_terminal(self.poll, || self.check_job(&job_id)).await?;
        self.download_result(&job_id).await
    }

    async fn shutdown(&self) {
        debug!("azure translation client released");
    }
}
