//! AWS translation backend behind the service-account gateway. Text is a
//! single call; documents start a remote job, poll it to a terminal state,
//! then fetch the output.
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

pub struct AwsProvider {
    http: Client,
    endpoint: String,
    api_key: String,
    region: Option<String>,
    poll: PollPolicy,
}

impl fmt::Debug for AwsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsProvider")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TranslateTextResp {
    #[serde(rename = "TranslatedText")]
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct StartJobResp {
    #[serde(rename = "JobId")]
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct DescribeJobResp {
    #[serde(rename = "JobStatus")]
    job_status: String,
}

#[derive(Debug, Deserialize)]
struct JobOutputResp {
    #[serde(rename = "Content")]
    content: String,
}

impl AwsProvider {
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
        let base = Url::parse(&self.endpoint).context("invalid AWS endpoint URL")?;
        Ok(base.join(path).context("invalid AWS endpoint path")?)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.bearer_auth(&self.api_key);
        match &self.region {
            Some(region) => req.header("X-Amz-Region", region),
            None => req,
        }
    }

    async fn start_document_job(
        &self,
        source: &[u8],
        target_language: &str,
    ) -> Result<String, ProviderError> {
        let url = self.url("start-document-translation-job")?;
        let res = self
            .authorize(self.http.post(url))
            .json(&json!({
                "Content": BASE64.encode(source),
                "TargetLanguageCode": target_language,
            }))
            .send()
            .await
            .context("failed to start AWS translation job")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("aws job start error {status}: {body}").into());
        }

        let payload: StartJobResp = res.json().await.context("invalid AWS job start response")?;
        debug!(job_id = %payload.job_id, "aws translation job started");
        Ok(payload.job_id)
    }

    async fn check_job(&self, job_id: &str) -> Result<Option<()>, ProviderError> {
        let url = self.url("describe-document-translation-job")?;
        let res = self
            .authorize(self.http.post(url))
            .json(&json!({ "JobId": job_id }))
            .send()
            .await
            .context("failed to describe AWS translation job")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("aws job describe error {status}: {body}").into());
        }

        let payload: DescribeJobResp = res.json().await.context("invalid AWS describe response")?;
        debug!(job_id, status = %payload.job_status, "aws job status");
        match payload.job_status.as_str() {
            "COMPLETED" => Ok(Some(())),
            "FAILED" | "COMPLETED_WITH_ERROR" | "STOPPED" => {
                Err(anyhow!("aws translation job failed with status: {}", payload.job_status).into())
            }
            _ => Ok(None),
        }
    }

    async fn fetch_job_output(&self, job_id: &str) -> Result<Vec<u8>, ProviderError> {
        let url = self.url("get-document-translation-output")?;
        let res = self
            .authorize(self.http.post(url))
            .json(&json!({ "JobId": job_id }))
            .send()
            .await
            .context("failed to fetch AWS job output")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("aws output fetch error {status}: {body}").into());
        }

        let payload: JobOutputResp = res.json().await.context("invalid AWS output response")?;
        Ok(BASE64
            .decode(payload.content)
            .context("aws job output is not valid base64")?)
    }
}

#[async_trait]
impl TranslationProvider for AwsProvider {
    async fn translate_text(
        &self,
        source_text: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        ensure_text_args(source_text, target_language)?;

        let url = self.url("translate-text")?;
        let res = self
            .authorize(self.http.post(url))
            .json(&json!({
                "Text": source_text,
                "TargetLanguageCode": target_language,
            }))
            .send()
            .await
            .context("failed to reach AWS Translate")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("aws error {status}: {body}").into());
        }

        let payload: TranslateTextResp = res
            .json()
            .await
            .context("invalid AWS Translate response JSON")?;
        Ok(payload.translated_text)
    }

    async fn translate_document(
        &self,
        source: &[u8],
        target_language: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        ensure_document_args(source, target_language)?;

        let job_id = self.start_document_job(source, target_language).await?;
        poll_until_terminal(self.poll, || self.check_job(&job_id)).await?;
        self.fetch_job_output(&job_id).await
    }

    async fn shutdown(&self) {
        debug!("aws translation client released");
    }
}
