//! Google translation backend. Text goes through the v2 REST endpoint;
//! documents use the synchronous document-translation call with inline
//! base64 payloads, so the poll budget caps the single request instead of
//! a polling loop.
use super::{ensure_document_args, ensure_text_args, ProviderError, TranslationProvider};
use crate::config::ProviderSettings;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::debug;

const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);

pub struct GoogleProvider {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TranslateTextResp {
    data: TranslateTextData,
}

#[derive(Debug, Deserialize)]
struct TranslateTextData {
    translations: Vec<TextTranslation>,
}

#[derive(Debug, Deserialize)]
struct TextTranslation {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct TranslateDocumentResp {
    #[serde(rename = "documentTranslation")]
    document_translation: DocumentTranslation,
}

#[derive(Debug, Deserialize)]
struct DocumentTranslation {
    #[serde(rename = "byteStreamOutputs")]
    byte_stream_outputs: Vec<String>,
}

impl GoogleProvider {
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        // The document call is a single synchronous request, so the whole
        // poll budget caps the request instead of a polling loop. The
        // product can overflow for extreme config values; cap it.
        let request_timeout = settings
            .poll_interval()
            .checked_mul(settings.max_poll_attempts)
            .unwrap_or(MAX_REQUEST_TIMEOUT)
            .min(MAX_REQUEST_TIMEOUT);
        let http = Client::builder()
            .user_agent("lingo-batch/0.1")
            .timeout(request_timeout)
            .build()
            .expect("reqwest client");
        Self {
            http,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> Result<Url, ProviderError> {
        let base = Url::parse(&self.endpoint).context("invalid Google endpoint URL")?;
        Ok(base.join(path).context("invalid Google endpoint path")?)
    }
}

#[async_trait]
impl TranslationProvider for GoogleProvider {
    async fn translate_text(
        &self,
        source_text: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        ensure_text_args(source_text, target_language)?;

        let url = self.url("language/translate/v2")?;
        let res = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "q": source_text,
                "target": target_language,
                "format": "text",
            }))
            .send()
            .await
            .context("failed to reach Google Translate")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("google error {status}: {body}").into());
        }

        let payload: TranslateTextResp = res
            .json()
            .await
            .context("invalid Google Translate response JSON")?;
        payload
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| anyhow!("google response contained no translations").into())
    }

    async fn translate_document(
        &self,
        source: &[u8],
        target_language: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        ensure_document_args(source, target_language)?;

        let url = self.url("v3/documents:translate")?;
        let res = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "document": { "content": BASE64.encode(source) },
                "targetLanguageCode": target_language,
            }))
            .send()
            .await
            .context("failed to reach Google document translation")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("google document error {status}: {body}").into());
        }

        let payload: TranslateDocumentResp = res
            .json()
            .await
            .context("invalid Google document response JSON")?;
        let encoded = payload
            .document_translation
            .byte_stream_outputs
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("google response contained no document output"))?;
        Ok(BASE64
            .decode(encoded)
            .context("google document output is not valid base64")?)
    }

    async fn shutdown(&self) {
        debug!("google translation client released");
    }
}
