//! Response checks shared by the HTTP providers.

use reqwest::header::CONTENT_TYPE;
use reqwest::Response;

use crate::error::{ProviderError, ProviderResult};

async fn error_body(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string())
}

/// Creation call: non-2xx is a rejection of the job itself.
pub(crate) async fn ensure_created(provider: &str, response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if !status.is_success() {
        let body = error_body(response).await;
        return Err(ProviderError::creation_rejected(provider, status.as_u16(), body));
    }
    Ok(response)
}

/// Status or download call.
pub(crate) async fn ensure_success(provider: &str, response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if !status.is_success() {
        let body = error_body(response).await;
        return Err(ProviderError::request_failed(provider, status.as_u16(), body));
    }
    Ok(response)
}

pub(crate) fn content_type(response: &Response, fallback: &str) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty() && v != "application/octet-stream")
        .unwrap_or_else(|| fallback.to_string())
}

/// Download a small remote file (reference images) as bytes plus MIME type.
pub(crate) async fn download(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    fallback_mime: &str,
) -> ProviderResult<(String, Vec<u8>)> {
    let response = ensure_success(provider, client.get(url).send().await?).await?;
    let mime = content_type(&response, fallback_mime);
    let bytes = response.bytes().await?;
    Ok((mime, bytes.to_vec()))
}
