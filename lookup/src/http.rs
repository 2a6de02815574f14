use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use crate::errors::LookupError;

/// Send a request and decode a JSON body, treating non-2xx statuses as errors
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, LookupError> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(LookupError::HttpError {
            status_code: status.as_u16(),
            message,
        });
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| LookupError::malformed(e.to_string()))
}
