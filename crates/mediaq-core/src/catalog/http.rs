//! HTTP catalog client on blocking curl handles.
//!
//! `GET {base}/recordings` returns a JSON array of `RecordingDescriptor`;
//! `DELETE {base}/recordings/{id}` removes one. Both use basic auth.

use curl::easy::{Auth, Easy};
use std::time::Duration;

use super::{CatalogApi, CatalogError, Credentials, RecordingDescriptor};
use crate::queue::RecordingId;

#[derive(Debug, Clone)]
pub struct HttpCatalog {
    base_url: String,
    user_agent: String,
    connect_timeout: Duration,
}

impl HttpCatalog {
    pub fn new(base_url: &str, user_agent: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
            connect_timeout,
        }
    }

    fn request(
        &self,
        creds: &Credentials,
        method: &str,
        path: &str,
    ) -> Result<Vec<u8>, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        let mut body = Vec::new();
        let mut easy = Easy::new();
        let code = (|| -> Result<u32, curl::Error> {
            easy.url(&url)?;
            easy.useragent(&self.user_agent)?;
            easy.connect_timeout(self.connect_timeout)?;
            easy.timeout(self.connect_timeout * 6)?;
            easy.follow_location(true)?;
            easy.username(&creds.username)?;
            easy.password(&creds.password)?;
            let mut auth = Auth::new();
            auth.basic(true);
            easy.http_auth(&auth)?;
            if method != "GET" {
                easy.custom_request(method)?;
            }
            {
                let mut transfer = easy.transfer();
                transfer.write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })?;
                transfer.perform()?;
            }
            easy.response_code()
        })()
        .map_err(|e| CatalogError::Transient(format!("{} {}: {}", method, url, e)))?;

        match code {
            200..=299 => Ok(body),
            401 | 403 => Err(CatalogError::BadCredentials),
            _ => Err(CatalogError::Transient(format!(
                "{} {} returned HTTP {}",
                method, url, code
            ))),
        }
    }
}

impl CatalogApi for HttpCatalog {
    fn list_recordings(&self, creds: &Credentials) -> Result<Vec<RecordingDescriptor>, CatalogError> {
        let body = self.request(creds, "GET", "/recordings")?;
        serde_json::from_slice(&body)
            .map_err(|e| CatalogError::Transient(format!("invalid recordings listing: {}", e)))
    }

    fn delete_recording(&self, creds: &Credentials, id: RecordingId) -> Result<(), CatalogError> {
        self.request(creds, "DELETE", &format!("/recordings/{}", id))?;
        Ok(())
    }
}
