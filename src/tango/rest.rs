//! Tango REST API gateway client
//!
//! Talks to a TangoRestServer (API revision rc4) over HTTP. Each device
//! operation is a single request:
//!
//! | Operation         | Request                                                     |
//! |-------------------|-------------------------------------------------------------|
//! | `read_attribute`  | `GET  {base}/devices/{dev}/attributes/{attr}/value`         |
//! | `write_attribute` | `PUT  {base}/devices/{dev}/attributes/{attr}/value?v={val}` |
//! | `command_inout`   | `PUT  {base}/devices/{dev}/commands/{cmd}` + `{"input":..}` |
//!
//! where `{base}` is `{url}/tango/rest/rc4/hosts/{tango_host}/{tango_port}`.
//!
//! Failed requests carry a Tango error stack in the body:
//!
//! ```json
//! {"errors":[{"reason":"API_AttrNotFound","description":"...","severity":"ERR","origin":"..."}],
//!  "quality":"FAILURE","timestamp":1712345678901}
//! ```
//!
//! which becomes [`AcqError::DevFailed`] with the first entry's reason,
//! description and origin.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hyper::body::Bytes;
use hyper::client::HttpConnector;
use hyper::{header, Body, Client, Method, Request};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::config::RestBackendConfig;
use crate::error::{AcqError, Result};
use crate::tango::{AttrValue, AttributeReading, DeviceName, DeviceProxy};

const API_REVISION: &str = "rc4";

#[derive(Debug, Deserialize)]
struct ErrorStack {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    origin: String,
}

#[derive(Debug, Deserialize)]
struct CommandResult {
    #[serde(default)]
    output: Option<serde_json::Value>,
}

/// A device reached through the Tango REST API gateway.
pub struct RestDeviceProxy {
    name: DeviceName,
    client: Client<HttpConnector>,
    device_url: Url,
    authorization: Option<String>,
    timeout: Duration,
}

impl RestDeviceProxy {
    /// Create a proxy for `name`. No request is made until the first call.
    ///
    /// A `tango://host:port/` prefix on the name overrides the configured
    /// database host.
    pub fn new(name: DeviceName, config: &RestBackendConfig) -> Result<Self> {
        let device_url = device_url(&name, config)?;

        let authorization = match (&config.username, &config.password) {
            (Some(user), password) => Some(format!(
                "Basic {}",
                BASE64.encode(format!("{}:{}", user, password.as_deref().unwrap_or_default()))
            )),
            (None, _) => None,
        };

        tracing::debug!(device = %name, url = %device_url, "Created REST device proxy");

        Ok(Self {
            name,
            client: Client::new(),
            device_url,
            authorization,
            timeout: config.timeout,
        })
    }

    /// Base URL of this device on the gateway.
    pub fn device_url(&self) -> &Url {
        &self.device_url
    }

    fn url_for(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.device_url.clone();
        url.path_segments_mut()
            .map_err(|_| AcqError::transport(self.name.to_string(), "gateway URL cannot be a base"))?
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<serde_json::Value>) -> Result<Bytes> {
        let device = self.name.to_string();

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(url.as_str())
            .header(header::ACCEPT, "application/json");
        if let Some(auth) = &self.authorization {
            builder = builder.header(header::AUTHORIZATION, auth.as_str());
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .map_err(|e| AcqError::transport(&device, e))?;

        tracing::debug!(device = %device, %method, url = %url, "REST request");

        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            let bytes = hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, hyper::Error>((status, bytes))
        };

        let (status, bytes) = timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                AcqError::transport(&device, format!("no response within {:?}", self.timeout))
            })?
            .map_err(|e| AcqError::transport(&device, e))?;

        if status.is_success() {
            return Ok(bytes);
        }

        tracing::debug!(device = %device, %status, "REST request failed");
        Err(error_from_body(&device, status.as_u16(), &bytes))
    }
}

#[async_trait]
impl DeviceProxy for RestDeviceProxy {
    fn name(&self) -> &DeviceName {
        &self.name
    }

    async fn write_attribute(&self, attribute: &str, value: AttrValue) -> Result<()> {
        let mut url = self.url_for(&["attributes", attribute, "value"])?;
        url.query_pairs_mut().append_pair("v", &value.to_string());
        self.send(Method::PUT, url, None).await?;
        Ok(())
    }

    async fn read_attribute(&self, attribute: &str) -> Result<AttributeReading> {
        let url = self.url_for(&["attributes", attribute, "value"])?;
        let bytes = self.send(Method::GET, url, None).await?;
        serde_json::from_slice(&bytes).map_err(|e| AcqError::malformed(self.name.to_string(), e))
    }

    async fn command_inout(
        &self,
        command: &str,
        input: Option<AttrValue>,
    ) -> Result<Option<AttrValue>> {
        let url = self.url_for(&["commands", command])?;
        let body = input.map(|value| serde_json::json!({ "input": value }));
        let bytes = self.send(Method::PUT, url, body).await?;
        if bytes.is_empty() {
            return Ok(None);
        }

        let result: CommandResult = serde_json::from_slice(&bytes)
            .map_err(|e| AcqError::malformed(self.name.to_string(), e))?;
        match result.output {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| AcqError::malformed(self.name.to_string(), e)),
        }
    }
}

fn device_url(name: &DeviceName, config: &RestBackendConfig) -> Result<Url> {
    let mut url = Url::parse(&config.url)
        .map_err(|e| AcqError::Configuration(format!("invalid gateway url '{}': {}", config.url, e)))?;

    let (tango_host, tango_port) = match &name.tango_host {
        Some((host, port)) => (host.clone(), *port),
        None => (config.tango_host.clone(), config.tango_port),
    };
    let port = tango_port.to_string();

    url.path_segments_mut()
        .map_err(|_| AcqError::Configuration(format!("gateway url '{}' cannot be a base", config.url)))?
        .pop_if_empty()
        .extend([
            "tango",
            "rest",
            API_REVISION,
            "hosts",
            tango_host.as_str(),
            port.as_str(),
            "devices",
            name.domain.as_str(),
            name.family.as_str(),
            name.member.as_str(),
        ]);
    Ok(url)
}

fn error_from_body(device: &str, status: u16, body: &[u8]) -> AcqError {
    match serde_json::from_slice::<ErrorStack>(body) {
        Ok(stack) if !stack.errors.is_empty() => {
            let first = &stack.errors[0];
            AcqError::dev_failed(device, &first.reason, &first.description, &first.origin)
        }
        _ => AcqError::transport(
            device,
            format!("HTTP {}: {}", status, String::from_utf8_lossy(body).trim()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RestBackendConfig {
        RestBackendConfig {
            url: "http://gateway.lab:8080".to_string(),
            tango_host: "tango-db".to_string(),
            tango_port: 10000,
            username: Some("tango-cs".to_string()),
            password: Some("tango".to_string()),
            timeout: Duration::from_secs(3),
        }
    }

    #[test]
    fn test_device_url_layout() {
        let name = DeviceName::parse("limaccd/tango/1").unwrap();
        let proxy = RestDeviceProxy::new(name, &config()).unwrap();
        assert_eq!(
            proxy.device_url().as_str(),
            "http://gateway.lab:8080/tango/rest/rc4/hosts/tango-db/10000/devices/limaccd/tango/1"
        );

        let url = proxy.url_for(&["attributes", "acq_status", "value"]).unwrap();
        assert!(url.as_str().ends_with("/devices/limaccd/tango/1/attributes/acq_status/value"));
    }

    #[test]
    fn test_name_prefix_overrides_database() {
        let name = DeviceName::parse("tango://other-db:20000/pointgrey/tango/1").unwrap();
        let url = device_url(&name, &config()).unwrap();
        assert!(url.as_str().contains("/hosts/other-db/20000/devices/pointgrey/tango/1"));
    }

    #[test]
    fn test_invalid_gateway_url() {
        let mut cfg = config();
        cfg.url = "not a url".to_string();
        let name = DeviceName::parse("limaccd/tango/1").unwrap();
        assert!(matches!(
            RestDeviceProxy::new(name, &cfg),
            Err(AcqError::Configuration(_))
        ));
    }

    #[test]
    fn test_error_stack_becomes_dev_failed() {
        let body = br#"{"errors":[{"reason":"API_AttributeFailed","description":"Invalid trigger mode","severity":"ERR","origin":"LimaCCDs"}],"quality":"FAILURE","timestamp":0}"#;
        match error_from_body("limaccd/tango/1", 500, body) {
            AcqError::DevFailed { reason, description, origin, .. } => {
                assert_eq!(reason, "API_AttributeFailed");
                assert_eq!(description, "Invalid trigger mode");
                assert_eq!(origin, "LimaCCDs");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_basic_auth_credentials() {
        let name = DeviceName::parse("limaccd/tango/1").unwrap();
        let proxy = RestDeviceProxy::new(name.clone(), &config()).unwrap();
        assert_eq!(proxy.authorization.as_deref(), Some("Basic dGFuZ28tY3M6dGFuZ28="));

        let mut cfg = config();
        cfg.username = None;
        cfg.password = None;
        assert!(RestDeviceProxy::new(name, &cfg).unwrap().authorization.is_none());
    }

    #[test]
    fn test_non_json_error_is_transport() {
        let err = error_from_body("limaccd/tango/1", 502, b"Bad Gateway");
        assert!(matches!(err, AcqError::Transport { .. }));
        assert!(err.to_string().contains("HTTP 502"));
    }
}
