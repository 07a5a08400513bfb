//! HTTP transport for the municipal inspection portal.

use std::time::Duration;

use async_trait::async_trait;
use foodinspect_core::InspectionId;
use tracing::debug;

use crate::{FetchError, Transport};

/// Paper-report endpoint of the DC food inspection portal.
pub const DEFAULT_ENDPOINT: &str = "https://dc.healthinspections.us/webadmin/dhd_431/lib/mod/inspection/paper/_paper_food_inspection_report.cfm?inspectionID={id}&wguid=1367&wgunm=sysact&wgdmn=431";

const ID_PLACEHOLDER: &str = "{id}";

#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// URL template; `{id}` is replaced by the inspection identifier.
    pub endpoint: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// The portal's certificate chain does not validate; off unless asked for.
    pub accept_invalid_certs: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("foodinspect/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_invalid_certs: false,
        }
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(options: HttpOptions) -> Result<Self, FetchError> {
        if !options.endpoint.contains(ID_PLACEHOLDER) {
            return Err(FetchError::Endpoint(options.endpoint));
        }
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()?;
        Ok(Self {
            client,
            endpoint: options.endpoint,
        })
    }

    pub fn url_for(&self, id: InspectionId) -> String {
        self.endpoint.replace(ID_PLACEHOLDER, &id.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    /// Non-success statuses still return their body; only an empty body
    /// means there is no report behind the identifier.
    async fn get(&self, id: InspectionId) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(id);
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            debug!(%id, status = status.as_u16(), bytes = body.len(), "non-success status");
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoint_substitutes_identifier() {
        let transport = HttpTransport::new(HttpOptions::default()).unwrap();
        let url = transport.url_for(InspectionId::new(431).unwrap());
        assert!(url.contains("inspectionID=431&"));
        assert!(!url.contains(ID_PLACEHOLDER));
    }

    #[test]
    fn custom_endpoint() {
        let transport = HttpTransport::new(HttpOptions {
            endpoint: "http://localhost:8080/report/{id}".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            transport.url_for(InspectionId::new(9).unwrap()),
            "http://localhost:8080/report/9"
        );
    }

    #[test]
    fn endpoint_without_placeholder_is_rejected() {
        let result = HttpTransport::new(HttpOptions {
            endpoint: "http://localhost:8080/report".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(FetchError::Endpoint(_))));
    }
}
