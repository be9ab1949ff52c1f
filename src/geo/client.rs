use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::ACCEPT;
use tokio_util::sync::CancellationToken;

use super::Fetcher;
use super::error::FetchError;
use super::types::LookupResponse;

const USER_AGENT: &str = concat!("tzsync/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by every lookup of a race.
pub struct GeoClient {
    client: Client,
}

impl GeoClient {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Query one service and extract the timezone it reports.
    pub async fn lookup(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(%url, "querying service");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        let parsed: LookupResponse = serde_json::from_str(&body)?;

        parsed
            .into_timezone()
            .ok_or_else(|| FetchError::MissingTimezone {
                url: url.to_string(),
            })
    }
}

impl Fetcher for GeoClient {
    type Descriptor = String;
    type Payload = String;
    type Error = FetchError;

    fn fetch(
        &self,
        url: String,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<String, FetchError>> + Send {
        async move {
            // Dropping the in-flight request releases its connection.
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(FetchError::Cancelled),
                result = self.lookup(&url) => result,
            }
        }
    }
}
