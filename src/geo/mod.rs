pub mod client;
pub mod error;
pub mod types;

use std::future::Future;

use tokio_util::sync::CancellationToken;

pub use client::GeoClient;
pub use error::FetchError;

/// Serviços de geolocalização consultados quando nenhum outro é configurado.
pub const DEFAULT_SERVICES: &[&str] = &[
    "https://ipapi.co/json",
    "http://ip-api.com/json",
    "https://freegeoip.app/json/",
    "http://worldtimeapi.org/api/ip",
];

/// Performs one lookup for a race.
///
/// Implementations must watch `cancel` and return promptly once it fires, and
/// must not retry internally. The future has to be `Send` because every lookup
/// runs on its own tokio task.
pub trait Fetcher: Send + Sync + 'static {
    type Descriptor: Send + 'static;
    type Payload: Send + 'static;
    type Error: std::error::Error + Send + 'static;

    fn fetch(
        &self,
        descriptor: Self::Descriptor,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Self::Payload, Self::Error>> + Send;
}
