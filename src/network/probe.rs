//! Connectivity probes.
//!
//! A probe measures one round trip to an endpoint. The monitor runs probes on
//! their own threads, so implementations may block for up to `timeout`.

use std::time::Duration;

use crate::error::ProbeError;

/// Measures a round trip to an endpoint.
pub trait Prober: Send + Sync {
    /// Returns the elapsed round-trip time on success.
    fn probe(&self, endpoint: &str, timeout: Duration) -> Result<Duration, ProbeError>;
}

/// Prober for builds without an HTTP client. Every probe fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableProber;

impl Prober for UnavailableProber {
    fn probe(&self, endpoint: &str, _timeout: Duration) -> Result<Duration, ProbeError> {
        Err(ProbeError::Request {
            endpoint: endpoint.to_string(),
            message: "no HTTP client compiled in".to_string(),
        })
    }
}

#[cfg(feature = "http-probe")]
pub use http::HttpProber;

#[cfg(feature = "http-probe")]
mod http {
    use std::time::{Duration, Instant};

    use reqwest::blocking::Client;
    use reqwest::header::CACHE_CONTROL;
    use reqwest::Url;

    use super::Prober;
    use crate::error::{ProbeError, WireError, WireResult};

    /// `HEAD` request prober. Any HTTP response counts as reachable.
    #[derive(Debug, Clone)]
    pub struct HttpProber {
        client: Client,
    }

    impl HttpProber {
        pub fn new() -> WireResult<Self> {
            let client = Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .map_err(|e| WireError::internal(format!("http client: {e}")))?;
            Ok(Self { client })
        }
    }

    impl Prober for HttpProber {
        fn probe(&self, endpoint: &str, timeout: Duration) -> Result<Duration, ProbeError> {
            let url = Url::parse(endpoint).map_err(|_| ProbeError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
            })?;

            let started = Instant::now();
            let result = self
                .client
                .head(url)
                .header(CACHE_CONTROL, "no-cache")
                .timeout(timeout)
                .send();
            let elapsed = started.elapsed();

            match result {
                Ok(_) => Ok(elapsed),
                Err(e) if e.is_timeout() => Err(ProbeError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
                Err(e) => Err(ProbeError::Request {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                }),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn malformed_endpoint_is_rejected_without_io() {
            let prober = HttpProber::new().unwrap();
            let err = prober.probe("not a url", Duration::from_millis(10)).unwrap_err();
            assert_eq!(
                err,
                ProbeError::InvalidEndpoint {
                    endpoint: "not a url".to_string()
                }
            );
        }
    }
}
