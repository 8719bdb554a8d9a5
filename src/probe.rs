//! Readiness probing of streamer endpoints

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;

/// Outcome of one readiness probe.
///
/// Only [`Readiness::Ready`] moves a camera forward; the other two are
/// retried until the camera's start timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// The endpoint answered with a status other than 200
    NotReady(u16),
    /// Connection failure or timeout
    Unreachable,
}

pub trait ReadinessProber {
    fn probe(&self, url: &str, timeout: Duration) -> Readiness;
}

/// HEAD request prober
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> Result<Self> {
        // Readiness endpoints live next to the cameras, never behind a proxy.
        // A redirect is an answer of its own, not a hop to the ready page.
        let client = Client::builder()
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl ReadinessProber for HttpProber {
    fn probe(&self, url: &str, timeout: Duration) -> Readiness {
        tracing::debug!("Getting HTTP status: {url}");
        match self.client.head(url).timeout(timeout).send() {
            Ok(response) if response.status() == StatusCode::OK => Readiness::Ready,
            Ok(response) => Readiness::NotReady(response.status().as_u16()),
            Err(e) => {
                tracing::warn!("Failed to connect: {url} ({e})");
                Readiness::Unreachable
            }
        }
    }
}
