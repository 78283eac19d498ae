//! HTTP routing client for OSRM-compatible routing servers.
//!
//! Implements [`RoutingService`] over the OSRM `/route/v1` API with GeoJSON
//! geometries. One request per leg, no caching and no retrying; failures
//! are surfaced verbatim and retry policy stays outside the engine.

use std::future::Future;
use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::Deserialize;

use crate::composer::{RoutedPath, RoutingService, TravelMode};
use crate::error::RoutingFailure;
use crate::GeoPoint;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const POOL_MAX_IDLE_PER_HOST: usize = 4;

/// Routing client against an OSRM-compatible server.
pub struct OsrmClient {
    client: Client,
    base_url: String,
}

impl OsrmClient {
    /// Create a client for the given server, e.g.
    /// `https://router.project-osrm.org`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, RoutingFailure> {
        let client = Client::builder()
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| RoutingFailure::Service {
                message: format!("failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn leg_url(&self, origin: &GeoPoint, destination: &GeoPoint, mode: TravelMode) -> String {
        format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}?overview=full&geometries=geojson",
            self.base_url,
            profile(mode),
            origin.longitude,
            origin.latitude,
            destination.longitude,
            destination.latitude,
        )
    }
}

fn profile(mode: TravelMode) -> &'static str {
    match mode {
        TravelMode::Pedestrian => "foot",
    }
}

/// OSRM route response envelope.
#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

/// GeoJSON LineString geometry: coordinates are [lon, lat] pairs.
#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

fn routed_path_from(
    response: OsrmResponse,
    status_code: Option<u16>,
) -> Result<RoutedPath, RoutingFailure> {
    match response.code.as_str() {
        "Ok" => {
            let route = response
                .routes
                .into_iter()
                .next()
                .ok_or(RoutingFailure::NoRoute)?;
            let polyline = route
                .geometry
                .coordinates
                .iter()
                .map(|c| GeoPoint::new(c[1], c[0]))
                .collect();
            Ok(RoutedPath {
                polyline,
                distance: route.distance,
                duration: route.duration,
            })
        }
        "NoRoute" => Err(RoutingFailure::NoRoute),
        other => Err(RoutingFailure::Service {
            message: response
                .message
                .unwrap_or_else(|| format!("routing code {}", other)),
            status_code,
        }),
    }
}

impl RoutingService for OsrmClient {
    fn route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        mode: TravelMode,
    ) -> impl Future<Output = Result<RoutedPath, RoutingFailure>> + Send {
        let url = self.leg_url(&origin, &destination, mode);
        let client = self.client.clone();
        async move {
            debug!("[OsrmClient] GET {}", url);
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| RoutingFailure::Service {
                    message: format!("request error: {}", e),
                    status_code: e.status().map(|s| s.as_u16()),
                })?;

            // OSRM reports routing outcomes (including NoRoute) in the body
            // code, on error statuses too, so decide from the body.
            let status = response.status();
            let body = response.text().await.map_err(|e| RoutingFailure::Service {
                message: format!("failed to read response: {}", e),
                status_code: Some(status.as_u16()),
            })?;
            let parsed: OsrmResponse =
                serde_json::from_str(&body).map_err(|e| RoutingFailure::Service {
                    message: format!("HTTP {}: unparseable body: {}", status, e),
                    status_code: Some(status.as_u16()),
                })?;

            routed_path_from(parsed, Some(status.as_u16()))
        }
    }
}
