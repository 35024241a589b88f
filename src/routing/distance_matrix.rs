use std::time::Duration;

use serde::Deserialize;

use super::{EstimateSource, EtaEstimator, OriginEstimate, RoutingError};
use crate::models::GeoPoint;

/// Google Distance Matrix client (blocking; call from `spawn_blocking`).
pub struct DistanceMatrixClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl DistanceMatrixClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, RoutingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RoutingError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }
}

#[derive(Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Deserialize)]
struct MatrixElement {
    status: String,
    #[serde(default)]
    duration: Option<MatrixValue>,
}

#[derive(Deserialize)]
struct MatrixValue {
    value: u32,
}

/// Parse a distance-matrix body for `origin_count` origins and a single
/// destination. Rows without an OK element come back as `Failed`.
pub fn parse_matrix(body: &str, origin_count: usize) -> Result<Vec<OriginEstimate>, RoutingError> {
    let parsed: MatrixResponse =
        serde_json::from_str(body).map_err(|e| RoutingError::ResponseParsing(e.to_string()))?;

    if parsed.status != "OK" {
        let detail = parsed
            .error_message
            .map(|m| format!("{}: {m}", parsed.status))
            .unwrap_or(parsed.status);
        return Err(RoutingError::Rejected(detail));
    }
    if parsed.rows.len() != origin_count {
        return Err(RoutingError::LengthMismatch {
            expected: origin_count,
            got: parsed.rows.len(),
        });
    }

    Ok(parsed
        .rows
        .into_iter()
        .map(|row| match row.elements.into_iter().next() {
            Some(MatrixElement {
                status,
                duration: Some(d),
            }) if status == "OK" => OriginEstimate::Duration {
                seconds: d.value,
                source: EstimateSource::Routing,
            },
            Some(el) if el.status != "OK" => OriginEstimate::Failed { status: el.status },
            Some(_) => OriginEstimate::Failed {
                status: "MISSING_DURATION".into(),
            },
            None => OriginEstimate::Failed {
                status: "NO_ELEMENTS".into(),
            },
        })
        .collect())
}

impl EtaEstimator for DistanceMatrixClient {
    fn estimate(
        &self,
        origins: &[GeoPoint],
        destination: GeoPoint,
    ) -> Result<Vec<OriginEstimate>, RoutingError> {
        if origins.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/maps/api/distancematrix/json", self.base_url);
        let origins_param = origins
            .iter()
            .map(GeoPoint::to_query)
            .collect::<Vec<_>>()
            .join("|");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("origins", origins_param.as_str()),
                ("destinations", destination.to_query().as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    RoutingError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    RoutingError::Connection(self.base_url.clone())
                } else {
                    RoutingError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RoutingError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .map_err(|e| RoutingError::ResponseParsing(e.to_string()))?;
        parse_matrix(&body, origins.len())
    }
}
