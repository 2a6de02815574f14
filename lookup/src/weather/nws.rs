use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use super::{Coordinates, ForecastPeriod, ForecastSource, GridPoint, GridResolver};
use crate::http::send_json;
use crate::outcome::LookupOutcome;

pub const DEFAULT_NWS_BASE: &str = "https://api.weather.gov";
/// api.weather.gov rejects requests without an identifying User-Agent
pub const DEFAULT_USER_AGENT: &str = "ADS Chat App (demo@example.com)";

#[derive(Debug, Deserialize)]
pub struct PointsResponse {
    #[serde(default)]
    pub properties: PointsProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsProperties {
    pub grid_id: Option<String>,
    pub grid_x: Option<i64>,
    pub grid_y: Option<i64>,
}

impl PointsResponse {
    /// Grid cell for the point, `NotFound` if any of office/x/y is absent
    pub fn into_outcome(self) -> LookupOutcome<GridPoint> {
        let PointsProperties {
            grid_id,
            grid_x,
            grid_y,
        } = self.properties;
        match (grid_id, grid_x, grid_y) {
            (Some(office), Some(x), Some(y)) if !office.is_empty() => {
                LookupOutcome::Found(GridPoint { office, x, y })
            }
            _ => LookupOutcome::NotFound,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
pub struct ForecastProperties {
    pub periods: Vec<ForecastPeriod>,
}

/// Render a coordinate with at most four decimals, as the points endpoint expects
pub fn format_coordinate(value: f64) -> String {
    let fixed = format!("{:.4}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

pub fn points_url(base: &str, coords: Coordinates) -> String {
    format!(
        "{}/points/{},{}",
        base,
        format_coordinate(coords.lat),
        format_coordinate(coords.lon)
    )
}

pub fn forecast_url(base: &str, grid: &GridPoint) -> String {
    format!(
        "{}/gridpoints/{}/{},{}/forecast",
        base, grid.office, grid.x, grid.y
    )
}

/// National Weather Service API client
#[derive(Debug, Clone)]
pub struct NwsClient {
    client: Client,
    base_url: String,
    user_agent: String,
}

impl NwsClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_NWS_BASE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.get(url).header(USER_AGENT, &self.user_agent)
    }
}

#[async_trait]
impl GridResolver for NwsClient {
    async fn resolve(&self, coords: Coordinates) -> LookupOutcome<GridPoint> {
        let url = points_url(&self.base_url, coords);

        match send_json::<PointsResponse>(self.get(&url)).await {
            Ok(body) => {
                let outcome = body.into_outcome();
                if !outcome.is_found() {
                    warn!(lat = coords.lat, lon = coords.lon, "Could not find gridId, gridX, or gridY");
                }
                outcome
            }
            Err(e) => {
                warn!(%url, error = %e, "NWS points API call failed");
                LookupOutcome::Unavailable(e)
            }
        }
    }
}

#[async_trait]
impl ForecastSource for NwsClient {
    async fn forecast(&self, grid: &GridPoint) -> LookupOutcome<Vec<ForecastPeriod>> {
        let url = forecast_url(&self.base_url, grid);

        match send_json::<ForecastResponse>(self.get(&url)).await {
            Ok(body) => LookupOutcome::Found(body.properties.periods),
            Err(e) => {
                warn!(%url, error = %e, "NWS forecast API call failed");
                LookupOutcome::Unavailable(e)
            }
        }
    }
}
