//! Weather forecast lookup.
//!
//! A forecast is resolved in three dependent steps: city → coordinates
//! (geocoding), coordinates → forecast office grid cell (NWS points), and
//! grid cell → forecast periods (NWS gridpoints). Each step is a trait so the
//! chain can be driven against fakes.

mod geocode;
mod nws;

pub use geocode::{GeocodeResponse, GoogleGeocoder, DEFAULT_GEOCODE_BASE, DEFAULT_REGION};
pub use nws::{
    forecast_url, format_coordinate, points_url, ForecastResponse, NwsClient, PointsResponse,
    DEFAULT_NWS_BASE, DEFAULT_USER_AGENT,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::outcome::LookupOutcome;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Forecast office and grid cell addressing a forecast product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridPoint {
    pub office: String,
    pub x: i64,
    pub y: i64,
}

/// One forecast period as returned upstream.
///
/// Fields other than the three named ones are carried along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPeriod {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_forecast: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_forecast: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, city: &str) -> LookupOutcome<Coordinates>;
}

#[async_trait]
pub trait GridResolver: Send + Sync {
    async fn resolve(&self, coords: Coordinates) -> LookupOutcome<GridPoint>;
}

#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn forecast(&self, grid: &GridPoint) -> LookupOutcome<Vec<ForecastPeriod>>;
}

/// Composes geocoding, grid resolution and the forecast call
#[derive(Clone)]
pub struct ForecastFetcher {
    geocoder: Arc<dyn Geocoder>,
    grid_resolver: Arc<dyn GridResolver>,
    source: Arc<dyn ForecastSource>,
}

impl ForecastFetcher {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        grid_resolver: Arc<dyn GridResolver>,
        source: Arc<dyn ForecastSource>,
    ) -> Self {
        Self {
            geocoder,
            grid_resolver,
            source,
        }
    }

    /// Build a fetcher whose grid and forecast steps share one NWS client
    pub fn from_clients(geocoder: GoogleGeocoder, nws: NwsClient) -> Self {
        let nws = Arc::new(nws);
        Self::new(Arc::new(geocoder), nws.clone(), nws)
    }

    /// Resolve `city` to its forecast periods, stopping at the first failed step
    pub async fn fetch(&self, city: &str) -> LookupOutcome<Vec<ForecastPeriod>> {
        let coords = match self.geocoder.resolve(city).await {
            LookupOutcome::Found(coords) => coords,
            LookupOutcome::NotFound => return LookupOutcome::NotFound,
            LookupOutcome::Unavailable(e) => return LookupOutcome::Unavailable(e),
        };
        info!(city, lat = coords.lat, lon = coords.lon, "Resolved coordinates");

        let grid = match self.grid_resolver.resolve(coords).await {
            LookupOutcome::Found(grid) => grid,
            LookupOutcome::NotFound => return LookupOutcome::NotFound,
            LookupOutcome::Unavailable(e) => return LookupOutcome::Unavailable(e),
        };
        debug!(office = %grid.office, x = grid.x, y = grid.y, "Resolved forecast grid");

        self.source.forecast(&grid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LookupError;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls {
        geocode: Mutex<Vec<String>>,
        grid: Mutex<Vec<Coordinates>>,
        forecast: Mutex<Vec<GridPoint>>,
    }

    enum GeoBehavior {
        Found(Coordinates),
        NotFound,
        Down,
    }

    struct FakeGeocoder {
        calls: Arc<Calls>,
        behavior: GeoBehavior,
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn resolve(&self, city: &str) -> LookupOutcome<Coordinates> {
            self.calls.geocode.lock().unwrap().push(city.to_string());
            match self.behavior {
                GeoBehavior::Found(c) => LookupOutcome::Found(c),
                GeoBehavior::NotFound => LookupOutcome::NotFound,
                GeoBehavior::Down => {
                    LookupOutcome::Unavailable(LookupError::malformed("connection reset"))
                }
            }
        }
    }

    struct FakeNws {
        calls: Arc<Calls>,
        grid: Option<GridPoint>,
        periods: Vec<ForecastPeriod>,
    }

    #[async_trait]
    impl GridResolver for FakeNws {
        async fn resolve(&self, coords: Coordinates) -> LookupOutcome<GridPoint> {
            self.calls.grid.lock().unwrap().push(coords);
            match &self.grid {
                Some(grid) => LookupOutcome::Found(grid.clone()),
                None => LookupOutcome::NotFound,
            }
        }
    }

    #[async_trait]
    impl ForecastSource for FakeNws {
        async fn forecast(&self, grid: &GridPoint) -> LookupOutcome<Vec<ForecastPeriod>> {
            self.calls.forecast.lock().unwrap().push(grid.clone());
            LookupOutcome::Found(self.periods.clone())
        }
    }

    fn juneau_periods() -> Vec<ForecastPeriod> {
        serde_json::from_value(json!([
            {"number": 1, "name": "Tonight", "shortForecast": "Light Snow",
             "detailedForecast": "Snow likely. Low around 20."},
            {"number": 2, "name": "Friday", "shortForecast": "Cloudy",
             "detailedForecast": "Cloudy, with a high near 28."}
        ]))
        .unwrap()
    }

    fn fetcher(behavior: GeoBehavior, grid: Option<GridPoint>) -> (ForecastFetcher, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let nws = Arc::new(FakeNws {
            calls: calls.clone(),
            grid,
            periods: juneau_periods(),
        });
        let geocoder = Arc::new(FakeGeocoder {
            calls: calls.clone(),
            behavior,
        });
        (ForecastFetcher::new(geocoder, nws.clone(), nws), calls)
    }

    fn afg_grid() -> GridPoint {
        GridPoint {
            office: "AFG".to_string(),
            x: 50,
            y: 60,
        }
    }

    #[tokio::test]
    async fn test_fetch_resolves_full_chain() {
        let juneau = Coordinates {
            lat: 58.3,
            lon: -134.4,
        };
        let (fetcher, calls) = fetcher(GeoBehavior::Found(juneau), Some(afg_grid()));

        let periods = fetcher.fetch("Juneau").await.found().unwrap();
        assert_eq!(periods, juneau_periods());

        assert_eq!(*calls.geocode.lock().unwrap(), vec!["Juneau".to_string()]);
        assert_eq!(*calls.grid.lock().unwrap(), vec![juneau]);
        assert_eq!(*calls.forecast.lock().unwrap(), vec![afg_grid()]);
    }

    #[tokio::test]
    async fn test_unresolvable_city_short_circuits() {
        let (fetcher, calls) = fetcher(GeoBehavior::NotFound, Some(afg_grid()));

        assert!(matches!(fetcher.fetch("Atlantis").await, LookupOutcome::NotFound));
        assert!(calls.grid.lock().unwrap().is_empty());
        assert!(calls.forecast.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_geocoder_outage_short_circuits() {
        let (fetcher, calls) = fetcher(GeoBehavior::Down, Some(afg_grid()));

        assert!(matches!(
            fetcher.fetch("Nome").await,
            LookupOutcome::Unavailable(_)
        ));
        assert!(calls.grid.lock().unwrap().is_empty());
        assert!(calls.forecast.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_grid_skips_forecast() {
        let coords = Coordinates {
            lat: 61.2,
            lon: -149.9,
        };
        let (fetcher, calls) = fetcher(GeoBehavior::Found(coords), None);

        assert!(fetcher.fetch("Anchorage").await.found().is_none());
        assert_eq!(calls.grid.lock().unwrap().len(), 1);
        assert!(calls.forecast.lock().unwrap().is_empty());
    }

    #[test]
    fn test_period_keeps_unknown_fields() {
        let raw = json!({
            "name": "Tonight",
            "shortForecast": "Clear",
            "temperature": -12,
            "temperatureUnit": "F"
        });
        let period: ForecastPeriod = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(period.extra.get("temperature"), Some(&json!(-12)));
        assert_eq!(serde_json::to_value(&period).unwrap(), raw);
    }
}
