use ads_core::types::{FunctionCall, FunctionDeclaration, Tool};
use ads_lookup::{FaqRetriever, ForecastFetcher, ForecastPeriod};
use serde_json::json;
use tracing::{info, warn};

pub const RAG_QUERY: &str = "rag_query";
/// Spelled the way the model sees it in the declaration
pub const GET_FORECAST: &str = "get_forcast";
pub const UNKNOWN_FUNCTION: &str = "Unknown function call";

/// The two tools declared to the model, one declaration each
pub fn tool_declarations() -> Vec<Tool> {
    let rag_query = FunctionDeclaration {
        name: RAG_QUERY.to_string(),
        description: Some(
            "VectorSearch's user prompt to faq database and returns related content.".to_string(),
        ),
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "query": {
                    "type": "STRING",
                    "description": "The user's question or prompt to search for in the FAQ database."
                }
            },
            "required": ["query"]
        }),
    };

    let get_forecast = FunctionDeclaration {
        name: GET_FORECAST.to_string(),
        description: Some(
            "Given a city name returns a json about upcoming weather patterns".to_string(),
        ),
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "city": {
                    "type": "STRING",
                    "description": "A city in Alaska"
                }
            },
            "required": ["city"]
        }),
    };

    vec![
        Tool {
            function_declarations: vec![rag_query],
        },
        Tool {
            function_declarations: vec![get_forecast],
        },
    ]
}

/// Routes a model function call to the matching lookup
#[derive(Clone)]
pub struct ToolDispatcher {
    faq: FaqRetriever,
    forecast: ForecastFetcher,
}

impl ToolDispatcher {
    pub fn new(faq: FaqRetriever, forecast: ForecastFetcher) -> Self {
        Self { faq, forecast }
    }

    /// Run the lookup named by `call` and return its context.
    ///
    /// `None` means the lookup produced no data, including when the argument it
    /// needs is missing.
    pub async fn dispatch(&self, call: &FunctionCall) -> Option<String> {
        match call.name.as_str() {
            RAG_QUERY => {
                let query = required_arg(call, "query")?;
                info!(query, "Running FAQ retrieval");
                Some(self.faq.query(query).await)
            }
            GET_FORECAST => {
                let city = required_arg(call, "city")?;
                info!(city, "Fetching forecast");
                let periods = self.forecast.fetch(city).await.log_failure("forecast")?;
                render_periods(&periods)
            }
            other => {
                warn!(function = other, "Model requested an undeclared function");
                Some(UNKNOWN_FUNCTION.to_string())
            }
        }
    }
}

fn required_arg<'a>(call: &'a FunctionCall, key: &str) -> Option<&'a str> {
    let value = call.str_arg(key);
    if value.is_none() {
        warn!(function = %call.name, key, "Function call is missing a string argument");
    }
    value
}

fn render_periods(periods: &[ForecastPeriod]) -> Option<String> {
    match serde_json::to_string(periods) {
        Ok(context) => Some(context),
        Err(e) => {
            warn!(error = %e, "Failed to serialize forecast periods");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ads_lookup::{
        Coordinates, FaqIndex, FaqRow, ForecastSource, Geocoder, GridPoint, GridResolver,
        LookupOutcome,
    };
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::sync::{Arc, Mutex};

    /// Records every lookup the dispatcher performs
    #[derive(Default)]
    pub(crate) struct LookupLog {
        pub faq_queries: Mutex<Vec<String>>,
        pub geocoded: Mutex<Vec<String>>,
        pub forecasts: Mutex<Vec<GridPoint>>,
    }

    impl LookupLog {
        pub fn total(&self) -> usize {
            self.faq_queries.lock().unwrap().len()
                + self.geocoded.lock().unwrap().len()
                + self.forecasts.lock().unwrap().len()
        }
    }

    pub(crate) struct FakeFaq {
        pub log: Arc<LookupLog>,
        pub rows: Vec<FaqRow>,
    }

    #[async_trait]
    impl FaqIndex for FakeFaq {
        async fn search(&self, text: &str) -> LookupOutcome<Vec<FaqRow>> {
            self.log.faq_queries.lock().unwrap().push(text.to_string());
            LookupOutcome::Found(self.rows.clone())
        }
    }

    /// Geocodes Juneau only; every grid resolves to AFG 50,60
    pub(crate) struct FakeWeather {
        pub log: Arc<LookupLog>,
        pub periods: Vec<ForecastPeriod>,
    }

    #[async_trait]
    impl Geocoder for FakeWeather {
        async fn resolve(&self, city: &str) -> LookupOutcome<Coordinates> {
            self.log.geocoded.lock().unwrap().push(city.to_string());
            if city == "Juneau" {
                LookupOutcome::Found(Coordinates {
                    lat: 58.3,
                    lon: -134.4,
                })
            } else {
                LookupOutcome::NotFound
            }
        }
    }

    #[async_trait]
    impl GridResolver for FakeWeather {
        async fn resolve(&self, _coords: Coordinates) -> LookupOutcome<GridPoint> {
            LookupOutcome::Found(GridPoint {
                office: "AFG".to_string(),
                x: 50,
                y: 60,
            })
        }
    }

    #[async_trait]
    impl ForecastSource for FakeWeather {
        async fn forecast(&self, grid: &GridPoint) -> LookupOutcome<Vec<ForecastPeriod>> {
            self.log.forecasts.lock().unwrap().push(grid.clone());
            LookupOutcome::Found(self.periods.clone())
        }
    }

    pub(crate) fn sample_periods() -> Vec<ForecastPeriod> {
        serde_json::from_value(json!([
            {"name": "Tonight", "shortForecast": "Snow Showers",
             "detailedForecast": "Snow showers. Low around 25.", "isDaytime": false}
        ]))
        .unwrap()
    }

    pub(crate) fn sample_rows() -> Vec<FaqRow> {
        vec![FaqRow {
            question: "What hours is the office open?".to_string(),
            answer: "8am to 5pm, Monday through Friday.".to_string(),
        }]
    }

    pub(crate) fn fake_dispatcher() -> (ToolDispatcher, Arc<LookupLog>) {
        let log = Arc::new(LookupLog::default());
        let faq = FaqRetriever::new(Arc::new(FakeFaq {
            log: log.clone(),
            rows: sample_rows(),
        }));
        let weather = Arc::new(FakeWeather {
            log: log.clone(),
            periods: sample_periods(),
        });
        let forecast = ForecastFetcher::new(weather.clone(), weather.clone(), weather);
        (ToolDispatcher::new(faq, forecast), log)
    }

    pub(crate) fn call(name: &str, args: Value) -> FunctionCall {
        let arguments: Map<String, Value> = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        FunctionCall {
            name: name.to_string(),
            arguments,
        }
    }

    #[tokio::test]
    async fn test_rag_query_returns_retriever_output() {
        let (dispatcher, log) = fake_dispatcher();
        let rows = sample_rows();
        let expected = ads_lookup::faq::render_context(&rows);

        let context = dispatcher
            .dispatch(&call(RAG_QUERY, json!({"query": "office hours"})))
            .await;

        assert_eq!(context.as_deref(), Some(expected.as_str()));
        assert_eq!(
            *log.faq_queries.lock().unwrap(),
            vec!["office hours".to_string()]
        );
        assert!(log.geocoded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forecast_returns_periods_json() {
        let (dispatcher, log) = fake_dispatcher();

        let context = dispatcher
            .dispatch(&call(GET_FORECAST, json!({"city": "Juneau"})))
            .await
            .unwrap();

        assert_eq!(context, serde_json::to_string(&sample_periods()).unwrap());
        assert_eq!(
            *log.forecasts.lock().unwrap(),
            vec![GridPoint {
                office: "AFG".to_string(),
                x: 50,
                y: 60
            }]
        );
        assert!(log.faq_queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_city_yields_no_context() {
        let (dispatcher, log) = fake_dispatcher();

        let context = dispatcher
            .dispatch(&call(GET_FORECAST, json!({"city": "Gotham"})))
            .await;

        assert!(context.is_none());
        assert!(log.forecasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_function_calls_nothing() {
        let (dispatcher, log) = fake_dispatcher();

        for name in ["get_forecast", "RAG_QUERY", "", "delete_everything"] {
            let context = dispatcher
                .dispatch(&call(name, json!({"query": "x", "city": "Juneau"})))
                .await;
            assert_eq!(context.as_deref(), Some(UNKNOWN_FUNCTION));
        }
        assert_eq!(log.total(), 0);
    }

    #[tokio::test]
    async fn test_missing_argument_is_a_failed_lookup() {
        let (dispatcher, log) = fake_dispatcher();

        assert!(dispatcher
            .dispatch(&call(RAG_QUERY, json!({"question": "hours"})))
            .await
            .is_none());
        assert!(dispatcher
            .dispatch(&call(GET_FORECAST, json!({"city": 42})))
            .await
            .is_none());
        assert_eq!(log.total(), 0);
    }

    #[test]
    fn test_declarations_match_dispatch_names() {
        let names: Vec<String> = tool_declarations()
            .into_iter()
            .flat_map(|tool| tool.function_declarations)
            .map(|decl| decl.name)
            .collect();
        assert_eq!(names, vec![RAG_QUERY.to_string(), GET_FORECAST.to_string()]);
    }
}
