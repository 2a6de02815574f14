// External lookups the chat coordinator can run on the model's behalf:
// - Weather forecast (geocoding + NWS grid points + forecast)
// - FAQ retrieval by vector search in BigQuery
// - Tagged lookup outcomes and errors

pub mod errors;
pub use errors::LookupError;

pub mod outcome;
pub use outcome::LookupOutcome;

pub mod faq;
pub use faq::{BigQueryFaqIndex, FaqIndex, FaqRetriever, FaqRow, VectorSearchTable};

pub mod weather;
pub use weather::{
    Coordinates, ForecastFetcher, ForecastPeriod, ForecastSource, Geocoder, GoogleGeocoder,
    GridPoint, GridResolver, NwsClient,
};

mod http;
