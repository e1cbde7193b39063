//! Blocking client for the booking site's backend API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::domain::FTError;
use crate::table::{CompanyRow, RowSource};

pub const COMPANY_TABLE: &str = "/api/company-table";
pub const COMPANY_CUSTOM_TABLE: &str = "/api/company-custom-table";
pub const FLIGHTS: &str = "/api/flights";
pub const AIRPORTS: &str = "/api/airports";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub code: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Airport {
    /// Label used for the airport options of the search form.
    pub fn label(&self) -> String {
        format!("{} ({})", self.city, self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: String,
    pub airline: String,
    pub price: f64,
    pub stops: u32,
    pub departure_time: String,
    pub arrival_time: String,
    pub duration: String,
    pub aircraft: String,
    pub available_seats: u32,
    pub route_type: String,
    pub departure_airport: Airport,
    pub arrival_airport: Airport,
}

/// Query string of `GET /api/flights`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlightQuery {
    pub origin: String,
    pub destination: String,
    pub date: String,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stops: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str, query: Option<&FlightQuery>) -> Result<Value, FTError> {
        let mut request = self.client.get(self.url(path));
        if let Some(q) = query {
            request = request.query(q);
        }
        let response = request.send()?;
        if !response.status().is_success() {
            return Err(FTError::HttpStatus {
                endpoint: path.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.json()?)
    }

    /// Rows of one of the company tables. A payload that is not an array
    /// counts as an empty table.
    #[instrument(skip(self))]
    pub fn company_rows(&self, path: &str) -> Result<Vec<CompanyRow>, FTError> {
        let value = self.get(path, None)?;
        rows_from_value(path, value)
    }

    #[instrument(skip(self))]
    pub fn flights(&self, query: &FlightQuery) -> Result<Vec<Flight>, FTError> {
        let value = self.get(FLIGHTS, Some(query))?;
        let flights: Vec<Flight> = serde_json::from_value(value)?;
        debug!("Received {} flights", flights.len());
        Ok(flights)
    }

    #[instrument(skip(self))]
    pub fn airports(&self) -> Result<Vec<Airport>, FTError> {
        let value = self.get(AIRPORTS, None)?;
        Ok(serde_json::from_value(value)?)
    }
}

fn rows_from_value(path: &str, value: Value) -> Result<Vec<CompanyRow>, FTError> {
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        other => {
            warn!("{path} returned {} instead of an array", json_kind(&other));
            Ok(Vec::new())
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A company table endpoint used as the row source of a table instance.
pub struct CompanyEndpoint {
    client: ApiClient,
    path: &'static str,
}

impl CompanyEndpoint {
    pub fn new(client: ApiClient, path: &'static str) -> Self {
        Self { client, path }
    }
}

impl RowSource for CompanyEndpoint {
    fn name(&self) -> String {
        self.client.url(self.path)
    }

    fn fetch_rows(&self) -> Result<Vec<CompanyRow>, FTError> {
        self.client.company_rows(self.path)
    }
}
