//! Flight search: criteria from the homepage form, the results page filters
//! and the flight cards it shows.

use std::cmp::Ordering;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::api::{Airport, ApiClient, Flight, FlightQuery};
use crate::domain::FTError;
use crate::format::{format_currency, format_time, plural, stops_text};
use crate::markup::Element;
use crate::storage::{FLIGHT_SEARCH, SELECTED_FLIGHT, Storage};

pub const NO_SEARCH_DATA: &str = "No search data found. Please search for flights again.";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TripType {
    Roundtrip,
    Oneway,
}

/// Search criteria as stored under `flightSearch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSearch {
    pub origin: String,
    pub destination: String,
    pub depart_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<NaiveDate>,
    pub trip_type: TripType,
    pub passengers: u32,
}

impl FlightSearch {
    pub fn new(
        origin: &str,
        destination: &str,
        depart_date: NaiveDate,
        return_date: Option<NaiveDate>,
        trip_type: TripType,
        passengers: u32,
        today: NaiveDate,
    ) -> Result<Self, FTError> {
        let origin = origin.trim().to_uppercase();
        let destination = destination.trim().to_uppercase();
        if origin.is_empty() || destination.is_empty() {
            return Err(FTError::InvalidInput(
                "Please select a departure and an arrival city.".into(),
            ));
        }
        if origin == destination {
            return Err(FTError::InvalidInput(
                "Origin and destination cannot be the same city.".into(),
            ));
        }
        if depart_date < today {
            return Err(FTError::InvalidInput(format!(
                "Departure date must not be before {today}."
            )));
        }
        if passengers == 0 {
            return Err(FTError::InvalidInput("At least one passenger is required.".into()));
        }
        let return_date = match trip_type {
            TripType::Oneway => None,
            TripType::Roundtrip => {
                if let Some(r) = return_date
                    && r < depart_date
                {
                    return Err(FTError::InvalidInput(
                        "Return date must not be before the departure date.".into(),
                    ));
                }
                return_date
            }
        };
        Ok(Self {
            origin,
            destination,
            depart_date,
            return_date,
            trip_type,
            passengers,
        })
    }

    /// `"JFK to LAX • Tuesday, October 20, 2026 • 1 passenger"`
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{} to {} • {}",
            self.origin,
            self.destination,
            long_date(self.depart_date)
        );
        if self.trip_type == TripType::Roundtrip
            && let Some(r) = self.return_date
        {
            text.push_str(&format!(" • Return {}", long_date(r)));
        }
        text.push_str(&format!(" • {}", plural(self.passengers as usize, "passenger")));
        text
    }

    pub fn query(&self, limit: usize) -> FlightQuery {
        FlightQuery {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            date: self.depart_date.format("%Y-%m-%d").to_string(),
            limit,
            ..FlightQuery::default()
        }
    }
}

fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Departure defaults to tomorrow, the return flight to a week from today.
pub fn default_dates(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let next_week = today.checked_add_days(Days::new(7)).unwrap_or(tomorrow);
    (tomorrow, next_week)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AirportOption {
    pub value: String,
    pub label: String,
    pub disabled: bool,
}

/// Options for the origin (`origin == None`) or destination select. The
/// destination list disables the chosen origin.
pub fn airport_options(airports: &[Airport], origin: Option<&str>) -> Vec<AirportOption> {
    let placeholder = match origin {
        None => "Select departure city",
        Some(_) => "Select arrival city",
    };
    let mut options = vec![AirportOption {
        value: String::new(),
        label: placeholder.to_string(),
        disabled: false,
    }];
    options.extend(airports.iter().map(|a| AirportOption {
        value: a.code.clone(),
        label: a.label(),
        disabled: origin.is_some_and(|o| o.eq_ignore_ascii_case(&a.code)),
    }));
    options
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub fn from_departure(time: &str) -> TimeOfDay {
        let hour = time
            .split(':')
            .next()
            .and_then(|h| h.trim().parse::<u32>().ok())
            .unwrap_or(0);
        match hour {
            6..=11 => TimeOfDay::Morning,
            12..=17 => TimeOfDay::Afternoon,
            _ => TimeOfDay::Evening,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, clap::ValueEnum)]
pub enum SortBy {
    #[default]
    Price,
    Duration,
    Departure,
    Arrival,
    Stops,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Price => "price",
            SortBy::Duration => "duration",
            SortBy::Departure => "departure",
            SortBy::Arrival => "arrival",
            SortBy::Stops => "stops",
        }
    }
}

/// Filters of the results page sidebar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultFilters {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub airlines: Vec<String>,
    pub stops: Vec<u32>,
    pub departure_times: Vec<TimeOfDay>,
    pub route_types: Vec<String>,
}

impl ResultFilters {
    pub fn is_empty(&self) -> bool {
        *self == ResultFilters::default()
    }

    /// The API takes one value per multi-select, so only the first one is sent.
    pub fn apply_to(&self, query: &mut FlightQuery) {
        query.min_price = self.min_price.filter(|p| *p > 0.0);
        query.max_price = self.max_price.filter(|p| *p > 0.0);
        query.stops = self.stops.first().copied();
        query.airline = self.airlines.first().cloned();
        query.departure_time = self.departure_times.first().map(|t| t.as_str().to_string());
    }

    /// Local evaluation used when the filtered request fails.
    pub fn matches(&self, flight: &Flight) -> bool {
        if self.min_price.is_some_and(|min| min > 0.0 && flight.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| max > 0.0 && flight.price > max) {
            return false;
        }
        if !self.airlines.is_empty() && !self.airlines.contains(&flight.airline) {
            return false;
        }
        if !self.stops.is_empty() && !self.stops.contains(&flight.stops) {
            return false;
        }
        if !self.departure_times.is_empty()
            && !self
                .departure_times
                .contains(&TimeOfDay::from_departure(&flight.departure_time))
        {
            return false;
        }
        self.matches_route_type(flight)
    }

    /// The API has no route type parameter, so this is always checked here.
    pub fn matches_route_type(&self, flight: &Flight) -> bool {
        self.route_types.is_empty() || self.route_types.contains(&flight.route_type)
    }
}

fn duration_hours(duration: &str) -> f64 {
    duration
        .split('h')
        .next()
        .and_then(|h| h.trim().parse().ok())
        .unwrap_or(0.0)
}

/// Client side ordering. Arrival and stops are only ordered by the server.
pub fn sort_flights(flights: &mut [Flight], sort_by: SortBy) {
    match sort_by {
        SortBy::Price => flights.sort_by(|a, b| {
            a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal)
        }),
        SortBy::Duration => flights.sort_by(|a, b| {
            duration_hours(&a.duration)
                .partial_cmp(&duration_hours(&b.duration))
                .unwrap_or(Ordering::Equal)
        }),
        SortBy::Departure => flights.sort_by(|a, b| a.departure_time.cmp(&b.departure_time)),
        SortBy::Arrival | SortBy::Stops => {}
    }
}

pub fn result_count(total: usize, shown: usize) -> String {
    let noun = if total == 1 { "flight" } else { "flights" };
    if shown == total {
        format!("{total} {noun} found")
    } else {
        format!("{shown} of {total} {noun} shown")
    }
}

pub trait FlightSource {
    fn fetch_flights(&self, query: &FlightQuery) -> Result<Vec<Flight>, FTError>;
}

impl FlightSource for ApiClient {
    fn fetch_flights(&self, query: &FlightQuery) -> Result<Vec<Flight>, FTError> {
        self.flights(query)
    }
}

#[derive(Debug, Default)]
pub struct SearchResults {
    pub all: Vec<Flight>,
    pub shown: Vec<Flight>,
}

impl SearchResults {
    /// Unfiltered results for the stored search.
    pub fn load(
        source: &dyn FlightSource,
        search: &FlightSearch,
        limit: usize,
    ) -> Result<Self, FTError> {
        let flights = source.fetch_flights(&search.query(limit)).map_err(|e| {
            error!("Error loading flights: {e}");
            e
        })?;
        info!("Loaded {} flights for {}", flights.len(), search.summary());
        Ok(Self {
            shown: flights.clone(),
            all: flights,
        })
    }

    /// Asks the server for filtered results. If that request fails the
    /// filters and sort are applied locally to the unfiltered results.
    pub fn apply_filters(
        &mut self,
        source: &dyn FlightSource,
        search: &FlightSearch,
        filters: &ResultFilters,
        sort_by: SortBy,
        limit: usize,
    ) {
        let mut query = search.query(limit);
        filters.apply_to(&mut query);
        query.sort_by = Some(sort_by.as_str().to_string());
        debug!("Applying filters {:?}", query);

        match source.fetch_flights(&query) {
            Ok(flights) => {
                self.shown = flights
                    .into_iter()
                    .filter(|f| filters.matches_route_type(f))
                    .collect();
            }
            Err(e) => {
                warn!("Error applying filters, filtering locally: {e}");
                self.shown = self
                    .all
                    .iter()
                    .filter(|f| filters.matches(f))
                    .cloned()
                    .collect();
                sort_flights(&mut self.shown, sort_by);
            }
        }
    }

    pub fn count_text(&self) -> String {
        result_count(self.all.len(), self.shown.len())
    }

    pub fn find(&self, id: &str) -> Option<&Flight> {
        self.all
            .iter()
            .chain(self.shown.iter())
            .find(|f| f.id == id)
    }

    pub fn markup(&self) -> Element {
        let container = Element::new("div").attr("id", "flightResults");
        if self.shown.is_empty() {
            container.child(empty_results())
        } else {
            container.children(self.shown.iter().map(flight_card))
        }
    }
}

pub fn empty_results() -> Element {
    Element::new("div")
        .class("text-center py-5")
        .child(Element::new("h5").text("No flights found"))
        .child(
            Element::new("p")
                .class("text-muted")
                .text("Try adjusting your search criteria or filters."),
        )
}

fn route_info(airport: &Airport, time: &str) -> Element {
    Element::new("div")
        .class("route-info")
        .child(Element::new("div").class("airport-code").text(airport.code.clone()))
        .child(Element::new("div").class("city-name").text(airport.city.clone()))
        .child(Element::new("div").class("time").text(format_time(time)))
}

fn detail_item(label: &str, value: String) -> Element {
    Element::new("div")
        .class("detail-item")
        .child(Element::new("div").class("detail-label").text(label))
        .child(Element::new("div").class("detail-value").text(value))
}

pub fn route_badge(route_type: &str) -> &'static str {
    if route_type == "major" {
        "Major Route"
    } else {
        "Regional"
    }
}

pub fn flight_card(flight: &Flight) -> Element {
    let badge_class = if flight.route_type == "major" {
        "badge bg-success me-2"
    } else {
        "badge bg-info me-2"
    };
    Element::new("div")
        .class("card flight-card mb-3")
        .attr("data-flight-id", flight.id.clone())
        .child(
            Element::new("div")
                .class("flight-badges")
                .child(Element::new("span").class(badge_class).text(route_badge(&flight.route_type)))
                .child(Element::new("span").class("badge bg-primary").text(flight.airline.clone()))
                .child(
                    Element::new("small")
                        .class("text-muted")
                        .text(format!("{} seats available", flight.available_seats)),
                ),
        )
        .child(
            Element::new("div")
                .class("flight-route")
                .child(route_info(&flight.departure_airport, &flight.departure_time))
                .child(
                    Element::new("div")
                        .class("flight-duration")
                        .text(flight.duration.clone()),
                )
                .child(route_info(&flight.arrival_airport, &flight.arrival_time)),
        )
        .child(
            Element::new("div")
                .class("flight-details")
                .child(detail_item("Stops", stops_text(flight.stops)))
                .child(detail_item("Aircraft", flight.aircraft.clone()))
                .child(detail_item("Flight", flight.id.clone())),
        )
        .child(
            Element::new("div")
                .class("flight-price")
                .child(Element::new("div").class("price-amount").text(format_currency(flight.price)))
                .child(Element::new("div").class("price-label").text("per passenger")),
        )
}

/// One line per flight for the terminal.
pub fn flight_line(flight: &Flight) -> String {
    format!(
        "{:<7} {} {} → {} {}  {:>8}  {:<8}  {:<10} {} ({}, {} seats)",
        flight.id,
        flight.departure_airport.code,
        format_time(&flight.departure_time),
        flight.arrival_airport.code,
        format_time(&flight.arrival_time),
        format_currency(flight.price),
        flight.duration,
        stops_text(flight.stops),
        flight.airline,
        route_badge(&flight.route_type),
        flight.available_seats,
    )
}

/// Reads the stored search; without it the results page cannot do anything.
pub fn stored_search(storage: &impl Storage) -> Result<FlightSearch, FTError> {
    storage
        .get_json::<FlightSearch>(FLIGHT_SEARCH)?
        .ok_or(FTError::MissingData(FLIGHT_SEARCH))
}

pub fn select_flight(storage: &mut impl Storage, flight: &Flight) -> Result<(), FTError> {
    storage.set_json(SELECTED_FLIGHT, flight)?;
    info!("Selected flight {}", flight.id);
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::cell::RefCell;

    pub(crate) fn flight(id: &str, price: f64, departure: &str, duration: &str, stops: u32) -> Flight {
        Flight {
            id: id.to_string(),
            airline: "American Airlines".to_string(),
            price,
            stops,
            departure_time: departure.to_string(),
            arrival_time: "23:10".to_string(),
            duration: duration.to_string(),
            aircraft: "Airbus A321".to_string(),
            available_seats: 12,
            route_type: "major".to_string(),
            departure_airport: Airport {
                code: "JFK".to_string(),
                city: "New York".to_string(),
                name: None,
            },
            arrival_airport: Airport {
                code: "LAX".to_string(),
                city: "Los Angeles".to_string(),
                name: None,
            },
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn search() -> FlightSearch {
        FlightSearch::new(
            "jfk",
            "lax",
            date(2026, 10, 20),
            Some(date(2026, 10, 25)),
            TripType::Roundtrip,
            2,
            date(2026, 10, 18),
        )
        .unwrap()
    }

    struct Canned {
        unfiltered: Vec<Flight>,
        fail_filtered: bool,
        queries: RefCell<Vec<FlightQuery>>,
    }

    impl FlightSource for Canned {
        fn fetch_flights(&self, query: &FlightQuery) -> Result<Vec<Flight>, FTError> {
            self.queries.borrow_mut().push(query.clone());
            if query.sort_by.is_some() && self.fail_filtered {
                return Err(FTError::HttpStatus {
                    endpoint: "/api/flights".into(),
                    status: 503,
                });
            }
            Ok(self.unfiltered.clone())
        }
    }

    #[test]
    fn same_origin_and_destination_is_rejected() {
        let today = date(2026, 10, 18);
        let result = FlightSearch::new("JFK", "jfk", today, None, TripType::Oneway, 1, today);
        match result {
            Err(FTError::InvalidInput(msg)) => {
                assert_eq!(msg, "Origin and destination cannot be the same city.")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn past_departure_is_rejected() {
        let today = date(2026, 10, 18);
        assert!(
            FlightSearch::new("JFK", "LAX", date(2026, 10, 17), None, TripType::Oneway, 1, today)
                .is_err()
        );
    }

    #[test]
    fn one_way_drops_return_date() {
        let today = date(2026, 10, 18);
        let s = FlightSearch::new(
            "JFK",
            "LAX",
            today,
            Some(date(2026, 10, 30)),
            TripType::Oneway,
            1,
            today,
        )
        .unwrap();
        assert_eq!(s.return_date, None);
    }

    #[test]
    fn summary_lists_dates_and_passengers() {
        assert_eq!(
            search().summary(),
            "JFK to LAX • Tuesday, October 20, 2026 • Return Sunday, October 25, 2026 • 2 passengers"
        );
    }

    #[test]
    fn stored_search_uses_site_field_names() {
        let json = serde_json::to_value(search()).unwrap();
        assert_eq!(json["departDate"], "2026-10-20");
        assert_eq!(json["tripType"], "roundtrip");
        assert_eq!(json["returnDate"], "2026-10-25");
    }

    #[test]
    fn default_dates_are_tomorrow_and_next_week() {
        let (depart, ret) = default_dates(date(2026, 12, 30));
        assert_eq!(depart, date(2026, 12, 31));
        assert_eq!(ret, date(2027, 1, 6));
    }

    #[test]
    fn destination_options_disable_origin() {
        let airports = vec![
            Airport { code: "JFK".into(), city: "New York".into(), name: None },
            Airport { code: "DFW".into(), city: "Dallas".into(), name: None },
        ];
        let options = airport_options(&airports, Some("JFK"));
        assert_eq!(options[0].label, "Select arrival city");
        assert_eq!(options[1].label, "New York (JFK)");
        assert!(options[1].disabled);
        assert!(!options[2].disabled);
    }

    #[test]
    fn time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_departure("06:00"), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_departure("11:59"), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_departure("12:00"), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_departure("18:15"), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_departure("05:30"), TimeOfDay::Evening);
    }

    #[test]
    fn only_first_multi_select_values_are_sent() {
        let filters = ResultFilters {
            min_price: Some(100.0),
            airlines: vec!["American Eagle".into(), "American Airlines".into()],
            stops: vec![0, 1],
            departure_times: vec![TimeOfDay::Evening, TimeOfDay::Morning],
            ..ResultFilters::default()
        };
        let mut query = search().query(100);
        filters.apply_to(&mut query);
        assert_eq!(query.airline.as_deref(), Some("American Eagle"));
        assert_eq!(query.stops, Some(0));
        assert_eq!(query.departure_time.as_deref(), Some("evening"));
        assert_eq!(query.min_price, Some(100.0));
        assert_eq!(query.max_price, None);
    }

    #[test]
    fn failed_filter_request_falls_back_to_local_filtering() {
        let source = Canned {
            unfiltered: vec![
                flight("AA1", 420.0, "07:00", "5h 10m", 0),
                flight("AA2", 180.0, "13:30", "6h 0m", 1),
                flight("AA3", 250.0, "19:45", "5h 40m", 0),
                flight("AA4", 199.0, "08:15", "5h 5m", 0),
            ],
            fail_filtered: true,
            queries: RefCell::new(Vec::new()),
        };
        let search = search();
        let mut results = SearchResults::load(&source, &search, 100).unwrap();
        assert_eq!(results.count_text(), "4 flights found");

        let filters = ResultFilters {
            max_price: Some(300.0),
            stops: vec![0],
            ..ResultFilters::default()
        };
        results.apply_filters(&source, &search, &filters, SortBy::Price, 100);
        let ids: Vec<&str> = results.shown.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["AA4", "AA3"]);
        assert_eq!(results.count_text(), "2 of 4 flights shown");
        assert_eq!(source.queries.borrow().len(), 2);
    }

    #[test]
    fn server_results_are_narrowed_by_route_type() {
        let mut regional = flight("AA2", 180.0, "13:30", "6h 0m", 1);
        regional.route_type = "regional".to_string();
        let source = Canned {
            unfiltered: vec![flight("AA1", 420.0, "07:00", "5h 10m", 0), regional],
            fail_filtered: false,
            queries: RefCell::new(Vec::new()),
        };
        let search = search();
        let mut results = SearchResults::load(&source, &search, 100).unwrap();
        let filters = ResultFilters {
            route_types: vec!["regional".into()],
            ..ResultFilters::default()
        };
        results.apply_filters(&source, &search, &filters, SortBy::Price, 100);
        let ids: Vec<&str> = results.shown.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["AA2"]);
        assert_eq!(results.count_text(), "1 of 2 flights shown");
    }

    #[test]
    fn client_sorts() {
        let mut flights = vec![
            flight("A", 300.0, "14:00", "10h 5m", 0),
            flight("B", 150.0, "09:30", "2h 50m", 0),
            flight("C", 220.0, "06:45", "4h 0m", 0),
        ];
        sort_flights(&mut flights, SortBy::Duration);
        assert_eq!(flights.iter().map(|f| f.id.as_str()).collect::<String>(), "BCA");
        sort_flights(&mut flights, SortBy::Departure);
        assert_eq!(flights.iter().map(|f| f.id.as_str()).collect::<String>(), "CBA");
        sort_flights(&mut flights, SortBy::Price);
        assert_eq!(flights.iter().map(|f| f.id.as_str()).collect::<String>(), "BCA");
    }

    #[test]
    fn result_count_wording() {
        assert_eq!(result_count(1, 1), "1 flight found");
        assert_eq!(result_count(0, 0), "0 flights found");
        assert_eq!(result_count(1, 0), "0 of 1 flight shown");
    }

    #[test]
    fn missing_search_is_reported() {
        let storage = MemoryStorage::default();
        assert!(matches!(
            stored_search(&storage),
            Err(FTError::MissingData(FLIGHT_SEARCH))
        ));
    }

    #[test]
    fn selected_flight_is_stored() {
        let mut storage = MemoryStorage::default();
        select_flight(&mut storage, &flight("AA7", 99.0, "10:00", "1h 0m", 0)).unwrap();
        let stored: Flight = storage.get_json(SELECTED_FLIGHT).unwrap().unwrap();
        assert_eq!(stored.id, "AA7");
    }

    #[test]
    fn cards_show_formatted_values() {
        let html = flight_card(&flight("AA9", 1250.0, "14:05", "5h 0m", 2)).render();
        assert!(html.contains("2:05 PM"));
        assert!(html.contains("$1,250.00"));
        assert!(html.contains("2 stops"));
        assert!(html.contains("Major Route"));
        let empty = SearchResults::default().markup().render();
        assert!(empty.contains("No flights found"));
    }
}
