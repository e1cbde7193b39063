//! Booking page: price summary, passenger form and the simulated checkout.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::Flight;
use crate::domain::{FTError, FieldError, Notification};
use crate::format::{format_currency, format_time, stops_text};
use crate::markup::Element;
use crate::storage::{PASSENGER_FORM_DATA, SELECTED_FLIGHT, Storage};

pub const NO_FLIGHT_SELECTED: &str = "No flight selected. Please search for flights again.";
pub const FORM_INVALID: &str = "Please fill in all required fields correctly.";
pub const TERMS_NOT_ACCEPTED: &str = "Please accept the terms and conditions";
pub const BOOKING_SUCCESS: &str = "Flight booking successful! Redirecting to confirmation...";
pub const BOOKING_CONFIRMED: &str =
    "Thank you for your booking! Your confirmation has been sent to your email.";

pub const PRIORITY_BOARDING_COST: f64 = 25.0;
pub const CHECKED_BAG_COST: f64 = 30.0;

pub const PROGRESS_STEPS: [&str; 4] = ["Flight", "Passenger", "Payment", "Confirmation"];

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\+]?[1-9][\d]{0,15}$").expect("valid phone regex"));

/// Surcharge of a seat type radio value. Unknown values cost nothing.
pub fn seat_cost(seat_type: &str) -> f64 {
    match seat_type {
        "economy_standard" => 15.0,
        "economy_premium" => 35.0,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdditionalCosts {
    pub seat_selection: f64,
    pub priority_boarding: f64,
    pub checked_bag: f64,
}

impl AdditionalCosts {
    pub fn select_seat(&mut self, seat_type: &str) {
        self.seat_selection = seat_cost(seat_type);
    }

    pub fn set_upgrades(&mut self, priority_boarding: bool, checked_bag: bool) {
        self.priority_boarding = if priority_boarding { PRIORITY_BOARDING_COST } else { 0.0 };
        self.checked_bag = if checked_bag { CHECKED_BAG_COST } else { 0.0 };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSummary {
    pub lines: Vec<(&'static str, f64)>,
    pub total: f64,
}

impl PriceSummary {
    pub fn new(base_fare: f64, costs: &AdditionalCosts) -> Self {
        let mut lines = vec![("Base Fare", base_fare)];
        for (label, amount) in [
            ("Seat Selection", costs.seat_selection),
            ("Priority Boarding", costs.priority_boarding),
            ("Checked Bag", costs.checked_bag),
        ] {
            if amount > 0.0 {
                lines.push((label, amount));
            }
        }
        let total = base_fare + costs.seat_selection + costs.priority_boarding + costs.checked_bag;
        Self { lines, total }
    }

    pub fn total_text(&self) -> String {
        format_currency(self.total)
    }

    pub fn markup(&self) -> Element {
        let item = |label: &str, amount: f64, class: &str| {
            Element::new("div")
                .class(class.to_string())
                .child(Element::new("span").text(label))
                .child(Element::new("span").text(format_currency(amount)))
        };
        Element::new("div")
            .attr("id", "priceSummary")
            .children(self.lines.iter().map(|(l, a)| item(*l, *a, "price-item")))
            .child(Element::new("hr"))
            .child(item("Total", self.total, "price-item price-total"))
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (label, amount) in &self.lines {
            out.push_str(&format!("{label:<20}{:>12}\n", format_currency(*amount)));
        }
        out.push_str(&format!("{}\n", "-".repeat(32)));
        out.push_str(&format!("{:<20}{:>12}\n", "Total", self.total_text()));
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text,
    Email,
    Tel,
    Date,
}

/// Checks one field the way the form does when it loses focus.
pub fn validate_field(kind: FieldKind, required: bool, value: &str) -> Result<(), String> {
    let value = value.trim();
    if required && value.is_empty() {
        return Err("This field is required".to_string());
    }
    if value.is_empty() {
        return Ok(());
    }
    match kind {
        FieldKind::Email if !EMAIL.is_match(value) => {
            Err("Please enter a valid email address".to_string())
        }
        FieldKind::Tel => {
            let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
            if PHONE.is_match(&digits) {
                Ok(())
            } else {
                Err("Please enter a valid phone number".to_string())
            }
        }
        _ => Ok(()),
    }
}

/// Passenger fields, autosaved under `passengerFormData`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PassengerForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub passport_number: String,
    pub address: String,
}

impl PassengerForm {
    const FIELDS: [(&'static str, FieldKind, bool); 7] = [
        ("firstName", FieldKind::Text, true),
        ("lastName", FieldKind::Text, true),
        ("email", FieldKind::Email, true),
        ("phone", FieldKind::Tel, true),
        ("dateOfBirth", FieldKind::Date, true),
        ("passportNumber", FieldKind::Text, false),
        ("address", FieldKind::Text, false),
    ];

    pub fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "firstName" => &self.first_name,
            "lastName" => &self.last_name,
            "email" => &self.email,
            "phone" => &self.phone,
            "dateOfBirth" => &self.date_of_birth,
            "passportNumber" => &self.passport_number,
            "address" => &self.address,
            _ => return None,
        };
        Some(value.as_str())
    }

    pub fn set(&mut self, field: &str, value: &str) -> Result<(), FTError> {
        let slot = match field {
            "firstName" => &mut self.first_name,
            "lastName" => &mut self.last_name,
            "email" => &mut self.email,
            "phone" => &mut self.phone,
            "dateOfBirth" => &mut self.date_of_birth,
            "passportNumber" => &mut self.passport_number,
            "address" => &mut self.address,
            other => return Err(FTError::InvalidInput(format!("unknown field {other}"))),
        };
        *slot = value.to_string();
        Ok(())
    }

    /// Sets a field and saves the whole form, like every keystroke does.
    pub fn input(&mut self, storage: &mut impl Storage, field: &str, value: &str) -> Result<(), FTError> {
        self.set(field, value)?;
        self.autosave(storage)
    }

    pub fn autosave(&self, storage: &mut impl Storage) -> Result<(), FTError> {
        storage.set_json(PASSENGER_FORM_DATA, self)?;
        debug!("Autosaved passenger form");
        Ok(())
    }

    /// Previously saved values, or an empty form. A corrupt entry is ignored.
    pub fn restore(storage: &impl Storage) -> Self {
        match storage.get_json::<PassengerForm>(PASSENGER_FORM_DATA) {
            Ok(Some(form)) => form,
            Ok(None) => PassengerForm::default(),
            Err(e) => {
                warn!("Ignoring saved passenger form: {e}");
                PassengerForm::default()
            }
        }
    }

    pub fn validate(&self) -> Vec<FieldError> {
        Self::FIELDS
            .iter()
            .filter_map(|(name, kind, required)| {
                let value = self.get(name).unwrap_or("");
                validate_field(*kind, *required, value)
                    .err()
                    .map(|msg| FieldError::new(*name, msg))
            })
            .collect()
    }
}

/// Payment inputs. Only formatted and checked for presence; nothing is charged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentForm {
    pub card_name: String,
    pub card_number: String,
    pub expiry_date: String,
    pub cvv: String,
}

impl PaymentForm {
    pub fn new(card_name: &str, card_number: &str, expiry_date: &str, cvv: &str) -> Self {
        Self {
            card_name: card_name.to_string(),
            card_number: format_card_number(card_number),
            expiry_date: format_expiry_date(expiry_date),
            cvv: format_cvv(cvv),
        }
    }

    pub fn validate(&self) -> Vec<FieldError> {
        [
            ("cardName", &self.card_name),
            ("cardNumber", &self.card_number),
            ("expiryDate", &self.expiry_date),
            ("cvv", &self.cvv),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            validate_field(FieldKind::Text, true, value)
                .err()
                .map(|msg| FieldError::new(name, msg))
        })
        .collect()
    }
}

fn digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Groups digits by four, `"4111111111111111"` → `"4111 1111 1111 1111"`.
pub fn format_card_number(value: &str) -> String {
    let digits = digits(value);
    let mut out = String::with_capacity(digits.len() + digits.len() / 4);
    for (idx, chr) in digits.chars().enumerate() {
        if idx > 0 && idx % 4 == 0 {
            out.push(' ');
        }
        out.push(chr);
    }
    out.chars().take(19).collect()
}

/// `"1228"` → `"12/28"`.
pub fn format_expiry_date(value: &str) -> String {
    let digits = digits(value);
    let formatted = if digits.len() >= 2 {
        let rest: String = digits.chars().skip(2).take(2).collect();
        format!("{}/{}", &digits[..2], rest)
    } else {
        digits
    };
    formatted.chars().take(5).collect()
}

pub fn format_cvv(value: &str) -> String {
    digits(value).chars().take(4).collect()
}

/// Which progress steps are marked active for the current step.
pub fn progress(step: usize) -> Vec<(&'static str, bool)> {
    PROGRESS_STEPS
        .iter()
        .enumerate()
        .map(|(idx, name)| (*name, idx <= step))
        .collect()
}

/// Navigation the page performs on its own after a delay.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub to: &'static str,
    pub after: Duration,
}

pub struct BookingPage {
    pub flight: Flight,
    pub costs: AdditionalCosts,
    pub seat_type: String,
}

impl BookingPage {
    /// Opens the page for the flight in session storage. Without one the
    /// page shows an error and sends the user back home.
    pub fn load(session: &impl Storage, redirect_delay: Duration) -> Result<Self, (FTError, Redirect)> {
        let redirect = Redirect {
            to: "/",
            after: redirect_delay,
        };
        match session.get_json::<Flight>(SELECTED_FLIGHT) {
            Ok(Some(flight)) => {
                info!("Booking page for flight {}", flight.id);
                Ok(Self {
                    flight,
                    costs: AdditionalCosts::default(),
                    seat_type: "economy_basic".to_string(),
                })
            }
            Ok(None) => Err((FTError::MissingData(SELECTED_FLIGHT), redirect)),
            Err(e) => Err((e, redirect)),
        }
    }

    pub fn select_seat(&mut self, seat_type: &str) {
        self.seat_type = seat_type.to_string();
        self.costs.select_seat(seat_type);
    }

    pub fn set_upgrades(&mut self, priority_boarding: bool, checked_bag: bool) {
        self.costs.set_upgrades(priority_boarding, checked_bag);
    }

    pub fn price_summary(&self) -> PriceSummary {
        PriceSummary::new(self.flight.price, &self.costs)
    }

    pub fn flight_summary(&self) -> Vec<(&'static str, String)> {
        let f = &self.flight;
        vec![
            (
                "From",
                format!("{} {} {}", f.departure_airport.code, f.departure_airport.city, format_time(&f.departure_time)),
            ),
            (
                "To",
                format!("{} {} {}", f.arrival_airport.code, f.arrival_airport.city, format_time(&f.arrival_time)),
            ),
            ("Duration", f.duration.clone()),
            ("Stops", stops_text(f.stops)),
            ("Airline", f.airline.clone()),
            ("Aircraft", f.aircraft.clone()),
            ("Price", format!("{} per passenger", format_currency(f.price))),
        ]
    }

    /// Validates everything and, if the user confirms, simulates the booking.
    /// Returns the notifications to show, in order.
    pub fn submit(
        &self,
        passenger: &PassengerForm,
        payment: &PaymentForm,
        terms_accepted: bool,
        confirm: impl FnOnce() -> bool,
    ) -> Result<Vec<Notification>, FTError> {
        let mut errors = passenger.validate();
        errors.extend(payment.validate());
        if !terms_accepted {
            errors.push(FieldError::new("termsAccept", TERMS_NOT_ACCEPTED));
        }
        if !errors.is_empty() {
            warn!("Booking blocked by {} invalid fields", errors.len());
            return Err(FTError::Validation(errors));
        }
        if !confirm() {
            info!("Booking not confirmed");
            return Ok(Vec::new());
        }
        info!(
            "Booked flight {} for {}",
            self.flight.id,
            self.price_summary().total_text()
        );
        Ok(vec![
            Notification::success(BOOKING_SUCCESS),
            Notification::success(BOOKING_CONFIRMED),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::tests::flight;
    use crate::storage::MemoryStorage;

    fn page() -> BookingPage {
        let mut session = MemoryStorage::default();
        session
            .set_json(SELECTED_FLIGHT, &flight("AA1000", 250.0, "14:05", "5h 20m", 0))
            .unwrap();
        BookingPage::load(&session, Duration::from_secs(3)).ok().unwrap()
    }

    fn valid_passenger() -> PassengerForm {
        PassengerForm {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "+1 (555) 012-3456".into(),
            date_of_birth: "1985-03-15".into(),
            ..PassengerForm::default()
        }
    }

    fn valid_payment() -> PaymentForm {
        PaymentForm::new("Ada Lovelace", "4111111111111111", "1228", "123")
    }

    #[test]
    fn premium_seat_with_priority_boarding_totals_310() {
        let mut page = page();
        page.select_seat("economy_premium");
        page.set_upgrades(true, false);
        let summary = page.price_summary();
        assert_eq!(summary.total, 310.0);
        assert_eq!(summary.total_text(), "$310.00");
        assert_eq!(
            summary.lines,
            vec![
                ("Base Fare", 250.0),
                ("Seat Selection", 35.0),
                ("Priority Boarding", 25.0)
            ]
        );
    }

    #[test]
    fn seat_costs() {
        assert_eq!(seat_cost("economy_basic"), 0.0);
        assert_eq!(seat_cost("economy_standard"), 15.0);
        assert_eq!(seat_cost("economy_premium"), 35.0);
        assert_eq!(seat_cost("first"), 0.0);
    }

    #[test]
    fn summary_markup_hides_zero_lines() {
        let mut costs = AdditionalCosts::default();
        costs.set_upgrades(false, true);
        let html = PriceSummary::new(100.0, &costs).markup().render();
        assert!(html.contains("<span>Checked Bag</span><span>$30.00</span>"));
        assert!(!html.contains("Seat Selection"));
        assert!(html.contains("<span>Total</span><span>$130.00</span>"));
    }

    #[test]
    fn missing_flight_redirects_home() {
        let session = MemoryStorage::default();
        match BookingPage::load(&session, Duration::from_secs(3)) {
            Err((FTError::MissingData(key), redirect)) => {
                assert_eq!(key, SELECTED_FLIGHT);
                assert_eq!(redirect.to, "/");
                assert_eq!(redirect.after, Duration::from_secs(3));
            }
            _ => panic!("expected a redirect"),
        }
    }

    #[test]
    fn field_validation_messages() {
        assert_eq!(
            validate_field(FieldKind::Text, true, "  "),
            Err("This field is required".to_string())
        );
        assert_eq!(
            validate_field(FieldKind::Email, true, "ada@example"),
            Err("Please enter a valid email address".to_string())
        );
        assert_eq!(validate_field(FieldKind::Email, true, "ada@example.com"), Ok(()));
        assert_eq!(validate_field(FieldKind::Tel, true, "+1 555-0123"), Ok(()));
        assert_eq!(
            validate_field(FieldKind::Tel, true, "0555"),
            Err("Please enter a valid phone number".to_string())
        );
        assert_eq!(validate_field(FieldKind::Tel, false, ""), Ok(()));
    }

    #[test]
    fn missing_terms_block_submission() {
        let page = page();
        let result = page.submit(&valid_passenger(), &valid_payment(), false, || -> bool {
            unreachable!("asked to confirm an invalid booking")
        });
        match result {
            Err(FTError::Validation(errors)) => {
                assert_eq!(errors, vec![FieldError::new("termsAccept", TERMS_NOT_ACCEPTED)]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_fields_are_all_reported() {
        let page = page();
        let mut passenger = valid_passenger();
        passenger.email = "nope".into();
        passenger.first_name.clear();
        let errors = match page.submit(&passenger, &PaymentForm::default(), true, || true) {
            Err(FTError::Validation(errors)) => errors,
            other => panic!("unexpected {other:?}"),
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["firstName", "email", "cardName", "cardNumber", "expiryDate", "cvv"]
        );
    }

    #[test]
    fn confirmed_booking_is_simulated() {
        let page = page();
        let notes = page
            .submit(&valid_passenger(), &valid_payment(), true, || true)
            .unwrap();
        let messages: Vec<&str> = notes.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec![BOOKING_SUCCESS, BOOKING_CONFIRMED]);

        let declined = page
            .submit(&valid_passenger(), &valid_payment(), true, || false)
            .unwrap();
        assert!(declined.is_empty());
    }

    #[test]
    fn passenger_form_is_autosaved_and_restored() {
        let mut storage = MemoryStorage::default();
        let mut form = PassengerForm::restore(&storage);
        assert_eq!(form, PassengerForm::default());
        form.input(&mut storage, "firstName", "Grace").unwrap();
        form.input(&mut storage, "passportNumber", "US123").unwrap();

        let restored = PassengerForm::restore(&storage);
        assert_eq!(restored.first_name, "Grace");
        assert_eq!(restored.passport_number, "US123");
        let raw = storage.get_item(PASSENGER_FORM_DATA).unwrap();
        assert!(raw.contains("\"firstName\":\"Grace\""));
    }

    #[test]
    fn unknown_form_field_is_rejected() {
        let mut form = PassengerForm::default();
        assert!(form.set("nickname", "x").is_err());
    }

    #[test]
    fn payment_inputs_are_formatted() {
        assert_eq!(format_card_number("4111-1111-1111-1111"), "4111 1111 1111 1111");
        assert_eq!(format_card_number("41111111111111112222"), "4111 1111 1111 1111");
        assert_eq!(format_expiry_date("12/28"), "12/28");
        assert_eq!(format_expiry_date("1"), "1");
        assert_eq!(format_expiry_date("122030"), "12/20");
        assert_eq!(format_cvv("12a345"), "1234");
    }

    #[test]
    fn progress_marks_steps_up_to_current() {
        let steps = progress(1);
        assert_eq!(
            steps,
            vec![
                ("Flight", true),
                ("Passenger", true),
                ("Payment", false),
                ("Confirmation", false)
            ]
        );
    }
}
