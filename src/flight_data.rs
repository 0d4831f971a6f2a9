// Flight quote handed from the search client to the orchestrator and the notifier.

use serde::Serialize;

/// Placeholder for any field the search could not fill.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlightQuote {
    // kept as the API's decimal text ("822.63"); parsed only when compared
    pub price: String,
    pub origin_city: String,
    pub origin_airport: String,
    pub destination_city: String,
    pub destination_airport: String,
    pub out_date: String,
    pub return_date: String,
    // every segment across outbound and return itineraries
    pub total_segments: u32,
}

impl FlightQuote {
    /// The "no usable offer" quote: every field N/A and zero segments.
    pub fn unavailable(origin_city: &str, destination_city: &str) -> Self {
        Self {
            price: NOT_AVAILABLE.to_string(),
            origin_city: origin_city.to_string(),
            origin_airport: NOT_AVAILABLE.to_string(),
            destination_city: destination_city.to_string(),
            destination_airport: NOT_AVAILABLE.to_string(),
            out_date: NOT_AVAILABLE.to_string(),
            return_date: NOT_AVAILABLE.to_string(),
            total_segments: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.price != NOT_AVAILABLE
    }

    pub fn numeric_price(&self) -> Option<f64> {
        if !self.is_available() {
            return None;
        }
        self.price.trim().parse::<f64>().ok().filter(|p| p.is_finite())
    }
}

/// What a single offer search produced, before it is folded into a quote.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(FlightQuote),
    NoOffers,
    RateLimited { attempts: u32 },
    Rejected { status: u16 },
    Malformed(String),
}

impl SearchOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found(_))
    }

    pub fn into_quote(self, query: &RoundTripQuery) -> FlightQuote {
        match self {
            SearchOutcome::Found(quote) => quote,
            _ => FlightQuote::unavailable(query.origin_display(), query.destination_display()),
        }
    }
}

/// Parameters of one cheapest round-trip search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundTripQuery {
    pub origin_code: String,
    pub destination_code: String,
    pub departure_date: String,
    pub return_date: String,
    pub destination_city: Option<String>,
    pub origin_city: Option<String>,
}

impl RoundTripQuery {
    pub fn new(
        origin_code: &str,
        destination_code: &str,
        departure_date: &str,
        return_date: &str,
    ) -> Self {
        Self {
            origin_code: origin_code.to_string(),
            destination_code: destination_code.to_string(),
            departure_date: departure_date.to_string(),
            return_date: return_date.to_string(),
            ..Default::default()
        }
    }

    pub fn with_destination_city(mut self, city: &str) -> Self {
        self.destination_city = Some(city.to_string());
        self
    }

    pub fn with_origin_city(mut self, city: &str) -> Self {
        self.origin_city = Some(city.to_string());
        self
    }

    /// Caller-supplied name, else the raw code.
    pub fn origin_display(&self) -> &str {
        pick_name(self.origin_city.as_deref(), &self.origin_code)
    }

    pub fn destination_display(&self) -> &str {
        pick_name(self.destination_city.as_deref(), &self.destination_code)
    }
}

fn pick_name<'a>(hint: Option<&'a str>, code: &'a str) -> &'a str {
    match hint {
        Some(name) if !name.trim().is_empty() => name,
        _ => code,
    }
}
