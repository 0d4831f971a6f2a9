// Flight offers response processing.
// Decodes the offer search payload into typed structs and reduces it to the
// cheapest offer's quote.

use crate::flight_data::{FlightQuote, RoundTripQuery, SearchOutcome, NOT_AVAILABLE};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OfferShapeError {
    #[error("Offer has no itineraries")]
    MissingItinerary,

    #[error("Itinerary {0} has no segments")]
    MissingSegments(usize),
}

#[derive(Debug, Default, Deserialize)]
pub struct FlightOffersResponse {
    #[serde(default)]
    pub data: Vec<FlightOffer>,
    #[serde(default)]
    pub dictionaries: Dictionaries,
}

#[derive(Debug, Default, Deserialize)]
pub struct Dictionaries {
    #[serde(default)]
    pub locations: HashMap<String, LocationEntry>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationEntry {
    #[serde(default)]
    pub city_code: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlightOffer {
    #[serde(default)]
    pub id: Option<String>,
    pub price: OfferPrice,
    #[serde(default)]
    pub itineraries: Vec<Itinerary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfferPrice {
    #[serde(deserialize_with = "decimal_text")]
    pub total: String,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Itinerary {
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub departure: SegmentEndpoint,
    pub arrival: SegmentEndpoint,
    #[serde(default)]
    pub carrier_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentEndpoint {
    pub iata_code: String,
    #[serde(default)]
    pub at: String,
}

// The API sends prices as strings; tolerate bare numbers without losing the text.
fn decimal_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected decimal price, got {other}"
        ))),
    }
}

impl FlightOffer {
    pub fn total_price(&self) -> Option<f64> {
        self.price
            .total
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite())
    }

    pub fn segment_count(&self) -> u32 {
        self.itineraries.iter().map(|it| it.segments.len() as u32).sum()
    }
}

impl Dictionaries {
    /// Uppercased country code for an airport, if the dictionary has one.
    pub fn country_code(&self, airport: &str) -> Option<String> {
        self.locations
            .get(airport)
            .and_then(|loc| loc.country_code.as_deref())
            .map(|cc| cc.trim().to_uppercase())
            .filter(|cc| !cc.is_empty())
    }
}

/// Lowest-priced offer; the first one wins a tie. Offers without a numeric
/// price are never picked.
pub fn cheapest_offer(offers: &[FlightOffer]) -> Option<&FlightOffer> {
    let mut best: Option<(&FlightOffer, f64)> = None;
    for offer in offers {
        let Some(price) = offer.total_price() else {
            continue;
        };
        match best {
            Some((_, lowest)) if price >= lowest => {}
            _ => best = Some((offer, price)),
        }
    }
    best.map(|(offer, _)| offer)
}

pub fn display_name(city: &str, country_code: Option<&str>) -> String {
    match country_code {
        Some(cc) if !cc.is_empty() => format!("{city}, {cc}"),
        _ => city.to_string(),
    }
}

fn date_part(timestamp: &str) -> String {
    match timestamp.split('T').next() {
        Some(date) if !date.is_empty() => date.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn quote_from_offer(
    offer: &FlightOffer,
    dictionaries: &Dictionaries,
    query: &RoundTripQuery,
) -> Result<FlightQuote, OfferShapeError> {
    let outbound = offer
        .itineraries
        .first()
        .ok_or(OfferShapeError::MissingItinerary)?;
    let (first_leg, last_leg) = match (outbound.segments.first(), outbound.segments.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(OfferShapeError::MissingSegments(0)),
    };

    let return_date = match offer.itineraries.get(1) {
        Some(inbound) => {
            let leg = inbound
                .segments
                .first()
                .ok_or(OfferShapeError::MissingSegments(1))?;
            date_part(&leg.departure.at)
        }
        None => NOT_AVAILABLE.to_string(),
    };

    let origin_airport = first_leg.departure.iata_code.clone();
    let destination_airport = last_leg.arrival.iata_code.clone();

    Ok(FlightQuote {
        price: offer.price.total.clone(),
        origin_city: display_name(
            query.origin_display(),
            dictionaries.country_code(&origin_airport).as_deref(),
        ),
        destination_city: display_name(
            query.destination_display(),
            dictionaries.country_code(&destination_airport).as_deref(),
        ),
        origin_airport,
        destination_airport,
        out_date: date_part(&first_leg.departure.at),
        return_date,
        total_segments: offer.segment_count(),
    })
}

/// Reduce a decoded response to the outcome of the search.
pub fn select_cheapest(response: &FlightOffersResponse, query: &RoundTripQuery) -> SearchOutcome {
    if response.data.is_empty() {
        return SearchOutcome::NoOffers;
    }

    let Some(offer) = cheapest_offer(&response.data) else {
        return SearchOutcome::Malformed("no offer carried a numeric price".to_string());
    };

    match quote_from_offer(offer, &response.dictionaries, query) {
        Ok(quote) => SearchOutcome::Found(quote),
        Err(e) => SearchOutcome::Malformed(e.to_string()),
    }
}
