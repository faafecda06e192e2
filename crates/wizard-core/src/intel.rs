//! Location enrichment records
//!
//! Three independent lookups (utility rate, solar resource, weather) each
//! settle into their own slot with a fetch status, so a failing source never
//! hides the others.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-slot fetch status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// Not requested
    #[default]
    Idle,
    /// Request in flight
    Fetching,
    /// Value available
    Ready,
    /// Lookup failed
    Error,
}

/// One enrichment slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelSlot<T> {
    /// Fetch status
    pub status: FetchStatus,
    /// Value once ready
    pub value: Option<T>,
    /// Failure message once errored
    pub error: Option<String>,
}

impl<T> Default for IntelSlot<T> {
    fn default() -> Self {
        Self {
            status: FetchStatus::Idle,
            value: None,
            error: None,
        }
    }
}

impl<T> IntelSlot<T> {
    fn fetching(&mut self) {
        self.status = FetchStatus::Fetching;
        self.error = None;
    }

    fn ready(&mut self, value: T) {
        self.status = FetchStatus::Ready;
        self.value = Some(value);
        self.error = None;
    }

    fn failed(&mut self, message: String) {
        self.status = FetchStatus::Error;
        self.error = Some(message);
    }
}

/// Utility tariff (every field optional; absence is a valid answer)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilityRate {
    /// Utility company
    pub utility_name: Option<String>,
    /// Energy rate ($/kWh)
    pub rate_per_kwh: Option<f64>,
    /// Demand charge ($/kW-month)
    pub demand_charge_per_kw: Option<f64>,
}

/// Solar resource at the site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolarResource {
    /// Peak sun hours per day
    pub peak_sun_hours: Option<f64>,
    /// Annual global horizontal irradiance (kWh/m²)
    pub annual_ghi: Option<f64>,
}

/// Climate summary at the site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherProfile {
    /// Climate zone label
    pub climate_zone: Option<String>,
    /// Annual heating degree days
    pub heating_degree_days: Option<f64>,
    /// Annual cooling degree days
    pub cooling_degree_days: Option<f64>,
}

/// Enrichment slot selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntelField {
    /// Utility rate lookup
    Utility,
    /// Solar resource lookup
    Solar,
    /// Weather lookup
    Weather,
}

impl IntelField {
    /// All slots
    pub const ALL: [IntelField; 3] = [IntelField::Utility, IntelField::Solar, IntelField::Weather];
}

/// Settled enrichment value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum IntelValue {
    /// Utility rate
    Utility(UtilityRate),
    /// Solar resource
    Solar(SolarResource),
    /// Weather profile
    Weather(WeatherProfile),
}

impl IntelValue {
    /// Slot this value belongs to
    #[inline]
    #[must_use]
    pub fn field(&self) -> IntelField {
        match self {
            IntelValue::Utility(_) => IntelField::Utility,
            IntelValue::Solar(_) => IntelField::Solar,
            IntelValue::Weather(_) => IntelField::Weather,
        }
    }
}

/// All enrichment slots for the current location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationIntel {
    /// Utility rate slot
    pub utility: IntelSlot<UtilityRate>,
    /// Solar resource slot
    pub solar: IntelSlot<SolarResource>,
    /// Weather slot
    pub weather: IntelSlot<WeatherProfile>,
}

impl LocationIntel {
    /// Status of one slot
    #[must_use]
    pub fn status(&self, field: IntelField) -> FetchStatus {
        match field {
            IntelField::Utility => self.utility.status,
            IntelField::Solar => self.solar.status,
            IntelField::Weather => self.weather.status,
        }
    }

    /// Mark a slot as in flight
    pub fn mark_fetching(&mut self, field: IntelField) {
        match field {
            IntelField::Utility => self.utility.fetching(),
            IntelField::Solar => self.solar.fetching(),
            IntelField::Weather => self.weather.fetching(),
        }
    }

    /// Store a settled value
    pub fn mark_ready(&mut self, value: IntelValue) {
        match value {
            IntelValue::Utility(v) => self.utility.ready(v),
            IntelValue::Solar(v) => self.solar.ready(v),
            IntelValue::Weather(v) => self.weather.ready(v),
        }
    }

    /// Record a failed lookup
    pub fn mark_failed(&mut self, field: IntelField, message: impl Into<String>) {
        let message = message.into();
        match field {
            IntelField::Utility => self.utility.failed(message),
            IntelField::Solar => self.solar.failed(message),
            IntelField::Weather => self.weather.failed(message),
        }
    }

    /// Check if every slot has settled
    #[must_use]
    pub fn all_settled(&self) -> bool {
        IntelField::ALL
            .iter()
            .all(|f| matches!(self.status(*f), FetchStatus::Ready | FetchStatus::Error))
    }

    /// Answer values derived from every ready slot
    #[must_use]
    pub fn answer_patch(&self) -> BTreeMap<String, Value> {
        let mut patch = BTreeMap::new();
        if let Some(utility) = &self.utility.value {
            patch.extend(answers_from(&IntelValue::Utility(utility.clone())));
        }
        if let Some(solar) = &self.solar.value {
            patch.extend(answers_from(&IntelValue::Solar(solar.clone())));
        }
        if let Some(weather) = &self.weather.value {
            patch.extend(answers_from(&IntelValue::Weather(weather.clone())));
        }
        patch
    }
}

/// Map one settled enrichment value onto profile answer keys.
#[must_use]
pub fn answers_from(value: &IntelValue) -> BTreeMap<String, Value> {
    let mut patch = BTreeMap::new();
    let mut put = |key: &str, v: Option<f64>| {
        if let Some(v) = v.filter(|v| v.is_finite()) {
            patch.insert(key.to_string(), Value::from(v));
        }
    };
    match value {
        IntelValue::Utility(u) => {
            put("electricityRate", u.rate_per_kwh);
            put("demandCharge", u.demand_charge_per_kw);
        }
        IntelValue::Solar(s) => put("peakSunHours", s.peak_sun_hours),
        IntelValue::Weather(w) => {
            put("coolingDegreeDays", w.cooling_degree_days);
            put("heatingDegreeDays", w.heating_degree_days);
        }
    }
    patch
}
