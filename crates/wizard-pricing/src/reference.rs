//! Reference pricing layers
//!
//! Deterministic stand-ins for the production load and finance models, used
//! by the simulator and as a baseline in tests. The constants are rough
//! commercial averages, not a tariff engine.

use crate::layers::{
    FinancialLayer, FinancialRequest, LayerError, PhysicalLayer, PhysicalOutput, PricingRequest,
};
use async_trait::async_trait;
use wizard_core::{FinancialBreakdown, IndustrySlug, LoadProfile, SizingHints};

/// Peak demand intensity (W per sq ft)
fn intensity_w_per_sqft(industry: &IndustrySlug) -> f64 {
    match industry.as_str() {
        "hotel" => 8.0,
        "hospital" => 12.0,
        "data_center" | "data-center" => 100.0,
        "retail" => 7.0,
        "warehouse" => 3.0,
        "manufacturing" => 15.0,
        "car_wash" | "car-wash" => 20.0,
        _ => 6.0,
    }
}

/// Base-to-peak ratio by grid connection
fn base_ratio(grid: Option<&str>) -> f64 {
    match grid {
        Some("unreliable") => 0.45,
        Some("limited" | "microgrid") => 0.5,
        Some("off_grid") => 0.6,
        _ => 0.35,
    }
}

/// Backup duration by grid connection
fn duration_hours(grid: Option<&str>) -> f64 {
    match grid {
        Some("off_grid") => 8.0,
        Some("unreliable") => 6.0,
        _ => 4.0,
    }
}

/// Grid import limit in kW for a `limited` connection; 0 MW means unlimited
fn grid_limit_kw(grid: Option<&str>, capacity_mw: Option<f64>) -> Option<f64> {
    match grid {
        Some("limited") => capacity_mw.filter(|mw| *mw > 0.0).map(|mw| mw * 1_000.0),
        _ => None,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Load model over facility answers
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceLoadModel;

impl ReferenceLoadModel {
    /// Compute synchronously
    ///
    /// # Errors
    /// `peakLoad` and `gridCapacity` answers are in MW; 0 means auto-calculate
    /// and unlimited respectively. On a `limited` grid, storage covers at
    /// least the demand above the grid capacity.
    ///
    /// # Errors
    /// Returns [`LayerError::InsufficientData`] without a peak load or
    /// facility size.
    pub fn compute(request: &PricingRequest) -> Result<PhysicalOutput, LayerError> {
        let answers = &request.answers;
        let peak = match answers.number("peakLoad").filter(|mw| *mw > 0.0) {
            Some(mw) => mw * 1_000.0,
            None => {
                let sqft = answers
                    .number("facilitySize")
                    .filter(|s| *s > 0.0)
                    .ok_or_else(|| {
                        LayerError::InsufficientData("facility size or peak load required".into())
                    })?;
                sqft * intensity_w_per_sqft(&request.industry) / 1_000.0
            }
        };
        let hours = answers
            .number("operatingHours")
            .unwrap_or(12.0)
            .clamp(0.0, 24.0);
        let grid = answers.text("gridConnection");
        let base = peak * base_ratio(grid);
        let daily = peak * hours * 0.7 + base * (24.0 - hours);

        let mut storage_kw = (peak - base).max(peak * 0.25);
        if let Some(limit) = grid_limit_kw(grid, answers.number("gridCapacity")) {
            storage_kw = storage_kw.max(peak - limit);
        }
        let storage_kw = round1(storage_kw);
        Ok(PhysicalOutput {
            load_profile: LoadProfile {
                base_load_kw: round1(base),
                peak_load_kw: round1(peak),
                daily_energy_kwh: round1(daily),
            },
            sizing: SizingHints::new(storage_kw, duration_hours(grid)),
        })
    }
}

#[async_trait]
impl PhysicalLayer for ReferenceLoadModel {
    async fn compute_load_profile(&self, request: &PricingRequest) -> Result<PhysicalOutput, LayerError> {
        Self::compute(request)
    }
}

/// Cost and savings model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFinancialModel {
    /// Storage energy cost ($/kWh)
    pub storage_per_kwh: f64,
    /// Storage power cost ($/kW)
    pub storage_per_kw: f64,
    /// Solar cost ($/kW)
    pub solar_per_kw: f64,
    /// Generator cost ($/kW)
    pub generator_per_kw: f64,
    /// EV charger cost ($/kW)
    pub ev_per_kw: f64,
    /// Installation share of equipment cost
    pub install_ratio: f64,
    /// Investment tax credit on storage and solar
    pub itc_ratio: f64,
}

impl Default for ReferenceFinancialModel {
    fn default() -> Self {
        Self {
            storage_per_kwh: 350.0,
            storage_per_kw: 150.0,
            solar_per_kw: 1_200.0,
            generator_per_kw: 600.0,
            ev_per_kw: 800.0,
            install_ratio: 0.2,
            itc_ratio: 0.3,
        }
    }
}

impl ReferenceFinancialModel {
    /// Compute synchronously
    ///
    /// # Errors
    /// Returns [`LayerError::InsufficientData`] without an electricity rate
    /// or when the system would save nothing.
    pub fn compute(&self, request: &FinancialRequest) -> Result<FinancialBreakdown, LayerError> {
        let rate = request
            .rates
            .electricity_rate
            .filter(|r| r.is_finite() && *r > 0.0)
            .ok_or_else(|| LayerError::InsufficientData("electricity rate unavailable".into()))?;
        let demand_charge = request.rates.demand_charge.unwrap_or(0.0).max(0.0);
        let sun_hours = request.rates.peak_sun_hours.unwrap_or(4.5).max(0.0);

        let sizing = &request.sizing;
        let add_ons = &request.add_ons;
        let solar_kw = add_ons.solar_kw.unwrap_or(0.0);
        let generator_kw = add_ons.generator_kw.unwrap_or(0.0);
        let ev_kw = add_ons.ev_chargers.map_or(0.0, |ev| ev.total_kw());

        let storage_cost =
            sizing.storage_kwh * self.storage_per_kwh + sizing.storage_kw * self.storage_per_kw;
        let solar_cost = solar_kw * self.solar_per_kw;
        let equipment_cost =
            storage_cost + solar_cost + generator_kw * self.generator_per_kw + ev_kw * self.ev_per_kw;
        let installation_cost = equipment_cost * self.install_ratio;
        let total_cost = equipment_cost + installation_cost;
        let tax_credit = (storage_cost + solar_cost) * (1.0 + self.install_ratio) * self.itc_ratio;
        let net_cost = total_cost - tax_credit;

        let demand_savings = sizing.storage_kw * demand_charge * 12.0;
        let arbitrage_savings = sizing.storage_kwh * 250.0 * rate * 0.3;
        let solar_savings = solar_kw * sun_hours * 365.0 * rate;
        let annual_savings = demand_savings + arbitrage_savings + solar_savings;
        if annual_savings <= 0.0 {
            return Err(LayerError::InsufficientData("system produces no savings".into()));
        }

        Ok(FinancialBreakdown {
            equipment_cost,
            installation_cost,
            total_cost,
            tax_credit,
            net_cost,
            annual_savings,
            payback_years: net_cost / annual_savings,
        })
    }
}

#[async_trait]
impl FinancialLayer for ReferenceFinancialModel {
    async fn compute_financials(&self, request: &FinancialRequest) -> Result<FinancialBreakdown, LayerError> {
        self.compute(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::RateInputs;
    use chrono::Utc;
    use serde_json::json;
    use wizard_core::{AddOnConfig, WizardState};

    fn request(answers: &[(&str, serde_json::Value)]) -> PricingRequest {
        let mut state = WizardState::default();
        state.industry = IndustrySlug::new("hotel");
        for (key, value) in answers {
            state.answers = state.answers.set_user_answer(*key, value.clone(), Utc::now());
        }
        PricingRequest::from_state(&state)
    }

    #[test]
    fn peak_from_facility_size() {
        let out = ReferenceLoadModel::compute(&request(&[
            ("facilitySize", json!(50_000)),
            ("operatingHours", json!(24)),
        ]))
        .unwrap();
        assert!((out.load_profile.peak_load_kw - 400.0).abs() < 1e-9);
        assert!((out.load_profile.base_load_kw - 140.0).abs() < 1e-9);
        assert!(out.load_profile.peak_load_kw >= out.load_profile.base_load_kw);
        assert!((out.sizing.storage_kwh - out.sizing.storage_kw * 4.0).abs() < 1e-9);
    }

    #[test]
    fn explicit_peak_wins() {
        let out = ReferenceLoadModel::compute(&request(&[
            ("facilitySize", json!(50_000)),
            ("peakLoad", json!(0.25)),
            ("gridConnection", json!("off_grid")),
        ]))
        .unwrap();
        assert!((out.load_profile.peak_load_kw - 250.0).abs() < 1e-9);
        assert!((out.sizing.duration_hours - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_peak_is_auto_calculated() {
        let out = ReferenceLoadModel::compute(&request(&[
            ("facilitySize", json!(50_000)),
            ("peakLoad", json!(0)),
        ]))
        .unwrap();
        assert!((out.load_profile.peak_load_kw - 400.0).abs() < 1e-9);
    }

    #[test]
    fn limited_grid_capacity_raises_storage() {
        let answers = [
            ("peakLoad", json!(1.0)),
            ("operatingHours", json!(24)),
            ("gridConnection", json!("limited")),
        ];
        let unlimited = ReferenceLoadModel::compute(&request(&answers)).unwrap();
        // base 500 kW, storage 500 kW without a capacity limit
        assert!((unlimited.sizing.storage_kw - 500.0).abs() < 1e-9);

        let mut capped = answers.to_vec();
        capped.push(("gridCapacity", json!(0.3)));
        let out = ReferenceLoadModel::compute(&request(&capped)).unwrap();
        assert!((out.sizing.storage_kw - 700.0).abs() < 1e-9);
        assert!((out.load_profile.peak_load_kw - 1_000.0).abs() < 1e-9);

        let mut reliable = capped.clone();
        reliable[2] = ("gridConnection", json!("reliable"));
        let out = ReferenceLoadModel::compute(&request(&reliable)).unwrap();
        assert!((out.sizing.storage_kw - 650.0).abs() < 1e-9);
    }

    #[test]
    fn missing_size_is_insufficient() {
        assert!(matches!(
            ReferenceLoadModel::compute(&request(&[])),
            Err(LayerError::InsufficientData(_))
        ));
    }

    #[test]
    fn financials_are_internally_consistent() {
        let model = ReferenceFinancialModel::default();
        let breakdown = model
            .compute(&FinancialRequest {
                load_profile: LoadProfile::default(),
                sizing: SizingHints::new(100.0, 4.0),
                rates: RateInputs {
                    electricity_rate: Some(0.2),
                    demand_charge: Some(20.0),
                    peak_sun_hours: None,
                },
                add_ons: AddOnConfig::default().with_solar(50.0),
            })
            .unwrap();
        assert!(breakdown.net_cost < breakdown.total_cost);
        assert!((breakdown.payback_years * breakdown.annual_savings - breakdown.net_cost).abs() < 1e-6);
    }

    #[test]
    fn missing_rate_is_insufficient() {
        let model = ReferenceFinancialModel::default();
        let result = model.compute(&FinancialRequest {
            load_profile: LoadProfile::default(),
            sizing: SizingHints::new(100.0, 4.0),
            rates: RateInputs::default(),
            add_ons: AddOnConfig::default(),
        });
        assert!(matches!(result, Err(LayerError::InsufficientData(_))));
    }
}
