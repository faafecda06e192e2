//! Sanity pass over a merged quote
//!
//! Findings never fail the run; each becomes a warning on the quote.

use wizard_core::QuoteOutput;

/// Cross-check a quote, returning one warning per finding
#[must_use]
pub fn check(quote: &QuoteOutput, tolerance: f64) -> Vec<String> {
    let mut warnings = Vec::new();
    let load = &quote.load_profile;
    let sizing = &quote.sizing;

    let mut numbers = vec![
        ("baseLoadKW", load.base_load_kw),
        ("peakLoadKW", load.peak_load_kw),
        ("dailyEnergyKwh", load.daily_energy_kwh),
        ("storageKw", sizing.storage_kw),
        ("durationHours", sizing.duration_hours),
        ("storageKwh", sizing.storage_kwh),
    ];
    if let Some(f) = &quote.financials {
        numbers.extend([
            ("equipmentCost", f.equipment_cost),
            ("installationCost", f.installation_cost),
            ("totalCost", f.total_cost),
            ("taxCredit", f.tax_credit),
            ("netCost", f.net_cost),
            ("annualSavings", f.annual_savings),
            ("paybackYears", f.payback_years),
        ]);
    }
    for (name, value) in &numbers {
        if !value.is_finite() {
            warnings.push(format!("{name} is not a finite number"));
        } else if *value < 0.0 {
            warnings.push(format!("{name} is negative ({value})"));
        }
    }

    if load.peak_load_kw < load.base_load_kw {
        warnings.push(format!(
            "peak load {:.1} kW is below base load {:.1} kW",
            load.peak_load_kw, load.base_load_kw
        ));
    }

    let expected_kwh = sizing.storage_kw * sizing.duration_hours;
    if !close(sizing.storage_kwh, expected_kwh, tolerance) {
        warnings.push(format!(
            "storage energy {:.1} kWh does not match {:.1} kW x {:.1} h",
            sizing.storage_kwh, sizing.storage_kw, sizing.duration_hours
        ));
    }

    if let Some(f) = &quote.financials {
        if f.net_cost > f.total_cost {
            warnings.push(format!(
                "net cost {:.0} exceeds total cost {:.0}",
                f.net_cost, f.total_cost
            ));
        }
        if f.annual_savings > 0.0 {
            let expected_payback = f.net_cost / f.annual_savings;
            if !close(f.payback_years, expected_payback, tolerance) {
                warnings.push(format!(
                    "payback {:.1} years is inconsistent with net cost over savings ({:.1})",
                    f.payback_years, expected_payback
                ));
            }
        }
    }

    warnings
}

fn close(actual: f64, expected: f64, tolerance: f64) -> bool {
    let scale = expected.abs().max(1.0);
    (actual - expected).abs() <= tolerance * scale
}
