//! End-to-end pricing runs folded back through the reducer

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wizard_core::{
    apply, can_proceed, Intent, PricingFailureKind, PricingStatus, WizardState, WizardStep,
};
use wizard_pricing::{
    LayerError, PricingConfig, PricingOrchestrator, PricingOutcome, PricingRequest,
    ReferenceFinancialModel, ReferenceLoadModel, RetryPolicy,
};
use wizard_test_utils::{
    at, state_ready_to_price, FailingFinancial, FlakyFinancial, HangingPhysical,
    InMemorySliceStore, RecordingSink, SlowPhysical,
};

fn orchestrator(financial: Arc<dyn wizard_pricing::FinancialLayer>) -> PricingOrchestrator {
    PricingOrchestrator::new(
        Arc::new(ReferenceLoadModel),
        financial,
        Arc::new(InMemorySliceStore::new()),
    )
}

#[tokio::test]
async fn financial_failure_keeps_physical_quote_and_results_open() {
    let state = state_ready_to_price();
    let orch = orchestrator(Arc::new(FailingFinancial(LayerError::Failed(
        "tariff engine crashed".into(),
    ))));
    let sink = RecordingSink::new();

    orch.run_pricing_safe(PricingRequest::from_state(&state), &sink, CancellationToken::new())
        .await;
    let next = sink.replay(&state);

    let quote = next.quote.as_ref().expect("quote merged");
    assert_eq!(next.pricing.status, PricingStatus::Ok);
    assert!(!quote.pricing_complete);
    assert!(quote.warnings.iter().any(|w| w.contains("tariff engine crashed")));

    let document = serde_json::to_value(quote).unwrap();
    assert!(document["baseLoadKW"].as_f64().is_some());
    assert!(document["peakLoadKW"].as_f64().is_some());
    assert_eq!(document["pricingComplete"], json!(false));

    assert!(can_proceed(&next, WizardStep::Results).ok);
    assert!(next.can_retry_pricing());
}

#[tokio::test(start_paused = true)]
async fn transient_financial_failures_are_retried() {
    let state = state_ready_to_price();
    let flaky = Arc::new(FlakyFinancial::new(2));
    let orch = orchestrator(flaky.clone());
    let sink = RecordingSink::new();

    let outcome = orch
        .run_pricing_safe(PricingRequest::from_state(&state), &sink, CancellationToken::new())
        .await;

    assert_eq!(flaky.calls(), 3);
    let quote = outcome.quote().unwrap();
    assert!(quote.pricing_complete);
    assert!(quote.warnings.is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_degrade_to_warning() {
    let state = state_ready_to_price();
    let flaky = Arc::new(FlakyFinancial::new(10));
    let orch = orchestrator(flaky.clone()).with_config(
        PricingConfig::default().with_financial_retry(RetryPolicy::default().with_attempts(4)),
    );
    let sink = RecordingSink::new();

    let outcome = orch
        .run_pricing_safe(PricingRequest::from_state(&state), &sink, CancellationToken::new())
        .await;

    assert_eq!(flaky.calls(), 4);
    let quote = outcome.quote().unwrap();
    assert!(!quote.pricing_complete);
    assert!(quote.warnings.iter().any(|w| w.contains("call 4")));
}

#[tokio::test]
async fn superseded_run_never_overwrites_newer_quote() {
    let first = state_ready_to_price();
    let second = apply(
        &first,
        Intent::SetAnswer {
            key: "electricityRate".into(),
            value: json!(0.25),
            at: at(5),
        },
    );
    let orch = orchestrator(Arc::new(ReferenceFinancialModel::default()));

    let old_sink = RecordingSink::new();
    let new_sink = RecordingSink::new();
    orch.run_pricing_safe(PricingRequest::from_state(&first), &old_sink, CancellationToken::new())
        .await;
    orch.run_pricing_safe(PricingRequest::from_state(&second), &new_sink, CancellationToken::new())
        .await;
    let old = old_sink.intents();
    let new = new_sink.intents();
    let new_key = second.pricing_inputs().request_key();
    assert_ne!(first.pricing_inputs().request_key(), new_key);

    // Old result arrives last
    let late = [old[0].clone(), new[0].clone(), new[1].clone(), old[1].clone()]
        .into_iter()
        .fold(second.clone(), |s, i| apply(&s, i));
    assert_eq!(late.quote.as_ref().map(|q| q.request_key.clone()), Some(new_key.clone()));

    // Old result arrives while the new run is pending
    let early = [old[0].clone(), new[0].clone(), old[1].clone()]
        .into_iter()
        .fold(second.clone(), |s, i| apply(&s, i));
    assert!(early.quote.is_none());
    assert_eq!(early.pricing.status, PricingStatus::Pending);
    let settled = apply(&early, new[1].clone());
    assert_eq!(settled.quote.map(|q| q.request_key), Some(new_key));
}

#[tokio::test(start_paused = true)]
async fn hung_physical_layer_times_out_and_allows_retry() {
    let state = state_ready_to_price();
    let orch = PricingOrchestrator::new(
        Arc::new(HangingPhysical),
        Arc::new(ReferenceFinancialModel::default()),
        Arc::new(InMemorySliceStore::new()),
    )
    .with_config(PricingConfig::default().with_total_timeout_ms(2_000));
    let sink = RecordingSink::new();

    let outcome = orch
        .run_pricing_safe(PricingRequest::from_state(&state), &sink, CancellationToken::new())
        .await;
    assert!(matches!(outcome, PricingOutcome::Failed(ref f) if f.kind == PricingFailureKind::TimedOut));

    let next = sink.replay(&state);
    assert_eq!(next.pricing.status, PricingStatus::TimedOut);
    assert!(next.quote.is_none());
    assert!(next.can_retry_pricing());
    let retried = apply(&next, Intent::PricingRetry);
    assert_eq!(retried.pricing.status, PricingStatus::Idle);
    assert_eq!(retried.pricing.retry_count, 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_run_dispatches_only_start() {
    let state = state_ready_to_price();
    let orch = PricingOrchestrator::new(
        Arc::new(SlowPhysical {
            delay: Duration::from_secs(2),
        }),
        Arc::new(ReferenceFinancialModel::default()),
        Arc::new(InMemorySliceStore::new()),
    );
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let run = orch.run_pricing_safe(PricingRequest::from_state(&state), &sink, cancel);
    let cancel_later = async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    };
    let (outcome, ()) = tokio::join!(run, cancel_later);

    assert_eq!(outcome, PricingOutcome::Cancelled);
    assert_eq!(sink.names(), vec!["PRICING_START"]);
}

fn priced_state(facility_size: u32, hours: u32, grid: &'static str) -> WizardState {
    [
        Intent::SetAnswer {
            key: "facilitySize".into(),
            value: json!(facility_size),
            at: at(2),
        },
        Intent::SetAnswer {
            key: "operatingHours".into(),
            value: json!(hours),
            at: at(3),
        },
        Intent::SetAnswer {
            key: "gridConnection".into(),
            value: json!(grid),
            at: at(4),
        },
    ]
    .into_iter()
    .fold(state_ready_to_price(), |s, i| apply(&s, i))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn financial_group_is_all_or_nothing(
        facility_size in 1_000u32..200_000,
        hours in 0u32..=24,
        grid in prop_oneof![Just("reliable"), Just("unreliable"), Just("off_grid")],
        financial_fails in any::<bool>(),
    ) {
        let state = priced_state(facility_size, hours, grid);
        let financial: Arc<dyn wizard_pricing::FinancialLayer> = if financial_fails {
            Arc::new(FailingFinancial(LayerError::Failed("forced".into())))
        } else {
            Arc::new(ReferenceFinancialModel::default())
        };
        let orch = orchestrator(financial);
        let sink = RecordingSink::new();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let outcome = runtime.block_on(orch.run_pricing_safe(
            PricingRequest::from_state(&state),
            &sink,
            CancellationToken::new(),
        ));

        let quote = outcome.quote().unwrap();
        prop_assert_eq!(quote.financials.is_some(), quote.pricing_complete);
        prop_assert_eq!(quote.pricing_complete, !financial_fails);
        if !quote.pricing_complete {
            prop_assert!(!quote.warnings.is_empty());
        }
        prop_assert!(quote.load_profile.peak_load_kw >= quote.load_profile.base_load_kw);
        prop_assert!(quote.load_profile.peak_load_kw > 0.0);

        let next = sink.replay(&state);
        prop_assert!(next.quote.is_some());
        prop_assert!(can_proceed(&next, WizardStep::Results).ok);
    }
}
