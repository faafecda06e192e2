//! Operator scenarios driven through a full session

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wizard_core::memory::LOAD_PROFILE_SLICE;
use wizard_core::{
    FetchStatus, IndustrySlug, Intent, ProvenanceSource, SliceStore, TemplateError, WizardError,
    WizardStep,
};
use wizard_pricing::{LayerError, ReferenceFinancialModel};
use wizard_runtime::{Collaborators, Navigation, Submission};
use wizard_test_utils::{
    collaborators, hotel_template, setup_test_session, AddressOnlyResolver, DelayedTemplates,
    FailingFinancial, NoAddressResolver, RecordingSubmitter, ScriptedIntel, StaticTemplates,
};

fn hotel() -> IndustrySlug {
    IndustrySlug::new("hotel")
}

#[tokio::test]
async fn bare_zip_is_synthesized_and_still_priced() {
    let (session, slices) = setup_test_session(
        collaborators(ScriptedIntel::with_rate(0.18)),
        Arc::new(ReferenceFinancialModel::default()),
    );

    let record = session.submit_location("94105").await.unwrap();
    assert!(record.synthesized);
    assert_eq!(record.region.as_deref(), Some("CA"));

    let state = session.snapshot();
    assert!(state.location_confirmed);
    assert!(!state.industry.is_resolved());
    assert_eq!(state.location_intel.utility.status, FetchStatus::Ready);

    session.select_industry(hotel(), false).await.unwrap();
    assert_eq!(
        session.go_to_step(WizardStep::Profile).await.unwrap(),
        Navigation::Arrived(WizardStep::Profile)
    );
    let seeded = session.snapshot();
    assert_eq!(seeded.answers.number("electricityRate"), Some(0.18));
    assert_eq!(
        seeded.answers.source_of("electricityRate"),
        Some(ProvenanceSource::LocationEnrichment)
    );

    let completion = session.complete_profile().await.unwrap();
    assert_eq!(completion.submission, Submission::Skipped);
    let outcome = completion.dispatched.wait_for_pricing().await.unwrap();
    let quote = outcome.quote().unwrap();
    assert!(quote.pricing_complete);
    assert!(quote.notes.iter().any(|n| n.contains("inferred from ZIP")));
    assert!(slices.read_slice(LOAD_PROFILE_SLICE).is_some());

    let priced = session.snapshot();
    assert_eq!(priced.quote.as_ref().map(|q| q.request_key.clone()), Some(quote.request_key.clone()));
    assert_eq!(priced.telemetry.pricing_runs, 1);
    assert_eq!(
        session.go_to_step(WizardStep::Results).await.unwrap(),
        Navigation::Arrived(WizardStep::Results)
    );
    assert_eq!(session.progress().percent, 100);
}

#[tokio::test]
async fn operator_rate_survives_later_enrichment() {
    let (session, _) = setup_test_session(
        collaborators(ScriptedIntel::with_rate(0.18)),
        Arc::new(ReferenceFinancialModel::default()),
    );
    session.dispatch(Intent::SetLocationInput("94105".into()));
    session.select_industry(hotel(), false).await.unwrap();
    session.go_to_step(WizardStep::Profile).await.unwrap();
    session.set_answer("electricityRate", 0.22);

    session.submit_location("94105").await.unwrap();

    let state = session.snapshot();
    assert_eq!(state.answers.get("electricityRate"), Some(&json!(0.22)));
    assert_eq!(
        state.answers.source_of("electricityRate"),
        Some(ProvenanceSource::UserEdit)
    );
    assert_eq!(state.answers.number("demandCharge"), Some(20.0));
    assert_eq!(
        state.answers.source_of("demandCharge"),
        Some(ProvenanceSource::LocationEnrichment)
    );
}

#[tokio::test]
async fn financial_failure_still_reaches_results() {
    let (session, _) = setup_test_session(
        collaborators(ScriptedIntel::with_rate(0.18)),
        Arc::new(FailingFinancial(LayerError::Failed("tariff engine crashed".into()))),
    );
    session.submit_location("94105").await.unwrap();
    session.select_industry(hotel(), false).await.unwrap();
    session.go_to_step(WizardStep::Profile).await.unwrap();

    let completion = session.complete_profile().await.unwrap();
    completion.dispatched.wait_for_pricing().await.unwrap();

    let state = session.snapshot();
    let quote = state.quote.as_ref().unwrap();
    assert!(!quote.pricing_complete);
    assert!(quote.load_profile.base_load_kw > 0.0);
    assert!(quote.warnings.iter().any(|w| w.contains("tariff engine crashed")));
    assert_eq!(
        session.go_to_step(WizardStep::Results).await.unwrap(),
        Navigation::Arrived(WizardStep::Results)
    );

    let retry = session.retry_pricing();
    assert!(retry.pricing.is_some());
}

#[tokio::test]
async fn failed_enrichment_slot_does_not_hide_the_others() {
    let (session, _) = setup_test_session(
        collaborators(ScriptedIntel::with_rate(0.18).failing_solar()),
        Arc::new(ReferenceFinancialModel::default()),
    );
    session.submit_location("94105").await.unwrap();

    let intel = session.snapshot().location_intel;
    assert_eq!(intel.utility.status, FetchStatus::Ready);
    assert_eq!(intel.weather.status, FetchStatus::Ready);
    assert_eq!(intel.solar.status, FetchStatus::Error);
    assert!(intel.solar.error.unwrap().contains("unreachable"));
}

#[tokio::test(start_paused = true)]
async fn newer_location_supersedes_enrichment_in_flight() {
    let (session, _) = setup_test_session(
        collaborators(ScriptedIntel::with_rate(0.18).delayed(Duration::from_secs(1))),
        Arc::new(ReferenceFinancialModel::default()),
    );

    let first = session.submit_location("94105");
    let second = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.submit_location("10001").await
    };
    let (first, second) = tokio::join!(first, second);
    first.unwrap();
    second.unwrap();

    let state = session.snapshot();
    assert_eq!(state.current_zip().as_deref(), Some("10001"));
    assert_eq!(state.location.and_then(|l| l.region).as_deref(), Some("NY"));
    assert_eq!(state.location_intel.utility.status, FetchStatus::Ready);
}

#[tokio::test]
async fn unreachable_template_falls_back_to_generic() {
    let collaborators = Collaborators::new(
        Arc::new(NoAddressResolver),
        Arc::new(ScriptedIntel::with_rate(0.18)),
        Arc::new(StaticTemplates(Err(WizardError::Network("template service down".into())))),
    );
    let (session, _) = setup_test_session(collaborators, Arc::new(ReferenceFinancialModel::default()));
    session.submit_location("94105").await.unwrap();

    let template = session.select_industry(hotel(), false).await.unwrap();
    assert!(template.fallback);
    assert_eq!(template.industry, hotel());
    session.go_to_step(WizardStep::Profile).await.unwrap();

    let completion = session.complete_profile().await.unwrap();
    let outcome = completion.dispatched.wait_for_pricing().await.unwrap();
    assert!(outcome
        .quote()
        .unwrap()
        .notes
        .iter()
        .any(|n| n.contains("Generic questionnaire")));
}

#[tokio::test]
async fn invalid_template_is_fatal() {
    let collaborators = Collaborators::new(
        Arc::new(NoAddressResolver),
        Arc::new(ScriptedIntel::default()),
        Arc::new(StaticTemplates(Err(TemplateError::Empty("hotel".into()).into()))),
    );
    let (session, _) = setup_test_session(collaborators, Arc::new(ReferenceFinancialModel::default()));
    session.submit_location("94105").await.unwrap();

    let err = session.select_industry(hotel(), false).await.unwrap_err();
    assert!(matches!(err, WizardError::Template(_)));
    let state = session.snapshot();
    assert!(state.template.is_none());
    assert!(state.error.is_some());

    let nav = session.go_to_step(WizardStep::Profile).await;
    assert!(nav.is_err());
}

#[tokio::test]
async fn completed_profile_is_submitted() {
    let submitter = Arc::new(RecordingSubmitter::default());
    let (session, _) = setup_test_session(
        collaborators(ScriptedIntel::with_rate(0.18)).with_submitter(submitter.clone()),
        Arc::new(ReferenceFinancialModel::default()),
    );
    session.submit_location("94105").await.unwrap();
    session.select_industry(hotel(), false).await.unwrap();
    session.go_to_step(WizardStep::Profile).await.unwrap();

    let completion = session.complete_profile().await.unwrap();
    assert_eq!(completion.submission, Submission::Sent);
    let submissions = submitter.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].industry, hotel());
    assert_eq!(submissions[0].answers.get("roomCount"), Some(&json!(150)));
}

#[tokio::test]
async fn snapshot_resumes_in_a_new_session() {
    let (session, slices) = setup_test_session(
        collaborators(ScriptedIntel::with_rate(0.18)),
        Arc::new(ReferenceFinancialModel::default()),
    );
    session.submit_location("94105").await.unwrap();
    session.select_industry(hotel(), false).await.unwrap();
    session.go_to_step(WizardStep::Profile).await.unwrap();
    session.set_answer("roomCount", 220);
    let saved = session.snapshot();

    let (resumed, _) = setup_test_session(
        collaborators(ScriptedIntel::default()),
        Arc::new(ReferenceFinancialModel::default()),
    );
    let snapshot = slices
        .read_slice(wizard_core::memory::SNAPSHOT_SLICE)
        .unwrap();
    resumed.resume_from(serde_json::from_value(snapshot).unwrap());

    let state = resumed.snapshot();
    assert_eq!(state.session_id, saved.session_id);
    assert_eq!(state.step, WizardStep::Profile);
    assert_eq!(state.answers.number("roomCount"), Some(220.0));
    assert!(state.has_template_for_industry());
    assert_eq!(resumed.gates(), session.gates());
}

#[tokio::test]
async fn street_number_is_never_taken_as_zip() {
    let collaborators = Collaborators::new(
        Arc::new(AddressOnlyResolver),
        Arc::new(ScriptedIntel::with_rate(0.18)),
        Arc::new(StaticTemplates(Ok(hotel_template()))),
    );
    let (session, _) = setup_test_session(collaborators, Arc::new(ReferenceFinancialModel::default()));

    let record = session
        .submit_location("10250 Santa Monica Blvd, Los Angeles")
        .await
        .unwrap();
    assert_eq!(record.postal_code, None);
    assert_eq!(record.region, None);
    let state = session.snapshot();
    assert!(state.location_confirmed);
    assert_eq!(state.current_zip(), None);
    assert_eq!(state.location_intel.utility.status, FetchStatus::Idle);

    let record = session
        .submit_location("10250 Santa Monica Blvd, Los Angeles, CA 90067")
        .await
        .unwrap();
    assert_eq!(record.postal_code.as_deref(), Some("90067"));
    assert_eq!(record.region.as_deref(), Some("CA"));
    assert_eq!(session.snapshot().location_intel.utility.status, FetchStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn superseded_template_load_clears_busy_label() {
    let collaborators = Collaborators::new(
        Arc::new(NoAddressResolver),
        Arc::new(ScriptedIntel::default()),
        Arc::new(DelayedTemplates {
            delay: Duration::from_secs(1),
        }),
    );
    let (session, _) = setup_test_session(collaborators, Arc::new(ReferenceFinancialModel::default()));
    session.submit_location("94105").await.unwrap();
    session.dispatch(Intent::SetIndustry {
        slug: hotel(),
        locked: false,
    });
    assert_eq!(
        session.go_to_step(WizardStep::Industry).await.unwrap(),
        Navigation::Arrived(WizardStep::Industry)
    );

    let forward = session.go_to_step(WizardStep::Profile);
    let back = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.go_to_step(WizardStep::Location).await
    };
    let (forward, back) = tokio::join!(forward, back);

    assert!(matches!(forward, Err(WizardError::Aborted)));
    assert_eq!(back.unwrap(), Navigation::Arrived(WizardStep::Location));
    let state = session.snapshot();
    assert_eq!(state.step, WizardStep::Location);
    assert_eq!(state.busy, None);
    assert!(state.template.is_none());
}

#[tokio::test]
async fn partial_profile_is_submitted_before_completion() {
    let submitter = Arc::new(RecordingSubmitter::default());
    let (session, _) = setup_test_session(
        collaborators(ScriptedIntel::with_rate(0.18)).with_submitter(submitter.clone()),
        Arc::new(ReferenceFinancialModel::default()),
    );
    session.submit_location("94105").await.unwrap();
    session.select_industry(hotel(), false).await.unwrap();
    session.go_to_step(WizardStep::Profile).await.unwrap();
    session.set_answer("roomCount", 90);

    assert_eq!(session.submit_partial_profile().await.unwrap(), Submission::Sent);
    session.complete_profile().await.unwrap();

    let submissions = submitter.submissions();
    assert_eq!(submissions.len(), 2);
    assert!(submissions[0].partial);
    assert_eq!(submissions[0].answers.get("roomCount"), Some(&json!(90)));
    assert!(submissions[0].answers.values().all(|v| !v.is_null()));
    assert!(!submissions[1].partial);
}
