// tests/engine_plan.rs

use devloop::bus::Message;
use devloop::engine::{effective_decision, initial_plan, plan, ReloadStep};
use devloop::types::ReloadDecision;

#[test]
fn incremental_with_live_process_only_publishes() {
    assert_eq!(
        plan(ReloadDecision::Incremental, true),
        vec![
            ReloadStep::Publish(Message::FrontendUpdate),
            ReloadStep::Publish(Message::AppReady),
        ]
    );
}

#[test]
fn full_closes_before_sync_and_restarts_after_build() {
    assert_eq!(
        plan(ReloadDecision::Full, true),
        vec![
            ReloadStep::Publish(Message::BackendUpdate),
            ReloadStep::CloseProcess,
            ReloadStep::Sync,
            ReloadStep::Build,
            ReloadStep::RestartProcess,
            ReloadStep::Publish(Message::AppReady),
        ]
    );
}

#[test]
fn without_a_process_everything_starts_fresh() {
    for decision in [ReloadDecision::Incremental, ReloadDecision::Full] {
        assert_eq!(effective_decision(decision, false), ReloadDecision::Full);
        let steps = plan(decision, false);
        assert!(!steps.contains(&ReloadStep::CloseProcess));
        assert!(steps.contains(&ReloadStep::StartProcess));
        assert_eq!(steps.first(), Some(&ReloadStep::Publish(Message::BackendUpdate)));
        assert_eq!(steps.last(), Some(&ReloadStep::Publish(Message::AppReady)));
    }
}

#[test]
fn initial_plan_ends_ready() {
    assert_eq!(
        initial_plan(),
        vec![
            ReloadStep::Sync,
            ReloadStep::Build,
            ReloadStep::StartProcess,
            ReloadStep::Publish(Message::AppReady),
        ]
    );
}
