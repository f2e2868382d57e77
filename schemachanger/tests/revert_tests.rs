//! Failures and cancellation at every stage boundary

#[path = "testutils/mod.rs"]
mod testutils;

use schemachanger::eval::Datum;
use schemachanger::{
    ErrorClass, EventKind, ExecutorState, JobStatus, Phase, SchemaChangeError, StageContext,
    Statement, TestingKnobs,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use testutils::statements::{add_int_column, add_unique, alter, drop_column};
use testutils::test_fixture::TestFixture;

/// Fails with a validation error before stage `at` of a forward run
fn fail_before(at: usize, armed: Arc<AtomicBool>) -> TestingKnobs {
    TestingKnobs {
        before_stage: Some(Arc::new(move |ctx: &StageContext<'_>| {
            if armed.load(Ordering::SeqCst) && !ctx.reverting && ctx.stages_completed == at {
                return Err(SchemaChangeError::Injected {
                    message: format!("validation failed before stage {}", at + 1),
                    class: ErrorClass::Validation,
                });
            }
            Ok(())
        })),
        ..TestingKnobs::default()
    }
}

struct Expectation {
    stage_revertible: Vec<bool>,
    sync_stages: usize,
}

async fn expectation(stmt: &Statement) -> Expectation {
    let fixture = TestFixture::new().expect("Failed to create fixture");
    fixture.setup_shop().await.expect("Failed to set up shop");
    let (_, plan) = fixture.changer().plan(stmt).expect("Failed to plan");
    Expectation {
        stage_revertible: plan.stages.iter().map(|s| s.revertible).collect(),
        sync_stages: plan.stages.iter().filter(|s| s.phase != Phase::PostCommit).count(),
    }
}

/// Inject a failure before every post-commit stage of `stmt` in turn
async fn fail_at_each_stage(stmt: Statement, check_reverted: impl Fn(&TestFixture), check_failed: impl Fn(&TestFixture)) {
    let expected = expectation(&stmt).await;
    assert!(expected.stage_revertible.len() > expected.sync_stages);

    for at in expected.sync_stages..expected.stage_revertible.len() {
        let armed = Arc::new(AtomicBool::new(false));
        let fixture = TestFixture::with_knobs(fail_before(at, armed.clone())).expect("Failed to create fixture");
        fixture.setup_shop().await.expect("Failed to set up shop");
        armed.store(true, Ordering::SeqCst);

        let row = fixture.execute(&stmt).await.expect("Failed to execute");
        let events = fixture.changer().events(row.run_id).unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(&e.kind, EventKind::StageFailed { class, .. } if class == "validation")));

        if expected.stage_revertible[at - 1] {
            assert_eq!(row.job_status, JobStatus::Reverted, "failure before stage {}", at + 1);
            assert_eq!(row.executor_state, ExecutorState::Reverted);
            assert!(matches!(
                events.last().map(|e| &e.kind),
                Some(EventKind::Reverted { .. })
            ));
            check_reverted(&fixture);
        } else {
            assert_eq!(row.job_status, JobStatus::Failed, "failure before stage {}", at + 1);
            assert_eq!(row.executor_state, ExecutorState::Failed);
            assert!(matches!(
                events.last().map(|e| &e.kind),
                Some(EventKind::Failed { .. })
            ));
            check_failed(&fixture);
        }
        assert!(row.error.unwrap_or_default().contains("Injected failure"));
    }
}

#[tokio::test]
async fn test_revert_add_column_and_index_at_each_stage() {
    let stmt = alter(
        "customers",
        vec![add_int_column("score", 3), add_unique("customers_score_email_key", &["score", "email"])],
    );
    fail_at_each_stage(
        stmt,
        |fixture| {
            assert!(!fixture.has_column("customers", "score"));
            assert!(!fixture.has_index("customers", "customers_score_email_key"));
            assert_eq!(fixture.busy_elements(), 0);
            for row in fixture.changer().rows("customers").unwrap() {
                assert_eq!(row.len(), 3);
            }
        },
        |_| panic!("an addition is always revertible"),
    )
    .await;
}

#[tokio::test]
async fn test_revert_drop_column_at_each_stage() {
    let stmt = alter("customers", vec![drop_column("name")]);
    fail_at_each_stage(
        stmt,
        |fixture| {
            assert!(fixture.has_column("customers", "name"));
            assert_eq!(
                fixture.column_values("customers", "name").unwrap(),
                vec![
                    Some(Datum::String("ada".into())),
                    Some(Datum::String("bob".into())),
                    Some(Datum::String("ada".into())),
                ]
            );
            assert_eq!(fixture.busy_elements(), 0);
        },
        |fixture| assert!(fixture.busy_elements() > 0),
    )
    .await;
}

#[tokio::test]
async fn test_cancel_reverts_pending_change() {
    let fixture = TestFixture::new().expect("Failed to create fixture");
    fixture.setup_shop().await.expect("Failed to set up shop");

    let run_id = fixture
        .changer()
        .submit(&alter("orders", vec![add_int_column("discount", 0)]))
        .unwrap()
        .unwrap();
    fixture.changer().cancel(run_id).expect("Failed to cancel");
    assert_eq!(fixture.changer().run_job(run_id).await.unwrap(), JobStatus::Reverted);

    let status = fixture.changer().status(run_id).unwrap();
    assert_eq!(status.executor_state, ExecutorState::Reverted);
    assert!(!fixture.has_column("orders", "discount"));
    assert_eq!(fixture.busy_elements(), 0);

    let err = fixture
        .changer()
        .cancel(run_id)
        .expect_err("A reverted change cannot be cancelled");
    assert_eq!(err.class(), ErrorClass::Semantic);
}
