use chrono::Utc;
use common::Provider;
use spotted::identity::ReconcileReport;

use crate::common::{TestApp, claims, unit_square};

#[tokio::test]
async fn clean_state_reports_nothing_to_do() {
    let app = TestApp::spawn().await;
    let ann = app.login(Provider::Facebook, "fb1").await;
    app.post(ann.id, false, 0.5, 0.5).await;

    let report = app.linker.reconcile().await.unwrap();

    assert_eq!(report, ReconcileReport::default());
}

#[tokio::test]
async fn archives_content_of_an_account_disabled_without_cascade() {
    let app = TestApp::spawn().await;
    let ann = app.login(Provider::Facebook, "fb1").await;
    app.post(ann.id, false, 0.5, 0.5).await;
    app.post(ann.id, true, 0.5, 0.5).await;
    // The flag landed but the cascade never ran.
    app.accounts().update_disabled(ann.id, true).await.unwrap();

    let report = app.linker.reconcile().await.unwrap();

    assert_eq!(report.archived, 2);
    assert!(app.in_region(&unit_square()).await.is_empty());
    assert!(app.owned(ann.id).await.is_empty());
}

#[tokio::test]
async fn unarchives_content_of_an_active_account() {
    let app = TestApp::spawn().await;
    let ann = app.login(Provider::Facebook, "fb1").await;
    app.post(ann.id, false, 0.5, 0.5).await;
    app.content()
        .set_archived_for_owner(ann.id, true)
        .await
        .unwrap();

    let report = app.linker.reconcile().await.unwrap();

    assert_eq!(report.unarchived, 1);
    assert_eq!(app.in_region(&unit_square()).await.len(), 1);
}

#[tokio::test]
async fn finishes_a_merge_that_stopped_before_moving_content() {
    let app = TestApp::spawn().await;
    let ann = app.login(Provider::Facebook, "fb1").await;
    let gail = app.login(Provider::Google, "g1").await;
    app.post(gail.id, false, 0.5, 0.5).await;

    // Identity moved, content did not.
    app.accounts()
        .supersede(gail.id, Provider::Google, "g1", ann.id)
        .await
        .unwrap();
    app.accounts()
        .update_identity(ann.id, Provider::Google, "g1", Utc::now())
        .await
        .unwrap();

    let report = app.linker.reconcile().await.unwrap();

    assert_eq!(report.reassigned, 1);
    assert_eq!(report.identities_restored, 0);
    assert_eq!(app.owned(ann.id).await.len(), 1);
    assert!(app.owned(gail.id).await.is_empty());
    assert_eq!(app.in_region(&unit_square()).await.len(), 1);
}

#[tokio::test]
async fn restores_an_account_whose_merge_never_attached_the_identity() {
    let app = TestApp::spawn().await;
    let ann = app.login(Provider::Facebook, "fb1").await;
    let gail = app.login(Provider::Google, "g1").await;
    app.post(gail.id, false, 0.5, 0.5).await;

    // Retired, but the survivor never received it.
    app.accounts()
        .supersede(gail.id, Provider::Google, "g1", ann.id)
        .await
        .unwrap();

    let report = app.linker.reconcile().await.unwrap();

    assert_eq!(report.identities_restored, 1);
    assert_eq!(report.reassigned, 0);

    let restored = app.account(gail.id).await;
    assert_eq!(restored.google_id.as_deref(), Some("g1"));
    assert_eq!(restored.successor_id, None);
    assert!(!restored.disabled);
    assert_eq!(app.account(ann.id).await.google_id, None);

    let login = app
        .linker
        .login_or_create(&claims(Provider::Google, "g1"))
        .await
        .unwrap();
    assert_eq!(login.account.id, gail.id);
    assert_eq!(app.owned(gail.id).await.len(), 1);
}

#[tokio::test]
async fn running_twice_is_a_no_op_the_second_time() {
    let app = TestApp::spawn().await;
    let ann = app.login(Provider::Facebook, "fb1").await;
    app.post(ann.id, false, 0.5, 0.5).await;
    app.accounts().update_disabled(ann.id, true).await.unwrap();

    app.linker.reconcile().await.unwrap();
    let second = app.linker.reconcile().await.unwrap();

    assert_eq!(second, ReconcileReport::default());
}
