use time::macros::datetime;
use time::Duration;

use super::*;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::test_support;

#[test]
fn window_bounds_apply_five_minute_tolerance() {
    let now = datetime!(2025-04-01 12:00);
    let (from, to) = ReminderWindow::Hour.bounds(now);
    assert_eq!(from, datetime!(2025-04-01 12:55));
    assert_eq!(to, datetime!(2025-04-01 13:05));

    let (from, to) = ReminderWindow::Day.bounds(now);
    assert_eq!(from, datetime!(2025-04-02 11:55));
    assert_eq!(to, datetime!(2025-04-02 12:05));
}

#[test]
fn notification_types_name_the_window() {
    let kinds: Vec<String> =
        ReminderWindow::ALL.iter().map(|window| window.notification_type()).collect();
    assert_eq!(
        kinds,
        vec!["WORKSHOP_REMINDER_24H", "WORKSHOP_REMINDER_1H", "WORKSHOP_REMINDER_10M"]
    );
}

#[tokio::test]
async fn repeated_sweep_sends_one_reminder_per_recipient() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();
    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let cook = test_support::insert_user(db, "cook@culina.test", UserRole::Student).await;
    let cancelled = test_support::insert_user(db, "late@culina.test", UserRole::Student).await;

    let now = primitive_now_utc();
    let workshop =
        test_support::insert_workshop(db, &chef.id, now + Duration::minutes(62), Some(10)).await;
    test_support::reserve_directly(db, &workshop.id, &cook.id).await;
    test_support::reserve_directly(db, &workshop.id, &cancelled.id).await;
    crate::services::reservations::cancel(db, &workshop.id, &cancelled.id)
        .await
        .expect("cancel");

    let first = run_sweep(&ctx.state, now).await.expect("first sweep");
    let second = run_sweep(&ctx.state, now).await.expect("second sweep");

    assert_eq!(first.sent(), 2);
    assert_eq!(second.sent(), 0);
    assert_eq!(ctx.mailer.sent_to("chef@culina.test"), 1);
    assert_eq!(ctx.mailer.sent_to("cook@culina.test"), 1);
    assert_eq!(ctx.mailer.sent_to("late@culina.test"), 0);

    let hour = &second.windows[1];
    assert_eq!(hour.window, "1H");
    assert_eq!(hour.skipped, 2);

    let recorded =
        test_support::count_notifications(db, &cook.id, "WORKSHOP_REMINDER_1H", &workshop.id).await;
    assert_eq!(recorded, 1);
}

#[tokio::test]
async fn workshops_outside_every_window_are_ignored() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();
    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;

    let now = primitive_now_utc();
    test_support::insert_workshop(db, &chef.id, now + Duration::minutes(30), None).await;
    test_support::insert_workshop(db, &chef.id, now + Duration::hours(3), None).await;

    let report = run_sweep(&ctx.state, now).await.expect("sweep");
    assert_eq!(report.sent(), 0);
    assert!(report.windows.iter().all(|window| window.workshops == 0));
    assert!(ctx.mailer.sent().is_empty());
}

#[tokio::test]
async fn failed_send_releases_claim_for_retry() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();
    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;

    let now = primitive_now_utc();
    let workshop =
        test_support::insert_workshop(db, &chef.id, now + Duration::minutes(10), None).await;

    ctx.mailer.fail_for("chef@culina.test");
    let failed = run_sweep(&ctx.state, now).await.expect("failing sweep");
    assert_eq!(failed.failed(), 1);
    let recorded =
        test_support::count_notifications(db, &chef.id, "WORKSHOP_REMINDER_10M", &workshop.id).await;
    assert_eq!(recorded, 0);

    ctx.mailer.recover();
    let retried = run_sweep(&ctx.state, now + Duration::minutes(2)).await.expect("retry sweep");
    assert_eq!(retried.sent(), 1);
    assert_eq!(ctx.mailer.sent_to("chef@culina.test"), 1);
}

#[tokio::test]
async fn each_window_is_tracked_separately() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();
    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;

    let start = primitive_now_utc() + Duration::hours(24);
    test_support::insert_workshop(db, &chef.id, start, None).await;

    let day = run_sweep(&ctx.state, start - Duration::hours(24)).await.expect("24h sweep");
    let hour = run_sweep(&ctx.state, start - Duration::hours(1)).await.expect("1h sweep");
    let ten = run_sweep(&ctx.state, start - Duration::minutes(10)).await.expect("10m sweep");

    assert_eq!((day.sent(), hour.sent(), ten.sent()), (1, 1, 1));
    assert_eq!(ctx.mailer.sent_to("chef@culina.test"), 3);
}
