use axum::http::{header, Method, StatusCode};
use serde_json::json;
use time::Duration;
use tower::ServiceExt;

use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::test_support;

#[tokio::test]
async fn capacity_is_enforced_and_cancellation_frees_a_seat() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let workshop =
        test_support::insert_workshop(db, &chef.id, primitive_now_utc() + Duration::days(2), Some(2))
            .await;

    let mut tokens = Vec::new();
    for name in ["ana", "ben", "cleo"] {
        let user =
            test_support::insert_user(db, &format!("{name}@culina.test"), UserRole::Student).await;
        tokens.push(test_support::bearer_token(&user.id, ctx.state.settings()));
    }

    let reserve_uri = format!("/api/v1/workshops/{}/reserve", workshop.id);
    let mut statuses = Vec::new();
    for token in &tokens {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::POST, &reserve_uri, Some(token), None))
            .await
            .expect("reserve");
        statuses.push(response.status());
    }
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CREATED, StatusCode::CONFLICT]);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::DELETE, &reserve_uri, Some(&tokens[0]), None))
        .await
        .expect("cancel");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["reservation"]["status"], "CANCELLED");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &reserve_uri, Some(&tokens[2]), None))
        .await
        .expect("reserve after cancel");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["reservation"]["status"], "RESERVED");

    let reserved = repositories::workshops::count_reserved(db, &workshop.id).await.expect("count");
    assert_eq!(reserved, 2);
    assert_eq!(ctx.mailer.sent_to("cleo@culina.test"), 1);
}

#[tokio::test]
async fn repeated_reservation_is_idempotent() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let student = test_support::insert_user(db, "ana@culina.test", UserRole::Student).await;
    let workshop =
        test_support::insert_workshop(db, &chef.id, primitive_now_utc() + Duration::days(1), Some(1))
            .await;
    let token = test_support::bearer_token(&student.id, ctx.state.settings());
    let uri = format!("/api/v1/workshops/{}/reserve", workshop.id);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &uri, Some(&token), None))
        .await
        .expect("first reserve");
    let status = response.status();
    let first = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {first}");
    assert!(first.get("ok").is_none());

    // The workshop is now full, yet the holder still gets their seat back.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &uri, Some(&token), None))
        .await
        .expect("second reserve");
    let status = response.status();
    let second = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {second}");
    assert_eq!(second["ok"], true);
    assert_eq!(second["reservation"]["id"], first["reservation"]["id"]);

    let rows = test_support::count_reservation_rows(db, &workshop.id, &student.id).await;
    assert_eq!(rows, 1);
    assert_eq!(ctx.mailer.sent_to("ana@culina.test"), 1);
}

#[tokio::test]
async fn missing_prerequisites_are_listed() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let student = test_support::insert_user(db, "ana@culina.test", UserRole::Student).await;
    let course = test_support::insert_course(db, "knife-skills", &chef.id, true).await;
    let module = test_support::insert_module(db, &course.id, "Basics", 0).await;
    let julienne = test_support::insert_lesson(db, &module, "Julienne").await;
    let brunoise = test_support::insert_lesson(db, &module, "Brunoise").await;

    let workshop =
        test_support::insert_workshop(db, &chef.id, primitive_now_utc() + Duration::days(3), None)
            .await;
    test_support::require_lessons(db, &workshop.id, &[&julienne, &brunoise]).await;
    test_support::complete_lesson(db, &student.id, &julienne).await;

    let token = test_support::bearer_token(&student.id, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/workshops/{}/reserve", workshop.id),
            Some(&token),
            None,
        ))
        .await
        .expect("reserve");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");
    assert_eq!(body["missingLessons"], json!(["Brunoise"]));

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/workshops/{}", workshop.id),
            Some(&token),
            None,
        ))
        .await
        .expect("detail");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["workshop"]["missingLessons"], json!(["Brunoise"]));
    assert_eq!(body["workshop"]["requiredLessons"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["workshop"]["isReserved"], false);
    assert_eq!(body["workshop"]["isInstructor"], false);
}

#[tokio::test]
async fn started_and_ended_workshops_follow_the_read_rule() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let guest = test_support::insert_user(db, "ana@culina.test", UserRole::Student).await;
    let started =
        test_support::insert_workshop(db, &chef.id, primitive_now_utc() - Duration::minutes(10), None)
            .await;
    let ended =
        test_support::insert_workshop(db, &chef.id, primitive_now_utc() - Duration::hours(3), None)
            .await;
    test_support::reserve_directly(db, &started.id, &guest.id).await;

    let guest_token = test_support::bearer_token(&guest.id, ctx.state.settings());
    let chef_token = test_support::bearer_token(&chef.id, ctx.state.settings());

    let cases = [
        (started.id.as_str(), None, StatusCode::FORBIDDEN),
        (started.id.as_str(), Some(guest_token.as_str()), StatusCode::OK),
        (ended.id.as_str(), Some(guest_token.as_str()), StatusCode::NOT_FOUND),
        (ended.id.as_str(), Some(chef_token.as_str()), StatusCode::OK),
    ];

    for (workshop_id, token, expected) in cases {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/workshops/{workshop_id}"),
                token,
                None,
            ))
            .await
            .expect("detail");
        assert_eq!(response.status(), expected, "workshop {workshop_id} token {token:?}");
    }

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/workshops",
            Some(&guest_token),
            None,
        ))
        .await
        .expect("list");
    let body = test_support::read_json(response).await;
    let ids: Vec<&str> = body["workshops"]
        .as_array()
        .expect("workshops")
        .iter()
        .filter_map(|item| item["id"].as_str())
        .collect();
    assert_eq!(ids, vec![started.id.as_str()]);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/workshops?include_ended=true",
            Some(&chef_token),
            None,
        ))
        .await
        .expect("list with ended");
    let body = test_support::read_json(response).await;
    assert_eq!(body["workshops"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn list_hides_started_workshops_without_a_reservation() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let rival = test_support::insert_user(db, "rival@culina.test", UserRole::Instructor).await;
    let bystander = test_support::insert_user(db, "ben@culina.test", UserRole::Student).await;
    let in_progress =
        test_support::insert_workshop(db, &chef.id, primitive_now_utc() - Duration::minutes(10), None)
            .await;
    let upcoming =
        test_support::insert_workshop(db, &chef.id, primitive_now_utc() + Duration::days(1), None)
            .await;

    let bystander_token = test_support::bearer_token(&bystander.id, ctx.state.settings());
    let rival_token = test_support::bearer_token(&rival.id, ctx.state.settings());
    let chef_token = test_support::bearer_token(&chef.id, ctx.state.settings());

    let cases = [
        (None, vec![upcoming.id.as_str()]),
        (Some(bystander_token.as_str()), vec![upcoming.id.as_str()]),
        (Some(rival_token.as_str()), vec![upcoming.id.as_str()]),
        (Some(chef_token.as_str()), vec![in_progress.id.as_str(), upcoming.id.as_str()]),
    ];

    for (token, expected) in cases {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/api/v1/workshops", token, None))
            .await
            .expect("list");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        let ids: Vec<&str> = body["workshops"]
            .as_array()
            .expect("workshops")
            .iter()
            .filter_map(|item| item["id"].as_str())
            .collect();
        assert_eq!(ids, expected, "token {token:?}");
    }

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/workshops/{}", in_progress.id),
            Some(&bystander_token),
            None,
        ))
        .await
        .expect("detail");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_lessons_follow_module_order() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let student = test_support::insert_user(db, "ana@culina.test", UserRole::Student).await;
    let course = test_support::insert_course(db, "french-basics", &chef.id, true).await;
    let later = test_support::insert_module(db, &course.id, "Braises", 1).await;
    let first = test_support::insert_module(db, &course.id, "Foundations", 0).await;
    let braising = test_support::insert_lesson(db, &later, "Braising").await;
    let stocks = test_support::insert_lesson(db, &first, "Stocks").await;
    let sauces = test_support::insert_lesson(db, &first, "Sauces").await;

    let workshop =
        test_support::insert_workshop(db, &chef.id, primitive_now_utc() + Duration::days(2), None)
            .await;
    test_support::require_lessons(db, &workshop.id, &[&braising, &sauces, &stocks]).await;

    let token = test_support::bearer_token(&student.id, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/workshops/{}/reserve", workshop.id),
            Some(&token),
            None,
        ))
        .await
        .expect("reserve");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");
    assert_eq!(body["missingLessons"], json!(["Stocks", "Sauces", "Braising"]));
}

#[tokio::test]
async fn instructor_creates_workshop_with_course_lessons() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let course = test_support::insert_course(db, "breads", &chef.id, true).await;
    let other = test_support::insert_course(db, "sauces", &chef.id, true).await;
    let module = test_support::insert_module(db, &course.id, "Doughs", 0).await;
    let other_module = test_support::insert_module(db, &other.id, "Mother sauces", 0).await;
    let starter = test_support::insert_lesson(db, &module, "Feeding a starter").await;
    let bechamel = test_support::insert_lesson(db, &other_module, "Bechamel").await;
    let token = test_support::bearer_token(&chef.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/workshops",
            Some(&token),
            Some(json!({
                "title": "Sourdough Lab",
                "startTime": "2030-03-01T18:00",
                "durationMin": 120,
                "capacity": 6,
                "courseId": course.id,
                "requiredLessonIds": [bechamel.id]
            })),
        ))
        .await
        .expect("create with foreign lesson");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/workshops",
            Some(&token),
            Some(json!({
                "title": "Sourdough Lab",
                "startTime": "2030-03-01T18:00:00Z",
                "durationMin": 120,
                "capacity": 6,
                "skillLevel": "intermediate",
                "courseId": course.id,
                "requiredLessonIds": [starter.id, starter.id]
            })),
        ))
        .await
        .expect("create workshop");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["workshop"]["endTime"], "2030-03-01T20:00:00Z");
    assert_eq!(body["workshop"]["isInstructor"], true);
    assert_eq!(body["workshop"]["requiredLessons"][0]["title"], "Feeding a starter");
    assert_eq!(body["workshop"]["requiredLessons"].as_array().map(Vec::len), Some(1));

    let workshop_id = body["workshop"]["id"].as_str().expect("id").to_string();
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/workshops/{workshop_id}"),
            Some(&token),
            Some(json!({ "capacity": null, "requiredLessonIds": [] })),
        ))
        .await
        .expect("update workshop");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert!(body["workshop"]["capacity"].is_null());
    assert_eq!(body["workshop"]["requiredLessons"], json!([]));
}

#[tokio::test]
async fn students_cannot_manage_workshops() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let student = test_support::insert_user(db, "ana@culina.test", UserRole::Student).await;
    let workshop =
        test_support::insert_workshop(db, &chef.id, primitive_now_utc() + Duration::days(1), None)
            .await;
    let token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/workshops",
            Some(&token),
            Some(json!({ "title": "Pop-up", "startTime": "2030-01-01T10:00", "durationMin": 60 })),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/workshops/{}", workshop.id),
            Some(&token),
            None,
        ))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let chef_token = test_support::bearer_token(&chef.id, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/workshops/{}", workshop.id),
            Some(&chef_token),
            None,
        ))
        .await
        .expect("owner delete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let found = repositories::workshops::find_by_id(db, &workshop.id).await.expect("lookup");
    assert!(found.is_none());
}

#[tokio::test]
async fn calendar_export_is_an_ics_attachment() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let workshop =
        test_support::insert_workshop(db, &chef.id, primitive_now_utc() + Duration::days(5), None)
            .await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/workshops/{}/calendar.ics", workshop.id),
            None,
            None,
        ))
        .await
        .expect("calendar");
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/calendar"), "content type: {content_type}");
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.starts_with("attachment;"), "disposition: {disposition}");

    let body = test_support::read_text(response).await;
    assert!(body.starts_with("BEGIN:VCALENDAR\r\n"));
    assert!(body.contains(&format!("UID:workshop-{}@culina.test\r\n", workshop.id)));
    assert!(body.contains("SUMMARY:Fresh Pasta Night\r\n"));
    assert!(body.contains(&format!("URL:https://culina.test/workshops/{}\r\n", workshop.id)));
    assert!(body.trim_end().ends_with("END:VCALENDAR"));
}

#[tokio::test]
async fn reminder_sweep_requires_cron_secret() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let student = test_support::insert_user(db, "ana@culina.test", UserRole::Student).await;
    let workshop = test_support::insert_workshop(
        db,
        &chef.id,
        primitive_now_utc() + Duration::hours(24),
        None,
    )
    .await;
    test_support::reserve_directly(db, &workshop.id, &student.id).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/workshops/reminders",
            Some("not-the-secret"),
            None,
        ))
        .await
        .expect("sweep with wrong secret");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(ctx.mailer.sent().is_empty());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/workshops/reminders",
            Some(test_support::TEST_CRON_SECRET),
            None,
        ))
        .await
        .expect("sweep");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["ok"], true);
    assert_eq!(body["windows"][0]["window"], "24H");
    assert_eq!(body["windows"][0]["sent"], 2);
    assert_eq!(ctx.mailer.sent_to("ana@culina.test"), 1);
    assert_eq!(ctx.mailer.sent_to("chef@culina.test"), 1);
}
