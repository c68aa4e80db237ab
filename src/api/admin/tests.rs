use axum::http::{Method, StatusCode};
use serde_json::json;
use time::Duration;
use tower::ServiceExt;

use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::test_support;

#[tokio::test]
async fn admin_endpoints_reject_non_admins() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let token = test_support::bearer_token(&chef.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/admin/audit-logs",
            Some(&token),
            None,
        ))
        .await
        .expect("audit logs");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/admin/users", None, None))
        .await
        .expect("anonymous users");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_promotes_user_and_action_is_audited() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let admin = test_support::insert_user(db, "admin@culina.test", UserRole::Admin).await;
    let learner = test_support::insert_user(db, "ana@culina.test", UserRole::Student).await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/admin/users/{}", learner.id),
            Some(&token),
            Some(json!({ "role": "instructor" })),
        ))
        .await
        .expect("promote user");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["role"], "instructor");
    assert_eq!(body["isActive"], true);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/admin/users?role=instructor",
            Some(&token),
            None,
        ))
        .await
        .expect("list instructors");
    let body = test_support::read_json(response).await;
    assert_eq!(body["totalCount"], 1);
    assert_eq!(body["items"][0]["id"], learner.id);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/admin/audit-logs",
            Some(&token),
            None,
        ))
        .await
        .expect("audit logs");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["totalCount"], 1);
    assert_eq!(body["items"][0]["action"], "user.update");
    assert_eq!(body["items"][0]["actorId"], admin.id);
    assert_eq!(body["items"][0]["targetId"], learner.id);
    assert_eq!(body["items"][0]["details"]["role"], "instructor");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/admin/users/{}", admin.id),
            Some(&token),
            Some(json!({ "isActive": false })),
        ))
        .await
        .expect("self deactivate");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_a_course_owner_conflicts_until_courses_are_gone() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let admin = test_support::insert_user(db, "admin@culina.test", UserRole::Admin).await;
    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let course = test_support::insert_course(db, "braising", &chef.id, true).await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let uri = format!("/api/v1/admin/users/{}", chef.id);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::DELETE, &uri, Some(&token), None))
        .await
        .expect("delete owner");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {body}");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/courses/{}", course.id),
            Some(&token),
            None,
        ))
        .await
        .expect("delete course");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::DELETE, &uri, Some(&token), None))
        .await
        .expect("delete owner again");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let found = repositories::users::find_by_id(db, &chef.id).await.expect("find user");
    assert!(found.is_none());
}

#[tokio::test]
async fn deleting_a_learner_removes_their_data() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let admin = test_support::insert_user(db, "admin@culina.test", UserRole::Admin).await;
    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let learner = test_support::insert_user(db, "ana@culina.test", UserRole::Student).await;
    let course = test_support::insert_course(db, "stocks", &chef.id, true).await;
    let module = test_support::insert_module(db, &course.id, "Bones", 0).await;
    let lesson = test_support::insert_lesson(db, &module, "Roasting bones").await;
    let quiz = test_support::insert_quiz(db, &lesson.id, None).await;
    test_support::insert_submission(db, &quiz.id, &learner.id, 100, primitive_now_utc()).await;
    test_support::complete_lesson(db, &learner.id, &lesson).await;
    repositories::reviews::upsert(db, &course.id, &learner.id, 5, None, primitive_now_utc())
        .await
        .expect("review");
    repositories::comments::create(db, &lesson.id, &learner.id, "Delicious", primitive_now_utc())
        .await
        .expect("comment");
    let workshop =
        test_support::insert_workshop(db, &chef.id, primitive_now_utc() + Duration::days(1), None)
            .await;
    test_support::reserve_directly(db, &workshop.id, &learner.id).await;

    let token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/admin/users/{}", learner.id),
            Some(&token),
            None,
        ))
        .await
        .expect("delete learner");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let enrolled = repositories::progress::is_enrolled(db, &learner.id, &course.id)
        .await
        .expect("enrollment");
    assert!(!enrolled);
    let reviews = repositories::reviews::list_visible(db, &course.id).await.expect("reviews");
    assert!(reviews.is_empty());
    let comments = repositories::comments::list_visible(db, &lesson.id).await.expect("comments");
    assert!(comments.is_empty());
    let reserved = repositories::workshops::count_reserved(db, &workshop.id).await.expect("count");
    assert_eq!(reserved, 0);

    let audit = repositories::audit_logs::list(db, 0, 10).await.expect("audit");
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, "user.delete");
}

#[tokio::test]
async fn admin_hides_reviews_and_comments() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let admin = test_support::insert_user(db, "admin@culina.test", UserRole::Admin).await;
    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let learner = test_support::insert_user(db, "ana@culina.test", UserRole::Student).await;
    let course = test_support::insert_course(db, "spices", &chef.id, true).await;
    let module = test_support::insert_module(db, &course.id, "Blends", 0).await;
    let lesson = test_support::insert_lesson(db, &module, "Garam masala").await;
    let (review, _) =
        repositories::reviews::upsert(db, &course.id, &learner.id, 1, Some("spam"), primitive_now_utc())
            .await
            .expect("review");
    let comment =
        repositories::comments::create(db, &lesson.id, &learner.id, "spam", primitive_now_utc())
            .await
            .expect("comment");
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/admin/reviews/{}", review.id),
            Some(&token),
            Some(json!({ "hidden": true })),
        ))
        .await
        .expect("hide review");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["hidden"], true);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/admin/comments/{}", comment.id),
            Some(&token),
            Some(json!({ "hidden": true })),
        ))
        .await
        .expect("hide comment");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            "/api/v1/admin/comments/missing",
            Some(&token),
            Some(json!({ "hidden": true })),
        ))
        .await
        .expect("hide missing comment");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let reviews = repositories::reviews::list_visible(db, &course.id).await.expect("reviews");
    assert!(reviews.is_empty());
    let comments = repositories::comments::list_visible(db, &lesson.id).await.expect("comments");
    assert!(comments.is_empty());
    let logged = repositories::audit_logs::count(db).await.expect("audit count");
    assert_eq!(logged, 2);
}

#[tokio::test]
async fn admin_unpublishes_course() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let admin = test_support::insert_user(db, "admin@culina.test", UserRole::Admin).await;
    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let course = test_support::insert_course(db, "offal", &chef.id, true).await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/admin/courses/{}", course.id),
            Some(&token),
            Some(json!({ "published": false })),
        ))
        .await
        .expect("unpublish");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["published"], false);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/courses", None, None))
        .await
        .expect("public list");
    let body = test_support::read_json(response).await;
    assert_eq!(body["totalCount"], 0);

    let audit = repositories::audit_logs::list(db, 0, 10).await.expect("audit");
    assert_eq!(audit[0].action, "course.unpublish");
}
