use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::test_support;

#[tokio::test]
async fn author_or_admin_may_delete_comment() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let admin = test_support::insert_user(db, "admin@culina.test", UserRole::Admin).await;
    let author = test_support::insert_user(db, "author@culina.test", UserRole::Student).await;
    let other = test_support::insert_user(db, "other@culina.test", UserRole::Student).await;
    let course = test_support::insert_course(db, "grill", &chef.id, true).await;
    let module = test_support::insert_module(db, &course.id, "Fire", 0).await;
    let lesson = test_support::insert_lesson(db, &module, "Two-zone fire").await;
    let author_token = test_support::bearer_token(&author.id, ctx.state.settings());
    let other_token = test_support::bearer_token(&other.id, ctx.state.settings());
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let comments_uri = format!("/api/v1/lessons/{}/comments", lesson.id);

    let mut comment_ids = Vec::new();
    for text in ["Works great with charcoal.", "Gas grills too?"] {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &comments_uri,
                Some(&author_token),
                Some(json!({ "body": text })),
            ))
            .await
            .expect("create comment");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "response: {body}");
        comment_ids.push(body["id"].as_str().expect("comment id").to_string());
    }

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, &comments_uri, Some(&other_token), None))
        .await
        .expect("list comments");
    let body = test_support::read_json(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(2));

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/comments/{}", comment_ids[0]),
            Some(&other_token),
            None,
        ))
        .await
        .expect("foreign delete");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/comments/{}", comment_ids[0]),
            Some(&author_token),
            None,
        ))
        .await
        .expect("own delete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/comments/{}", comment_ids[1]),
            Some(&admin_token),
            None,
        ))
        .await
        .expect("admin delete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/comments/{}", comment_ids[1]),
            Some(&admin_token),
            None,
        ))
        .await
        .expect("repeat delete");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let remaining = repositories::comments::list_visible(db, &lesson.id).await.expect("comments");
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn hidden_comments_drop_out_of_the_list() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let learner = test_support::insert_user(db, "ana@culina.test", UserRole::Student).await;
    let course = test_support::insert_course(db, "pickles", &chef.id, true).await;
    let module = test_support::insert_module(db, &course.id, "Brines", 0).await;
    let lesson = test_support::insert_lesson(db, &module, "Quick pickles").await;

    let now = primitive_now_utc();
    let kept = repositories::comments::create(db, &lesson.id, &learner.id, "Crunchy!", now)
        .await
        .expect("comment");
    let hidden = repositories::comments::create(db, &lesson.id, &learner.id, "Buy my knives", now)
        .await
        .expect("comment");
    repositories::comments::set_hidden(db, &hidden.id, true)
        .await
        .expect("hide")
        .expect("comment exists");

    let token = test_support::bearer_token(&learner.id, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/lessons/{}/comments", lesson.id),
            Some(&token),
            None,
        ))
        .await
        .expect("list comments");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let ids: Vec<&str> =
        body.as_array().expect("comments").iter().filter_map(|item| item["id"].as_str()).collect();
    assert_eq!(ids, vec![kept.id.as_str()]);
}

#[tokio::test]
async fn blank_comment_is_rejected() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let chef = test_support::insert_user(db, "chef@culina.test", UserRole::Instructor).await;
    let course = test_support::insert_course(db, "rice", &chef.id, true).await;
    let module = test_support::insert_module(db, &course.id, "Grains", 0).await;
    let lesson = test_support::insert_lesson(db, &module, "Risotto").await;
    let token = test_support::bearer_token(&chef.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/lessons/{}/comments", lesson.id),
            Some(&token),
            Some(json!({ "body": "   " })),
        ))
        .await
        .expect("blank comment");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
