use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::types::{CourseRole, EnrollmentStatus};
use crate::services::notifications::NotificationEvent;
use crate::test_support;

fn quiz_payload(course_id: &str) -> serde_json::Value {
    json!({
        "course_id": course_id,
        "title": "Capitals quiz",
        "instructions": "One attempt, no notes",
        "time_limit_minutes": 20,
        "questions": [
            {
                "question_type": "multiple_choice",
                "prompt": "Capital of France?",
                "points": 2,
                "options": [
                    {"text": "Paris", "is_correct": true},
                    {"text": "Lyon"},
                    {"text": "Nice"}
                ]
            },
            {
                "question_type": "short_answer",
                "prompt": "Capital of Italy?",
                "points": 1.5,
                "acceptable_answers": "Rome, Roma"
            }
        ]
    })
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn teacher_creates_and_publishes_test() {
    let ctx = test_support::setup_test_context().await;
    let (course, teacher, _) = test_support::course_with_people(ctx.state.db()).await;
    let token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    let created = test_support::create_test(&ctx.app, &token, quiz_payload(&course.id)).await;
    assert_eq!(created["status"], "draft");
    assert_eq!(created["max_attempts"], 1);
    assert_eq!(created["total_points"].as_f64(), Some(3.5));
    let questions = created["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["order_index"], 0);
    assert_eq!(questions[1]["order_index"], 1);
    assert_eq!(questions[0]["options"][0]["is_correct"], true);

    let test_id = created["id"].as_str().unwrap();
    test_support::publish(&ctx.app, &token, test_id).await;

    let fetched = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/tests/{test_id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("get test");
    assert_eq!(fetched.status(), StatusCode::OK);
    let fetched = test_support::read_json(fetched).await;
    assert_eq!(fetched["status"], "published");
    assert!(fetched["published_at"].is_string());

    let events = test_support::recorded_events(&ctx.notifier, 1).await;
    assert!(matches!(
        events.as_slice(),
        [NotificationEvent::TestPublished { test_id: id, .. }] if id == test_id
    ));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn students_and_pending_teachers_cannot_create_tests() {
    let ctx = test_support::setup_test_context().await;
    let (course, _, student) = test_support::course_with_people(ctx.state.db()).await;
    let pending = test_support::insert_user(ctx.state.db(), "teacher2", "Pat Pending").await;
    test_support::add_membership(
        ctx.state.db(),
        &course.id,
        &pending.id,
        CourseRole::Teacher,
        EnrollmentStatus::Pending,
    )
    .await;

    for user_id in [&student.id, &pending.id] {
        let token = test_support::bearer_token(user_id, ctx.state.settings());
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/tests",
                Some(&token),
                Some(quiz_payload(&course.id)),
            ))
            .await
            .expect("create test");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn invalid_question_sets_are_rejected() {
    let ctx = test_support::setup_test_context().await;
    let (course, teacher, _) = test_support::course_with_people(ctx.state.db()).await;
    let token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    let two_correct = json!({
        "course_id": course.id,
        "title": "Broken",
        "questions": [{
            "question_type": "multiple_choice",
            "prompt": "Pick one",
            "points": 1,
            "options": [
                {"text": "A", "is_correct": true},
                {"text": "B", "is_correct": true}
            ]
        }]
    });
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/tests",
            Some(&token),
            Some(two_correct),
        ))
        .await
        .expect("create test");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let empty = test_support::create_test(
        &ctx.app,
        &token,
        json!({"course_id": course.id, "title": "Empty"}),
    )
    .await;
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tests/{}/publish", empty["id"].as_str().unwrap()),
            Some(&token),
            None,
        ))
        .await
        .expect("publish");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn published_tests_only_accept_metadata_edits() {
    let ctx = test_support::setup_test_context().await;
    let (course, teacher, _) = test_support::course_with_people(ctx.state.db()).await;
    let token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    let created = test_support::create_test(&ctx.app, &token, quiz_payload(&course.id)).await;
    let test_id = created["id"].as_str().unwrap();
    let question_id = created["questions"][0]["id"].as_str().unwrap();

    let update = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/tests/{test_id}/questions/{question_id}"),
            Some(&token),
            Some(json!({"points": 3})),
        ))
        .await
        .expect("update question");
    assert_eq!(update.status(), StatusCode::OK);
    assert_eq!(test_support::read_json(update).await["points"].as_f64(), Some(3.0));

    test_support::publish(&ctx.app, &token, test_id).await;

    let add = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tests/{test_id}/questions"),
            Some(&token),
            Some(json!({"question_type": "essay", "prompt": "Explain", "points": 5})),
        ))
        .await
        .expect("add question");
    assert_eq!(add.status(), StatusCode::BAD_REQUEST);

    let delete = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/tests/{test_id}/questions/{question_id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("delete question");
    assert_eq!(delete.status(), StatusCode::BAD_REQUEST);

    let scoring = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/tests/{test_id}"),
            Some(&token),
            Some(json!({"passing_score": 80})),
        ))
        .await
        .expect("update test");
    assert_eq!(scoring.status(), StatusCode::BAD_REQUEST);

    let metadata = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/tests/{test_id}"),
            Some(&token),
            Some(json!({"title": "Capitals quiz (final)", "show_correct_answers": true})),
        ))
        .await
        .expect("update test");
    assert_eq!(metadata.status(), StatusCode::OK);
    let body = test_support::read_json(metadata).await;
    assert_eq!(body["title"], "Capitals quiz (final)");
    assert_eq!(body["show_correct_answers"], true);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn draft_questions_can_be_removed() {
    let ctx = test_support::setup_test_context().await;
    let (course, teacher, _) = test_support::course_with_people(ctx.state.db()).await;
    let token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    let created = test_support::create_test(&ctx.app, &token, quiz_payload(&course.id)).await;
    let test_id = created["id"].as_str().unwrap();
    let question_id = created["questions"][1]["id"].as_str().unwrap();

    let delete = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/tests/{test_id}/questions/{question_id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("delete question");
    assert_eq!(delete.status(), StatusCode::NO_CONTENT);

    let fetched = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/tests/{test_id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("get test");
    let body = test_support::read_json(fetched).await;
    assert_eq!(body["questions"].as_array().unwrap().len(), 1);
    assert_eq!(body["total_points"].as_f64(), Some(2.0));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn only_the_author_manages_a_test() {
    let ctx = test_support::setup_test_context().await;
    let (course, teacher, _) = test_support::course_with_people(ctx.state.db()).await;
    let colleague = test_support::insert_user(ctx.state.db(), "teacher3", "Cole League").await;
    test_support::add_membership(
        ctx.state.db(),
        &course.id,
        &colleague.id,
        CourseRole::Teacher,
        EnrollmentStatus::Approved,
    )
    .await;

    let token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let created = test_support::create_test(&ctx.app, &token, quiz_payload(&course.id)).await;
    let test_id = created["id"].as_str().unwrap();

    let colleague_token = test_support::bearer_token(&colleague.id, ctx.state.settings());
    for (method, uri) in [
        (Method::GET, format!("/api/v1/tests/{test_id}")),
        (Method::POST, format!("/api/v1/tests/{test_id}/publish")),
        (Method::GET, format!("/api/v1/tests/{test_id}/summary")),
        (Method::GET, format!("/api/v1/tests/{test_id}/attempts")),
    ] {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(method, &uri, Some(&colleague_token), None))
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
    }

    let missing = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/tests/does-not-exist",
            Some(&token),
            None,
        ))
        .await
        .expect("get test");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn closing_requires_a_published_test() {
    let ctx = test_support::setup_test_context().await;
    let (course, teacher, _) = test_support::course_with_people(ctx.state.db()).await;
    let token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    let created = test_support::create_test(&ctx.app, &token, quiz_payload(&course.id)).await;
    let test_id = created["id"].as_str().unwrap();
    let close_uri = format!("/api/v1/tests/{test_id}/close");

    let early = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &close_uri, Some(&token), None))
        .await
        .expect("close draft");
    assert_eq!(early.status(), StatusCode::BAD_REQUEST);

    test_support::publish(&ctx.app, &token, test_id).await;
    let closed = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &close_uri, Some(&token), None))
        .await
        .expect("close");
    assert_eq!(closed.status(), StatusCode::OK);
    assert_eq!(test_support::read_json(closed).await["status"], "closed");
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn total_points_stay_within_the_score_range() {
    let ctx = test_support::setup_test_context().await;
    let (course, teacher, _) = test_support::course_with_people(ctx.state.db()).await;
    let token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let essay =
        |points: i64| json!({"question_type": "essay", "prompt": "Discuss", "points": points});

    let oversized = json!({
        "course_id": course.id,
        "title": "Too heavy",
        "questions": [essay(600_000), essay(600_000)]
    });
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/tests",
            Some(&token),
            Some(oversized),
        ))
        .await
        .expect("create test");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let created = test_support::create_test(
        &ctx.app,
        &token,
        json!({"course_id": course.id, "title": "Heavy", "questions": [essay(600_000)]}),
    )
    .await;
    let test_id = created["id"].as_str().unwrap();
    let question_id = created["questions"][0]["id"].as_str().unwrap();

    let add = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tests/{test_id}/questions"),
            Some(&token),
            Some(essay(500_000)),
        ))
        .await
        .expect("add question");
    assert_eq!(add.status(), StatusCode::BAD_REQUEST);

    let add = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tests/{test_id}/questions"),
            Some(&token),
            Some(essay(400_000)),
        ))
        .await
        .expect("add question");
    assert_eq!(add.status(), StatusCode::CREATED);

    // Raising the first question past the remaining budget is refused; lowering it is fine.
    for (points, expected) in [(600_001, StatusCode::BAD_REQUEST), (500_000, StatusCode::OK)] {
        let update = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::PATCH,
                &format!("/api/v1/tests/{test_id}/questions/{question_id}"),
                Some(&token),
                Some(json!({"points": points})),
            ))
            .await
            .expect("update question");
        assert_eq!(update.status(), expected);
    }
}
