// Integration tests for ApiClient.
// Runs each endpoint against a wiremock server: paths, query strings, bodies and error mapping.

use serde_json::json;
use summary_sync::api::{
    ApiClient, CreateFeedRequest, FeedType, StoredSummaryFilter, SummarySource,
    UpdateStoredSummaryRequest,
};
use summary_sync::config::ApiSettings;
use summary_sync::SyncError;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    let settings = ApiSettings::default().with_base_url(format!("{}/", server.uri()));
    ApiClient::new(&settings).expect("failed to create client")
}

fn feed_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "guild_id": "g1",
        "channel_id": null,
        "feed_type": "rss",
        "is_public": true,
        "url": format!("https://example.test/feeds/{id}.xml")
    })
}

#[tokio::test]
async fn test_list_feeds_uses_versioned_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/guilds/g1/feeds"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([feed_json("f1")])))
        .expect(1)
        .mount(&server)
        .await;

    let feeds = client(&server).list_feeds("g1").await.expect("list failed");

    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].id, "f1");
    assert_eq!(feeds[0].feed_type, FeedType::Rss);
    assert!(feeds[0].is_public);
}

#[tokio::test]
async fn test_error_detail_becomes_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/guilds/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "Guild not found" })))
        .mount(&server)
        .await;

    let err = client(&server).get_guild("missing").await.unwrap_err();

    assert!(err.is_not_found());
    match err {
        SyncError::Http { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Guild not found");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_error_without_json_keeps_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/guilds"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client(&server).list_guilds().await.unwrap_err();

    assert_eq!(err.status(), Some(502));
    assert!(err.to_string().contains("bad gateway"));
}

#[tokio::test]
async fn test_stored_summary_filters_in_query_string() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/guilds/g1/stored-summaries"))
        .and(query_param("page", "2"))
        .and(query_param("pinned", "true"))
        .and(query_param("tags", "weekly,ops"))
        .and(query_param("source", "scheduled"))
        .and(query_param_is_missing("archived"))
        .and(query_param_is_missing("limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": "s1",
                "created_at": "2024-03-01T12:00:00Z",
                "is_pinned": true,
                "tags": ["weekly", "ops"],
                "source": "scheduled"
            }],
            "total": 11,
            "page": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let filter = StoredSummaryFilter {
        page: Some(2),
        pinned: Some(true),
        tags: vec!["weekly".into(), "ops".into()],
        source: SummarySource::Scheduled,
        ..Default::default()
    };
    let page = client(&server)
        .list_stored_summaries("g1", &filter)
        .await
        .expect("list failed");

    assert_eq!(page.total, 11);
    assert_eq!(page.page, 2);
    assert_eq!(page.items[0].source, SummarySource::Scheduled);
    assert!(page.items[0].is_pinned);
}

#[tokio::test]
async fn test_create_feed_posts_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/guilds/g1/feeds"))
        .and(body_json(json!({
            "feed_type": "atom",
            "is_public": false,
            "title": "Weekly digest",
            "include_full_content": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(feed_json("f2")))
        .expect(1)
        .mount(&server)
        .await;

    let request = CreateFeedRequest {
        feed_type: FeedType::Atom,
        title: Some("Weekly digest".into()),
        include_full_content: true,
        ..Default::default()
    };
    let feed = client(&server)
        .create_feed("g1", &request)
        .await
        .expect("create failed");

    assert_eq!(feed.id, "f2");
}

#[tokio::test]
async fn test_patch_sends_only_set_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/guilds/g1/stored-summaries/s1"))
        .and(body_json(json!({ "is_pinned": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "s1",
            "created_at": "2024-03-01T12:00:00Z",
            "is_pinned": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let update = UpdateStoredSummaryRequest {
        is_pinned: Some(true),
        ..Default::default()
    };
    let summary = client(&server)
        .update_stored_summary("g1", "s1", &update)
        .await
        .expect("update failed");

    assert!(summary.is_pinned);
}

#[tokio::test]
async fn test_delete_accepts_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/guilds/g1/schedules/s1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .delete_schedule("g1", "s1")
        .await
        .expect("delete failed");
}

#[tokio::test]
async fn test_health_served_from_root() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "healthy",
            "version": "2.1.0"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let health = client(&server).health().await.expect("health failed");

    assert!(health.is_healthy());
    assert_eq!(health.version.as_deref(), Some("2.1.0"));
}

#[tokio::test]
async fn test_ids_are_percent_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/prompts/defaults/weekly%20digest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "category": "weekly digest",
            "content": "Summarize the week."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let prompt = client(&server)
        .get_default_prompt("weekly digest")
        .await
        .expect("prompt failed");

    assert_eq!(prompt.category, "weekly digest");
}
