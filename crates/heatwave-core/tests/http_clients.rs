use chrono::NaiveDate;
use heatwave_core::github::{GitHubApi, GitHubClient};
use heatwave_core::gitlab::{fetch_all_events, GitLabApi, GitLabClient, EventsQuery};
use heatwave_core::token::OAuthRefresher;
use heatwave_core::{FetchError, HttpSettings, TokenRefresher, Window};
use mockito::{Matcher, Server};
use serde_json::json;

fn window() -> Window {
    Window::trailing_year(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
}

fn events_json(n: usize, day: &str) -> String {
    let events: Vec<_> = (0..n)
        .map(|i| {
            json!({
                "id": i,
                "project_id": 12,
                "action_name": "pushed to",
                "target_type": null,
                "created_at": format!("{day}T10:00:00.000Z"),
            })
        })
        .collect();
    serde_json::to_string(&events).unwrap()
}

#[tokio::test]
async fn test_github_client_posts_graphql_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/graphql")
        .match_header("authorization", "Bearer gh-token")
        .match_body(Matcher::PartialJson(json!({
            "variables": {
                "username": "octocat",
                "from": "2023-03-03T00:00:00+00:00",
                "to": "2024-03-01T23:59:59+00:00"
            }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "data": {"user": {"contributionsCollection": {"contributionCalendar": {
                    "totalContributions": 4,
                    "weeks": [{"contributionDays": [
                        {"date": "2024-02-26", "contributionCount": 4},
                        {"date": "2024-02-27", "contributionCount": 0}
                    ]}]
                }}}}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = GitHubClient::new(&server.url(), HttpSettings::default());
    let calendar = client
        .contribution_calendar("gh-token", "octocat", &window())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(calendar.total_contributions, 4);
    assert_eq!(calendar.weeks[0].days.len(), 2);
}

#[tokio::test]
async fn test_github_client_maps_401_to_unauthorized() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/graphql")
        .with_status(401)
        .with_body(r#"{"message":"Bad credentials"}"#)
        .create_async()
        .await;

    let client = GitHubClient::new(&server.url(), HttpSettings::default());
    let err = client
        .contribution_calendar("expired", "octocat", &window())
        .await
        .unwrap_err();
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn test_github_client_maps_exhausted_quota_to_rate_limited() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/graphql")
        .with_status(403)
        .with_header("x-ratelimit-remaining", "0")
        .with_body(r#"{"message":"API rate limit exceeded"}"#)
        .create_async()
        .await;

    let client = GitHubClient::new(&server.url(), HttpSettings::default());
    let err = client
        .contribution_calendar("t", "octocat", &window())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::RateLimited));
}

#[tokio::test]
async fn test_gitlab_client_sends_window_filters() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/users/42/events")
        .match_header("authorization", "Bearer gl-token")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "1".into()),
            Matcher::UrlEncoded("per_page".into(), "100".into()),
            Matcher::UrlEncoded("after".into(), "2023-03-02".into()),
            Matcher::UrlEncoded("before".into(), "2024-03-02".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(events_json(2, "2024-01-15"))
        .create_async()
        .await;

    let client = GitLabClient::new(&server.url(), HttpSettings::default());
    let events = client
        .events_page("gl-token", "42", &EventsQuery::first_page(&window()))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn test_gitlab_pagination_follows_full_pages() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/users/42/events")
        .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
        .with_status(200)
        .with_body(events_json(100, "2024-01-15"))
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/users/42/events")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .with_status(200)
        .with_body(events_json(3, "2024-01-16"))
        .expect(1)
        .create_async()
        .await;

    let client = GitLabClient::new(&server.url(), HttpSettings::default());
    let events = fetch_all_events(&client, "gl-token", "42", &window())
        .await
        .unwrap();

    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(events.len(), 103);
}

#[tokio::test]
async fn test_gitlab_429_is_rate_limited() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/users/42/events")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_header("retry-after", "60")
        .create_async()
        .await;

    let client = GitLabClient::new(&server.url(), HttpSettings::default());
    let err = fetch_all_events(&client, "gl-token", "42", &window())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::RateLimited));
}

#[tokio::test]
async fn test_gitlab_server_error_keeps_status_and_body() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/users/42/events")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let client = GitLabClient::new(&server.url(), HttpSettings::default());
    let err = fetch_all_events(&client, "gl-token", "42", &window())
        .await
        .unwrap_err();
    match err {
        FetchError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_oauth_refresher_exchanges_refresh_token() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth/token")
        .match_header("accept", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "grant_type": "refresh_token",
            "refresh_token": "r-1",
            "client_id": "id",
            "client_secret": "secret"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"a-2","refresh_token":"r-2","expires_in":7200,"token_type":"Bearer"}"#)
        .create_async()
        .await;

    let refresher = OAuthRefresher::new(
        format!("{}/oauth/token", server.url()),
        "id",
        "secret",
        HttpSettings::default(),
    );
    let grant = refresher.refresh("r-1").await.unwrap();

    mock.assert_async().await;
    assert_eq!(grant.access_token, "a-2");
    assert_eq!(grant.refresh_token.as_deref(), Some("r-2"));
    assert_eq!(grant.expires_in, Some(7200));
}

#[tokio::test]
async fn test_oauth_refresher_rejects_error_payload() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(r#"{"error":"bad_refresh_token","error_description":"The refresh token is expired"}"#)
        .create_async()
        .await;

    let refresher = OAuthRefresher::new(
        format!("{}/oauth/token", server.url()),
        "id",
        "secret",
        HttpSettings::default(),
    );
    let err = refresher.refresh("r-1").await.unwrap_err();
    assert!(matches!(err, FetchError::Decode(msg) if msg.contains("bad_refresh_token")));
}

#[tokio::test]
async fn test_oauth_refresher_rejected_grant_is_status_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/oauth/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let refresher = OAuthRefresher::new(
        format!("{}/oauth/token", server.url()),
        "id",
        "secret",
        HttpSettings::default(),
    );
    let err = refresher.refresh("r-1").await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 400, .. }));
}
