use serde_json::json;
use ticky_sync::{ApiError, ClientConfig, GameApi, GameStatus, HttpGameApi, JoinedGame, MoveRequest};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> HttpGameApi {
    HttpGameApi::new(ClientConfig::new(&server.uri()).unwrap()).unwrap()
}

#[tokio::test]
async fn test_fetch_snapshot_negotiates_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/games/g1"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "board": [["X", null, null], [null, "O", null], [null, null, null]],
            "current_player": "p1",
            "status": "in_progress",
            "winner": null,
            "players": [
                {"id": "p1", "name": "Ana", "marker": "X"},
                {"id": "p2", "name": "Bruno", "marker": "O"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = api_for(&server).fetch_snapshot("g1").await.unwrap();
    assert_eq!(snapshot.game_status, GameStatus::InProgress);
    assert_eq!(snapshot.board.len(), 3);
    assert_eq!(snapshot.current_player.as_deref(), Some("p1"));
    assert_eq!(snapshot.display_name("p2"), "Bruno");
}

#[tokio::test]
async fn test_fetch_fragment_sends_partial_request_headers() {
    let server = MockServer::start().await;
    let html = r#"<div id="game-container" data-player-id="p1"></div>"#;
    Mock::given(method("GET"))
        .and(path("/api/games/g1"))
        .and(header("accept", "text/html"))
        .and(header("hx-request", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .expect(1)
        .mount(&server)
        .await;

    let fragment = api_for(&server).fetch_fragment("g1").await.unwrap();
    assert_eq!(fragment, html);
}

#[tokio::test]
async fn test_submit_move_posts_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/games/g1/move"))
        .and(body_string_contains("player_id=p1"))
        .and(body_string_contains("row=2"))
        .and(body_string_contains("col=0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let request = MoveRequest {
        player_id: "p1".into(),
        row: 2,
        col: 0,
    };
    api_for(&server).submit_move("g1", &request).await.unwrap();
}

#[tokio::test]
async fn test_rejected_move_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/games/g1/move"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Not your turn"))
        .mount(&server)
        .await;

    let request = MoveRequest {
        player_id: "p2".into(),
        row: 0,
        col: 0,
    };
    let err = api_for(&server).submit_move("g1", &request).await.unwrap_err();
    match err {
        ApiError::Http { status, body } => {
            assert_eq!(status.as_u16(), 403);
            assert_eq!(body, "Not your turn");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_malformed_snapshot_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/games/g1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"board": "nope"}"#))
        .mount(&server)
        .await;

    let err = api_for(&server).fetch_snapshot("g1").await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)), "got {err}");
}

#[tokio::test]
async fn test_missing_game_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/games/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Game not found"))
        .mount(&server)
        .await;

    let err = api_for(&server).fetch_snapshot("gone").await.unwrap_err();
    assert!(matches!(err, ApiError::Http { ref status, .. } if status.as_u16() == 404));
}

#[tokio::test]
async fn test_session_cookie_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/games/g1"))
        .and(header("cookie", "session=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>ok</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::new(&server.uri())
        .unwrap()
        .with_session_cookie("session=abc123");
    let api = HttpGameApi::new(config).unwrap();
    assert_eq!(api.fetch_fragment("g1").await.unwrap(), "<p>ok</p>");
}

#[tokio::test]
async fn test_join_game_returns_assigned_seat() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/games/g1/join"))
        .and(header("hx-request", "true"))
        .and(body_string_contains("player_name=Bruno+Lima"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "player_id": "p2",
            "marker": "O",
            "game_status": "waiting",
            "players": [
                {"id": "p1", "name": "Ana", "marker": "X"},
                {"id": "p2", "name": "Bruno Lima", "marker": "O"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let joined = api_for(&server).join_game("g1", "Bruno Lima").await.unwrap();
    assert_eq!(
        joined,
        JoinedGame {
            player_id: "p2".into(),
            marker: Some("O".into()),
            game_status: Some(GameStatus::Waiting),
        }
    );
}

#[tokio::test]
async fn test_join_full_game_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/games/g1/join"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Game is full"))
        .mount(&server)
        .await;

    let err = api_for(&server).join_game("g1", "Carla").await.unwrap_err();
    assert!(matches!(err, ApiError::Http { ref body, .. } if body == "Game is full"));
}

#[tokio::test]
async fn test_start_game_posts_player_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/games/g1/start"))
        .and(body_string_contains("player_id=p1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<div id=\"game-container\"></div>"))
        .expect(1)
        .mount(&server)
        .await;

    api_for(&server).start_game("g1", "p1").await.unwrap();
}

#[tokio::test]
async fn test_start_by_non_creator_is_forbidden() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/games/g1/start"))
        .respond_with(
            ResponseTemplate::new(403).set_body_string("Only the game creator can start the game"),
        )
        .mount(&server)
        .await;

    let err = api_for(&server).start_game("g1", "p2").await.unwrap_err();
    assert!(matches!(err, ApiError::Http { ref status, .. } if status.as_u16() == 403));
}

#[test]
fn test_invalid_cookie_is_rejected_up_front() {
    let config = ClientConfig::new("http://localhost:8000")
        .unwrap()
        .with_session_cookie("bad\nvalue");
    assert!(matches!(
        HttpGameApi::new(config),
        Err(ApiError::InvalidCookie)
    ));
}
