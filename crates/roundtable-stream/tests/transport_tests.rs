//! SSE transport tests
//!
//! Serves canned `text/event-stream` bodies from a mock server and checks
//! the frames that come out the other end.

use std::time::Duration;

use futures::StreamExt;
use roundtable_stream::{Frame, FrameSource, SseTransport, StreamError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> SseTransport {
    SseTransport::new(Duration::from_secs(5)).unwrap()
}

async fn serve_stream(body: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sessions/1/stream"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    server
}

async fn collect(server: &MockServer) -> Vec<Result<Frame, StreamError>> {
    let url = format!("{}/sessions/1/stream", server.uri());
    let stream = transport().connect(&url).await.unwrap();
    stream.collect().await
}

mod sse_transport_tests {
    use super::*;

    #[tokio::test]
    async fn test_labeled_and_unlabeled_frames() {
        let body = concat!(
            "event: status\n",
            "data: {\"status\": \"running\", \"message\": \"Connected to session stream.\"}\n",
            "\n",
            "data: {\"message\": \"plain\"}\n",
            "\n",
            "event: analysts_ready\n",
            "data: {\"status\": \"awaiting_feedback\"}\n",
            "\n",
        );
        let server = serve_stream(body).await;

        let frames: Vec<Frame> = collect(&server)
            .await
            .into_iter()
            .map(|f| f.unwrap())
            .collect();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].label(), Some("status"));
        assert!(frames[0].data.contains("Connected"));
        assert_eq!(frames[1].label(), None);
        assert_eq!(frames[1].data, "{\"message\": \"plain\"}");
        assert_eq!(frames[2].label(), Some("analysts_ready"));
    }

    #[tokio::test]
    async fn test_multiline_data_is_joined() {
        let body = "event: interview_progress\ndata: line one\ndata: line two\n\n";
        let server = serve_stream(body).await;

        let frames = collect(&server).await;
        assert_eq!(frames.len(), 1);
        let frame = frames[0].as_ref().unwrap();
        assert_eq!(frame.data, "line one\nline two");
    }

    #[tokio::test]
    async fn test_frame_order_is_preserved() {
        let body = "event: ping\ndata: {}\n\nevent: status\ndata: a\n\nevent: status\ndata: b\n\n";
        let server = serve_stream(body).await;

        let data: Vec<String> = collect(&server)
            .await
            .into_iter()
            .map(|f| f.unwrap().data)
            .collect();
        assert_eq!(data, vec!["{}", "a", "b"]);
    }

    #[tokio::test]
    async fn test_not_found_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/404/stream"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string("{\"detail\":\"Session not found.\"}"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/sessions/404/stream", server.uri());
        let result = transport().connect(&url).await;

        match result {
            Err(err) => {
                assert_eq!(err.status(), Some(404));
                assert!(err.to_string().contains("Session not found"));
            }
            Ok(_) => panic!("Expected status error"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connect_error() {
        // Port 9 (discard) is not expected to run an HTTP server
        let result = transport().connect("http://127.0.0.1:9/sessions/1/stream").await;
        assert!(matches!(result, Err(StreamError::Connect(_))));
    }
}
