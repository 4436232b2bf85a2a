//! Tests for the reqwest-backed transport.

use std::time::Duration;

use tessera_net::{HttpService, TransportError};

#[test]
fn test_builder_requires_runtime() {
    let result = HttpService::builder().no_cookies().build();
    assert!(matches!(result, Err(TransportError::Runtime(_))));
}

#[tokio::test]
async fn test_builder_uses_ambient_runtime() {
    let service = HttpService::builder()
        .timeout(Duration::from_secs(5))
        .connect_timeout(Duration::from_secs(2))
        .max_redirects(3)
        .build()
        .expect("Failed to build service");

    assert_eq!(service.config().max_redirects, 3);
    assert_eq!(service.config().connect_timeout, Some(Duration::from_secs(2)));
}

#[tokio::test]
async fn test_invalid_default_header() {
    let result = HttpService::builder().default_header("bad header", "value");
    assert!(matches!(result, Err(TransportError::InvalidHeader(_))));
}

// Note: We use wiremock for mocked HTTP tests
#[cfg(feature = "integration-tests")]
mod integration_tests {
    use super::*;
    use futures_util::StreamExt;
    use serde::Deserialize;
    use tessera_net::http::{HttpMethod, MultipartForm};
    use tessera_net::{DownloadEndpoint, Endpoint, HttpServiceError, UploadEndpoint};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_decoded_get() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/7"))
            .and(query_param("fields", "name"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 7, "name": "Ada"})),
            )
            .mount(&mock_server)
            .await;

        let service = HttpService::new().expect("Failed to build service");
        let endpoint = Endpoint::new(mock_server.uri(), "/users/7").with_parameter("fields", "name");

        let results: Vec<_> = service
            .request_decoded::<User>(&endpoint)
            .into_stream()
            .collect()
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].as_ref().unwrap(),
            &User {
                id: 7,
                name: "Ada".into()
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_post_json_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/users"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({"name": "Grace"})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 8, "name": "Grace"})),
            )
            .mount(&mock_server)
            .await;

        let service = HttpService::new().expect("Failed to build service");
        let endpoint = Endpoint::new(mock_server.uri(), "/users")
            .with_method(HttpMethod::Post)
            .with_parameter("name", "Grace");

        let mut stream = service.request_json(&endpoint).into_stream();
        let (metadata, body) = stream.next().await.unwrap().unwrap();
        assert_eq!(metadata.status, 201);
        assert_eq!(body["id"], 8);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_server_error_is_retried_then_reported() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "timeout"})),
            )
            .expect(3)
            .mount(&mock_server)
            .await;

        let service = HttpService::new().expect("Failed to build service");
        let endpoint = Endpoint::new(mock_server.uri(), "/flaky").with_retries(2);

        let results: Vec<_> = service.request_raw(&endpoint).into_stream().collect().await;
        match &results[..] {
            [Err(HttpServiceError::RequestFailed { status_code, response })] => {
                assert_eq!(*status_code, 500);
                assert_eq!(response["error"], "timeout");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_timeout_is_unknown() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&mock_server)
            .await;

        let service = HttpService::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build service");
        let endpoint = Endpoint::new(mock_server.uri(), "/slow").with_retries(0);

        let results: Vec<_> = service.request_raw(&endpoint).into_stream().collect().await;
        assert!(matches!(
            &results[..],
            [Err(HttpServiceError::Unknown(Some(TransportError::Timeout)))]
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_download_to_file() {
        let mock_server = MockServer::start().await;
        let payload = vec![42u8; 200_000];

        Mock::given(method("GET"))
            .and(path("/files/blob.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("blob.bin");
        let source = url::Url::parse(&format!("{}/files/blob.bin", mock_server.uri())).unwrap();

        let service = HttpService::new().expect("Failed to build service");
        let results: Vec<_> = service
            .download(&DownloadEndpoint::new(source, &destination))
            .into_stream()
            .collect()
            .await;

        assert!(results.iter().all(Result::is_ok));
        let last = results.last().unwrap().as_ref().unwrap();
        assert_eq!(last.bytes_transferred, payload.len() as u64);
        assert_eq!(std::fs::read(&destination).unwrap(), payload);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_download_not_found_leaves_no_file() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("missing.bin");
        let source = url::Url::parse(&format!("{}/missing", mock_server.uri())).unwrap();

        let service = HttpService::new().expect("Failed to build service");
        let results: Vec<_> = service
            .download(&DownloadEndpoint::new(source, &destination))
            .into_stream()
            .collect()
            .await;

        match &results[..] {
            [Err(error)] => assert_eq!(error.status_code(), Some(404)),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!destination.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_multipart_upload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/avatars"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let endpoint = UploadEndpoint::new(mock_server.uri(), "/avatars", |form: &mut MultipartForm| {
            form.append_text("user", "7")
                .append_bytes("avatar", vec![1u8; 100_000], "avatar.png", Some("image/png"));
        });

        let service = HttpService::new().expect("Failed to build service");
        let results: Vec<_> = service.upload(&endpoint).into_stream().collect().await;

        assert!(results.iter().all(Result::is_ok));
        let last = results.last().unwrap().as_ref().unwrap();
        assert_eq!(last.percent(), Some(100));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dropping_stream_cancels_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&mock_server)
            .await;

        let service = HttpService::new().expect("Failed to build service");
        let endpoint = Endpoint::new(mock_server.uri(), "/slow");

        let stream = service.request_raw(&endpoint).into_stream();
        let subscription = stream.subscription().clone();
        drop(stream);

        assert!(subscription.is_closed());
    }
}
