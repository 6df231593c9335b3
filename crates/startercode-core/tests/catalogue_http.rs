use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;

use reqwest::Client;
use startercode_core::catalogue::fetch_catalogue;
use startercode_core::{Settings, StarterError};

/// Serve exactly one HTTP response on an ephemeral port and return its URL.
fn serve_once(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
    let addr = listener.local_addr().expect("local addr");

    thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader.read_line(&mut line).expect("read request");
            if read == 0 || line == "\r\n" {
                break;
            }
        }
        let mut stream = stream;
        let response = format!(
            "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).expect("write response");
    });

    format!("http://{addr}/catalogue.json")
}

fn settings_for(url: String) -> Settings {
    let mut settings = Settings::default();
    settings.datashop.metadata_link = url;
    settings.datashop.timeout_secs = 5;
    settings
}

#[tokio::test]
async fn fetch_returns_dataset_records() {
    let url = serve_once(
        "HTTP/1.1 200 OK",
        r#"{"dataset": [{"identifier": "1@a", "distribution": [{"format": "CSV"}]}, {"identifier": "2@b"}]}"#,
    );

    let records = fetch_catalogue(&Client::new(), &settings_for(url))
        .await
        .expect("fetch succeeds");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].identifier, "1@a");
    assert!(records[1].distribution.is_empty());
}

#[tokio::test]
async fn error_status_is_a_fetch_error() {
    let url = serve_once("HTTP/1.1 503 Service Unavailable", "{}");

    let err = fetch_catalogue(&Client::new(), &settings_for(url))
        .await
        .unwrap_err();

    match err {
        StarterError::FetchStatus { status, .. } => assert_eq!(status.as_u16(), 503),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn body_without_dataset_key_is_a_parse_error() {
    let url = serve_once("HTTP/1.1 200 OK", r#"{"result": []}"#);

    let err = fetch_catalogue(&Client::new(), &settings_for(url))
        .await
        .unwrap_err();

    assert!(matches!(err, StarterError::Parse(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_fetch_error() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let err = fetch_catalogue(
        &Client::new(),
        &settings_for(format!("http://{addr}/catalogue.json")),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, StarterError::Fetch { .. }));
}
