use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::json;

use hfdownload::app::{App, NoProgress};
use hfdownload::config::Settings;
use hfdownload::domain::{DatasetId, DownloadRequest};
use hfdownload::error::HfdlError;
use hfdownload::hub::{CatalogClient, HubHttpClient, parse_parquet_listing};
use hfdownload::query::NoQueryEngine;
use hfdownload::store::Store;

struct Route {
    path: String,
    status: u16,
    body: Vec<u8>,
    location: Option<String>,
}

impl Route {
    fn ok(path: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.to_string(),
            status: 200,
            body: body.into(),
            location: None,
        }
    }

    fn status(path: &str, status: u16) -> Self {
        Self {
            path: path.to_string(),
            status,
            body: Vec::new(),
            location: None,
        }
    }

    fn redirect(path: &str, location: &str) -> Self {
        Self {
            path: path.to_string(),
            status: 302,
            body: Vec::new(),
            location: Some(location.to_string()),
        }
    }
}

/// Answers each connection with the matching route (404 otherwise) and
/// closes it. Runs until the test process exits.
fn serve(listener: TcpListener, routes: Vec<Route>) {
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) if line == "\r\n" => break,
                    Ok(_) => {}
                }
            }

            let path = request_line.split_whitespace().nth(1).unwrap_or("/");
            let (status, body, location) = routes
                .iter()
                .find(|route| route.path == path)
                .map(|route| (route.status, route.body.clone(), route.location.clone()))
                .unwrap_or((404, Vec::new(), None));

            let mut head = format!(
                "HTTP/1.1 {status} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                reason(status),
                body.len()
            );
            if let Some(location) = location {
                head.push_str(&format!("Location: {location}\r\n"));
            }
            head.push_str("\r\n");
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
        }
    });
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    (listener, base)
}

fn client(base: &str) -> HubHttpClient {
    HubHttpClient::new(&Settings::default().with_endpoint(base)).unwrap()
}

#[test]
fn listing_not_found_maps_to_metadata_error() {
    let (listener, base) = bind();
    serve(listener, Vec::new());

    let id: DatasetId = "org/name".parse().unwrap();
    let err = client(&base)
        .parquet_listing(&id, "default", "train")
        .unwrap_err();

    assert_matches!(err, HfdlError::MetadataFetch { status: 404, reason } => {
        assert_eq!(reason, "Not Found");
    });
}

#[test]
fn listing_body_is_returned_as_json() {
    let (listener, base) = bind();
    serve(
        listener,
        vec![Route::ok(
            "/api/datasets/org/name/parquet/default/train",
            r#"["https://example.org/a.parquet","https://example.org/b.parquet"]"#,
        )],
    );

    let id: DatasetId = "org/name".parse().unwrap();
    let listing = client(&base)
        .parquet_listing(&id, "default", "train")
        .unwrap();

    assert_eq!(
        parse_parquet_listing(&listing, &id, "train").unwrap(),
        vec!["https://example.org/a.parquet", "https://example.org/b.parquet"]
    );
}

#[test]
fn listing_that_is_not_json_is_a_decode_error() {
    let (listener, base) = bind();
    serve(
        listener,
        vec![Route::ok("/api/datasets/org/name/parquet/default/train", "<html>")],
    );

    let id: DatasetId = "org/name".parse().unwrap();
    let err = client(&base)
        .parquet_listing(&id, "default", "train")
        .unwrap_err();

    assert_matches!(err, HfdlError::MetadataDecode(_));
}

#[test]
fn download_follows_redirects() {
    let (listener, base) = bind();
    serve(
        listener,
        vec![
            Route::redirect("/resolve/0.parquet", &format!("{base}/cdn/0.parquet")),
            Route::ok("/cdn/0.parquet", b"PAR1 body".to_vec()),
        ],
    );

    let mut buffer = Vec::new();
    let bytes = client(&base)
        .download(&format!("{base}/resolve/0.parquet"), &mut buffer)
        .unwrap();

    assert_eq!(bytes, 9);
    assert_eq!(buffer, b"PAR1 body");
}

#[test]
fn download_error_status_is_a_download_error() {
    let (listener, base) = bind();
    serve(listener, vec![Route::status("/broken.parquet", 500)]);

    let mut buffer = Vec::new();
    let err = client(&base)
        .download(&format!("{base}/broken.parquet"), &mut buffer)
        .unwrap_err();

    assert_matches!(err, HfdlError::Download { cause, .. } => {
        assert!(cause.contains("500"));
    });
}

#[test]
fn pipeline_over_http_writes_split_files() {
    let (listener, base) = bind();
    let listing = json!([format!("{base}/files/0"), format!("{base}/files/1")]).to_string();
    serve(
        listener,
        vec![
            Route::ok("/api/datasets/org/name/parquet/default/validation", listing),
            Route::ok("/files/0", b"zero".to_vec()),
            Route::ok("/files/1", b"one".to_vec()),
        ],
    );

    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("datasets")).unwrap();
    let app = App::new(Store::new_with_root(root.clone()), client(&base), NoQueryEngine);

    let request = DownloadRequest::new("org/name")
        .with_split("validation")
        .download_only(true);
    let result = app.run(&request, &NoProgress).unwrap();

    assert_eq!(result.fetch.downloaded(), 2);
    let dir = root.join("org/name/validation");
    assert_eq!(std::fs::read(dir.join("validation_0.parquet")).unwrap(), b"zero");
    assert_eq!(std::fs::read(dir.join("validation_1.parquet")).unwrap(), b"one");
}

#[test]
fn pipeline_over_http_stops_on_missing_split() {
    let (listener, base) = bind();
    serve(listener, Vec::new());

    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("datasets")).unwrap();
    let app = App::new(Store::new_with_root(root.clone()), client(&base), NoQueryEngine);

    let err = app
        .run(&DownloadRequest::new("org/name"), &NoProgress)
        .unwrap_err();

    assert_matches!(err, HfdlError::MetadataFetch { status: 404, .. });
    assert!(!root.as_std_path().exists());
}

#[test]
fn listing_validation_cases() {
    let id: DatasetId = "org/name".parse().unwrap();

    let err = parse_parquet_listing(&json!({"error": "nope"}), &id, "train").unwrap_err();
    assert_matches!(err, HfdlError::MetadataDecode(_));

    let err = parse_parquet_listing(&json!([]), &id, "train").unwrap_err();
    assert_matches!(err, HfdlError::EmptyResult { .. });

    let err = parse_parquet_listing(&json!(["https://a", 42]), &id, "train").unwrap_err();
    assert_matches!(err, HfdlError::MalformedEntry { index: 1 });

    let err = parse_parquet_listing(&json!(["", "https://b"]), &id, "train").unwrap_err();
    assert_matches!(err, HfdlError::MalformedEntry { index: 0 });
}

#[test]
#[ignore = "downloads from huggingface.co"]
fn nonverbal_tts_train_split_has_six_files() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("datasets")).unwrap();
    let settings = Settings::default();
    let app = App::new(
        Store::new_with_root(root.clone()),
        HubHttpClient::new(&settings).unwrap(),
        NoQueryEngine,
    );

    let request = DownloadRequest::new("deepvk/NonverbalTTS").download_only(true);
    app.run(&request, &NoProgress).unwrap();

    let dir = root.join("deepvk/NonverbalTTS/train");
    for i in 0..=5 {
        assert!(dir.join(format!("train_{i}.parquet")).as_std_path().exists());
    }
}
