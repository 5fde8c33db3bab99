//! STOW-RS through the real reqwest client against a local axum server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;

use vlphoto::code_table::CodeTable;
use vlphoto::models::Metadata;
use vlphoto::pixel::{ColorMode, DecodedImage, ImageDecoder, PixelError};
use vlphoto::transmission::{
    DispatchOutcome, Destination, Dispatcher, ReqwestPoster, SerializedRecord, StowDestination,
    TransmissionResult,
};
use vlphoto::{Engine, EngineSettings, ImageInput};

struct Gray;

impl ImageDecoder for Gray {
    fn decode(&self, _bytes: &[u8]) -> Result<DecodedImage, PixelError> {
        Ok(DecodedImage {
            width: 2,
            height: 1,
            mode: ColorMode::Gray8,
            pixels: vec![0, 255],
        })
    }
}

fn records(n: usize) -> Vec<SerializedRecord> {
    let engine = Engine::new(
        Arc::new(CodeTable::new()),
        Arc::new(Gray),
        EngineSettings::default(),
    );
    let meta = Metadata::new();
    (0..n)
        .map(|_| {
            let bytes = engine.encode(&ImageInput::new(b"-", &meta)).unwrap();
            SerializedRecord::from_part10(bytes).unwrap()
        })
        .collect()
}

#[derive(Default)]
struct Seen {
    content_type: Option<String>,
    accept: Option<String>,
    authorization: Option<String>,
    body: Vec<u8>,
}

/// Mock archive answering every POST with `status` and `body`
async fn mock_archive(
    status: StatusCode,
    body: serde_json::Value,
) -> (String, Arc<Mutex<Seen>>, tokio::task::JoinHandle<()>) {
    let seen = Arc::new(Mutex::new(Seen::default()));
    let recorder = Arc::clone(&seen);
    let app = Router::new().route(
        "/dicomweb/studies",
        post(move |headers: HeaderMap, payload: Bytes| {
            let recorder = Arc::clone(&recorder);
            let body = body.clone();
            async move {
                let header = |name: &str| {
                    headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string)
                };
                let mut seen = recorder.lock().unwrap();
                seen.content_type = header("content-type");
                seen.accept = header("accept");
                seen.authorization = header("authorization");
                seen.body = payload.to_vec();
                let text = if body.is_null() {
                    String::new()
                } else {
                    body.to_string()
                };
                (status, [("content-type", "application/dicom+json")], text)
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/dicomweb/studies", addr), seen, handle)
}

fn destination(url: &str) -> StowDestination {
    let mut stow = StowDestination::new(url);
    stow.username = Some("photo".into());
    stow.password = Some("secret".into());
    stow.timeout_secs = 5;
    stow
}

async fn send(stow: StowDestination, batch: &[SerializedRecord]) -> DispatchOutcome {
    let dispatcher = Dispatcher::new(stow.timeout())
        .with_http(Arc::new(ReqwestPoster::new(&stow).unwrap()));
    dispatcher.send(batch, &Destination::Stow(stow)).await
}

#[tokio::test]
async fn per_instance_results_from_store_response() {
    let batch = records(3);
    let uid = |i: usize| batch[i].sop_instance_uid().to_string();
    let response = json!({
        "00081199": {"vr": "SQ", "Value": [
            {"00081155": {"vr": "UI", "Value": [uid(0)]}},
            {"00081155": {"vr": "UI", "Value": [uid(1)]},
             "00081196": {"vr": "US", "Value": [0xB007]}}
        ]},
        "00081198": {"vr": "SQ", "Value": [
            {"00081155": {"vr": "UI", "Value": [uid(2)]},
             "00081197": {"vr": "US", "Value": [0xA900]}}
        ]}
    });
    let (url, seen, handle) = mock_archive(StatusCode::ACCEPTED, response).await;

    let outcome = send(destination(&url), &batch).await;
    assert_eq!(outcome.result_for(&uid(0)), Some(&TransmissionResult::Success));
    assert!(matches!(
        outcome.result_for(&uid(1)),
        Some(TransmissionResult::Warning { code: 0xB007, .. })
    ));
    assert!(matches!(
        outcome.result_for(&uid(2)),
        Some(TransmissionResult::Failure { code: 0xA900, .. })
    ));

    let seen = seen.lock().unwrap();
    let content_type = seen.content_type.clone().unwrap();
    assert!(content_type.starts_with("multipart/related; type=\"application/dicom\"; boundary=dicomweb_"));
    assert_eq!(seen.accept.as_deref(), Some("application/dicom+json"));
    assert!(seen.authorization.as_deref().unwrap().starts_with("Basic "));

    let boundary = content_type.rsplit("boundary=").next().unwrap();
    let body = String::from_utf8_lossy(&seen.body);
    assert_eq!(body.matches(&format!("--{}\r\n", boundary)).count(), 3);
    assert!(body.ends_with(&format!("--{}--\r\n", boundary)));
    handle.abort();
}

#[tokio::test]
async fn ok_without_body_is_aggregate_success() {
    let batch = records(2);
    let (url, _seen, handle) = mock_archive(StatusCode::OK, serde_json::Value::Null).await;
    let outcome = send(destination(&url), &batch).await;
    assert_eq!(outcome, DispatchOutcome::Aggregate(TransmissionResult::Success));
    handle.abort();
}

#[tokio::test]
async fn ok_with_empty_dataset_is_aggregate_success() {
    let batch = records(2);
    let (url, _seen, handle) = mock_archive(StatusCode::OK, json!({})).await;
    let outcome = send(destination(&url), &batch).await;
    assert_eq!(outcome, DispatchOutcome::Aggregate(TransmissionResult::Success));
    handle.abort();
}

#[tokio::test]
async fn instance_missing_from_response_is_unknown() {
    let batch = records(2);
    let response = json!({
        "00081199": {"vr": "SQ", "Value": [
            {"00081155": {"vr": "UI", "Value": [batch[0].sop_instance_uid()]}}
        ]}
    });
    let (url, _seen, handle) = mock_archive(StatusCode::OK, response).await;
    let outcome = send(destination(&url), &batch).await;
    assert_eq!(
        outcome.result_for(batch[1].sop_instance_uid()),
        Some(&TransmissionResult::Unknown { code: None })
    );
    handle.abort();
}

#[tokio::test]
async fn server_error_maps_to_dimse_failure() {
    let batch = records(1);
    let (url, _seen, handle) =
        mock_archive(StatusCode::SERVICE_UNAVAILABLE, serde_json::Value::Null).await;
    let outcome = send(destination(&url), &batch).await;
    match outcome {
        DispatchOutcome::Aggregate(TransmissionResult::Failure { code, meaning }) => {
            assert_eq!(code, 0xA701);
            assert_eq!(meaning, "HTTP 503");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    handle.abort();
}

#[tokio::test]
async fn refused_connection_is_no_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let batch = records(1);
    let mut stow = destination(&format!("http://{}/dicomweb/studies", addr));
    stow.timeout_secs = 2;
    let outcome = send(stow, &batch).await;
    assert_eq!(outcome, DispatchOutcome::Aggregate(TransmissionResult::NoResponse));
}

#[tokio::test]
async fn slow_archive_times_out() {
    let app = Router::new().route(
        "/dicomweb/studies",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::OK
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let batch = records(1);
    let mut stow = destination(&format!("http://{}/dicomweb/studies", addr));
    stow.timeout_secs = 1;
    let outcome = send(stow, &batch).await;
    assert_eq!(outcome, DispatchOutcome::Aggregate(TransmissionResult::NoResponse));
    handle.abort();
}
