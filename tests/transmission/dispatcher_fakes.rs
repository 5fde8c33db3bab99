//! Scripted session transports: every raw status the archive may send
//! back must land in the right result category.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dimse::{DimseError, RemoteNode, StoreRequest};

use vlphoto::code_table::CodeTable;
use vlphoto::models::Metadata;
use vlphoto::pixel::{ColorMode, DecodedImage, ImageDecoder, PixelError};
use vlphoto::transmission::{
    DispatchOutcome, Destination, Dispatcher, SerializedRecord, SessionTransport, StoreChannel,
    StowDestination, TransmissionResult, TransportError,
};
use vlphoto::{Engine, EngineSettings, ImageInput};

struct Gray;

impl ImageDecoder for Gray {
    fn decode(&self, _bytes: &[u8]) -> Result<DecodedImage, PixelError> {
        Ok(DecodedImage {
            width: 2,
            height: 2,
            mode: ColorMode::Gray8,
            pixels: vec![10, 20, 30, 40],
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

fn node() -> Destination {
    Destination::Dimse(RemoteNode::new("ARCHIVE", "127.0.0.1", 104))
}

#[derive(Clone)]
enum Step {
    Status(u16),
    Fail(fn() -> DimseError),
    Hang,
}

#[derive(Default)]
struct Script {
    steps: Mutex<Vec<Step>>,
    opened: Mutex<Vec<Vec<(String, String)>>>,
    closed: Mutex<bool>,
    refuse: Option<fn() -> DimseError>,
}

/// Answers each store with the next scripted step
#[derive(Clone)]
struct Scripted(Arc<Script>);

impl Scripted {
    fn new(steps: Vec<Step>) -> Self {
        Self(Arc::new(Script {
            steps: Mutex::new(steps.into_iter().rev().collect()),
            ..Script::default()
        }))
    }

    fn refusing(error: fn() -> DimseError) -> Self {
        Self(Arc::new(Script {
            refuse: Some(error),
            ..Script::default()
        }))
    }

    fn opened(&self) -> Vec<Vec<(String, String)>> {
        self.0.opened.lock().unwrap().clone()
    }

    fn closed(&self) -> bool {
        *self.0.closed.lock().unwrap()
    }
}

struct ScriptedChannel {
    script: Arc<Script>,
}

#[async_trait]
impl SessionTransport for Scripted {
    async fn open(
        &self,
        _node: &RemoteNode,
        contexts: &[(String, String)],
    ) -> Result<Box<dyn StoreChannel>, TransportError> {
        if let Some(error) = self.0.refuse {
            return Err(error().into());
        }
        self.0.opened.lock().unwrap().push(contexts.to_vec());
        Ok(Box::new(ScriptedChannel {
            script: Arc::clone(&self.0),
        }))
    }
}

#[async_trait]
impl StoreChannel for ScriptedChannel {
    async fn store(&self, _request: StoreRequest) -> Result<u16, TransportError> {
        let step = self.script.steps.lock().unwrap().pop();
        match step {
            Some(Step::Status(code)) => Ok(code),
            Some(Step::Fail(error)) => Err(error().into()),
            Some(Step::Hang) | None => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(0)
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        *self.script.closed.lock().unwrap() = true;
        Ok(())
    }
}

fn dispatcher(script: &Scripted) -> Dispatcher {
    Dispatcher::new(Duration::from_millis(200)).with_sessions(Arc::new(script.clone()))
}

fn per_record(outcome: DispatchOutcome) -> Vec<TransmissionResult> {
    match outcome {
        DispatchOutcome::PerRecord(results) => results.into_iter().map(|r| r.result).collect(),
        DispatchOutcome::Aggregate(result) => panic!("expected per-record results, got {}", result),
    }
}

#[tokio::test]
async fn statuses_are_classified_per_record() {
    let batch = records(5);
    let script = Scripted::new(vec![
        Step::Status(0x0000),
        Step::Status(0xB006),
        Step::Status(0xC000),
        Step::Status(0xA700),
        Step::Status(0x0299),
    ]);
    let results = per_record(dispatcher(&script).send(&batch, &node()).await);

    assert_eq!(results[0], TransmissionResult::Success);
    assert!(matches!(results[1], TransmissionResult::Warning { code: 0xB006, .. }));
    assert!(matches!(results[2], TransmissionResult::Failure { code: 0xC000, .. }));
    assert!(matches!(results[3], TransmissionResult::Failure { code: 0xA700, .. }));
    assert!(results[3].is_retriable());
    assert_eq!(results[4], TransmissionResult::Unknown { code: Some(0x0299) });
    assert!(script.closed());
}

#[tokio::test]
async fn one_session_with_deduplicated_contexts() {
    let batch = records(3);
    let script = Scripted::new(vec![Step::Status(0); 3]);
    let outcome = dispatcher(&script).send(&batch, &node()).await;
    assert!(outcome.all_stored());

    let opened = script.opened();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].len(), 1);
    assert_eq!(opened[0][0].0, "1.2.840.10008.5.1.4.1.1.77.1.4");
}

#[tokio::test]
async fn silent_archive_is_no_response_and_siblings_still_report() {
    let batch = records(3);
    let script = Scripted::new(vec![
        Step::Status(0),
        Step::Hang,
        Step::Fail(|| DimseError::Timeout("read".into())),
    ]);
    let results = per_record(dispatcher(&script).send(&batch, &node()).await);

    assert_eq!(results[0], TransmissionResult::Success);
    assert_eq!(results[1], TransmissionResult::NoResponse);
    assert_eq!(results[2], TransmissionResult::NoResponse);
}

#[tokio::test]
async fn rejected_association_fails_the_whole_batch() {
    let batch = records(2);
    let script = Scripted::refusing(|| DimseError::AssociationRejected("called AE unknown".into()));
    let outcome = dispatcher(&script).send(&batch, &node()).await;

    match &outcome {
        DispatchOutcome::Aggregate(TransmissionResult::Failure { code, meaning }) => {
            assert_eq!(*code, 0x0110);
            assert!(meaning.contains("called AE unknown"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(
        outcome.result_for(batch[0].sop_instance_uid()),
        outcome.result_for(batch[1].sop_instance_uid())
    );
}

#[tokio::test]
async fn missing_presentation_context_is_sop_class_not_supported() {
    let batch = records(1);
    let script = Scripted::refusing(|| DimseError::NoPresentationContext {
        sop_class: "1.2.840.10008.5.1.4.1.1.77.1.4".into(),
        transfer_syntax: "1.2.840.10008.1.2.1".into(),
    });
    let outcome = dispatcher(&script).send(&batch, &node()).await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Aggregate(TransmissionResult::Failure { code: 0x0122, .. })
    ));
}

#[tokio::test]
async fn unreachable_archive_is_no_response() {
    let batch = records(1);
    let script = Scripted::refusing(|| {
        DimseError::Network(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
    });
    let outcome = dispatcher(&script).send(&batch, &node()).await;
    assert_eq!(outcome, DispatchOutcome::Aggregate(TransmissionResult::NoResponse));
    assert!(!outcome.all_stored());
}

#[tokio::test]
async fn empty_batch_sends_nothing() {
    let script = Scripted::new(Vec::new());
    let outcome = dispatcher(&script).send(&[], &node()).await;
    assert_eq!(outcome, DispatchOutcome::PerRecord(Vec::new()));
    assert!(script.opened().is_empty());
}

#[tokio::test]
async fn stow_destination_without_http_transport() {
    let batch = records(1);
    let script = Scripted::new(Vec::new());
    let stow = Destination::Stow(StowDestination::new("http://127.0.0.1:1/studies"));
    let outcome = dispatcher(&script).send(&batch, &stow).await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Aggregate(TransmissionResult::Failure { code: 0x0110, .. })
    ));
}
