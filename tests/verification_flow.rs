use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use faceverify::common::{FaceAuthError, Result};
use faceverify::core::{
    DetectedFace, DistanceMetric, ExtractionGateway, ExtractionSettings, AnalyzeOptions,
    FaceAnalyzer, FaceUpload, FaceVerifier, ModelConfig, RecognitionModel,
};
use faceverify::identity::{Identity, IdentityProvider, IdentityResolver, SessionRejection};
use faceverify::storage::{EmbeddingStore, MemoryEmbeddingStore};

const DIM: usize = 512;

#[test]
fn unresolved_session_touches_nothing() {
    let fixture = Fixture::new();
    let verifier = fixture.verifier();

    let err = verifier.verify(Some("forged"), Some(&jpeg(b"near"))).unwrap_err();
    assert!(matches!(err, FaceAuthError::InvalidSession));

    let err = verifier.enroll(Some("forged"), Some(&jpeg(b"reference"))).unwrap_err();
    assert!(matches!(err, FaceAuthError::InvalidSession));

    let err = verifier.enroll(None, Some(&jpeg(b"reference"))).unwrap_err();
    assert!(matches!(err, FaceAuthError::MissingSession));

    assert_eq!(fixture.store.gets.get(), 0);
    assert_eq!(fixture.store.upserts.get(), 0);
    assert_eq!(fixture.analyzer.calls.get(), 0);
}

#[test]
fn verification_before_enrollment_is_not_found_without_extraction() {
    let fixture = Fixture::new();
    let verifier = fixture.verifier();

    let err = verifier.verify(Some("session-u1"), Some(&jpeg(b"near"))).unwrap_err();
    assert!(matches!(err, FaceAuthError::NotFound(ref id) if id == "u1"));
    assert_eq!(fixture.analyzer.calls.get(), 0);

    // the stored-embedding check runs before upload validation
    let err = verifier.verify(Some("session-u1"), None).unwrap_err();
    assert!(matches!(err, FaceAuthError::NotFound(_)));
}

#[test]
fn enroll_then_verify_accepts_the_same_person() {
    let fixture = Fixture::new();
    let verifier = fixture.verifier();

    let identity = verifier.enroll(Some("session-u1"), Some(&jpeg(b"reference"))).unwrap();
    assert_eq!(identity.as_str(), "u1");
    assert_eq!(fixture.store.upserts.get(), 1);

    let options = fixture.analyzer.last_options.borrow().clone().unwrap();
    assert_eq!(options.max_faces, Some(2));
    assert_eq!(options.model, RecognitionModel::ArcFace);

    let outcome = verifier.verify(Some("session-u1"), Some(&jpeg(b"near"))).unwrap();
    assert!(outcome.verified);
    assert!((outcome.distance - 0.05).abs() < 1e-4);
    assert_eq!(outcome.threshold, 0.4);
    assert!(outcome.confidence > 50.0 && outcome.confidence <= 100.0);
}

#[test]
fn enroll_then_verify_rejects_a_distant_face() {
    let fixture = Fixture::new();
    let verifier = fixture.verifier();

    verifier.enroll(Some("session-u1"), Some(&jpeg(b"reference"))).unwrap();
    let outcome = verifier.verify(Some("session-u1"), Some(&jpeg(b"far"))).unwrap();

    assert!(!outcome.verified);
    assert!((outcome.distance - 0.6).abs() < 1e-4);
    assert_eq!(outcome.threshold, 0.4);
    assert!(outcome.confidence >= 50.0 && outcome.confidence <= 100.0);
}

#[test]
fn failed_extraction_never_writes() {
    let fixture = Fixture::new();
    let verifier = fixture.verifier();

    let cases: [(&[u8], fn(&FaceAuthError) -> bool); 3] = [
        (&b"empty-room"[..], |e| matches!(e, FaceAuthError::NoFaceDetected)),
        (&b"group"[..], |e| matches!(e, FaceAuthError::MultipleFacesDetected(2))),
        (&b"printout"[..], |e| matches!(e, FaceAuthError::SpoofDetected)),
    ];

    for (image, expected) in cases {
        let err = verifier.enroll(Some("session-u1"), Some(&jpeg(image))).unwrap_err();
        assert!(expected(&err), "unexpected error: {:?}", err);
    }

    assert_eq!(fixture.store.upserts.get(), 0);
    assert!(fixture.store.inner.is_empty());
}

#[test]
fn bad_uploads_fail_before_extraction() {
    let fixture = Fixture::new();
    let verifier = fixture.verifier();

    let pdf = FaceUpload::new("application/pdf", b"reference".to_vec());
    let err = verifier.enroll(Some("session-u1"), Some(&pdf)).unwrap_err();
    assert!(matches!(err, FaceAuthError::NotAnImage(_)));

    let err = verifier.enroll(Some("session-u1"), None).unwrap_err();
    assert!(matches!(err, FaceAuthError::MissingImage));

    assert_eq!(fixture.analyzer.calls.get(), 0);
}

#[test]
fn reenrollment_replaces_the_reference() {
    let fixture = Fixture::new();
    let verifier = fixture.verifier();

    verifier.enroll(Some("session-u1"), Some(&jpeg(b"reference"))).unwrap();
    verifier.enroll(Some("session-u1"), Some(&jpeg(b"reference"))).unwrap();
    let first = verifier.fetch_embedding(Some("session-u1")).unwrap();
    assert_eq!(first, embedding(1.0));

    verifier.enroll(Some("session-u1"), Some(&jpeg(b"far"))).unwrap();
    assert_eq!(verifier.fetch_embedding(Some("session-u1")).unwrap(), embedding(1.6));

    // "far" is now the reference, so "far" verifies exactly
    let outcome = verifier.verify(Some("session-u1"), Some(&jpeg(b"far"))).unwrap();
    assert!(outcome.verified);
    assert_eq!(outcome.distance, 0.0);
}

#[test]
fn identities_do_not_see_each_other() {
    let fixture = Fixture::new();
    let verifier = fixture.verifier();

    verifier.enroll(Some("session-u1"), Some(&jpeg(b"reference"))).unwrap();
    let err = verifier.fetch_embedding(Some("session-u2")).unwrap_err();
    assert!(matches!(err, FaceAuthError::NotFound(ref id) if id == "u2"));
}

fn jpeg(bytes: &[u8]) -> FaceUpload {
    FaceUpload::new("image/jpeg", bytes.to_vec())
}

fn embedding(lead: f32) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[0] = lead;
    v
}

fn live(lead: f32, confidence: f32) -> DetectedFace {
    DetectedFace {
        embedding: embedding(lead),
        is_live: true,
        confidence,
        antispoof_score: 0.95,
    }
}

struct Fixture {
    provider: TokenTable,
    store: CountingStore,
    analyzer: ScriptedAnalyzer,
}

impl Fixture {
    fn new() -> Self {
        let mut faces = HashMap::new();
        faces.insert(b"reference".to_vec(), vec![live(1.0, 0.9)]);
        faces.insert(b"near".to_vec(), vec![live(1.05, 0.9)]);
        faces.insert(b"far".to_vec(), vec![live(1.6, 0.9)]);
        faces.insert(b"empty-room".to_vec(), vec![]);
        faces.insert(b"group".to_vec(), vec![live(1.0, 0.9), live(0.5, 0.8)]);
        faces.insert(
            b"printout".to_vec(),
            vec![DetectedFace {
                embedding: Vec::new(),
                is_live: false,
                confidence: 0.9,
                antispoof_score: 0.1,
            }],
        );

        Self {
            provider: TokenTable(
                [("session-u1", "u1"), ("session-u2", "u2")]
                    .into_iter()
                    .collect(),
            ),
            store: CountingStore::default(),
            analyzer: ScriptedAnalyzer {
                faces,
                calls: Cell::new(0),
                last_options: RefCell::new(None),
            },
        }
    }

    fn verifier(&self) -> FaceVerifier<&TokenTable, &CountingStore, &ScriptedAnalyzer> {
        let settings = ExtractionSettings {
            model: RecognitionModel::ArcFace,
            detector_backend: "scripted".into(),
        };
        let model = ModelConfig::calibrated(RecognitionModel::ArcFace, DistanceMetric::Euclidean)
            .with_threshold(0.4)
            .unwrap();

        FaceVerifier::new(
            IdentityResolver::new(&self.provider),
            &self.store,
            ExtractionGateway::new(&self.analyzer, settings),
            model,
        )
    }
}

struct TokenTable(HashMap<&'static str, &'static str>);

impl IdentityProvider for TokenTable {
    fn verify_session(&self, token: &str) -> std::result::Result<Identity, SessionRejection> {
        self.0
            .get(token)
            .and_then(|id| Identity::parse(*id))
            .ok_or(SessionRejection::BadSignature)
    }
}

#[derive(Default)]
struct CountingStore {
    inner: MemoryEmbeddingStore,
    gets: Cell<usize>,
    upserts: Cell<usize>,
}

impl EmbeddingStore for CountingStore {
    fn get(&self, identity: &Identity) -> Result<Vec<f32>> {
        self.gets.set(self.gets.get() + 1);
        self.inner.get(identity)
    }

    fn upsert(&self, identity: &Identity, embedding: &[f32]) -> Result<()> {
        self.upserts.set(self.upserts.get() + 1);
        self.inner.upsert(identity, embedding)
    }
}

struct ScriptedAnalyzer {
    faces: HashMap<Vec<u8>, Vec<DetectedFace>>,
    calls: Cell<usize>,
    last_options: RefCell<Option<AnalyzeOptions>>,
}

impl FaceAnalyzer for ScriptedAnalyzer {
    fn analyze(&self, image: &[u8], options: &AnalyzeOptions) -> Result<Vec<DetectedFace>> {
        self.calls.set(self.calls.get() + 1);
        assert!(options.anti_spoofing);
        *self.last_options.borrow_mut() = Some(options.clone());
        Ok(self.faces.get(image).cloned().unwrap_or_default())
    }
}
