// tests/pipeline_e2e.rs
//
// Whole-run behaviour against in-memory collaborators: stub pages, scripted model
// replies, a memory store and a recording notifier.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use page_sentinel::classify::{Classifier, ScriptedGenerator};
use page_sentinel::fetch::{FetchError, PageSource};
use page_sentinel::model::{MonitoredSource, Summary};
use page_sentinel::notify::RecordingNotifier;
use page_sentinel::pipeline::{Pipeline, PipelineError, NO_CHANGES_TITLE};
use page_sentinel::store::{MemoryStore, Store};
use page_sentinel::fingerprint;

/// Serves fixed text per URL; URLs without an entry fail like a blocked page.
#[derive(Default)]
struct StubPages {
    pages: Mutex<HashMap<String, String>>,
}

impl StubPages {
    fn with(pages: &[(&str, &str)]) -> Self {
        let s = Self::default();
        for (url, text) in pages {
            s.set(url, text);
        }
        s
    }

    fn set(&self, url: &str, text: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), text.to_string());
    }
}

#[async_trait]
impl PageSource for StubPages {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(FetchError::Status(403))
    }
}

fn seeded(id: &str, name: &str, url: &str, content: &str) -> MonitoredSource {
    let mut s = MonitoredSource::new(id, name, url);
    s.last_content = Some(content.to_string());
    s.content_hash = Some(fingerprint(Some(content)));
    s.last_checked = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    s
}

struct Harness {
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    generator: Arc<ScriptedGenerator>,
    pipeline: Pipeline,
}

fn harness(
    sources: Vec<MonitoredSource>,
    pages: StubPages,
    generator: ScriptedGenerator,
    notifier: RecordingNotifier,
) -> Harness {
    let pages = Arc::new(pages);
    let store = Arc::new(MemoryStore::new(sources, vec![]));
    let notifier = Arc::new(notifier);
    let generator = Arc::new(generator);
    let pipeline = Pipeline::new(
        pages.clone(),
        Classifier::with_generator(generator.clone()),
        store.clone(),
        notifier.clone(),
    );
    Harness {
        store,
        notifier,
        generator,
        pipeline,
    }
}

const MEANINGFUL_REPLY: &str = r#"{"is_meaningful": true, "summary": ["Deadline extended to July 1"], "confidence": 0.9}"#;

#[tokio::test]
async fn meaningful_change_is_recorded_notified_and_persisted() {
    let url = "https://uni.example/admissions";
    let h = harness(
        vec![seeded("s1", "Admissions", url, "Deadline: June 1")],
        StubPages::with(&[(url, "Deadline: July 1")]),
        ScriptedGenerator::reply(MEANINGFUL_REPLY),
        RecordingNotifier::new(),
    );

    let report = h.pipeline.run_once().await.expect("run succeeds");

    let changes = h.store.changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].source_id, "s1");
    assert_eq!(changes[0].title, "Admissions");
    assert_eq!(changes[0].summary, "• Deadline extended to July 1");
    assert_eq!(changes[0].url, url);
    assert!(changes[0].is_meaningful);
    assert!(!changes[0].is_read);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1, "no digest when something meaningful happened");
    assert_eq!(sent[0].title, "Admissions");
    assert_eq!(
        sent[0].summary,
        Summary::BulletList(vec!["Deadline extended to July 1".into()])
    );
    assert_eq!(sent[0].url.as_deref(), Some(url));

    let rec = h.store.source("s1").unwrap();
    assert_eq!(rec.last_content.as_deref(), Some("Deadline: July 1"));
    assert_eq!(rec.content_hash, Some(fingerprint(Some("Deadline: July 1"))));

    assert!(h.generator.prompts()[0].contains("OLD:\nDeadline: June 1"));
    assert_eq!(report.meaningful, vec!["Admissions".to_string()]);
    assert!(!report.digest_sent);
}

#[tokio::test]
async fn unchanged_sources_get_refreshed_and_one_digest() {
    let sources = vec![
        seeded("a", "A", "https://a.example", "alpha page"),
        seeded("b", "B", "https://b.example", "beta page"),
        seeded("c", "C", "https://c.example", "gamma page"),
    ];
    // Formatting-only differences keep the same fingerprint.
    let pages = StubPages::with(&[
        ("https://a.example", "alpha page"),
        ("https://b.example", "Beta  Page"),
        ("https://c.example", "gamma\npage"),
    ]);
    let before = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let h = harness(sources, pages, ScriptedGenerator::default(), RecordingNotifier::new());

    let report = h.pipeline.run_once().await.unwrap();

    assert!(h.store.changes().is_empty());
    assert_eq!(h.generator.calls(), 0, "no classification without a fingerprint change");
    for id in ["a", "b", "c"] {
        assert!(h.store.source(id).unwrap().last_checked.unwrap() > before);
    }
    assert_eq!(report.unchanged, 3);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, NO_CHANGES_TITLE);
    assert_eq!(sent[0].url, None);
    let Summary::PlainText(body) = &sent[0].summary else {
        panic!("digest is plain text");
    };
    assert!(body.contains("• A\n• B\n• C"));
    assert!(report.digest_sent);
}

#[tokio::test]
async fn second_run_over_same_content_is_quiet() {
    let url = "https://uni.example/fees";
    let h = harness(
        vec![MonitoredSource::new("s1", "Fees", url)],
        StubPages::with(&[(url, "Tuition: 1000 EUR")]),
        ScriptedGenerator::reply(
            r#"{"is_meaningful": true, "summary": ["Tuition announced"], "confidence": 0.8}"#,
        ),
        RecordingNotifier::new(),
    );

    h.pipeline.run_once().await.unwrap();
    assert_eq!(h.store.changes().len(), 1);

    let second = h.pipeline.run_once().await.unwrap();
    assert_eq!(h.store.changes().len(), 1, "no new change on identical content");
    assert_eq!(h.generator.calls(), 1);
    assert_eq!(second.unchanged, 1);
    assert!(second.meaningful.is_empty());
}

#[tokio::test]
async fn fetch_failure_skips_only_that_source() {
    let h = harness(
        vec![
            seeded("a", "A", "https://a.example", "alpha"),
            seeded("b", "B", "https://b.example", "beta"),
        ],
        StubPages::with(&[("https://b.example", "beta")]),
        ScriptedGenerator::default(),
        RecordingNotifier::new(),
    );

    let report = h.pipeline.run_once().await.unwrap();

    assert_eq!(report.failed, vec!["A".to_string()]);
    assert_eq!(report.checked, vec!["B".to_string()]);
    assert_eq!(h.store.update_calls(), 1);
    let a = h.store.source("a").unwrap();
    assert_eq!(a.last_content.as_deref(), Some("alpha"), "failed source untouched");

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    let Summary::PlainText(body) = &sent[0].summary else {
        panic!("digest is plain text");
    };
    assert!(body.contains("• B"));
    assert!(body.contains("could not be checked this run:\n\n• A"));
}

#[tokio::test]
async fn unusable_model_reply_still_advances_the_record() {
    let url = "https://uni.example/news";
    let h = harness(
        vec![seeded("s1", "News", url, "old text")],
        StubPages::with(&[(url, "new text")]),
        ScriptedGenerator::reply("Sorry, I cannot help with that."),
        RecordingNotifier::new(),
    );

    let report = h.pipeline.run_once().await.unwrap();

    assert!(h.store.changes().is_empty());
    assert_eq!(report.changed_not_meaningful, 1);
    let rec = h.store.source("s1").unwrap();
    assert_eq!(rec.content_hash, Some(fingerprint(Some("new text"))));
    // Only the digest goes out.
    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.notifier.sent()[0].title, NO_CHANGES_TITLE);
}

#[tokio::test]
async fn store_write_failure_aborts_the_run() {
    let h = harness(
        vec![
            seeded("a", "A", "https://a.example", "alpha"),
            seeded("b", "B", "https://b.example", "beta"),
        ],
        StubPages::with(&[("https://a.example", "alpha"), ("https://b.example", "beta")]),
        ScriptedGenerator::default(),
        RecordingNotifier::new(),
    );
    h.store.fail_updates(true);

    let err = h.pipeline.run_once().await.unwrap_err();

    assert!(matches!(err, PipelineError::Store(_)), "got {err:?}");
    assert_eq!(h.store.update_calls(), 1, "second source never processed");
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn notification_failure_does_not_stop_the_run() {
    let h = harness(
        vec![
            seeded("a", "A", "https://a.example", "alpha"),
            seeded("b", "B", "https://b.example", "beta"),
        ],
        StubPages::with(&[
            ("https://a.example", "alpha changed"),
            ("https://b.example", "beta"),
        ]),
        ScriptedGenerator::reply(MEANINGFUL_REPLY),
        RecordingNotifier::failing(),
    );

    let report = h.pipeline.run_once().await.unwrap();

    assert_eq!(h.store.changes().len(), 1);
    assert_eq!(report.notifications_failed, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(
        h.store.source("a").unwrap().last_content.as_deref(),
        Some("alpha changed")
    );
}

#[tokio::test]
async fn empty_source_list_sends_nothing() {
    let h = harness(
        vec![],
        StubPages::default(),
        ScriptedGenerator::default(),
        RecordingNotifier::new(),
    );
    let report = h.pipeline.run_once().await.unwrap();
    assert_eq!(report.sources_total, 0);
    assert!(!report.digest_sent);
    assert!(h.notifier.sent().is_empty());
    assert!(h.store.list_changes().await.unwrap().is_empty());
}
