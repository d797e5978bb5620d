use std::fs;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use quiz_core::model::TopicId;
use quiz_core::time::fixed_clock;
use quiz_core::{Clock, Phase, Transition};
use serde_json::json;
use services::{
    CatalogError, CatalogService, CatalogSource, QuizLoopService, QuizSessionError, REPORT_GRACE,
};
use storage::{InMemoryStore, KeyValueStore, ProgressStore};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const BASICS: &str = "01-basics";
const BASICS_KEY: &str = "quiz-progress-01-basics";

fn question(prompt: &str, correct_index: usize) -> serde_json::Value {
    json!({
        "q": prompt,
        "options": ["who", "which", "whose", "whom"],
        "correctIndex": correct_index,
        "explanation": {"translation": format!("{prompt} (zh)"), "grammar": "relative pronoun"}
    })
}

fn write_catalog(root: &std::path::Path, stats_endpoint: &str) {
    fs::create_dir_all(root.join("topics")).unwrap();
    let manifest = json!({
        "gasUrl": stats_endpoint,
        "categories": [{
            "categoryTitle": "Grammar",
            "topics": [
                {"name": "Basics", "slug": "basics", "topicId": BASICS},
                {"name": "Empty", "slug": "empty", "topicId": "02-empty"}
            ]
        }]
    });
    fs::write(root.join("manifest.json"), manifest.to_string()).unwrap();

    let basics = json!({
        "topicId": BASICS,
        "currentTopic": "Basics",
        "questions": [question("Q1", 0), question("Q2", 1), question("Q3", 2)]
    });
    fs::write(root.join("topics/01-basics.json"), basics.to_string()).unwrap();

    let empty = json!({"topicId": "02-empty", "currentTopic": "Empty", "questions": []});
    fs::write(root.join("topics/02-empty.json"), empty.to_string()).unwrap();

    fs::write(root.join("topics/03-broken.json"), r#"{"topicId": "03-broken", "#).unwrap();
}

struct Fixture {
    dir: TempDir,
    kv: InMemoryStore,
}

impl Fixture {
    fn new(stats_endpoint: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(dir.path(), stats_endpoint);
        Self {
            dir,
            kv: InMemoryStore::new(),
        }
    }

    fn service_at(&self, clock: Clock) -> QuizLoopService {
        let catalog = CatalogService::new(CatalogSource::Directory(self.dir.path().to_path_buf()));
        let progress = ProgressStore::new(Arc::new(self.kv.clone())).with_clock(clock);
        QuizLoopService::new(clock, catalog, progress).with_shuffle(false)
    }

    fn service(&self) -> QuizLoopService {
        self.service_at(fixed_clock())
    }

    async fn stored(&self) -> Option<serde_json::Value> {
        let raw = self.kv.get(BASICS_KEY).await.unwrap()?;
        Some(serde_json::from_str(&raw).unwrap())
    }
}

fn basics() -> TopicId {
    TopicId::new(BASICS).unwrap()
}

#[tokio::test]
async fn perfect_run_clears_saved_progress() {
    let fixture = Fixture::new("");
    let service = fixture.service();
    let mut session = service.open_topic(&basics()).await.unwrap();
    assert!(!session.is_resumed());
    assert_eq!(session.title(), "Basics");

    for correct in [0, 1, 2] {
        assert_eq!(service.answer(&mut session, correct).await, Transition::Applied);
        assert_eq!(service.next(&mut session).await, Transition::Applied);
    }

    let state = session.state();
    assert_eq!(state.phase, Phase::Result);
    assert_eq!(state.score, 3);
    assert_eq!(state.percentage, 100);
    assert!(state.wrongs.is_empty());
    assert!(fixture.kv.is_empty().unwrap());
}

#[tokio::test]
async fn one_miss_scores_sixty_seven_and_retries_only_the_miss() {
    let fixture = Fixture::new("");
    let service = fixture.service();
    let mut session = service.open_topic(&basics()).await.unwrap();

    service.answer(&mut session, 0).await;
    service.next(&mut session).await;
    service.answer(&mut session, 3).await;
    assert_eq!(session.state().last_answer_correct, Some(false));
    service.next(&mut session).await;
    service.answer(&mut session, 2).await;
    service.next(&mut session).await;

    let state = session.state();
    assert_eq!(state.phase, Phase::Result);
    assert_eq!(state.percentage, 67);
    assert_eq!(state.wrongs.len(), 1);
    assert_eq!(state.wrongs[0].prompt(), "Q2");

    assert_eq!(service.retry_wrongs(&mut session).await, Transition::Applied);
    let retry = session.state();
    assert_eq!(retry.total_questions, 1);
    assert_eq!(retry.current_question.map(|q| q.prompt()), Some("Q2"));
    assert_eq!(fixture.stored().await.unwrap()["questions"].as_array().unwrap().len(), 1);

    service.answer(&mut session, 1).await;
    service.next(&mut session).await;
    assert_eq!(session.state().percentage, 100);
    assert!(fixture.kv.is_empty().unwrap());
}

#[tokio::test]
async fn fresh_open_is_saved_before_the_first_answer() {
    let fixture = Fixture::new("");
    fixture.service().open_topic(&basics()).await.unwrap();

    let stored = fixture.stored().await.unwrap();
    assert_eq!(stored["phase"], "question");
    assert_eq!(stored["currentIndex"], 0);
    assert_eq!(stored["savedAt"], fixed_clock().now_millis());
}

#[tokio::test]
async fn reopening_resumes_mid_run() {
    let fixture = Fixture::new("");
    let service = fixture.service();
    let mut session = service.open_topic(&basics()).await.unwrap();
    service.answer(&mut session, 0).await;
    service.next(&mut session).await;
    service.answer(&mut session, 0).await;

    let later = fixture.service_at(fixed_clock().advanced(Duration::hours(2)));
    let resumed = later.open_topic(&basics()).await.unwrap();
    assert!(resumed.is_resumed());

    let state = resumed.state();
    assert_eq!(state.phase, Phase::Explanation);
    assert_eq!(state.current_index, 1);
    assert_eq!(state.score, 1);
    assert_eq!(state.selected_index, Some(0));
    assert_eq!(state.last_answer_correct, Some(false));
    assert_eq!(state.wrongs.len(), 1);
    assert_eq!(resumed.progress().position, 2);
}

#[tokio::test]
async fn shuffled_order_survives_resume() {
    let fixture = Fixture::new("");
    let service = fixture.service().with_shuffle(true);
    let session = service.open_topic(&basics()).await.unwrap();
    let order: Vec<(String, Vec<String>)> = session
        .state()
        .questions
        .iter()
        .map(|q| (q.prompt().to_owned(), q.options().to_vec()))
        .collect();

    let resumed = fixture
        .service()
        .with_shuffle(true)
        .open_topic(&basics())
        .await
        .unwrap();
    assert!(resumed.is_resumed());
    let resumed_order: Vec<(String, Vec<String>)> = resumed
        .state()
        .questions
        .iter()
        .map(|q| (q.prompt().to_owned(), q.options().to_vec()))
        .collect();
    assert_eq!(order, resumed_order);
}

#[tokio::test]
async fn expired_progress_starts_over() {
    let fixture = Fixture::new("");
    let service = fixture.service();
    let mut session = service.open_topic(&basics()).await.unwrap();
    service.answer(&mut session, 0).await;

    let next_day = fixture.service_at(fixed_clock().advanced(Duration::hours(25)));
    let fresh = next_day.open_topic(&basics()).await.unwrap();
    assert!(!fresh.is_resumed());
    assert_eq!(fresh.state().phase, Phase::Question);
    assert_eq!(fresh.state().score, 0);
}

#[tokio::test]
async fn rejected_intents_leave_storage_untouched() {
    let fixture = Fixture::new("");
    let service = fixture.service();
    let mut session = service.open_topic(&basics()).await.unwrap();
    service.answer(&mut session, 0).await;
    let before = fixture.stored().await;

    assert_eq!(service.answer(&mut session, 1).await, Transition::Rejected);
    assert_eq!(fixture.stored().await, before);
    assert_eq!(session.state().score, 1);

    service.next(&mut session).await;
    let before = fixture.stored().await;
    assert_eq!(service.next(&mut session).await, Transition::Rejected);
    assert_eq!(fixture.stored().await, before);
}

#[tokio::test]
async fn retry_all_restarts_and_saves() {
    let fixture = Fixture::new("");
    let service = fixture.service();
    let mut session = service.open_topic(&basics()).await.unwrap();
    for answer in [3, 3, 3] {
        service.answer(&mut session, answer).await;
        service.next(&mut session).await;
    }
    assert_eq!(session.state().percentage, 0);
    assert!(fixture.kv.is_empty().unwrap());

    assert_eq!(service.retry_all(&mut session).await, Transition::Applied);
    let state = session.state();
    assert_eq!(state.phase, Phase::Question);
    assert_eq!(state.total_questions, 3);
    assert!(state.wrongs.is_empty());
    assert_eq!(fixture.stored().await.unwrap()["phase"], "question");
}

#[tokio::test]
async fn unknown_topic_is_reported() {
    let fixture = Fixture::new("");
    let err = fixture
        .service()
        .open_topic(&TopicId::new("99-missing").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QuizSessionError::Catalog(CatalogError::TopicNotFound(ref id)) if id.as_str() == "99-missing"
    ));
}

#[tokio::test]
async fn empty_topic_cannot_be_opened() {
    let fixture = Fixture::new("");
    let err = fixture
        .service()
        .open_topic(&TopicId::new("02-empty").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, QuizSessionError::Empty(_)));
    assert!(fixture.kv.is_empty().unwrap());
}

#[tokio::test]
async fn malformed_topic_is_a_parse_error() {
    let fixture = Fixture::new("");
    let err = fixture
        .service()
        .open_topic(&TopicId::new("03-broken").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, QuizSessionError::Catalog(CatalogError::Parse { .. })));
}

#[tokio::test]
async fn missing_manifest_fails_the_open() {
    let fixture = Fixture::new("");
    fs::remove_file(fixture.dir.path().join("manifest.json")).unwrap();

    let err = fixture.service().open_topic(&basics()).await.unwrap_err();
    assert!(matches!(
        err,
        QuizSessionError::Catalog(CatalogError::DocumentNotFound(ref doc)) if doc == "manifest.json"
    ));
}

#[tokio::test]
async fn finished_full_run_posts_its_score() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let collector = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0_u8; 1024];
        while !buf.ends_with(b"}") {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}")
            .await
            .unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    });

    let fixture = Fixture::new(&format!("http://{addr}/exec"));
    let service = fixture.service();
    let mut session = service.open_topic(&basics()).await.unwrap();
    assert!(session.stats().enabled());
    for answer in [0, 3, 2] {
        service.answer(&mut session, answer).await;
        service.next(&mut session).await;
    }

    assert!(service.flush_report(&mut session, StdDuration::from_secs(5)).await);
    let request = tokio::time::timeout(StdDuration::from_secs(5), collector)
        .await
        .unwrap()
        .unwrap();
    assert!(request.starts_with("POST /exec "));
    assert!(request.ends_with(r#"{"topic":"Basics","score":67}"#));
}

#[tokio::test]
async fn stats_override_wins_over_manifest() {
    let fixture = Fixture::new("https://stats.example.test/exec");
    let service = fixture.service().with_stats_endpoint("");
    let session = service.open_topic(&basics()).await.unwrap();
    assert!(!session.stats().enabled());

    let stats = service.spawn_stats_fetch(&session).await.unwrap();
    assert_eq!(stats.count, 0);
}

#[tokio::test]
async fn saved_run_without_questions_starts_fresh() {
    let fixture = Fixture::new("");
    let stuck = json!({
        "questions": [],
        "currentIndex": 0,
        "score": 0,
        "wrongs": [],
        "phase": "question",
        "savedAt": fixed_clock().now_millis()
    });
    fixture.kv.set(BASICS_KEY, &stuck.to_string()).await.unwrap();

    let service = fixture.service();
    let mut session = service.open_topic(&basics()).await.unwrap();
    assert!(!session.is_resumed());
    assert_eq!(session.state().total_questions, 3);
    assert_eq!(fixture.stored().await.unwrap()["questions"].as_array().unwrap().len(), 3);

    service.retry_all(&mut session).await;
    assert_eq!(session.state().total_questions, 3);
    assert!(session.state().current_question.is_some());
}

#[tokio::test]
async fn saved_run_past_its_last_question_starts_fresh() {
    let fixture = Fixture::new("");
    let service = fixture.service();
    let mut session = service.open_topic(&basics()).await.unwrap();
    service.answer(&mut session, 0).await;

    let mut stored = fixture.stored().await.unwrap();
    stored["currentIndex"] = json!(7);
    fixture.kv.set(BASICS_KEY, &stored.to_string()).await.unwrap();

    let reopened = fixture.service().open_topic(&basics()).await.unwrap();
    assert!(!reopened.is_resumed());
    assert_eq!(reopened.state().current_index, 0);
    assert_eq!(reopened.state().score, 0);
}

#[tokio::test]
async fn flush_without_a_report_returns_immediately() {
    let fixture = Fixture::new("");
    let service = fixture.service();
    let mut session = service.open_topic(&basics()).await.unwrap();
    assert!(service.flush_report(&mut session, REPORT_GRACE).await);
}

#[tokio::test]
async fn flush_gives_up_on_a_stalled_collector() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let collector = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(StdDuration::from_secs(5)).await;
        drop(socket);
    });

    let fixture = Fixture::new(&format!("http://{addr}/exec"));
    let service = fixture.service();
    let mut session = service.open_topic(&basics()).await.unwrap();
    for answer in [0, 1, 2] {
        service.answer(&mut session, answer).await;
        service.next(&mut session).await;
    }

    assert!(!service.flush_report(&mut session, StdDuration::from_millis(100)).await);
    // The report is consumed either way.
    assert!(service.flush_report(&mut session, REPORT_GRACE).await);
    collector.abort();
}
