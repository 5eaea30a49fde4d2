use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use promptdesk::{
    capability::{
        DisabledLanguageModel, LanguageModel, LanguageSession, ModelError, ResponseSchema,
    },
    extraction::{ExtractionPipeline, Record, sample_records},
    generation::{
        GenerationError, MemoryClipboard, Platform, PostGenerator, SocialPosts, copy_post,
    },
};
use tokio::time::Instant;

/// Plays back one reply per session and logs every prompt plus session teardown.
#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    destroyed: Arc<Mutex<usize>>,
    latency: Duration,
    calls: Arc<Mutex<Vec<(Instant, Instant)>>>,
}

impl ScriptedModel {
    fn with_replies<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = Result<S, S>>,
        S: Into<String>,
    {
        Self::with_latency(replies, Duration::ZERO)
    }

    fn with_latency<I, S>(replies: I, latency: Duration) -> Arc<Self>
    where
        I: IntoIterator<Item = Result<S, S>>,
        S: Into<String>,
    {
        let model = Self {
            latency,
            ..Self::default()
        };
        *model.replies.lock().unwrap() = replies
            .into_iter()
            .map(|reply| reply.map(Into::into).map_err(Into::into))
            .collect();
        Arc::new(model)
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn destroyed(&self) -> usize {
        *self.destroyed.lock().unwrap()
    }

    /// Start and finish instants of every prompt, in call order.
    fn calls(&self) -> Vec<(Instant, Instant)> {
        self.calls.lock().unwrap().clone()
    }
}

struct ScriptedSession {
    reply: Mutex<Option<Result<String, String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    destroyed: Arc<Mutex<usize>>,
    latency: Duration,
    calls: Arc<Mutex<Vec<(Instant, Instant)>>>,
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn is_available(&self) -> bool {
        true
    }

    async fn create_session(&self) -> Result<Box<dyn LanguageSession>, ModelError> {
        let reply = self.replies.lock().unwrap().pop_front();
        Ok(Box::new(ScriptedSession {
            reply: Mutex::new(reply),
            prompts: self.prompts.clone(),
            destroyed: self.destroyed.clone(),
            latency: self.latency,
            calls: self.calls.clone(),
        }))
    }
}

#[async_trait]
impl LanguageSession for ScriptedSession {
    async fn prompt(
        &self,
        prompt: &str,
        _constraint: Option<&ResponseSchema>,
    ) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let started = Instant::now();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.calls.lock().unwrap().push((started, Instant::now()));
        let reply = self.reply.lock().unwrap().take();
        match reply {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ModelError::GenerationFailed(message)),
            None => Err(ModelError::GenerationFailed("no scripted reply".into())),
        }
    }

    fn destroy(&mut self) {
        *self.destroyed.lock().unwrap() += 1;
    }
}

fn address_reply(city: &str, state: &str, pin: &str) -> Result<String, String> {
    Ok(serde_json::json!({ "city": city, "state": state, "pinCode": pin }).to_string())
}

fn pipeline(model: Arc<ScriptedModel>) -> ExtractionPipeline {
    ExtractionPipeline::new(model).with_throttle(Duration::ZERO)
}

#[tokio::test]
async fn noida_address_is_filled_without_error() {
    let model = ScriptedModel::with_replies([address_reply("Noida", "Uttar Pradesh", "201301")]);
    let mut records = vec![Record::new(
        "1",
        "Rajesh",
        "Kumar",
        "Flat 302, Sunrise Apartments, Sector 5, Noida, Uttar Pradesh 201301",
    )];

    let report = pipeline(model.clone()).run(&mut records).await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert!(report.last_error.is_none());
    assert_eq!(records[0].city, "Noida");
    assert_eq!(records[0].state, "Uttar Pradesh");
    assert_eq!(records[0].pin_code, "201301");
    assert_eq!(model.destroyed(), 1);
}

#[tokio::test]
async fn one_request_per_record_in_input_order() {
    let mut records = sample_records();
    let replies: Vec<_> = (0..records.len())
        .map(|i| address_reply("City", "State", &format!("{:06}", 100000 + i)))
        .collect();
    let model = ScriptedModel::with_replies(replies);
    let ids_before: Vec<_> = records.iter().map(|record| record.id.clone()).collect();

    let report = pipeline(model.clone()).run(&mut records).await.unwrap();

    let prompts = model.prompts();
    assert_eq!(prompts.len(), records.len());
    for (prompt, record) in prompts.iter().zip(&records) {
        assert!(prompt.contains(&record.address));
    }
    let ids_after: Vec<_> = records.iter().map(|record| record.id.clone()).collect();
    assert_eq!(ids_before, ids_after);
    assert_eq!(report.succeeded, records.len());
    assert_eq!(records[3].pin_code, "100003");
    assert_eq!(model.destroyed(), records.len());
}

#[tokio::test]
async fn a_failing_record_does_not_stop_later_records() {
    let model = ScriptedModel::with_replies([
        address_reply("Mumbai", "Maharashtra", "400050"),
        Err("rate limited".to_string()),
        Ok("not json".to_string()),
        address_reply("Chennai", "Tamil Nadu", "600017"),
    ]);
    let mut records = sample_records();
    records.truncate(4);

    let report = pipeline(model.clone()).run(&mut records).await.unwrap();

    assert_eq!(model.prompts().len(), 4);
    assert_eq!(report.attempted, 4);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed_ids, vec!["2".to_string(), "3".to_string()]);
    assert!(records[1].is_unprocessed());
    assert!(records[2].is_unprocessed());
    assert_eq!(records[3].city, "Chennai");

    let message = report.last_error.unwrap();
    assert!(message.starts_with(&format!(
        "Failed to extract address for {}.",
        records[2].full_name()
    )));
}

#[tokio::test(start_paused = true)]
async fn throttle_follows_successes_only_and_requests_never_overlap() {
    let throttle = Duration::from_millis(100);
    let latency = Duration::from_millis(10);
    let model = ScriptedModel::with_latency(
        [
            address_reply("Noida", "Uttar Pradesh", "201301"),
            Err("rate limited".to_string()),
            address_reply("Chennai", "Tamil Nadu", "600017"),
        ],
        latency,
    );
    let mut records = sample_records();
    records.truncate(3);
    let pipeline = ExtractionPipeline::new(model.clone()).with_throttle(throttle);

    let start = Instant::now();
    let report = pipeline.run(&mut records).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(
        elapsed.as_millis(),
        (3 * latency + 2 * throttle).as_millis()
    );

    let calls = model.calls();
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        assert!(pair[1].0 >= pair[0].1, "next request started before the previous settled");
    }
    // pause after the first success, none after the failure
    assert_eq!((calls[1].0 - calls[0].1).as_millis(), throttle.as_millis());
    assert_eq!((calls[2].0 - calls[1].1).as_millis(), 0);
}

#[tokio::test]
async fn progress_observer_sees_each_filled_record() {
    let model = ScriptedModel::with_replies([
        address_reply("Noida", "Uttar Pradesh", "201301"),
        Err("boom".to_string()),
        address_reply("Bengaluru", "Karnataka", "560034"),
    ]);
    let mut records = sample_records();
    records.truncate(3);
    let mut seen = Vec::new();

    pipeline(model)
        .run_with_progress(&mut records, |index, record| {
            seen.push((index, record.city.clone()));
        })
        .await
        .unwrap();

    assert_eq!(
        seen,
        vec![(0, "Noida".to_string()), (2, "Bengaluru".to_string())]
    );
}

#[tokio::test]
async fn closed_gate_leaves_records_untouched() {
    let mut records = sample_records();
    let pipeline = ExtractionPipeline::new(Arc::new(DisabledLanguageModel));

    let err = pipeline.run(&mut records).await.unwrap_err();

    assert!(matches!(err, ModelError::Unavailable));
    assert!(records.iter().all(Record::is_unprocessed));
}

#[tokio::test]
async fn exact_labels_split_into_three_posts() {
    let model = ScriptedModel::with_replies([Ok(
        "LINKEDIN:\nHello\n\nTWITTER:\nHi\n\nINSTAGRAM:\nHey\n",
    )]);
    let generator = PostGenerator::new(model.clone());

    let posts = generator.generate("launch day").await.unwrap();

    assert_eq!(
        posts,
        SocialPosts {
            linkedin: "Hello".into(),
            twitter: "Hi".into(),
            instagram: "Hey".into(),
        }
    );
    assert_eq!(model.prompts().len(), 1);
    assert!(model.prompts()[0].contains("\"launch day\""));
    assert_eq!(model.destroyed(), 1);
}

#[tokio::test]
async fn lowercase_labels_are_recovered_by_fallback() {
    let model = ScriptedModel::with_replies([Ok(
        "linkedin: Big news for the team\ntwitter: Big news!\ninstagram: Big news \u{1F389}",
    )]);
    let generator = PostGenerator::new(model);

    let posts = generator.generate("news").await.unwrap();

    assert_eq!(posts.linkedin, "Big news for the team");
    assert_eq!(posts.twitter, "Big news!");
    assert_eq!(posts.instagram, "Big news \u{1F389}");
}

#[tokio::test]
async fn blank_topic_is_rejected_before_any_request() {
    let model = ScriptedModel::with_replies(Vec::<Result<&str, &str>>::new());
    let generator = PostGenerator::new(model.clone());

    let err = generator.generate("   ").await.unwrap_err();

    assert!(matches!(err, GenerationError::EmptyTopic));
    assert!(model.prompts().is_empty());
}

#[tokio::test]
async fn copying_a_generated_post_leaves_posts_unchanged() {
    let model = ScriptedModel::with_replies([Ok(
        "LINKEDIN:\nHello\n\nTWITTER:\nHi\n\nINSTAGRAM:\nHey\n",
    )]);
    let posts = PostGenerator::new(model).generate("topic").await.unwrap();
    let clipboard = MemoryClipboard::new();

    copy_post(&clipboard, &posts, Platform::Twitter).await.unwrap();
    assert_eq!(clipboard.contents().as_deref(), Some("Hi"));

    let rejecting = MemoryClipboard::rejecting();
    assert!(
        copy_post(&rejecting, &posts, Platform::LinkedIn)
            .await
            .is_err()
    );
    assert_eq!(posts.linkedin, "Hello");
}
