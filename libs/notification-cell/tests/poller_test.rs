use std::sync::Arc;

use anyhow::anyhow;
use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::Duration;
use mockall::{mock, Sequence};

use notification_cell::{
    ContentKind, ContentNotice, ContentPoller, ContentService, NotificationError, NotificationState,
    Notifier, PublishContentRequest, SubscriberService,
};
use shared_models::auth::Actor;
use shared_utils::test_utils::{TestConfig, TestUser};
use shared_utils::{AppState, ManualClock};
use user_cell::UserService;

mock! {
    pub Mailer {}

    #[async_trait]
    impl Notifier for Mailer {
        async fn notify(&self, notice: &ContentNotice, recipients: &[String]) -> anyhow::Result<()>;
    }
}

struct Fixture {
    app: AppState,
    clock: ManualClock,
    admin: Actor,
}

impl Fixture {
    async fn new() -> Self {
        let (app, clock) = TestConfig::default().to_state();
        let admin = UserService::new(&app)
            .ensure_user(&TestUser::admin().to_user())
            .await
            .unwrap()
            .to_actor();
        Self { app, clock, admin }
    }

    fn poller(&self, mailer: MockMailer) -> ContentPoller {
        ContentPoller::new(&NotificationState::with_notifier(self.app.clone(), Arc::new(mailer)))
    }

    async fn publish(&self, kind: ContentKind, title: &str) {
        self.clock.advance(Duration::seconds(1));
        ContentService::new(&self.app)
            .publish(
                &self.admin,
                kind,
                PublishContentRequest {
                    title: title.to_string(),
                    body: "Details inside.".to_string(),
                },
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn first_poll_records_a_baseline_without_notifying() {
    let fx = Fixture::new().await;
    SubscriberService::new(&fx.app).subscribe("reader@example.com").await.unwrap();
    fx.publish(ContentKind::Article, "Already here").await;

    let mut mailer = MockMailer::new();
    mailer.expect_notify().never();

    let report = fx.poller(mailer).poll_once().await.unwrap();
    assert_eq!(report.notified(), 0);
    assert!(report.kinds.iter().all(|kind| kind.previous_count.is_none()));
    assert_eq!(report.kinds[1].current_count, 1);
}

#[tokio::test]
async fn each_new_item_is_sent_once_in_publish_order() {
    let fx = Fixture::new().await;
    SubscriberService::new(&fx.app).subscribe("a@example.com").await.unwrap();
    SubscriberService::new(&fx.app).subscribe("b@example.com").await.unwrap();
    fx.poller(MockMailer::new()).poll_once().await.unwrap();

    fx.publish(ContentKind::Announcement, "Flu clinic").await;
    fx.publish(ContentKind::Announcement, "Parking update").await;
    fx.publish(ContentKind::Article, "Sleep hygiene").await;

    let mut mailer = MockMailer::new();
    let mut order = Sequence::new();
    for title in ["Flu clinic", "Parking update", "Sleep hygiene"] {
        mailer
            .expect_notify()
            .withf(move |notice, recipients| notice.item.title == title && recipients.len() == 2)
            .times(1)
            .in_sequence(&mut order)
            .returning(|_, _| Ok(()));
    }

    let report = fx.poller(mailer).poll_once().await.unwrap();
    assert_eq!(report.notified(), 3);
    assert_eq!(report.recipients, 2);

    let mut quiet = MockMailer::new();
    quiet.expect_notify().never();
    assert_eq!(fx.poller(quiet).poll_once().await.unwrap().notified(), 0);
}

#[tokio::test]
async fn failed_deliveries_are_retried_on_the_next_poll() {
    let fx = Fixture::new().await;
    SubscriberService::new(&fx.app).subscribe("reader@example.com").await.unwrap();
    fx.poller(MockMailer::new()).poll_once().await.unwrap();

    fx.publish(ContentKind::Article, "First").await;
    fx.publish(ContentKind::Article, "Second").await;

    let mut flaky = MockMailer::new();
    flaky
        .expect_notify()
        .withf(|notice, _| notice.item.title == "First")
        .times(1)
        .returning(|_, _| Ok(()));
    flaky
        .expect_notify()
        .withf(|notice, _| notice.item.title == "Second")
        .times(1)
        .returning(|_, _| Err(anyhow!("mailer unavailable")));

    let report = fx.poller(flaky).poll_once().await.unwrap();
    let articles = &report.kinds[1];
    assert_eq!(articles.kind, ContentKind::Article);
    assert_eq!(articles.notified, 1);
    assert_eq!(articles.failed, 1);

    let mut recovered = MockMailer::new();
    recovered
        .expect_notify()
        .withf(|notice, _| notice.item.title == "Second")
        .times(1)
        .returning(|_, _| Ok(()));
    assert_eq!(fx.poller(recovered).poll_once().await.unwrap().notified(), 1);
}

#[tokio::test]
async fn content_published_without_subscribers_is_not_replayed_later() {
    let fx = Fixture::new().await;
    fx.poller(MockMailer::new()).poll_once().await.unwrap();

    fx.publish(ContentKind::Announcement, "Nobody listening").await;
    let mut mailer = MockMailer::new();
    mailer.expect_notify().never();
    fx.poller(mailer).poll_once().await.unwrap();

    SubscriberService::new(&fx.app).subscribe("late@example.com").await.unwrap();
    let mut later = MockMailer::new();
    later.expect_notify().never();
    assert_eq!(fx.poller(later).poll_once().await.unwrap().notified(), 0);
}

#[tokio::test]
async fn only_publishers_can_post_content() {
    let fx = Fixture::new().await;
    let patient = UserService::new(&fx.app)
        .ensure_user(&TestUser::patient("p@example.com").to_user())
        .await
        .unwrap()
        .to_actor();

    let result = ContentService::new(&fx.app)
        .publish(
            &patient,
            ContentKind::Announcement,
            PublishContentRequest {
                title: "Free pizza".to_string(),
                body: "Lobby".to_string(),
            },
        )
        .await;
    assert_matches!(result, Err(NotificationError::Permission(_)));

    let blank = ContentService::new(&fx.app)
        .publish(
            &fx.admin,
            ContentKind::Announcement,
            PublishContentRequest {
                title: " ".to_string(),
                body: "Lobby".to_string(),
            },
        )
        .await;
    assert_matches!(blank, Err(NotificationError::Validation(_)));
}

#[tokio::test]
async fn subscribing_is_idempotent_per_email() {
    let fx = Fixture::new().await;
    let subscribers = SubscriberService::new(&fx.app);

    let (first, created) = subscribers.subscribe("Reader@Example.com").await.unwrap();
    assert!(created);
    assert_eq!(first.email, "reader@example.com");

    let (again, created) = subscribers.subscribe("reader@example.com ").await.unwrap();
    assert!(!created);
    assert_eq!(again.id, first.id);

    assert_matches!(
        subscribers.subscribe("not-an-email").await,
        Err(NotificationError::Validation(_))
    );

    subscribers.unsubscribe("reader@example.com").await.unwrap();
    assert_matches!(
        subscribers.unsubscribe("reader@example.com").await,
        Err(NotificationError::SubscriberNotFound(_))
    );
    assert!(subscribers.list_emails().await.unwrap().is_empty());
}
