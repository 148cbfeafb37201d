//! End-to-end dispatch scenarios through `AppCore` with a recording client.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use slackbot_core::channel::{REACTION_DONE, REACTION_WAITING};
use slackbot_core::matcher::{Matcher, TextMatcher, action};
use slackbot_core::queue::PENDING_COLLECTION;
use slackbot_core::testkit::{RecordingClient, message_at, wait_until};
use slackbot_core::{
    AppCore, BotConfig, Command, Commands, Message, PluginContext, RunningCommand, RunningCommands,
};
use slackbot_storage::Storage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// `deploy` starts a blocking operation and keeps its handle for the test.
struct DeployCommand {
    running: RunningCommands,
    handle: Arc<Mutex<Option<RunningCommand>>>,
}

impl Command for DeployCommand {
    fn matcher(self: Arc<Self>) -> Box<dyn Matcher> {
        Box::new(TextMatcher::new(
            "deploy",
            action(move |message, _| {
                let this = self.clone();
                async move {
                    let handle = this.running.register(&message, "")?;
                    *this.handle.lock() = Some(handle);
                    Ok(())
                }
            }),
        ))
    }
}

struct Harness {
    client: Arc<RecordingClient>,
    inbound: mpsc::Sender<Message>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl Harness {
    async fn stop(self) {
        self.shutdown.cancel();
        drop(self.inbound);
        tokio::time::timeout(Duration::from_secs(2), self.task)
            .await
            .expect("bot did not stop")
            .expect("bot task panicked");
    }

    async fn wait_for_texts(&self, count: usize) -> Vec<String> {
        let client = self.client.clone();
        let reached = wait_until(Duration::from_secs(2), || {
            let client = client.clone();
            async move { client.sent_texts().await.len() >= count }
        })
        .await;
        assert!(reached, "expected {} replies", count);
        self.client.sent_texts().await
    }
}

fn config() -> BotConfig {
    let mut config = BotConfig::default();
    config.dispatch.drain_timeout_secs = 0;
    config
}

fn start<F>(storage: Storage, plugins: F) -> Harness
where
    F: FnOnce(&PluginContext) -> Commands,
{
    let client = Arc::new(RecordingClient::new());
    let app = AppCore::new(&config(), storage, client.clone(), plugins);
    let inbound = app.inbound();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(app.start(shutdown.clone()));
    Harness {
        client,
        inbound,
        shutdown,
        task,
    }
}

#[tokio::test]
async fn then_runs_after_blocking_command_resolves() {
    let slot = Arc::new(Mutex::new(None));
    let harness = start(Storage::memory(), |ctx| {
        let mut plugins = Commands::new();
        plugins.add(DeployCommand {
            running: ctx.running.clone(),
            handle: slot.clone(),
        });
        plugins
    });

    harness
        .inbound
        .send(message_at("U1", "C1", "1.0", "deploy"))
        .await
        .unwrap();
    let deploy_started = wait_until(Duration::from_secs(2), || {
        let slot = slot.clone();
        async move { slot.lock().is_some() }
    })
    .await;
    assert!(deploy_started);

    let then = message_at("U1", "C1", "2.0", "then reply done");
    harness.inbound.send(then.clone()).await.unwrap();
    let client = harness.client.clone();
    let waiting = wait_until(Duration::from_secs(2), || {
        let client = client.clone();
        let then = then.clone();
        async move { client.reactions_of(&then).await == [REACTION_WAITING] }
    })
    .await;
    assert!(waiting);
    assert!(harness.client.sent_texts().await.is_empty());

    let handle = slot.lock().take().unwrap();
    handle.resolve();

    assert_eq!(harness.wait_for_texts(1).await, ["done"]);
    assert_eq!(harness.client.reactions_of(&then).await, [REACTION_DONE]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.client.sent_texts().await.len(), 1);
    harness.stop().await;
}

#[tokio::test]
async fn then_without_blocking_command_is_rejected() {
    let harness = start(Storage::memory(), |_| Commands::new());

    harness
        .inbound
        .send(message_at("U1", "C1", "1.0", "then reply done"))
        .await
        .unwrap();

    let sent = harness.wait_for_texts(1).await;
    assert!(sent[0].starts_with("You have to call this command"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.client.sent_texts().await.len(), 1);
    harness.stop().await;
}

#[tokio::test]
async fn typo_is_answered_with_suggestion_and_help() {
    let harness = start(Storage::memory(), |_| Commands::new());

    harness
        .inbound
        .send(message_at("U1", "C1", "1.0", "rep1y"))
        .await
        .unwrap();

    let sent = harness.wait_for_texts(2).await;
    assert_eq!(sent[0], "Command `rep1y` not found...do you mean *reply* command?");
    assert!(sent[1].starts_with("*reply*"));
    harness.stop().await;
}

#[tokio::test]
async fn pending_delay_is_replayed_after_restart() {
    let storage = Storage::memory();

    let first = start(storage.clone(), |_| Commands::new());
    first
        .inbound
        .send(message_at("U1", "C1", "1.0", "delay 1h reply recovered"))
        .await
        .unwrap();
    assert_eq!(
        first.wait_for_texts(1).await,
        ["I queued the command `reply recovered` for 3600s"]
    );
    first.stop().await;
    assert_eq!(storage.list_keys(PENDING_COLLECTION).unwrap().len(), 1);

    let second = start(storage.clone(), |_| Commands::new());
    assert_eq!(second.wait_for_texts(1).await, ["recovered"]);
    assert!(storage.list_keys(PENDING_COLLECTION).unwrap().is_empty());
    second.stop().await;
}

#[tokio::test]
async fn pending_entries_survive_shutdown_during_startup() {
    let storage = Storage::memory();
    RunningCommands::new(storage.clone())
        .register(
            &message_at("U1", "C1", "1.0", "delay 1h reply recovered"),
            "reply recovered",
        )
        .unwrap();

    let client = Arc::new(RecordingClient::new());
    let app = AppCore::new(&config(), storage.clone(), client.clone(), |_| {
        Commands::new()
    });
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), app.start(shutdown))
        .await
        .expect("bot did not stop");

    assert!(client.sent_texts().await.is_empty());
    let entries = RunningCommands::new(storage).pending_entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1.text, "reply recovered");
    assert_eq!(entries[0].1.timestamp, "1.0");
}

#[tokio::test]
async fn list_queue_shows_pending_entries_per_channel() {
    let storage = Storage::memory();
    let harness = start(storage, |_| Commands::new());

    for (user, channel, ts) in [("U1", "C1", "1.0"), ("U2", "C2", "2.0")] {
        harness
            .inbound
            .send(message_at(user, channel, ts, "delay 1h reply later"))
            .await
            .unwrap();
    }
    harness.wait_for_texts(2).await;
    harness.client.clear_sent_messages().await;

    harness
        .inbound
        .send(message_at("U1", "C1", "3.0", "list queue in channel"))
        .await
        .unwrap();
    let in_channel = harness.wait_for_texts(1).await;
    assert!(in_channel[0].starts_with("*1 queued commands*"));

    harness.client.clear_sent_messages().await;
    harness
        .inbound
        .send(message_at("U1", "C1", "4.0", "list queue"))
        .await
        .unwrap();
    let all = harness.wait_for_texts(1).await;
    assert!(all[0].starts_with("*2 queued commands*"));

    harness.stop().await;
}
