mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use common::{key, unavailable, FakeNode, StaticCatchpoint};
use nodewatch::catchup::{abort_catchup, catchup_to_latest};
use nodewatch::lifecycle::ensure_running;
use nodewatch::participation::{delete_key, generate_key, GenerateKeyRequest, KeyPoll};
use nodewatch::{
    NodeLifecycle, OperationalState, Status, StatusTracker, StopSignal, WatchConfig, WatchError,
};

const TIMEOUT: Duration = Duration::from_secs(5);
const ADDRESS: &str = "TUIDKH2C7MUHZDD77MAMUREJRKNK25SYXB7OAFA6JFBB24PEL5UX4S4GUU";

fn request() -> GenerateKeyRequest {
    GenerateKeyRequest {
        address: ADDRESS.into(),
        first_valid: 1_000,
        last_valid: 31_000,
        dilution: None,
    }
}

fn poll(deadline_secs: u64) -> KeyPoll {
    KeyPoll {
        interval: Duration::from_secs(2),
        deadline: Duration::from_secs(deadline_secs),
        call_timeout: TIMEOUT,
    }
}

#[tokio::test(start_paused = true)]
async fn test_generate_key_returns_once_listed() {
    let node = FakeNode::new();
    node.edit(|s| {
        s.keys = vec![key("old", ADDRESS, b"OLD", 0, 1_000)];
        s.generated = Some((3, key("new", ADDRESS, b"NEW", 1_000, 31_000)));
    });

    let started = Instant::now();
    let generated = generate_key(&node, &request(), &poll(1_200), &StopSignal::new())
        .await
        .unwrap();

    assert_eq!(generated.id, "new");
    assert_eq!(node.calls("generate"), 1);
    assert_eq!(node.calls("keys"), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_generate_key_times_out() {
    let node = FakeNode::new();
    let started = Instant::now();

    let result = generate_key(&node, &request(), &poll(10), &StopSignal::new()).await;

    assert!(matches!(
        result,
        Err(WatchError::KeyGenerationTimeout { address }) if address == ADDRESS
    ));
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_eq!(node.calls("keys"), 5);
}

#[tokio::test(start_paused = true)]
async fn test_generate_key_cancelled() {
    let node = FakeNode::new();
    let stop = StopSignal::new();
    let canceller = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        canceller.stop();
    });

    let result = generate_key(&node, &request(), &poll(1_200), &stop).await;
    assert!(matches!(result, Err(WatchError::Cancelled)));
    assert_eq!(node.calls("keys"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_generate_key_listing_error_aborts() {
    let node = FakeNode::new();
    node.edit(|s| s.keys_error = Some(unavailable()));

    let result = generate_key(&node, &request(), &poll(1_200), &StopSignal::new()).await;
    assert!(result.unwrap_err().is_api());
}

#[tokio::test(start_paused = true)]
async fn test_generate_key_rejects_malformed_address() {
    let node = FakeNode::new();
    let mut bad = request();
    bad.address = "ABC".into();

    let result = generate_key(&node, &bad, &poll(1_200), &StopSignal::new()).await;
    assert!(matches!(result, Err(WatchError::InvalidAddress(a)) if a == "ABC"));
    assert_eq!(node.calls("generate"), 0);
    assert_eq!(node.calls("keys"), 0);

    // A single flipped character breaks the checksum.
    bad.address = ADDRESS.replacen('T', "U", 1);
    let result = generate_key(&node, &bad, &poll(1_200), &StopSignal::new()).await;
    assert!(matches!(result, Err(WatchError::InvalidAddress(_))));
    assert_eq!(node.calls("generate"), 0);
}

#[tokio::test]
async fn test_delete_key() {
    let node = FakeNode::new();
    node.edit(|s| s.keys = vec![key("1", "ABC", b"K1", 0, 100)]);

    delete_key(&node, "1", TIMEOUT).await.unwrap();
    assert!(node.read(|s| s.keys.is_empty()));

    let missing = delete_key(&node, "1", TIMEOUT).await;
    assert!(matches!(missing, Err(WatchError::Api(e)) if e.status_code() == Some(404)));
}

#[tokio::test]
async fn test_catchup_refused_while_catching_up() {
    let node = FakeNode::new();
    let status = Status {
        state: OperationalState::FastCatchup,
        network: "mainnet-v1.0".into(),
        ..Status::default()
    };

    let result = catchup_to_latest(&node, &status, &StaticCatchpoint("1000#ABC"), TIMEOUT).await;
    assert!(matches!(result, Err(WatchError::NodeBusy(_))));
    assert_eq!(node.calls("start_catchup"), 0);
}

#[tokio::test]
async fn test_catchup_to_latest_and_abort() {
    let node = FakeNode::new();
    let status = Status {
        network: "mainnet-v1.0".into(),
        ..Status::default()
    };

    let (catchpoint, message) =
        catchup_to_latest(&node, &status, &StaticCatchpoint("1000#ABC"), TIMEOUT)
            .await
            .unwrap();
    assert_eq!(catchpoint, "1000#ABC");
    assert_eq!(message, "Catchup 1000#ABC started");
    assert_eq!(node.read(|s| s.catchup_requests.clone()), vec!["1000#ABC"]);

    let message = abort_catchup(&node, &catchpoint, TIMEOUT).await.unwrap();
    assert_eq!(message, "Catchup 1000#ABC aborted");
}

#[derive(Default)]
struct FakeService {
    running: AtomicBool,
    starts: AtomicUsize,
}

impl NodeLifecycle for FakeService {
    async fn install(&self) -> Result<(), WatchError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), WatchError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), WatchError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_running(&self) -> Result<bool, WatchError> {
        Ok(self.running.load(Ordering::SeqCst))
    }
}

#[tokio::test(start_paused = true)]
async fn test_ensure_running_starts_and_waits_for_status() {
    let node = Arc::new(FakeNode::new());
    node.edit(|s| {
        s.status_errors.push_back(unavailable());
        s.status_errors.push_back(unavailable());
    });
    let tracker = StatusTracker::new(node.clone(), &WatchConfig::default());
    let service = FakeService::default();

    let status = ensure_running(&service, &tracker, Duration::from_secs(30), Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(status.last_round, 10);
    assert_eq!(service.starts.load(Ordering::SeqCst), 1);
    assert_eq!(node.calls("status"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_ensure_running_leaves_running_node_alone() {
    let node = Arc::new(FakeNode::new());
    let tracker = StatusTracker::new(node.clone(), &WatchConfig::default());
    let service = FakeService::default();
    service.running.store(true, Ordering::SeqCst);

    ensure_running(&service, &tracker, Duration::from_secs(30), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(service.starts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ensure_running_deadline() {
    let node = Arc::new(FakeNode::new());
    node.edit(|s| s.status_errors = std::iter::repeat_with(unavailable).take(100).collect());
    let tracker = StatusTracker::new(node.clone(), &WatchConfig::default());
    let service = FakeService::default();

    let result =
        ensure_running(&service, &tracker, Duration::from_secs(5), Duration::from_secs(1)).await;
    assert!(matches!(
        result,
        Err(WatchError::Timeout { op: "node startup", .. })
    ));
}
