use crate::mcp::error::BridgeError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;

/// Cap on concurrent in-flight invocations across all servers.
pub const DEFAULT_MAX_CONCURRENCY: usize = 20;

/// End-to-end bound on one invocation, admission wait included.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt` (2-based): `base * 2^(attempt-2)`.
    fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(2))
    }
}

/// Run `op` until it succeeds, retrying transient failures with exponential
/// backoff. Non-transient failures propagate after a single attempt; the
/// last transient failure is re-raised once attempts are exhausted.
pub async fn call_with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, BridgeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BridgeError>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                attempt += 1;
                let delay = policy.delay_before(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure; backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Admission-controlled, retrying, timeout-guarded executor for session
/// operations.
///
/// Per invocation: `PENDING → ADMITTED` (permit acquired) `→ ATTEMPTING`
/// (up to the retry cap) `→ SUCCEEDED | FAILED | CANCELLED`. On timeout the
/// in-flight task is aborted and awaited before the failure is reported, so
/// the permit is observably free again when the caller sees the outcome.
pub struct Invoker {
    permits: Arc<Semaphore>,
    capacity: usize,
    policy: RetryPolicy,
}

impl Invoker {
    pub fn new(max_concurrency: usize, policy: RetryPolicy) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            capacity: max_concurrency,
            policy,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Admit, retry, and bound one operation.
    pub async fn run<T, F, Fut>(&self, timeout: Duration, op: F) -> Result<T, BridgeError>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, BridgeError>> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let policy = self.policy;
        let mut handle = tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| BridgeError::Transport("Invoker is shut down.".to_string()))?;
            call_with_retry(policy, op).await
        });

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(BridgeError::Transport(format!(
                "Invocation task failed: {join_error}"
            ))),
            Err(_) => {
                handle.abort();
                // Await the abort so the permit and the session are released
                // before the timeout outcome becomes observable.
                let _ = handle.await;
                Err(BridgeError::Timeout(format!(
                    "Invocation timed out after {timeout:?}."
                )))
            }
        }
    }
}

impl Default for Invoker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY, RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn transient() -> BridgeError {
        BridgeError::Transport("connection reset".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn retry_backs_off_exponentially_then_succeeds() {
        let attempts: Arc<std::sync::Mutex<Vec<Instant>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = Arc::clone(&attempts);

        let result = call_with_retry(RetryPolicy::default(), move || {
            let seen = Arc::clone(&seen);
            async move {
                let mut seen = seen.lock().expect("attempt log should lock");
                seen.push(Instant::now());
                if seen.len() < 3 {
                    Err(transient())
                } else {
                    Ok(99)
                }
            }
        })
        .await;

        assert_eq!(result.expect("third attempt should succeed"), 99);
        let seen = attempts.lock().expect("attempt log should lock");
        assert_eq!(seen.len(), 3);
        let first_gap = seen[1] - seen[0];
        let second_gap = seen[2] - seen[1];
        assert!(first_gap >= RetryPolicy::default().base_delay);
        assert!(second_gap >= first_gap * 2);
    }

    #[tokio::test]
    async fn non_transient_failures_short_circuit() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<(), BridgeError> =
            call_with_retry(RetryPolicy::default(), move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(BridgeError::Rpc {
                        code: -32602,
                        message: "bad arguments".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(BridgeError::Rpc { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_reraise_the_last_transient_error() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<(), BridgeError> =
            call_with_retry(RetryPolicy::default(), move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(transient())
                }
            })
            .await;

        assert!(matches!(result, Err(BridgeError::Transport(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn admission_is_bounded_by_the_semaphore() {
        let invoker = Arc::new(Invoker::new(2, RetryPolicy::default()));
        let gate = Arc::new(Semaphore::new(0));
        let started = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let invoker = Arc::clone(&invoker);
            let gate = Arc::clone(&gate);
            let started = Arc::clone(&started);
            handles.push(tokio::spawn(async move {
                invoker
                    .run(Duration::from_secs(600), move || {
                        let gate = Arc::clone(&gate);
                        let started = Arc::clone(&started);
                        async move {
                            started.fetch_add(1, Ordering::SeqCst);
                            let _released = gate
                                .acquire_owned()
                                .await
                                .map_err(|_| transient())?;
                            Ok(7)
                        }
                    })
                    .await
            }));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(invoker.available_permits(), 0);

        gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(started.load(Ordering::SeqCst), 3);

        gate.add_permits(2);
        for handle in handles {
            let result = handle.await.expect("task should join");
            assert_eq!(result.expect("invocation should succeed"), 7);
        }
        assert_eq!(invoker.available_permits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_and_frees_the_permit() {
        let invoker = Invoker::new(2, RetryPolicy::default());

        let started = Instant::now();
        let result: Result<(), BridgeError> = invoker
            .run(Duration::from_secs(1), || async {
                std::future::pending::<Result<(), BridgeError>>().await
            })
            .await;

        assert!(matches!(result, Err(BridgeError::Timeout(_))));
        assert!(Instant::now() - started >= Duration::from_secs(1));
        assert_eq!(invoker.available_permits(), 2);
    }
}
