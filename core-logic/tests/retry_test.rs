use core_logic::{is_transient_error, with_retry, RetryConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_retry_success_first_try() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = RetryConfig::new(3, 10).without_jitter();

    let result: Result<String, anyhow::Error> = with_retry(&config, "test_op", || async {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok("success".to_string())
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_success_after_transient_failures() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = RetryConfig::new(3, 10).without_jitter();

    let result: Result<String, anyhow::Error> = with_retry(&config, "eth_gasPrice", || async {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if count < 3 {
            Err(anyhow::anyhow!("connection reset by peer"))
        } else {
            Ok("success".to_string())
        }
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_gives_up_after_max_retries() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = RetryConfig::new(3, 10).without_jitter();

    let result: Result<String, anyhow::Error> = with_retry(&config, "test_op", || async {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("Request timeout"))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(counter.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_retry_stops_on_permanent_error() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = RetryConfig::new(3, 10).without_jitter();

    let result: Result<String, anyhow::Error> = with_retry(&config, "test_op", || async {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("execution reverted"))
    })
    .await;

    let err = result.unwrap_err();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(format!("{:#}", err).contains("execution reverted"));
}

#[tokio::test]
async fn test_retry_with_delay() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = RetryConfig::new(2, 50).without_jitter();

    let start = tokio::time::Instant::now();
    let _: Result<String, anyhow::Error> = with_retry(&config, "test_op", || async {
        counter.fetch_add(1, Ordering::SeqCst);
        if counter.load(Ordering::SeqCst) < 3 {
            Err(anyhow::anyhow!("503 service unavailable"))
        } else {
            Ok("done".to_string())
        }
    })
    .await;

    // 50ms + 100ms backoff
    assert!(start.elapsed() >= Duration::from_millis(150));
}

#[test]
fn test_transient_error_detection() {
    assert!(is_transient_error(&anyhow::anyhow!("Request timeout")));
    assert!(is_transient_error(&anyhow::anyhow!("429 Too Many Requests")));
    assert!(is_transient_error(&anyhow::anyhow!("502 Bad Gateway")));
    assert!(is_transient_error(&anyhow::anyhow!("header not found")));
    assert!(!is_transient_error(&anyhow::anyhow!("Invalid address")));
    assert!(!is_transient_error(&anyhow::anyhow!(
        "insufficient funds for gas * price + value"
    )));
}

#[test]
fn test_transient_error_case_insensitive() {
    assert!(is_transient_error(&anyhow::anyhow!("TIMEOUT")));
    assert!(is_transient_error(&anyhow::anyhow!("TiMeOuT")));
}

#[test]
fn test_broadcast_rejections_are_not_transient() {
    for msg in [
        "nonce too low",
        "already known",
        "replacement transaction underpriced",
        "transaction underpriced",
    ] {
        assert!(!is_transient_error(&anyhow::anyhow!(msg.to_string())), "{}", msg);
    }
}
