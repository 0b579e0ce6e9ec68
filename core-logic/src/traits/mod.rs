use async_trait::async_trait;
use std::time::Duration;

/// Running totals of what the scheduler has done since process start.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub deployed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub faults: u64,
}

impl CycleStats {
    pub fn total(&self) -> u64 {
        self.deployed + self.failed + self.skipped + self.faults
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.deployed as f64 / total as f64) * 100.0
    }
}

/// Source of every wait in the bot. Swapped for a recording clock in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let stats = CycleStats {
            deployed: 3,
            failed: 1,
            skipped: 0,
            faults: 0,
        };
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.success_rate(), 75.0);
        assert_eq!(CycleStats::default().success_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_tokio_clock_sleeps() {
        let start = tokio::time::Instant::now();
        TokioClock.sleep(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
