use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::repository::CommissionRepository;
use super::service::CommissionService;

/// Run the status sweep on a fixed interval. Returns `None` when the interval is zero.
pub fn spawn_status_sweep<R>(
    service: Arc<CommissionService<R>>,
    interval: Duration,
) -> Option<JoinHandle<()>>
where
    R: CommissionRepository + 'static,
{
    if interval.is_zero() {
        debug!("header status sweep disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = service.sweep() {
                warn!(error = %err, "header status sweep failed; retrying next tick");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::clock::FixedClock;
    use crate::commission::domain::{HeaderStatus, NewHeader};
    use crate::commission::repository::InMemoryCommissionRepository;
    use chrono::{TimeZone, Utc};

    #[test]
    fn zero_interval_disables_the_sweep() {
        let service = Arc::new(CommissionService::new(
            Arc::new(InMemoryCommissionRepository::new()),
            Arc::new(FixedClock::new(Utc::now())),
        ));
        assert!(spawn_status_sweep(service, Duration::ZERO).is_none());
    }

    #[tokio::test]
    async fn spawned_sweep_persists_transitions() {
        let start = Utc
            .with_ymd_and_hms(2025, 4, 1, 0, 0, 0)
            .single()
            .expect("valid");
        let clock = Arc::new(FixedClock::new(start));
        let service = Arc::new(CommissionService::new(
            Arc::new(InMemoryCommissionRepository::new()),
            clock.clone(),
        ));
        let header = service
            .create_header(NewHeader {
                name: "Spring launch".to_string(),
                start_date: Some(start + chrono::Duration::hours(1)),
                ..NewHeader::default()
            })
            .expect("created");
        assert_eq!(header.status, HeaderStatus::Scheduled);

        clock.advance(chrono::Duration::hours(2));
        let handle = spawn_status_sweep(service.clone(), Duration::from_millis(5))
            .expect("sweep spawned");

        let mut status = HeaderStatus::Scheduled;
        for _ in 0..100 {
            status = service.get_header(header.id).expect("header").status;
            if status != HeaderStatus::Scheduled {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.abort();
        assert_eq!(status, HeaderStatus::Active);
    }
}
