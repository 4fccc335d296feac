// Tests for the node resource governor.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;

    use crate::governor::{
        HealthState, HealthTransition, HeatMap, HeatMapEntry, ResourceGovernor, TimerPool,
        EVAL_INTERVAL,
    };
    use crate::support::{Reading, SharedReading};

    fn governor(readings: &[&SharedReading]) -> (Arc<ResourceGovernor>, TimerPool) {
        let pool = TimerPool::new();
        let samplers = readings
            .iter()
            .enumerate()
            .map(|(i, r)| r.sampler(&format!("sample-{}", i)))
            .collect();
        let gov = Arc::new(ResourceGovernor::new(samplers, Arc::new(pool.clone())));
        (gov, pool)
    }

    #[test]
    fn test_starts_normal() {
        let cpu = SharedReading::value(0.0);
        let (gov, _) = governor(&[&cpu]);
        assert_eq!(gov.current_health_state(), HealthState::Normal);
    }

    #[test]
    fn test_warm_band_and_back() {
        let cpu = SharedReading::value(90.0);
        let (gov, _) = governor(&[&cpu]);

        assert_eq!(
            gov.evaluate(),
            Some(HealthTransition {
                previous: HealthState::Normal,
                current: HealthState::Warm
            })
        );
        assert_eq!(gov.current_health_state(), HealthState::Warm);

        cpu.set_value(70.0);
        gov.evaluate();
        assert_eq!(gov.current_health_state(), HealthState::Normal);
    }

    #[test]
    fn test_gap_values_leave_state_unchanged() {
        let cpu = SharedReading::value(90.0);
        let (gov, _) = governor(&[&cpu]);
        gov.evaluate();

        for v in [85.0, 86.0, 95.0, 96.0, 120.0] {
            cpu.set_value(v);
            assert_eq!(gov.evaluate(), None);
            assert_eq!(gov.current_health_state(), HealthState::Warm, "value {}", v);
        }
    }

    #[test]
    fn test_dead_zone_ticks_keep_the_previous_state() {
        // From Normal, 86 and 95 would read Warm if the bands were closed.
        let cpu = SharedReading::value(40.0);
        let (gov, _) = governor(&[&cpu]);
        gov.evaluate();
        let mut rx = gov.subscribe();
        for v in [86.0, 95.0] {
            cpu.set_value(v);
            assert_eq!(gov.evaluate(), None);
            assert_eq!(gov.current_health_state(), HealthState::Normal, "value {}", v);
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        // From Warm, 85 and 96 would read Normal if the bands were closed.
        cpu.set_value(90.0);
        gov.evaluate();
        for v in [85.0, 96.0] {
            cpu.set_value(v);
            assert_eq!(gov.evaluate(), None);
            assert_eq!(gov.current_health_state(), HealthState::Warm, "value {}", v);
        }
    }

    #[test]
    fn test_top_band_reads_as_normal() {
        let cpu = SharedReading::value(90.0);
        let (gov, _) = governor(&[&cpu]);
        gov.evaluate();

        cpu.set_value(97.0);
        gov.evaluate();
        assert_eq!(gov.current_health_state(), HealthState::Normal);

        cpu.set_value(90.0);
        gov.evaluate();
        cpu.set_value(100.0);
        assert_eq!(
            gov.evaluate(),
            Some(HealthTransition {
                previous: HealthState::Warm,
                current: HealthState::Normal
            })
        );
    }

    #[test]
    fn test_highest_candidate_across_samplers_wins() {
        let cpu = SharedReading::value(40.0);
        let mem = SharedReading::value(91.5);
        let (gov, _) = governor(&[&cpu, &mem]);
        gov.evaluate();
        assert_eq!(gov.current_health_state(), HealthState::Warm);
    }

    #[test]
    fn test_hot_band_from_custom_heat_map() {
        let cpu = SharedReading::value(99.0);
        let gov = ResourceGovernor::with_heat_map(
            HeatMap::new(vec![
                HeatMapEntry::new(HealthState::Normal, 0.0, 80.0),
                HeatMapEntry::new(HealthState::Hot, 80.0, 101.0),
            ]),
            vec![cpu.sampler("cpu")],
            Arc::new(TimerPool::new()),
        );
        gov.evaluate();
        assert_eq!(gov.current_health_state(), HealthState::Hot);
    }

    #[test]
    fn test_repeated_state_notifies_once() {
        let cpu = SharedReading::value(90.0);
        let (gov, _) = governor(&[&cpu]);
        let mut rx = gov.subscribe();

        gov.evaluate();
        cpu.set_value(92.0);
        gov.evaluate();
        cpu.set_value(88.0);
        gov.evaluate();

        assert_eq!(rx.try_recv().unwrap().current, HealthState::Warm);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_all_samples_unavailable_is_a_noop() {
        let cpu = SharedReading::value(90.0);
        let mem = SharedReading::new(Reading::Unavailable);
        let (gov, _) = governor(&[&cpu, &mem]);
        gov.evaluate();

        cpu.set(Reading::Unavailable);
        let mut rx = gov.subscribe();
        assert_eq!(gov.evaluate(), None);
        assert_eq!(gov.current_health_state(), HealthState::Warm);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_failing_sampler_only_drops_its_own_reading() {
        let cpu = SharedReading::value(90.0);
        let mem = SharedReading::new(Reading::Fail);
        let (gov, _) = governor(&[&cpu, &mem]);

        assert_eq!(
            gov.evaluate(),
            Some(HealthTransition {
                previous: HealthState::Normal,
                current: HealthState::Warm
            })
        );

        cpu.set_value(50.0);
        gov.evaluate();
        assert_eq!(gov.current_health_state(), HealthState::Normal);

        // Nothing else reads: the failure leaves the state alone.
        cpu.set(Reading::Fail);
        mem.set_value(90.0);
        gov.evaluate();
        assert_eq!(gov.current_health_state(), HealthState::Warm);
        mem.set(Reading::Fail);
        assert_eq!(gov.evaluate(), None);
        assert_eq!(gov.current_health_state(), HealthState::Warm);
    }

    #[test]
    fn test_panicking_sampler_aborts_the_tick() {
        let cpu = SharedReading::value(90.0);
        let mem = SharedReading::value(40.0);
        let (gov, _) = governor(&[&cpu, &mem]);
        gov.evaluate();

        cpu.set_value(50.0);
        mem.set(Reading::Panic);
        assert_eq!(gov.evaluate(), None);
        assert_eq!(gov.current_health_state(), HealthState::Warm);

        mem.set(Reading::Unavailable);
        gov.evaluate();
        assert_eq!(gov.current_health_state(), HealthState::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_publishes_transitions() {
        let cpu = SharedReading::value(90.0);
        let (gov, pool) = governor(&[&cpu]);
        let mut rx = gov.subscribe();
        let started = tokio::time::Instant::now();
        let handle = gov.start();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.current, HealthState::Warm);
        assert!(started.elapsed() >= EVAL_INTERVAL);

        cpu.set_value(20.0);
        let second = rx.recv().await.unwrap();
        assert_eq!(
            second,
            HealthTransition {
                previous: HealthState::Warm,
                current: HealthState::Normal
            }
        );

        pool.dispose();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_failing_ticks() {
        let cpu = SharedReading::new(Reading::Fail);
        let (gov, pool) = governor(&[&cpu]);
        let mut rx = gov.subscribe();
        let handle = gov.start();

        tokio::time::sleep(EVAL_INTERVAL * 2 + Duration::from_secs(5)).await;
        assert_eq!(gov.current_health_state(), HealthState::Normal);
        assert!(!handle.is_finished());

        cpu.set_value(90.0);
        assert_eq!(rx.recv().await.unwrap().current, HealthState::Warm);

        pool.dispose();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_the_loop() {
        let cpu = SharedReading::value(90.0);
        let (gov, pool) = governor(&[&cpu]);
        let handle = gov.start();

        tokio::task::yield_now().await;
        pool.dispose();
        handle.await.unwrap();

        // Disposed before the first tick elapsed: nothing was evaluated.
        assert_eq!(gov.current_health_state(), HealthState::Normal);
    }
}
