//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 端到端场景（配置 → 收集 → 分发 → 释放/超时）
//! - 时间相关行为使用 tokio 暂停时钟，保证确定性

#[cfg(test)]
mod contract_tests {
    use contracts::{BatchError, TimedBatchConfig};

    #[test]
    fn test_default_config_matches_reference_scenario() {
        let config = TimedBatchConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.batch_timeout_ms, 2000);
        assert_eq!(config.thread_timeout_ms, 22000);
        assert_eq!(
            TimedBatchConfig::recommended_thread_timeout(10, 2000),
            config.thread_timeout_ms
        );
    }

    #[test]
    fn test_timeout_error_message() {
        let err = BatchError::Timeout { waited_ms: 22000 };
        assert!(err
            .to_string()
            .contains("timed out waiting for batch completion"));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use timed_batch::{
        handler_fn, BatchError, BatchHandler, HandlerError, TimedBatchBuilder, TimedBatchConfig,
    };
    use tokio::task::JoinSet;
    use tokio::time::{sleep, Instant};

    /// One handler invocation as seen by the downstream store
    #[derive(Debug, Clone)]
    struct HandledBatch {
        at: Duration,
        items: Vec<u32>,
    }

    /// Store double that records every batch with the time it was handled
    #[derive(Clone)]
    struct TimedStore {
        origin: Instant,
        latency: Duration,
        poison: Option<u32>,
        handled: Arc<Mutex<Vec<HandledBatch>>>,
    }

    impl TimedStore {
        fn new(latency: Duration) -> Self {
            Self {
                origin: Instant::now(),
                latency,
                poison: None,
                handled: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing_on(mut self, item: u32) -> Self {
            self.poison = Some(item);
            self
        }

        fn handled(&self) -> Vec<HandledBatch> {
            self.handled.lock().unwrap().clone()
        }
    }

    impl BatchHandler<u32> for TimedStore {
        async fn handle(&self, items: Vec<u32>) -> Result<(), HandlerError> {
            sleep(self.latency).await;
            let poisoned = self.poison.is_some_and(|p| items.contains(&p));
            self.handled.lock().unwrap().push(HandledBatch {
                at: self.origin.elapsed(),
                items,
            });
            if poisoned {
                Err(HandlerError::failed("poisoned batch"))
            } else {
                Ok(())
            }
        }
    }

    /// 95 items back-to-back with batch_size=10, batch_timeout=2s, thread_timeout=22s
    ///
    /// 验证：
    /// 1. 前 9 批因数量触发，1 秒内处理完成
    /// 2. 第 10 批 (5 条) 在最后一次入队约 2 秒后由不活跃定时器触发
    /// 3. 95 个调用方全部成功，无超时
    #[tokio::test(start_paused = true)]
    async fn test_ninety_five_items_reference_scenario() {
        let store = TimedStore::new(Duration::from_millis(1));
        let block = TimedBatchBuilder::new(TimedBatchConfig::new(10, 2000, 22000).unwrap())
            .unwrap()
            .set_handler(store.clone());

        let handles: Vec<_> = (0..95).map(|i| block.submit(i).unwrap()).collect();
        let last_enqueue = store.origin.elapsed();

        let mut waiters = JoinSet::new();
        for handle in handles {
            waiters.spawn(handle.wait());
        }
        let mut successes = 0;
        while let Some(outcome) = waiters.join_next().await {
            assert_eq!(outcome.unwrap(), Ok(()));
            successes += 1;
        }
        assert_eq!(successes, 95);

        let handled = store.handled();
        assert_eq!(handled.len(), 10);
        for batch in &handled[..9] {
            assert_eq!(batch.items.len(), 10);
            assert!(batch.at < Duration::from_secs(1), "size batch at {:?}", batch.at);
        }

        let last = &handled[9];
        assert_eq!(last.items, (90..95).collect::<Vec<u32>>());
        let after_last_enqueue = last.at - last_enqueue;
        assert!(after_last_enqueue >= Duration::from_millis(2000));
        assert!(after_last_enqueue < Duration::from_millis(2100));

        let all: Vec<u32> = handled.iter().flat_map(|b| b.items.clone()).collect();
        assert_eq!(all, (0..95).collect::<Vec<u32>>());

        let snapshot = block.shutdown().await;
        assert_eq!(snapshot.batches_handled, 10);
        assert_eq!(snapshot.batches_failed, 0);
        assert_eq!(snapshot.items_released, 95);
        assert_eq!(snapshot.items_released_late, 0);
    }

    /// A failing batch times out its own items only; neighbours are released
    #[tokio::test(start_paused = true)]
    async fn test_handler_failure_is_isolated_to_its_batch() {
        let store = TimedStore::new(Duration::from_millis(1)).failing_on(12);
        let block = TimedBatchBuilder::new(TimedBatchConfig::new(5, 100, 3000).unwrap())
            .unwrap()
            .set_handler(store.clone());

        let start = Instant::now();
        let handles: Vec<_> = (0..15).map(|i| block.submit(i).unwrap()).collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.wait().await);
        }

        for (i, outcome) in outcomes.iter().enumerate() {
            if (10..15).contains(&i) {
                assert_eq!(*outcome, Err(BatchError::Timeout { waited_ms: 3000 }));
            } else {
                assert_eq!(*outcome, Ok(()), "item {i}");
            }
        }
        // Failed items only fail once their own deadline elapses
        assert!(start.elapsed() >= Duration::from_millis(3000));

        let snapshot = block.shutdown().await;
        assert_eq!(snapshot.batches_handled, 2);
        assert_eq!(snapshot.batches_failed, 1);
        assert_eq!(snapshot.items_failed, 5);
    }

    /// Each item's deadline is measured from its own enqueue
    #[tokio::test(start_paused = true)]
    async fn test_timeouts_measured_from_each_enqueue() {
        let store = TimedStore::new(Duration::from_millis(1)).failing_on(0);
        let block = TimedBatchBuilder::new(TimedBatchConfig::new(3, 100, 1000).unwrap())
            .unwrap()
            .set_handler(store);

        let origin = Instant::now();
        let mut waiters = JoinSet::new();
        for i in 0..3u32 {
            let enqueuer = block.enqueuer();
            waiters.spawn(async move {
                let result = enqueuer.enqueue(i).await;
                (i, result, origin.elapsed())
            });
            sleep(Duration::from_millis(50)).await;
        }

        let mut finished = Vec::new();
        while let Some(joined) = waiters.join_next().await {
            let (i, result, at) = joined.unwrap();
            assert!(result.unwrap_err().is_timeout());
            finished.push((i, at));
        }
        finished.sort_by_key(|(i, _)| *i);

        for (i, at) in finished {
            let expected = Duration::from_millis(1000 + 50 * u64::from(i));
            assert!(at >= expected && at < expected + Duration::from_millis(10), "item {i} at {at:?}");
        }
    }

    /// Many producers: every item handled exactly once, no batch over the cap
    #[tokio::test(start_paused = true)]
    async fn test_concurrent_producers_lose_and_duplicate_nothing() {
        let store = TimedStore::new(Duration::from_millis(2));
        let block = TimedBatchBuilder::new(TimedBatchConfig::new(7, 50, 5000).unwrap())
            .unwrap()
            .set_handler(store.clone());

        let mut producers = JoinSet::new();
        for producer in 0..8u32 {
            let enqueuer = block.enqueuer();
            producers.spawn(async move {
                let mut waits = JoinSet::new();
                for n in 0..40u32 {
                    let handle = enqueuer.submit(producer * 1000 + n).unwrap();
                    waits.spawn(handle.wait());
                    if n % 5 == 0 {
                        sleep(Duration::from_millis(u64::from(producer) * 3 + 1)).await;
                    }
                }
                let mut ok = 0;
                while let Some(outcome) = waits.join_next().await {
                    if outcome.unwrap().is_ok() {
                        ok += 1;
                    }
                }
                ok
            });
        }

        let mut released = 0;
        while let Some(count) = producers.join_next().await {
            released += count.unwrap();
        }
        assert_eq!(released, 320);

        let handled = store.handled();
        assert!(handled.iter().all(|b| !b.items.is_empty() && b.items.len() <= 7));

        let mut all: Vec<u32> = handled.iter().flat_map(|b| b.items.clone()).collect();
        all.sort_unstable();
        let mut expected: Vec<u32> = (0..8u32)
            .flat_map(|p| (0..40u32).map(move |n| p * 1000 + n))
            .collect();
        expected.sort_unstable();
        assert_eq!(all, expected);

        let snapshot = block.shutdown().await;
        assert_eq!(snapshot.items_enqueued, 320);
        assert_eq!(snapshot.items_released, 320);
    }

    /// Items from one producer keep their relative order across batches
    #[tokio::test(start_paused = true)]
    async fn test_enqueue_order_preserved() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = handler_fn(move |items: Vec<u32>| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().extend(items);
                Ok(())
            }
        });
        let block = TimedBatchBuilder::new(TimedBatchConfig::new(4, 20, 1000).unwrap())
            .unwrap()
            .set_handler(handler);

        let mut handles = Vec::new();
        for i in 0..30u32 {
            handles.push(block.submit(i).unwrap());
            if i % 7 == 0 {
                sleep(Duration::from_millis(25)).await;
            }
        }
        for handle in handles {
            assert!(handle.wait().await.is_ok());
        }

        assert_eq!(*seen.lock().unwrap(), (0..30).collect::<Vec<u32>>());
        block.shutdown().await;
    }

    /// Config file → builder → block
    #[tokio::test(start_paused = true)]
    async fn test_block_from_config_file() {
        let file = ConfigLoader::load_from_str(
            r#"
[batch]
batch_size = 2
batch_timeout_ms = 100
thread_timeout_ms = 300
max_in_flight_batches = 2
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let store = TimedStore::new(Duration::from_millis(1));
        let block = TimedBatchBuilder::new(file.batch)
            .unwrap()
            .set_handler(store.clone());

        assert!(block.enqueue(1).await.is_ok());
        let snapshot = block.shutdown().await;
        assert_eq!(snapshot.batches_handled, 1);
        assert_eq!(store.handled()[0].items, vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_produces_no_block() {
        let parsed = ConfigLoader::load_from_str(
            "[batch]\nbatch_size = 10\nbatch_timeout_ms = 2000\nthread_timeout_ms = 1000\n",
            ConfigFormat::Toml,
        );
        assert!(parsed.is_err());

        let config = TimedBatchConfig {
            batch_size: 0,
            ..TimedBatchConfig::default()
        };
        assert!(TimedBatchBuilder::<u32>::new(config).is_err());
    }

    #[test]
    fn test_aggregator_summary_for_reference_scenario() {
        let mut aggregator = observability::BatchMetricsAggregator::new(10);
        for _ in 0..9 {
            aggregator.update(10, true, 1.0);
        }
        aggregator.update(5, true, 1.0);
        let summary = aggregator.summary();
        assert_eq!(summary.total_items, 95);
        assert_eq!(summary.partial_batches, 1);
    }
}
