use super::*;
use stock_watcher::cache::FoundCache;
use stock_watcher::scheduler::{shutdown_channel, MonitorScheduler};

const SHOP: &str = r"shop\.example";
const INTERVAL: Duration = Duration::from_secs(60);

fn shop_setup(probe: &Arc<ScriptedProbe>, launcher: FakeLauncher) -> (MonitorScheduler, Arc<SessionLog>, tempfile::TempDir) {
    let Harness { runner, log, _dir, .. } =
        Harness::new(scripted_registry(vec![(SHOP, Arc::clone(probe))]), launcher);
    let items = vec![item("A", "https://shop.example/A")];
    let scheduler = MonitorScheduler::new(runner, items, FoundCache::new(), INTERVAL);
    (scheduler, log, _dir)
}

fn shop_launcher() -> FakeLauncher {
    FakeLauncher::new([page("https://shop.example/A", "<html></html>")].into_iter().collect())
}

#[tokio::test(start_paused = true)]
async fn test_cycles_run_back_to_back_without_overlap() -> anyhow::Result<()> {
    let probe = Arc::new(ScriptedProbe::new("Shop"));
    let (scheduler, log, _dir) = shop_setup(&probe, shop_launcher());
    let (trigger, shutdown) = shutdown_channel();

    let handle = tokio::spawn(scheduler.run(shutdown));
    tokio::time::sleep(Duration::from_secs(150)).await;
    trigger.send(true)?;
    let stats = handle.await?;

    // Cycles start at 0s, 60s and 120s
    assert_eq!(stats.completed_cycles, 3);
    assert_eq!(stats.failed_cycles, 0);
    assert_eq!(probe.calls_for("A"), 3);
    assert_eq!(log.opened(), 3);
    assert_eq!(log.max_active(), 1);
    assert_eq!(stats.last_report.map(|report| report.unavailable), Some(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_lets_in_flight_cycle_finish() -> anyhow::Result<()> {
    let probe = Arc::new(
        ScriptedProbe::new("Shop")
            .answer("A", Scripted::Slow(Duration::from_secs(30), AvailabilityVerdict::Available)),
    );
    let (scheduler, log, _dir) = shop_setup(&probe, shop_launcher());
    let (trigger, shutdown) = shutdown_channel();

    let start = tokio::time::Instant::now();
    let handle = tokio::spawn(scheduler.run(shutdown));
    tokio::time::sleep(Duration::from_secs(10)).await;
    trigger.send(true)?;
    let stats = handle.await?;

    assert_eq!(stats.completed_cycles, 1);
    assert_eq!(stats.last_report.map(|report| report.available), Some(1));
    assert_eq!(log.closed(), 1);
    assert!(start.elapsed() >= Duration::from_secs(30));
    assert!(start.elapsed() < INTERVAL);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycle_does_not_stop_the_loop() -> anyhow::Result<()> {
    let probe = Arc::new(ScriptedProbe::new("Shop"));
    let (scheduler, log, _dir) = shop_setup(&probe, shop_launcher().failing_first(1));
    let (trigger, shutdown) = shutdown_channel();

    let handle = tokio::spawn(scheduler.run(shutdown));
    tokio::time::sleep(Duration::from_secs(90)).await;
    trigger.send(true)?;
    let stats = handle.await?;

    assert_eq!(stats.failed_cycles, 1);
    assert_eq!(stats.completed_cycles, 1);
    assert_eq!(log.failed_opens.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(probe.calls_for("A"), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dropped_trigger_stops_the_loop() -> anyhow::Result<()> {
    let probe = Arc::new(ScriptedProbe::new("Shop"));
    let (scheduler, _log, _dir) = shop_setup(&probe, shop_launcher());
    let (trigger, shutdown) = shutdown_channel();

    let handle = tokio::spawn(scheduler.run(shutdown));
    tokio::time::sleep(Duration::from_secs(70)).await;
    drop(trigger);
    let stats = handle.await?;

    assert_eq!(stats.completed_cycles, 2);
    Ok(())
}

#[tokio::test]
async fn test_found_item_is_skipped_on_next_run() -> anyhow::Result<()> {
    let probe = Arc::new(
        ScriptedProbe::new("Shop").answer("A", Scripted::Verdict(AvailabilityVerdict::Available)),
    );
    let (mut scheduler, _log, _dir) = shop_setup(&probe, shop_launcher());

    let first = scheduler.run_once().await?;
    let second = scheduler.run_once().await?;

    assert_eq!(first.available, 1);
    assert_eq!(second.skipped, 1);
    assert!(scheduler.cache().last_found("A").is_some());
    assert_eq!(scheduler.stats().completed_cycles, 2);
    assert_eq!(probe.calls_for("A"), 1);
    Ok(())
}
