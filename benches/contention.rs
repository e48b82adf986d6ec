use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use ulid::Ulid;

use campsite::calendar::Calendar;
use campsite::engine::{DayUniverse, Engine, EngineError};
use campsite::store::WalStore;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
}

fn bench_engine(universe: bool) -> Engine {
    let dir = std::env::temp_dir().join(format!("campsite_bench_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let path: PathBuf = dir.join("bookings.wal");
    let store = Arc::new(WalStore::open(path).unwrap());
    let universe = if universe {
        DayUniverse::Materialized(Arc::new(Calendar::materialize(
            epoch(),
            epoch() + Days::new(5 * 366),
        )))
    } else {
        DayUniverse::Computed
    };
    Engine::with_universe(store, universe)
}

fn night(offset: u64) -> (NaiveDate, NaiveDate) {
    let arrival = epoch() + Days::new(offset);
    (arrival, arrival + Days::new(1))
}

async fn phase1_sequential() {
    let engine = bench_engine(false);
    let n = 1500;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let (arrival, departure) = night(i as u64);
        let t = Instant::now();
        engine
            .create("bench@example.com".into(), "Bench".into(), arrival, departure)
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("create latency", &mut latencies);
}

/// Every task fights over the same small set of nights.
async fn phase2_contended() {
    let engine = Arc::new(bench_engine(false));
    let n_tasks = 32;
    let n_per_task = 50;
    let hot_nights = 40;

    let start = Instant::now();
    let mut handles = Vec::new();
    for t in 0..n_tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut won = 0usize;
            let mut lost = 0usize;
            let mut latencies = Vec::with_capacity(n_per_task);
            for j in 0..n_per_task {
                let (arrival, departure) = night(((t * 7 + j * 3) % hot_nights) as u64);
                let start = Instant::now();
                match engine
                    .create(format!("g{t}@example.com"), "Bench".into(), arrival, departure)
                    .await
                {
                    Ok(_) => won += 1,
                    Err(EngineError::UnavailableDates { .. }) => lost += 1,
                    Err(e) => panic!("unexpected error: {e}"),
                }
                latencies.push(start.elapsed());
            }
            (won, lost, latencies)
        }));
    }

    let mut won = 0;
    let mut lost = 0;
    let mut latencies = Vec::new();
    for h in handles {
        let (w, l, lat) = h.await.unwrap();
        won += w;
        lost += l;
        latencies.extend(lat);
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    println!(
        "  {n_tasks} tasks x {n_per_task} attempts = {total} in {:.2}s: {won} won, {lost} unavailable",
        elapsed.as_secs_f64()
    );
    assert_eq!(won, hot_nights, "every hot night should be booked exactly once");
    print_latency("contended create latency", &mut latencies);
}

async fn phase3_availability_under_load(materialized: bool) {
    let engine = Arc::new(bench_engine(materialized));
    for i in (0..600).step_by(2) {
        let (arrival, departure) = night(i);
        engine
            .create("bench@example.com".into(), "Bench".into(), arrival, departure)
            .await
            .unwrap();
    }

    let writer = {
        let engine = engine.clone();
        tokio::spawn(async move {
            for i in (1..600).step_by(2) {
                let (arrival, departure) = night(i);
                let _ = engine
                    .create("writer@example.com".into(), "Writer".into(), arrival, departure)
                    .await;
            }
        })
    };

    let mut latencies = Vec::with_capacity(500);
    for i in 0..500u64 {
        let from = epoch() + Days::new(i % 300);
        let to = from + Days::new(30);
        let t = Instant::now();
        engine.find_available_days(from, to).await.unwrap();
        latencies.push(t.elapsed());
    }
    writer.await.unwrap();

    let label = if materialized {
        "availability latency (materialized)"
    } else {
        "availability latency (computed)"
    };
    print_latency(label, &mut latencies);
}

#[tokio::main]
async fn main() {
    println!("=== campsite contention benchmark ===\n");

    println!("[phase 1] sequential create throughput");
    phase1_sequential().await;

    println!("\n[phase 2] contended creates");
    phase2_contended().await;

    println!("\n[phase 3] availability under write load");
    phase3_availability_under_load(false).await;
    phase3_availability_under_load(true).await;

    println!("\n=== benchmark complete ===");
}
