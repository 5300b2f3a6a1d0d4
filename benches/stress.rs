//! In-process stress driver: sequential latency, per-machine parallelism,
//! and a contention storm on one machine. Run with `cargo bench`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, TimeDelta};
use ulid::Ulid;

use lanbook::engine::Engine;
use lanbook::model::{Contact, VenueTime};
use lanbook::notify::NotifyHub;

fn bench_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("lanbook_bench");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn base() -> VenueTime {
    NaiveDate::from_ymd_opt(2026, 7, 6)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
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
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

async fn setup(name: &str, machines: usize) -> (Arc<Engine>, Vec<Ulid>) {
    let engine = Arc::new(Engine::open(bench_wal_path(name), Arc::new(NotifyHub::new())).unwrap());
    engine
        .ensure_admin("admin".into(), Contact::Phone("+1".into()))
        .await
        .unwrap();
    let admin = engine
        .authorize_admin(&Contact::Phone("+1".into()))
        .await
        .unwrap();
    let mut ids = Vec::with_capacity(machines);
    for i in 0..machines {
        let id = engine
            .add_resource(&admin, format!("PC-{i}"), None)
            .await
            .unwrap();
        ids.push(id);
    }
    (engine, ids)
}

/// Back-to-back one-hour bookings on one machine, one at a time.
async fn phase1_sequential() {
    let (engine, ids) = setup("phase1.wal", 1).await;
    let machine = ids[0];
    let now = base();

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n as i64 {
        let s = base() + TimeDelta::hours(i);
        let e = s + TimeDelta::hours(1);
        let t = Instant::now();
        engine
            .create_reservation("seq", &Contact::Phone("+100".into()), machine, s, e, now)
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    println!(
        "  throughput: {:.0} bookings/s",
        n as f64 / elapsed.as_secs_f64()
    );
    print_latency("sequential create_reservation", &mut latencies);
}

/// Independent machines booked from independent tasks — no lock contention.
async fn phase2_parallel_machines() {
    let machines = 10;
    let per_task = 200;
    let (engine, ids) = setup("phase2.wal", machines).await;
    let now = base();

    let start = Instant::now();
    let mut handles = Vec::new();
    for (m, machine) in ids.into_iter().enumerate() {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(per_task);
            for i in 0..per_task as i64 {
                let s = base() + TimeDelta::hours(i);
                let e = s + TimeDelta::hours(1);
                let t = Instant::now();
                engine
                    .create_reservation(
                        "par",
                        &Contact::Chat(format!("tg-{m}")),
                        machine,
                        s,
                        e,
                        now,
                    )
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all = Vec::new();
    for h in handles {
        all.extend(h.await.unwrap());
    }
    let elapsed = start.elapsed();
    println!(
        "  throughput: {:.0} bookings/s across {machines} machines",
        (machines * per_task) as f64 / elapsed.as_secs_f64()
    );
    print_latency("parallel create_reservation", &mut all);
}

/// Many rivals race for the same 50 slots on one machine; exactly one wins
/// each slot and everyone else fails fast.
async fn phase3_contention() {
    let rivals = 100;
    let slots = 50;
    let (engine, ids) = setup("phase3.wal", 1).await;
    let machine = ids[0];
    let now = base();

    let start = Instant::now();
    let mut handles = Vec::new();
    for r in 0..rivals {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut won = 0usize;
            for i in 0..slots as i64 {
                let s = base() + TimeDelta::hours(i);
                let e = s + TimeDelta::hours(1);
                if engine
                    .create_reservation(
                        "rival",
                        &Contact::Chat(format!("tg-{r}")),
                        machine,
                        s,
                        e,
                        now,
                    )
                    .await
                    .is_ok()
                {
                    won += 1;
                }
            }
            won
        }));
    }

    let mut total_won = 0;
    for h in handles {
        total_won += h.await.unwrap();
    }
    let elapsed = start.elapsed();

    assert_eq!(total_won, slots, "every slot must be won exactly once");
    println!(
        "  {rivals} rivals × {slots} slots in {:.2}s — {slots} winners, {} conflicts",
        elapsed.as_secs_f64(),
        rivals * slots - slots,
    );
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    println!("phase 1: sequential");
    phase1_sequential().await;

    println!("phase 2: parallel machines");
    phase2_parallel_machines().await;

    println!("phase 3: contention storm");
    phase3_contention().await;
}
