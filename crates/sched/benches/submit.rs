use criterion::{criterion_group, criterion_main, Criterion};
use sched::{Scheduler, SchedulerConfig, WorkItem, WorkerId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn submit_throughput(c: &mut Criterion) {
    let scheduler = Scheduler::new(SchedulerConfig::new().worker_count(4)).unwrap();
    let group = scheduler.create_group(0, 4, 1, "bench").unwrap();
    scheduler.begin_execution().unwrap();

    let completed = Arc::new(AtomicUsize::new(0));

    c.bench_function("submit_1000_closures", |b| {
        b.iter(|| {
            let start = completed.load(Ordering::SeqCst);
            for _ in 0..1000 {
                let completed = Arc::clone(&completed);
                scheduler
                    .submit(
                        WorkerId::EXTERNAL,
                        group,
                        WorkItem::pack(move || {
                            completed.fetch_add(1, Ordering::SeqCst);
                        }),
                    )
                    .unwrap();
            }
            while completed.load(Ordering::SeqCst) < start + 1000 {
                std::hint::spin_loop();
            }
        })
    });

    scheduler.end_execution();
}

criterion_group!(benches, submit_throughput);
criterion_main!(benches);
