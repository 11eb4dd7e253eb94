//! Basic scheduler example
//!
//! Demonstrates submitting plain closures and a coroutine task.

use sched::{r#async, sync_wait_result, work, Runtime, SchedulerConfig, WorkItem, WorkerId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn main() {
    println!("=== sched basic example ===\n");

    let config = SchedulerConfig::new().worker_count(4).debug_logging(true);
    let runtime = Runtime::new(config);
    let group = runtime
        .create_group(0, runtime.worker_count() as u32, 1, "default")
        .unwrap();
    runtime.start().unwrap();

    println!("Submitting closures...\n");

    let completed = Arc::new(AtomicUsize::new(0));
    for i in 0..3 {
        let completed = Arc::clone(&completed);
        runtime
            .scheduler()
            .submit(
                WorkerId::EXTERNAL,
                group,
                WorkItem::pack(move || {
                    println!("[work item {}] running on a worker thread", i);
                    completed.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
    }

    while completed.load(Ordering::SeqCst) < 3 {
        std::thread::yield_now();
    }
    println!("\nAll closures finished.\n");

    println!("Submitting a coroutine task...");
    let task = r#async(runtime.scheduler(), group, async { 2 + 2 });
    let result = sync_wait_result(task);
    println!("Coroutine task resolved to {}", result);

    println!("Submitting a plain closure through the async sugar...");
    let task = r#async(runtime.scheduler(), group, work(|| 6 * 7));
    let result = sync_wait_result(task);
    println!("Closure task resolved to {}", result);

    runtime.shutdown();
    println!("\nRuntime shut down.");
}
