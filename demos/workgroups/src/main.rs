//! Workgroup priority example
//!
//! Two workgroups share the same worker: a low-priority background
//! group and a high-priority interactive group. Submits a batch to each
//! and shows the high-priority group draining first.

use sched::{Runtime, SchedulerConfig, WorkItem, WorkerId};
use std::sync::{Arc, Mutex};

fn main() {
    println!("=== sched workgroups example ===\n");

    let runtime = Runtime::new(SchedulerConfig::new().worker_count(1));
    let background = runtime.create_group(0, 1, 1, "background").unwrap();
    let interactive = runtime.create_group(0, 1, 10, "interactive").unwrap();
    runtime.start().unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..5 {
        let order = Arc::clone(&order);
        runtime
            .scheduler()
            .submit(
                WorkerId::EXTERNAL,
                background,
                WorkItem::pack(move || order.lock().unwrap().push(format!("background-{i}"))),
            )
            .unwrap();
    }
    for i in 0..5 {
        let order = Arc::clone(&order);
        runtime
            .scheduler()
            .submit(
                WorkerId::EXTERNAL,
                interactive,
                WorkItem::pack(move || order.lock().unwrap().push(format!("interactive-{i}"))),
            )
            .unwrap();
    }

    while order.lock().unwrap().len() < 10 {
        std::thread::yield_now();
    }

    println!("Completion order:");
    for entry in order.lock().unwrap().iter() {
        println!("  {entry}");
    }

    runtime.shutdown();
}
