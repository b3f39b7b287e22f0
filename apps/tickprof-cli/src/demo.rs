//! Small instrumented workload.

use std::thread;
use std::time::Duration;

use tracing::info;

use tickprof_profiler::{probe, tick, Profiler};

struct MyClass;

impl MyClass {
    fn test1(&self, profiler: &mut Profiler) {
        probe!(self: "MyClass", "test1");
        tick!(profiler);
        info!("test1 used");
        tick!(profiler);
    }

    fn test2(&self, profiler: &mut Profiler, timeout: Duration) {
        probe!(self: "MyClass", "test2"; timeout);
        tick!(profiler);
        thread::sleep(timeout);
        tick!(profiler);
        info!("test2 used");
        tick!(profiler);
    }

    fn test3(&self, profiler: &mut Profiler) {
        probe!(self: "MyClass", "test3");
        tick!(profiler);
        info!("test3 used");
        tick!(profiler);
    }
}

/// Run the workload, ticking between statements.
pub fn run(profiler: &mut Profiler, sleep: Duration) {
    let demo = MyClass;
    demo.test1(profiler);
    tick!(profiler);
    demo.test2(profiler, sleep);
    tick!(profiler);
    demo.test2(profiler, sleep);
    tick!(profiler);
    demo.test3(profiler);
    tick!(profiler);
}
