//! Instrumentation macros.

/// Register the enclosing function on the probe stack until end of scope.
///
/// When the `profiling` feature is disabled, this macro expands to nothing.
///
/// # Examples
///
/// ```ignore
/// use tickprof_profiler::probe;
///
/// fn load(id: u64) {
///     probe!("load");
///     // ...
/// }
///
/// impl Repo {
///     fn find(&self, id: u64) {
///         probe!(self: "Repo", "find"; id);
///         // ...
///     }
/// }
/// ```
///
/// Arguments after `;` are rendered with `Debug` and kept only when the
/// profiler captures arguments.
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! probe {
    (self: $class:expr, $function:expr) => {
        let _probe = $crate::probe::enter($crate::CallSite::method($class, $function));
    };
    (self: $class:expr, $function:expr; $($arg:expr),+ $(,)?) => {
        let _probe = $crate::probe::enter_with_args(
            $crate::CallSite::method($class, $function),
            vec![$(format!("{:?}", $arg)),+],
        );
    };
    ($function:expr) => {
        let _probe = $crate::probe::enter($crate::CallSite::function($function));
    };
    ($function:expr; $($arg:expr),+ $(,)?) => {
        let _probe = $crate::probe::enter_with_args(
            $crate::CallSite::function($function),
            vec![$(format!("{:?}", $arg)),+],
        );
    };
    ($class:expr, $function:expr) => {
        let _probe = $crate::probe::enter($crate::CallSite::associated($class, $function));
    };
    ($class:expr, $function:expr; $($arg:expr),+ $(,)?) => {
        let _probe = $crate::probe::enter_with_args(
            $crate::CallSite::associated($class, $function),
            vec![$(format!("{:?}", $arg)),+],
        );
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! probe {
    ($($tt:tt)*) => {};
}

/// Deliver a tick to a profiler at this point of execution.
///
/// When the `profiling` feature is disabled, this macro expands to nothing.
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! tick {
    ($profiler:expr) => {
        $profiler.tick();
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! tick {
    ($profiler:expr) => {};
}

#[cfg(all(test, feature = "profiling"))]
mod tests {
    use std::time::Duration;

    use tickprof_core::{ManualClock, ProfilerConfig, Timestamp};

    use crate::Profiler;

    struct Repo;

    impl Repo {
        fn find(&self, profiler: &mut Profiler<ManualClock>, id: u64) {
            probe!(self: "Repo", "find"; id);
            tick!(profiler);
        }
    }

    fn handle(profiler: &mut Profiler<ManualClock>) {
        probe!("Service", "handle");
        tick!(profiler);
        Repo.find(profiler, 7);
        tick!(profiler);
    }

    #[test]
    fn macros_drive_frames() {
        let clock = ManualClock::new(Timestamp::from_secs(1));
        let mut profiler = Profiler::builder(ProfilerConfig::new("trace").with_capture_args(true))
            .clock(clock.clone())
            .build()
            .unwrap();

        handle(&mut profiler);
        clock.advance(Duration::from_millis(1));
        tick!(profiler);

        let frames = profiler.frames();
        let ids: Vec<_> = frames.iter().map(|f| f.identity()).collect();
        assert_eq!(ids, ["Service::handle", "Repo.find", "Service::handle"]);
        assert_eq!(frames[1].caller().args, Some(vec!["7".to_string()]));
    }
}
