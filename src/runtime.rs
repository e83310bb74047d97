//! Process-wide facts about the running executable.

use std::backtrace::Backtrace;
use std::sync::OnceLock;

/// Name the standard library gives the thread that runs `main`.
const MAIN_THREAD_NAME: &str = "main";

/// Frame symbols that only appear while libtest is driving the process.
const TEST_RUNNER_FRAMES: [&str; 3] = ["test::run_test", "test::__rust_begin_short_backtrace", "test::console::run_tests"];

/// What one thread's stack says about the process.
///
/// Libtest frames settle it as a test run. The main thread without them
/// settles it as a normal run. Any other thread cannot tell: it may have been
/// spawned from inside a test, and its stack does not reach back that far.
pub fn detect_from_stack(frames: &str, thread_name: Option<&str>) -> Option<bool> {
    if frames_indicate_test_runner(frames) {
        return Some(true);
    }
    if thread_name == Some(MAIN_THREAD_NAME) {
        return Some(false);
    }
    return None;
}

/// Whether any frame in a rendered stack snapshot belongs to a test harness.
pub fn frames_indicate_test_runner(frames: &str) -> bool {
    return TEST_RUNNER_FRAMES.iter().any(|marker| return frames.contains(marker));
}

/// Whether the process is running under the libtest harness.
///
/// The answer is taken from the first stack snapshot that settles it (see
/// [`detect_from_stack`]) and cached for the lifetime of the process.
/// Concurrent settling calls all observe the value published first. A call
/// from a thread that cannot tell returns `false` without caching anything,
/// so a helper thread reading first never fixes the answer for everyone else.
pub fn is_running_under_test() -> bool {
    /// Published once, never recomputed.
    static UNDER_TEST: OnceLock<bool> = OnceLock::new();

    if let Some(cached) = UNDER_TEST.get() {
        return *cached;
    }
    let frames = Backtrace::force_capture().to_string();
    let current = std::thread::current();
    let Some(detected) = detect_from_stack(&frames, current.name()) else {
        tracing::trace!(thread = ?current.name(), "test runner detection inconclusive on this thread");
        return false;
    };
    return *UNDER_TEST.get_or_init(|| {
        tracing::debug!(detected, "test runner detection");
        return detected;
    });
}
