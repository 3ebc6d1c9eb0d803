/// Initialises `env_logger` for tests. Output is captured by the test harness,
/// and initialising more than once (tests run in parallel) is harmless.
pub fn test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
