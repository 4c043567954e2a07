mod test_clustering;
mod test_data;
mod test_forces;
mod test_neighbors;
mod test_reduction;

/// Route `log` output through the test harness.
pub(crate) fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
