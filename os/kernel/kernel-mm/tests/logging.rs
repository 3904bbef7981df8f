use log::LevelFilter;

#[test]
fn logger_installs_once() {
    assert_eq!(kernel_mm::init_logging(LevelFilter::Info), Ok(()));
    assert_eq!(log::max_level(), LevelFilter::Info);
    log::info!("routed to the debug console");

    assert_eq!(
        kernel_mm::init_logging(LevelFilter::Trace),
        Err(kernel_mm::BootError::LoggerInstalled)
    );
    assert_eq!(log::max_level(), LevelFilter::Info);
}
