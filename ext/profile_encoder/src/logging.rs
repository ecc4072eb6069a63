/// Installs the `env_logger` backend when built with the `debug` feature.
/// Safe to call more than once.
pub fn init() {
    #[cfg(feature = "debug")]
    {
        let _ = env_logger::builder()
            .format_timestamp(None)
            .format_module_path(false)
            .try_init();
    }
}
