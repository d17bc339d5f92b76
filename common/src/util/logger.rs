use std::io::Write;

/// Installs the global logger at `info` unless `RUST_LOG` says otherwise.
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{:<5} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();
}
