use crate::error::Result;
use crate::logging::{init_logging, DEFAULT_FILTER};
use crate::server;
use crate::settings::load_effective_settings;

pub fn run(bind: Option<String>) -> Result<()> {
    init_logging(DEFAULT_FILTER);
    let settings = load_effective_settings();
    let bind_addr = bind.unwrap_or_else(|| settings.bind_addr.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(server::serve(&settings, &bind_addr))
}
