use std::process::ExitCode;

use env_logger::Env;
use log::{debug, error, info};

use hotset::generator::prepare;
use hotset::page::system_page_size;
use hotset::BLOCK_SIZE;

fn main() -> ExitCode {
    // Quiet unless asked, e.g. RUST_LOG=debug ./hotset
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let stride = system_page_size();
    debug!("Page stride is {} bytes", stride);

    match prepare(BLOCK_SIZE, stride) {
        Ok(mut generator) => {
            info!("Keeping {} pages hot until killed", generator.block().page_count());
            generator.keep_hot_forever()
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
