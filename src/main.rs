mod catalog;
mod config;
mod file;
mod logging;
mod random_file_server;
mod resolver;

use anyhow::Result;
use catalog::Catalog;
use config::Config;
use logging::init_logging;
use random_file_server::RandomFileServer;

fn main() -> Result<()> {
    init_logging();

    let config = Config::get();
    let public = Catalog::local(&config.public_dir);
    let assets = Catalog::remote(&config.assets_file);

    RandomFileServer::new(config, public, assets).start()
}
