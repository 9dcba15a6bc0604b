//! Schema migration CLI for the authorization server database.
//!
//! `DATABASE_URL` wins; otherwise `database_url` is read from `config.yaml`
//! in the working directory, the same file the server loads.

use config::{Config, File};
use sea_orm_migration::prelude::*;
use std::env;

fn database_url_from_config() -> Option<String> {
    Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .build()
        .and_then(|settings| settings.get_string("database_url"))
        .ok()
}

#[tokio::main]
async fn main() {
    if env::var("DATABASE_URL").is_err() {
        if let Some(url) = database_url_from_config() {
            env::set_var("DATABASE_URL", url);
        }
    }
    cli::run_cli(migration::Migrator).await;
}
