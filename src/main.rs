use clap::Parser;
use log::info;
use snation_grades::{
    api::JournalClient, config::Opts, cookie_store, service::GradeService, telegram,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let opts = Opts::parse();
    let storage_path = opts.storage_path();
    let store = cookie_store::open(opts.storage, &storage_path)?;
    info!("Using {:?} cookie storage at {storage_path:?}", opts.storage);

    let client = JournalClient::new(opts.journal_url.clone(), opts.request_timeout())?;
    let service = GradeService::new(client, store, opts.cookie_marker.clone());
    telegram::run(&opts, service).await
}
