use std::path::PathBuf;

use clap::Parser;
use fs_err::read_to_string;
use scraper::Html;
use snation_grades::{api, messages, parser};

/// Runs the grade extractor on a saved journal page.
#[derive(Parser)]
struct Opts {
    input_file: PathBuf,
    /// Also report whether the page would pass the journal check.
    #[arg(long)]
    check_marker: bool,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let opts = Opts::parse();
    let html = read_to_string(&opts.input_file)?;
    if opts.check_marker {
        let page = api::classify(reqwest::StatusCode::OK, html.clone());
        println!(
            "Journal marker: {}",
            matches!(page, api::JournalPage::Journal(_))
        );
    }
    match parser::parse(&Html::parse_document(&html)) {
        Ok(entries) => eprintln!("{} rows found", entries.len()),
        Err(e) => eprintln!("{e}"),
    }
    println!("{}", messages::grades_reply(&html));
    Ok(())
}
