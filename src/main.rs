use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};
use uinscan::UinReaderBuilder;

fn main() {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .expect("usage: uinscan <page-image>");
    let page = image::open(&path)
        .expect("Failed to load page image")
        .to_luma8();
    let reader = UinReaderBuilder::new()
        .build()
        .expect("Failed to build reader");
    match reader.read(&page) {
        Ok(reading) => println!("{}", reading.text),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
