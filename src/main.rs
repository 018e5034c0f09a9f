fn main() {
    use clap::Parser;
    use std::process::exit;

    env_logger::builder().format_timestamp(None).init();
    let cli = gotosh::Cli::parse();

    if let Err(error) = cli.run() {
        eprintln!("{error:#}");
        exit(1)
    }
}
