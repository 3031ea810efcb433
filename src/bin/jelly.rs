#[tokio::main]
async fn main() {
    env_logger::init();

    #[cfg(feature = "cli")]
    {
        let code = jelly_dl::cli::run().await;
        std::process::exit(code);
    }

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("CLI support not compiled in");
        std::process::exit(1);
    }
}
