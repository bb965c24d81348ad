mod cli;
mod ext;
mod log;
mod svc;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        cli::ux::present_error(e);
        std::process::exit(1);
    }
}
