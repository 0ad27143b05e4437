//! `modelsync` binary entrypoint.

#[tokio::main]
async fn main() {
    let exit_code = modelsync_cli::run().await;
    std::process::exit(exit_code);
}
