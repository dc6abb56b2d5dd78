#[tokio::main]
async fn main() -> std::io::Result<()> {
    tabletop_server::run_with_config().await
}
