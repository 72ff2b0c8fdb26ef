#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_world_server::init().await
}
