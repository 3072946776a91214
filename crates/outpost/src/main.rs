//! Binary entry point for the Outpost manager.

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_outpost::init().await
}
