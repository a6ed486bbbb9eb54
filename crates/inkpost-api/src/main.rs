use inkpost_core::Config;

// Use mimalloc as the global allocator for lower fragmentation under many
// small allocations (JSON bodies, cache entries).
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    // Initialize the application (database, services, background tasks, routes)
    let app = inkpost_api::setup::initialize_app(config.clone()).await?;

    inkpost_api::setup::server::start_server(&config, app).await?;

    Ok(())
}
