use yatube_server::infrastructure::config::AppConfig;
use yatube_server::infrastructure::logging::init_logging;
use yatube_server::server;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::from_env()?;
    server::run(config).await
}
