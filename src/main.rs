use influxdb_hello_rs::{demo::InfluxConnector, server::create_router};

const LISTEN_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::SimpleLogger::new().with_level(log::LevelFilter::Info).env().init()?;

    let app = create_router(InfluxConnector::default());

    let listener = tokio::net::TcpListener::bind(LISTEN_ADDR).await?;
    log::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
