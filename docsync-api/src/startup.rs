use std::net::TcpListener;

use actix_web::{App, HttpServer, dev::Server, web};
use docsync::query::QueryService;
use docsync::store::DocumentStore;
use docsync::store::elasticsearch::ElasticsearchStore;
use docsync_config::shared::ApiConfig;
use docsync_telemetry::metrics::init_metrics_handle;
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::routes::{
    health_check::health_check,
    index::index,
    metrics::metrics,
    search::{find_by_owner, find_by_tag, fuzzy_search},
};

/// Query server wrapper managing the HTTP server lifecycle.
pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    /// Connects to the index and binds the server to the configured address.
    pub async fn build(config: ApiConfig) -> anyhow::Result<Self> {
        let store = ElasticsearchStore::new(config.index.clone())?;
        store.ensure_index().await?;

        let address = format!("{}:{}", config.application.host, config.application.port);
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        info!(port, index = store.index(), "query server bound");

        let server = run(listener, store)?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Runs the server until it receives a shutdown signal.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

/// Builds the query server over `store` on an already bound listener.
pub fn run<S>(listener: TcpListener, store: S) -> anyhow::Result<Server>
where
    S: DocumentStore + Send + Sync + 'static,
{
    let prometheus_handle = web::ThinData(init_metrics_handle()?);
    let service = web::Data::new(QueryService::new(store));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .service(index)
            .service(health_check)
            .service(metrics)
            .route("/search/user/{owner_id}", web::get().to(find_by_owner::<S>))
            .route("/search/hashtags/{tag}", web::get().to(find_by_tag::<S>))
            .route("/search/fuzzy/{query}", web::get().to(fuzzy_search::<S>))
            .app_data(prometheus_handle.clone())
            .app_data(service.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
