use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::{Server, ServerHandle};
use actix_web::{App, HttpServer, web};
use actix_web_httpauth::middleware::HttpAuthentication;
use anyhow::Context;
use roster::auth::{AdminAuthenticator, JwtTokenVerifier, TokenVerifier};
use roster::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use roster::error::RosterError;
use roster::fanout::{FanoutChannel, PushServer, PushServerHandle};
use roster::ingestion::{CommandProducer, CsvIngestion};
use roster::notification::NotificationService;
use roster::queue::CommandQueue;
use roster::queue::memory::MemoryCommandQueue;
use roster::queue::postgres::PostgresCommandQueue;
use roster::store::admin::AdminStore;
use roster::store::admin::memory::MemoryAdminStore;
use roster::store::admin::postgres::PostgresAdminStore;
use roster::store::create_pg_pool;
use roster::store::notification::NotificationStore;
use roster::store::notification::memory::MemoryNotificationStore;
use roster::store::notification::postgres::PostgresNotificationStore;
use roster::store::staff::StaffStore;
use roster::store::staff::memory::MemoryStaffStore;
use roster::store::staff::postgres::PostgresStaffStore;
use roster::types::{NotificationPayload, SortOrder, StaffFields, StaffRecord, StaffSortField};
use roster::workers::pool::MutationWorkerPool;
use roster_config::shared::{
    PgConnectionConfig, QueueConfig, ROSTER_API_OPTIONS, ROSTER_QUEUE_OPTIONS, StorageConfig,
};
use roster_telemetry::metrics::init_metrics_handle;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::authentication::auth_validator;
use crate::config::ApiConfig;
use crate::routes::auth::{
    Identity, LoginRequest, LoginResponse, LoginToken, ReadIdentityResponse, login, read_identity,
};
use crate::routes::health_check::{HealthCheckResponse, HealthStatus, health_check};
use crate::routes::metrics::metrics;
use crate::routes::notifications::{
    MarkNotificationsReadResponse, MarkedNotifications, ReadNotificationsResponse,
    mark_notifications_read, read_notifications,
};
use crate::routes::staff::{
    CreateStaffRequest, QueuedStaff, QueuedStaffResponse, ReadStaffResponse, UpdateStaffRequest,
    add_staff, add_staff_csv, read_staff, remove_staff, update_staff,
};
use crate::routes::{
    ErrorMessage, Pagination, ValidationErrorResponse, json_error_handler, query_error_handler,
};

/// Connections held by the pool serving HTTP reads and notification writes.
const API_MAX_CONNECTIONS: u32 = 10;

/// Connections held beyond one per worker, for enqueues and the wake-up listener.
const QUEUE_EXTRA_CONNECTIONS: u32 = 2;

/// Storage backends shared by the HTTP handlers and the mutation workers.
#[derive(Debug, Clone)]
pub struct Backends {
    pub staff_store: Arc<dyn StaffStore>,
    pub notification_store: Arc<dyn NotificationStore>,
    pub admin_store: Arc<dyn AdminStore>,
    pub queue: Arc<dyn CommandQueue>,
}

impl Backends {
    /// Process-local backends. Nothing survives a restart.
    pub fn memory() -> Self {
        Self {
            staff_store: Arc::new(MemoryStaffStore::new()),
            notification_store: Arc::new(MemoryNotificationStore::new()),
            admin_store: Arc::new(MemoryAdminStore::new()),
            queue: Arc::new(MemoryCommandQueue::new()),
        }
    }

    /// Postgres backends. The queue gets its own pool so workers cannot starve HTTP requests.
    pub async fn postgres(
        connection: &PgConnectionConfig,
        queue_config: &QueueConfig,
    ) -> anyhow::Result<Self> {
        let api_pool = create_pg_pool(connection, &ROSTER_API_OPTIONS, API_MAX_CONNECTIONS);
        let queue_pool = create_pg_pool(
            connection,
            &ROSTER_QUEUE_OPTIONS,
            u32::from(queue_config.concurrency) + QUEUE_EXTRA_CONNECTIONS,
        );

        let queue = PostgresCommandQueue::connect(
            queue_pool,
            Duration::from_secs(queue_config.visibility_timeout_secs),
        )
        .await
        .context("connecting the command queue listener")?;

        Ok(Self {
            staff_store: Arc::new(PostgresStaffStore::new(api_pool.clone())),
            notification_store: Arc::new(PostgresNotificationStore::new(api_pool.clone())),
            admin_store: Arc::new(PostgresAdminStore::new(api_pool)),
            queue: Arc::new(queue),
        })
    }

    pub async fn from_config(config: &ApiConfig) -> anyhow::Result<Self> {
        match &config.storage {
            StorageConfig::Memory => Ok(Self::memory()),
            StorageConfig::Postgres { connection } => {
                Self::postgres(connection, &config.queue).await
            }
        }
    }
}

/// Shared state handed to every HTTP worker.
#[derive(Clone)]
pub struct AppState {
    pub staff_store: Arc<dyn StaffStore>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub authenticator: AdminAuthenticator,
    pub producer: CommandProducer,
    pub ingestion: CsvIngestion,
    pub notifications: NotificationService,
}

/// Roster API application.
///
/// Owns the HTTP server together with the mutation workers and the websocket push server, which
/// all stop together.
pub struct Application {
    port: u16,
    push_addr: SocketAddr,
    server: Server,
    workers: MutationWorkerPool,
    push_server: PushServerHandle,
    shutdown_tx: ShutdownTx,
}

impl Application {
    /// Builds the application with the backends named by `config.storage`.
    pub async fn build(config: ApiConfig) -> anyhow::Result<Self> {
        let backends = Backends::from_config(&config).await?;

        Self::build_with_backends(config, backends).await
    }

    /// Builds the application on top of already constructed backends.
    pub async fn build_with_backends(config: ApiConfig, backends: Backends) -> anyhow::Result<Self> {
        config.validate().context("validating API configuration")?;

        let address = format!("{}:{}", config.application.host, config.application.port);
        let listener = TcpListener::bind(&address)
            .with_context(|| format!("binding HTTP listener on {address}"))?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        let issuer = JwtTokenVerifier::new(&config.auth);
        let authenticator = AdminAuthenticator::new(
            backends.admin_store,
            issuer.clone(),
            config.auth.password_hash_cost,
        );
        if let Some(seed) = &config.auth.admin {
            authenticator
                .seed(seed)
                .await
                .context("seeding the admin account")?;
        }

        let verifier: Arc<dyn TokenVerifier> = Arc::new(issuer);
        let channel = FanoutChannel::new(config.push.subscriber_buffer);
        let push_server = PushServer::bind(&config.push, channel.clone(), verifier.clone()).await?;
        let push_addr = push_server.local_addr()?;

        let notifications = NotificationService::new(backends.notification_store, Some(channel));

        let workers = MutationWorkerPool::start(
            &config.queue,
            backends.staff_store.clone(),
            backends.queue.clone(),
            shutdown_rx.clone(),
        )
        .await?;
        let push_server = push_server.start(shutdown_rx);

        let producer = CommandProducer::new(backends.queue);
        let ingestion = CsvIngestion::new(producer.clone(), &config.ingestion);

        let state = AppState {
            staff_store: backends.staff_store,
            verifier,
            authenticator,
            producer,
            ingestion,
            notifications,
        };
        let server = run(listener, state)?;

        info!(%port, %push_addr, "roster api started");

        Ok(Self {
            port,
            push_addr,
            server,
            workers,
            push_server,
            shutdown_tx,
        })
    }

    /// Returns the port the HTTP server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the address the websocket push server is listening on.
    pub fn push_addr(&self) -> SocketAddr {
        self.push_addr
    }

    /// Returns a handle that stops the HTTP server gracefully.
    pub fn server_handle(&self) -> ServerHandle {
        self.server.handle()
    }

    /// Serves requests until the HTTP server stops, then drains the workers and the push server.
    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        let served = self.server.await;

        info!("http server stopped, shutting down workers and push server");
        self.shutdown_tx.shutdown();

        let mut errors = Vec::new();
        if let Err(err) = self.workers.wait_all().await {
            error!(error = %err, "mutation workers stopped with errors");
            errors.push(err);
        }
        if let Err(err) = self.push_server.wait().await {
            error!(error = %err, "push server stopped with an error");
            errors.push(err);
        }

        served.context("running HTTP server")?;
        if !errors.is_empty() {
            return Err(RosterError::from(errors).into());
        }

        Ok(())
    }
}

/// Creates the HTTP server with every route and middleware configured.
pub fn run(listener: TcpListener, state: AppState) -> anyhow::Result<Server> {
    let prometheus_handle = web::ThinData(init_metrics_handle()?);
    let staff_store: web::Data<dyn StaffStore> = state.staff_store.into();
    let verifier: web::Data<dyn TokenVerifier> = state.verifier.into();
    let authenticator = web::Data::new(state.authenticator);
    let producer = web::Data::new(state.producer);
    let ingestion = web::Data::new(state.ingestion);
    let notifications = web::Data::new(state.notifications);

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::routes::health_check::health_check,
            crate::routes::metrics::metrics,
            crate::routes::auth::login,
        ),
        components(schemas(
            ErrorMessage,
            ValidationErrorResponse,
            Pagination,
            HealthCheckResponse,
            HealthStatus,
            Identity,
            ReadIdentityResponse,
            LoginRequest,
            LoginToken,
            LoginResponse,
            CreateStaffRequest,
            UpdateStaffRequest,
            QueuedStaff,
            QueuedStaffResponse,
            ReadStaffResponse,
            StaffRecord,
            StaffFields,
            StaffSortField,
            SortOrder,
            NotificationPayload,
            ReadNotificationsResponse,
            MarkedNotifications,
            MarkNotificationsReadResponse,
        )),
        nest(
            (path = "/v1", api = ApiV1)
        )
    )]
    struct ApiDoc;

    #[derive(OpenApi)]
    #[openapi(paths(
        crate::routes::auth::read_identity,
        crate::routes::staff::add_staff,
        crate::routes::staff::add_staff_csv,
        crate::routes::staff::update_staff,
        crate::routes::staff::remove_staff,
        crate::routes::staff::read_staff,
        crate::routes::notifications::read_notifications,
        crate::routes::notifications::mark_notifications_read,
    ))]
    struct ApiV1;

    let openapi = ApiDoc::openapi();

    let server = HttpServer::new(move || {
        let authentication = HttpAuthentication::bearer(auth_validator);
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .service(health_check)
            .service(metrics)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
            // registered ahead of the authenticated `v1` scope, which would otherwise claim it
            .service(login)
            .service(
                web::scope("v1")
                    .wrap(authentication)
                    // identity
                    .service(read_identity)
                    // staff
                    .service(add_staff_csv)
                    .service(add_staff)
                    .service(update_staff)
                    .service(remove_staff)
                    .service(read_staff)
                    // notifications
                    .service(read_notifications)
                    .service(mark_notifications_read),
            )
            .app_data(prometheus_handle.clone())
            .app_data(staff_store.clone())
            .app_data(verifier.clone())
            .app_data(authenticator.clone())
            .app_data(producer.clone())
            .app_data(ingestion.clone())
            .app_data(notifications.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
