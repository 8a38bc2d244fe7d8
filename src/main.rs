use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use caterflow_backend::config::Config;
use caterflow_backend::db::postgres_workflow_repository::PostgresWorkflowRepository;
use caterflow_backend::engine::registry::StepHandlerRegistry;
use caterflow_backend::routes::worker::run_poll_cycle;
use caterflow_backend::routes::workflows::{
    add_step, create_workflow, delete_schedule, delete_step, delete_workflow, get_execution,
    get_schedule, get_workflow, list_executions, list_steps, list_workflows, replace_steps,
    start_workflow_execution, update_step, update_workflow, upsert_schedule,
};
use caterflow_backend::services::conditions::PostgresConditionEvaluator;
use caterflow_backend::services::recipients::PostgresRecipientResolver;
use caterflow_backend::services::smtp_mailer::SmtpMailer;
use caterflow_backend::state::AppState;
use caterflow_backend::worker::start_background_worker;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let config = Arc::new(Config::from_env());

    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let mailer = Arc::new(SmtpMailer::new().expect("Failed to configure SMTP mailer"));
    let recipients = Arc::new(PostgresRecipientResolver { pool: pool.clone() });
    let conditions = Arc::new(PostgresConditionEvaluator { pool: pool.clone() });
    let registry = Arc::new(StepHandlerRegistry::standard(mailer, recipients, conditions));

    let state = AppState {
        workflow_repo: Arc::new(PostgresWorkflowRepository { pool }),
        registry,
        config: config.clone(),
    };

    start_background_worker(state.clone()).await;

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .frontend_origin
                .parse::<HeaderValue>()
                .expect("FRONTEND_ORIGIN must be a valid origin"),
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    let workflow_routes = Router::new()
        .route("/", post(create_workflow).get(list_workflows))
        .route(
            "/{workflow_id}",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
        .route(
            "/{workflow_id}/steps",
            get(list_steps).post(add_step).put(replace_steps),
        )
        .route(
            "/{workflow_id}/steps/{step_id}",
            put(update_step).delete(delete_step),
        )
        .route(
            "/{workflow_id}/schedule",
            get(get_schedule).put(upsert_schedule).delete(delete_schedule),
        )
        .route("/{workflow_id}/execute", post(start_workflow_execution))
        .route("/{workflow_id}/executions", get(list_executions))
        .route(
            "/{workflow_id}/executions/{execution_id}",
            get(get_execution),
        );

    let app = Router::new()
        .nest("/api/workflows", workflow_routes)
        .route("/api/worker/poll", post(run_poll_cycle))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on {}", addr);
    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app.into_make_service()).await.unwrap();
}
