// src/main.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use dotenvy::dotenv;
use proctored_quiz::config::Config;
use proctored_quiz::models::{question::QuestionRecord, quiz::QuizRecord};
use proctored_quiz::routes;
use proctored_quiz::state::AppState;
use proctored_quiz::store::Store;
use proctored_quiz::utils::jwt::sign_jwt;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store = Arc::new(Store::new());

    if config.seed_demo_quiz {
        seed_demo_quiz(&store, &config).await;
    }

    // Create AppState
    let state = AppState {
        store,
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind listening address");

    // Start the server
    axum::serve(listener, app).await.expect("Server error");
}

async fn seed_demo_quiz(store: &Store, config: &Config) {
    let question = |id: &str, content: &str, options: [&str; 3], correct: &str| QuestionRecord {
        id: id.to_string(),
        content: content.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_option: correct.to_string(),
    };

    store
        .insert_quiz(QuizRecord {
            id: "demo-quiz".to_string(),
            course_id: "demo-course".to_string(),
            title: "Demo Quiz".to_string(),
            topic: Some("Warm-up".to_string()),
            duration: 10,
            deadline: Utc::now() + Duration::days(7),
            questions: vec![
                question("1", "2 + 2 = ?", ["3", "4", "5"], "4"),
                question("2", "Capital of France?", ["Paris", "Rome", "Berlin"], "Paris"),
                question("3", "Largest planet?", ["Mars", "Earth", "Jupiter"], "Jupiter"),
            ],
        })
        .await;
    tracing::info!("Seeded demo quiz: demo-course/demo-quiz");

    match sign_jwt("demo-student", "student", &config.jwt_secret, config.jwt_expiration) {
        Ok(token) => tracing::info!("Demo bearer token: {}", token),
        Err(e) => tracing::error!("Failed to sign demo token: {}", e),
    }
}
