use std::env;

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub port: u16,
    pub step_timeout_seconds: u64,
    pub poll_interval_seconds: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let frontend_origin =
            env::var("FRONTEND_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(3000);

        let step_timeout_seconds = env::var("STEP_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        let poll_interval_seconds = env::var("POLL_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        Config {
            database_url,
            frontend_origin,
            port,
            step_timeout_seconds,
            poll_interval_seconds,
        }
    }
}
