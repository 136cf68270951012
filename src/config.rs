//! Environment-driven application configuration
//!
//! All settings come from environment variables (optionally via a .env file)
//! and fall back to development-friendly defaults, so the server starts with
//! no configuration at all.

use std::env;
use std::path::PathBuf;

/// Runtime configuration shared across the application.
#[derive(Clone, Debug)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,

    /// Path of the embedded database file.
    pub database_url: String,

    /// Directory where uploaded listing images are stored.
    pub image_dir: PathBuf,

    /// Externally visible base URL, used to build public image links.
    pub public_url: String,

    /// Number of listings per result page.
    pub page_size: usize,

    /// Session lifetime in hours.
    pub session_ttl_hours: i64,
}

impl Config {
    /// Reads the configuration from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `PORT` - Server port number (default: 8080)
    /// - `DATABASE_URL` - Path to the database file (default: "data.db")
    /// - `IMAGE_DIR` - Directory for uploaded images (default: "images")
    /// - `URL` - Public base URL without port (default: "http://localhost")
    /// - `PAGE_SIZE` - Listings per page (default: 10)
    /// - `SESSION_TTL_HOURS` - Session lifetime (default: 24)
    pub fn from_env() -> Self {
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let base_url = env::var("URL").unwrap_or_else(|_| "http://localhost".to_string());

        let page_size = env::var("PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(10);

        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&h: &i64| h > 0)
            .unwrap_or(24);

        Config {
            port,
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "data.db".to_string()),
            image_dir: PathBuf::from(env::var("IMAGE_DIR").unwrap_or_else(|_| "images".to_string())),
            public_url: format!("{}:{}", base_url, port),
            page_size,
            session_ttl_hours,
        }
    }
}
