use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt_key: JwtKeyConfig,
    pub batch: BatchConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// Redis connection used for the activity dead-letter lists
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Prefix prepended to every list key (e.g. "dailyfeed")
    pub key_prefix: String,
}

/// Lifetime of generated JWT signing keys
#[derive(Debug, Clone)]
pub struct JwtKeyConfig {
    /// A primary key older than this is replaced on the next rotation run
    pub rotation_hours: i64,
    /// Extra validity after rotation so already-issued tokens keep verifying
    pub grace_period_hours: i64,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_concurrent_jobs: usize,
    /// Directory scanned by the listener file restore job
    pub listener_file_path: String,
    /// Directory holding publisher failure files (cleanup target)
    pub failure_path: String,
    pub schedules: Vec<ScheduleConfig>,
}

/// One fixed-rate schedule entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub job_name: String,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            redis: RedisConfig::from_env()?,
            jwt_key: JwtKeyConfig::from_env()?,
            batch: BatchConfig::from_env()?,
            admin: AdminConfig::from_env()?,
        })
    }
}

impl AppConfig {
    const DEFAULT_PORT: u16 = 8080;

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| Self::DEFAULT_PORT.to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MAX_CONNECTIONS must be a valid number".to_string())?;

        let min_connections = env::var("DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MIN_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MIN_CONNECTIONS must be a valid number".to_string())?;

        let acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ACQUIRE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_ACQUIRE_TIMEOUT_SECS must be a valid number".to_string())?;

        let idle_timeout_secs = env::var("DB_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_IDLE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_IDLE_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_lifetime_secs = env::var("DB_MAX_LIFETIME_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_LIFETIME_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_MAX_LIFETIME_SECS must be a valid number".to_string())?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
        })
    }
}

impl RedisConfig {
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let key_prefix = env::var("REDIS_KEY_PREFIX").unwrap_or_else(|_| "dailyfeed".to_string());

        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(format!("REDIS_URL must use redis:// or rediss://, got {}", url));
        }

        Ok(Self { url, key_prefix })
    }
}

impl JwtKeyConfig {
    const DEFAULT_ROTATION_HOURS: i64 = 24;
    const DEFAULT_GRACE_PERIOD_HOURS: i64 = 48;

    pub fn from_env() -> Result<Self, String> {
        let rotation_hours = env::var("JWT_KEY_ROTATION_HOURS")
            .unwrap_or_else(|_| Self::DEFAULT_ROTATION_HOURS.to_string())
            .parse::<i64>()
            .map_err(|_| "JWT_KEY_ROTATION_HOURS must be a valid number".to_string())?;

        let grace_period_hours = env::var("JWT_KEY_GRACE_PERIOD_HOURS")
            .unwrap_or_else(|_| Self::DEFAULT_GRACE_PERIOD_HOURS.to_string())
            .parse::<i64>()
            .map_err(|_| "JWT_KEY_GRACE_PERIOD_HOURS must be a valid number".to_string())?;

        if rotation_hours <= 0 {
            return Err("JWT_KEY_ROTATION_HOURS must be greater than zero".to_string());
        }
        if grace_period_hours < 0 {
            return Err("JWT_KEY_GRACE_PERIOD_HOURS must not be negative".to_string());
        }

        Ok(Self {
            rotation_hours,
            grace_period_hours,
        })
    }
}

impl Default for JwtKeyConfig {
    fn default() -> Self {
        Self {
            rotation_hours: Self::DEFAULT_ROTATION_HOURS,
            grace_period_hours: Self::DEFAULT_GRACE_PERIOD_HOURS,
        }
    }
}

impl BatchConfig {
    const DEFAULT_MAX_CONCURRENT_JOBS: usize = 10;
    pub const DEFAULT_LISTENER_FILE_PATH: &'static str = "listener-failure-storage";
    pub const DEFAULT_FAILURE_PATH: &'static str = "kafka-failure-storage";

    pub fn from_env() -> Result<Self, String> {
        let max_concurrent_jobs = env::var("BATCH_MAX_CONCURRENT_JOBS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_CONCURRENT_JOBS.to_string())
            .parse::<usize>()
            .map_err(|_| "BATCH_MAX_CONCURRENT_JOBS must be a valid number".to_string())?;

        if max_concurrent_jobs == 0 {
            return Err("BATCH_MAX_CONCURRENT_JOBS must be greater than zero".to_string());
        }

        let listener_file_path = env::var("BATCH_LISTENER_FILE_PATH")
            .unwrap_or_else(|_| Self::DEFAULT_LISTENER_FILE_PATH.to_string());
        let failure_path =
            env::var("BATCH_FAILURE_PATH").unwrap_or_else(|_| Self::DEFAULT_FAILURE_PATH.to_string());

        let schedules = parse_schedules(&env::var("BATCH_SCHEDULES").unwrap_or_default())?;

        Ok(Self {
            max_concurrent_jobs,
            listener_file_path,
            failure_path,
            schedules,
        })
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: Self::DEFAULT_MAX_CONCURRENT_JOBS,
            listener_file_path: Self::DEFAULT_LISTENER_FILE_PATH.to_string(),
            failure_path: Self::DEFAULT_FAILURE_PATH.to_string(),
            schedules: Vec::new(),
        }
    }
}

/// Parse `jobName=seconds` pairs separated by commas
pub fn parse_schedules(raw: &str) -> Result<Vec<ScheduleConfig>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (name, secs) = entry
                .split_once('=')
                .ok_or_else(|| format!("Invalid BATCH_SCHEDULES entry '{}'", entry))?;
            let secs = secs
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("Invalid interval in BATCH_SCHEDULES entry '{}'", entry))?;
            if secs == 0 {
                return Err(format!("Interval must be positive in '{}'", entry));
            }
            Ok(ScheduleConfig {
                job_name: name.trim().to_string(),
                interval: Duration::from_secs(secs),
            })
        })
        .collect()
}

impl AdminConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("BATCH_ADMIN_USERNAME")
            .ok()
            .filter(|s| !s.is_empty());
        let password = env::var("BATCH_ADMIN_PASSWORD")
            .ok()
            .filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Dailyfeed Batch API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "Job launching and execution history for dailyfeed batch".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schedules() {
        let schedules = parse_schedules("tokenCleanupJob=3600, jwtKeyRotationJob = 600").unwrap();
        assert_eq!(
            schedules,
            vec![
                ScheduleConfig {
                    job_name: "tokenCleanupJob".to_string(),
                    interval: Duration::from_secs(3600),
                },
                ScheduleConfig {
                    job_name: "jwtKeyRotationJob".to_string(),
                    interval: Duration::from_secs(600),
                },
            ]
        );
    }

    #[test]
    fn test_parse_schedules_empty() {
        assert!(parse_schedules("").unwrap().is_empty());
        assert!(parse_schedules(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_schedules_invalid() {
        assert!(parse_schedules("tokenCleanupJob").is_err());
        assert!(parse_schedules("tokenCleanupJob=soon").is_err());
        assert!(parse_schedules("tokenCleanupJob=0").is_err());
    }

    #[test]
    fn test_admin_credentials() {
        let mut admin = AdminConfig {
            username: Some("ops".to_string()),
            password: None,
            title: String::new(),
            version: String::new(),
            description: String::new(),
        };
        assert_eq!(admin.credentials(), None);

        admin.password = Some("secret".to_string());
        assert_eq!(admin.credentials(), Some("ops:secret".to_string()));
    }
}
