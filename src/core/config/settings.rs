use super::parsing::{
    env_optional, env_or_default, is_supported_image_extension, normalize_base_url,
    parse_app_base_url, parse_bool, parse_cors_origins, parse_environment, parse_quiz_pass_policy,
    parse_string_list, parse_u16, parse_u64,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, MailSettings,
    ProgressSettings, RedisSettings, RuntimeSettings, S3Settings, SecuritySettings, ServerHost,
    ServerPort, ServerSettings, Settings, TelemetrySettings, WorkshopSettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("CULINA_HOST", "0.0.0.0");
        let port = env_or_default("CULINA_PORT", "8000");

        let environment =
            parse_environment(env_optional("CULINA_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("CULINA_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Culina API");
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };
        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "culina");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "culina_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let s3_endpoint = env_or_default("S3_ENDPOINT", "https://s3.amazonaws.com");
        let s3_access_key = env_or_default("S3_ACCESS_KEY", "");
        let s3_secret_key = env_or_default("S3_SECRET_KEY", "");
        let s3_bucket = env_or_default("S3_BUCKET", "culina-media");
        let s3_region = env_or_default("S3_REGION", "eu-central-1");
        let presigned_url_expire_minutes = parse_u64(
            "PRESIGNED_URL_EXPIRE_MINUTES",
            env_or_default("PRESIGNED_URL_EXPIRE_MINUTES", "10"),
        )?;
        let allowed_image_extensions =
            parse_string_list(env_optional("ALLOWED_IMAGE_EXTENSIONS"), &["jpg", "jpeg", "png"]);

        let mail_api_url = normalize_base_url(env_or_default(
            "MAIL_API_URL",
            "https://api.resend.com",
        ));
        let mail_api_key = env_or_default("MAIL_API_KEY", "");
        let mail_from = env_or_default("MAIL_FROM", "Culina <no-reply@culina.academy>");
        let mail_timeout_seconds =
            parse_u64("MAIL_TIMEOUT_SECONDS", env_or_default("MAIL_TIMEOUT_SECONDS", "15"))?;

        let cron_secret = env_or_default("CRON_SECRET", "");
        let (app_base_url, calendar_host) =
            parse_app_base_url(env_or_default("APP_BASE_URL", "http://localhost:5173"))?;
        let reminder_sweep_interval_seconds = parse_u64(
            "REMINDER_SWEEP_INTERVAL_SECONDS",
            env_or_default("REMINDER_SWEEP_INTERVAL_SECONDS", "300"),
        )?;

        let quiz_pass_policy = parse_quiz_pass_policy(env_or_default("QUIZ_PASS_POLICY", "any"))?;

        let first_superuser_email =
            env_or_default("FIRST_SUPERUSER_EMAIL", "admin@culina.academy");
        let first_superuser_password = env_or_default("FIRST_SUPERUSER_PASSWORD", "");

        let log_level = env_or_default("CULINA_LOG_LEVEL", "info");
        let json = env_optional("CULINA_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, api_v1_str },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            s3: S3Settings {
                endpoint: s3_endpoint,
                access_key: s3_access_key,
                secret_key: s3_secret_key,
                bucket: s3_bucket,
                region: s3_region,
                presigned_url_expire_minutes,
                allowed_image_extensions,
            },
            mail: MailSettings {
                api_url: mail_api_url,
                api_key: mail_api_key,
                from_address: mail_from,
                timeout_seconds: mail_timeout_seconds,
            },
            workshops: WorkshopSettings {
                cron_secret,
                app_base_url,
                calendar_host,
                reminder_sweep_interval_seconds,
            },
            progress: ProgressSettings { quiz_pass_policy },
            admin: AdminSettings { first_superuser_email, first_superuser_password },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn s3(&self) -> &S3Settings {
        &self.s3
    }

    pub(crate) fn mail(&self) -> &MailSettings {
        &self.mail
    }

    pub(crate) fn workshops(&self) -> &WorkshopSettings {
        &self.workshops
    }

    pub(crate) fn progress(&self) -> &ProgressSettings {
        &self.progress
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for extension in &self.s3.allowed_image_extensions {
            if !is_supported_image_extension(extension) {
                return Err(ConfigError::InvalidValue {
                    field: "ALLOWED_IMAGE_EXTENSIONS",
                    value: extension.clone(),
                });
            }
        }

        if self.workshops.reminder_sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "REMINDER_SWEEP_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.workshops.cron_secret.is_empty() {
            return Err(ConfigError::MissingSecret("CRON_SECRET"));
        }
        if self.mail.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("MAIL_API_KEY"));
        }
        if self.admin.first_superuser_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_SUPERUSER_PASSWORD"));
        }

        Ok(())
    }
}
