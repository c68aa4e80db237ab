mod parsing;
mod secret;
mod settings;
mod types;

pub(crate) use types::{ConfigError, Environment, QuizPassPolicy, Settings};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn strict_mode_requires_cron_secret() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("CULINA_STRICT_CONFIG", "1");
        std::env::set_var("FIRST_SUPERUSER_PASSWORD", "admin-pass");
        std::env::set_var("MAIL_API_KEY", "mail-key");
        std::env::remove_var("CRON_SECRET");

        let result = Settings::load();

        std::env::set_var("CULINA_STRICT_CONFIG", "0");
        std::env::remove_var("FIRST_SUPERUSER_PASSWORD");
        std::env::remove_var("MAIL_API_KEY");

        assert!(matches!(result, Err(ConfigError::MissingSecret("CRON_SECRET"))));
    }

    #[tokio::test]
    async fn quiz_pass_policy_defaults_to_any_passing() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::remove_var("QUIZ_PASS_POLICY");

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.progress().quiz_pass_policy, QuizPassPolicy::AnyPassing);
        assert_eq!(settings.runtime().environment, Environment::Test);
    }

    #[tokio::test]
    async fn join_url_uses_base_url_without_trailing_slash() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("APP_BASE_URL", "https://cook.example/");

        let settings = Settings::load().expect("settings");
        std::env::remove_var("APP_BASE_URL");

        assert_eq!(settings.workshops().join_url("w1"), "https://cook.example/workshops/w1");
        assert_eq!(settings.workshops().calendar_host(), "cook.example");
    }

    #[tokio::test]
    async fn malformed_app_base_url_fails_to_load() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("APP_BASE_URL", "not a url");

        let result = Settings::load();
        std::env::remove_var("APP_BASE_URL");

        assert!(result.is_err());
    }
}
