use courtier_core::config::{AppConfig, LoadOptions};

use super::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_invalid", error.to_string(), 2)
        }
    };

    CommandResult::success_with(
        "config",
        "effective config (source precedence: env > file > default)",
        Some(details(&config)),
    )
}

fn details(config: &AppConfig) -> serde_json::Value {
    serde_json::json!({
        "database": {
            "url": config.database.url,
            "max_connections": config.database.max_connections,
            "timeout_secs": config.database.timeout_secs,
        },
        "aoa": {
            "api_url": config.aoa.api_url,
            "api_token": config.aoa.api_token.as_ref().map(|_| "[redacted]"),
            "test_group_percent": config.aoa.test_group_percent,
            "algo_version": config.aoa.algo_version,
            "remember_window_size": config.aoa.remember_window_size,
            "backfill_epoch": config.aoa.backfill_epoch.to_string(),
            "bu_category_ident": config.aoa.bu_category_ident,
        },
        "demand": {
            "crm_events_enabled": config.demand.crm_events_enabled,
        },
        "logging": {
            "level": config.logging.level,
        },
    })
}

#[cfg(test)]
mod tests {
    use courtier_core::config::AppConfig;

    use super::details;

    #[test]
    fn secrets_never_reach_the_rendered_config() {
        let mut config = AppConfig::default();
        config.aoa.api_token = Some("very-secret-token".to_owned().into());

        let rendered = details(&config).to_string();

        assert!(!rendered.contains("very-secret-token"));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn absent_token_renders_as_null() {
        let rendered = details(&AppConfig::default());
        assert!(rendered["aoa"]["api_token"].is_null());
    }
}
