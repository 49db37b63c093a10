use serde::{Deserialize, Serialize};

/// HTTP server settings, read from `CINESIM_*` environment variables
/// (optionally through a `.env` file)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_api_title")]
    pub api_title: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_api_description")]
    pub api_description: String,

    #[serde(default = "default_min_recommendations")]
    pub min_recommendations: usize,

    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,

    #[serde(default = "default_recommendations")]
    pub default_recommendations: usize,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_api_title() -> String {
    "Movie recommendation API".to_string()
}

fn default_api_version() -> String {
    "1.0.0".to_string()
}

fn default_api_description() -> String {
    "Content based movie recommendation using ANN".to_string()
}

fn default_min_recommendations() -> usize {
    1
}

fn default_max_recommendations() -> usize {
    50
}

fn default_recommendations() -> usize {
    10
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            api_title: default_api_title(),
            api_version: default_api_version(),
            api_description: default_api_description(),
            min_recommendations: default_min_recommendations(),
            max_recommendations: default_max_recommendations(),
            default_recommendations: default_recommendations(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    /// Load settings from the environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let settings = envy::prefixed("CINESIM_")
            .from_env::<ServerSettings>()
            .map_err(|e| anyhow::anyhow!("Failed to load settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_recommendations == 0 || self.min_recommendations > self.max_recommendations {
            anyhow::bail!(
                "recommendation bounds must satisfy 1 <= min ({}) <= max ({})",
                self.min_recommendations,
                self.max_recommendations
            );
        }
        if !(self.min_recommendations..=self.max_recommendations)
            .contains(&self.default_recommendations)
        {
            anyhow::bail!(
                "default recommendations {} outside [{}, {}]",
                self.default_recommendations,
                self.min_recommendations,
                self.max_recommendations
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ServerSettings::default();
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.max_recommendations, 50);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_bounds() {
        let settings = ServerSettings {
            min_recommendations: 10,
            max_recommendations: 5,
            ..ServerSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = ServerSettings {
            default_recommendations: 0,
            ..ServerSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_from_env_iter() {
        let vars = vec![
            ("CINESIM_PORT".to_string(), "9100".to_string()),
            ("CINESIM_MAX_RECOMMENDATIONS".to_string(), "20".to_string()),
        ];
        let settings: ServerSettings = envy::prefixed("CINESIM_").from_iter(vars).unwrap();
        assert_eq!(settings.port, 9100);
        assert_eq!(settings.max_recommendations, 20);
        assert_eq!(settings.host, "0.0.0.0");
    }
}
