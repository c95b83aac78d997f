use std::path::PathBuf;
use std::time::Duration;

use crate::CollectError;

/// Connection settings for the state health secretariat's open-data FTP.
#[derive(Debug, Clone)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub file_name: String,
    pub timeout: Duration,
    pub raw_fs_dir: PathBuf,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            host: "ftp2.ciasc.gov.br".to_string(),
            port: 21,
            user: "boavista".to_string(),
            password: "dados_abertos".to_string(),
            file_name: "boavista_covid_dados_abertos.csv".to_string(),
            timeout: Duration::from_secs(120),
            raw_fs_dir: PathBuf::from("./data/raw"),
        }
    }
}

impl FtpConfig {
    pub fn from_env() -> Result<Self, CollectError> {
        let defaults = Self::default();

        let port = match std::env::var("FTP_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| CollectError::Config(format!("FTP_PORT is not a port: {raw}")))?,
            Err(_) => defaults.port,
        };

        let timeout = std::env::var("FTP_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Ok(Self {
            host: std::env::var("FTP_HOST").unwrap_or(defaults.host),
            port,
            user: std::env::var("FTP_USER").unwrap_or(defaults.user),
            password: std::env::var("FTP_PASSWORD").unwrap_or(defaults.password),
            file_name: std::env::var("FTP_FILE").unwrap_or(defaults.file_name),
            timeout,
            raw_fs_dir: std::env::var("RAW_FS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.raw_fs_dir),
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_public_dataset() {
        let config = FtpConfig::default();
        assert_eq!(config.address(), "ftp2.ciasc.gov.br:21");
        assert_eq!(config.file_name, "boavista_covid_dados_abertos.csv");
        assert_eq!(config.timeout, Duration::from_secs(120));
    }
}
