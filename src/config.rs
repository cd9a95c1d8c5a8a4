use std::{env, fs, io};

use log::{info, warn};
use serde::Deserialize;

use crate::actions::{Action, MAX_CALLBACK_DATA};
use crate::error::{BookingError, ConfigError};
use crate::models::{Employee, Service};

const DEFAULT_CONFIG_PATH: &str = "salon.toml";

/// Каталог салона: сотрудники и их услуги с ценами.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_studio_name")]
    pub studio_name: String,
    pub employees: Vec<Employee>,
}

fn default_studio_name() -> String {
    "Студия МОБ".to_string()
}

impl Default for Config {
    fn default() -> Self {
        let service = |name: &str, price| Service { name: name.to_string(), price };
        Config {
            studio_name: default_studio_name(),
            employees: vec![
                Employee {
                    name: "Анна".to_string(),
                    services: vec![service("Стрижка", 1500), service("Окрашивание", 3500)],
                },
                Employee {
                    name: "Мария".to_string(),
                    services: vec![service("Маникюр", 1200), service("Педикюр", 1800)],
                },
                Employee {
                    name: "Ольга".to_string(),
                    services: vec![service("Стрижка", 1300), service("Укладка", 900)],
                },
            ],
        }
    }
}

impl Config {
    /// Загружает каталог из файла `SALON_CONFIG` (по умолчанию `salon.toml`).
    /// Если файла нет, используется встроенный каталог.
    pub fn load() -> Result<Config, ConfigError> {
        let path = env::var("SALON_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("Config {} not found, using built-in catalog", path);
                return Ok(Config::default());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        let config = Config::from_toml(&contents).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse { path: path.clone(), source },
            other => other,
        })?;
        info!("Loaded {} employees from {}", config.employees.len(), path);
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: String::from("<inline>"),
            source,
        })?;
        if config.employees.is_empty() {
            return Err(ConfigError::Empty);
        }
        config.check_callback_sizes()?;
        Ok(config)
    }

    // имена попадают в callback data кнопок, а Telegram ограничивает её 64 байтами
    fn check_callback_sizes(&self) -> Result<(), ConfigError> {
        for employee in &self.employees {
            let tokens = std::iter::once((&employee.name, Action::Employee(employee.name.clone()).token()))
                .chain(employee.services.iter().map(|s| (&s.name, Action::Service(s.name.clone()).token())));
            for (name, token) in tokens {
                if token.len() > MAX_CALLBACK_DATA {
                    return Err(ConfigError::NameTooLong(name.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn employee(&self, name: &str) -> Result<&Employee, BookingError> {
        self.employees
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| BookingError::UnknownEmployee(name.to_string()))
    }

    pub fn service(&self, employee: &str, name: &str) -> Result<&Service, BookingError> {
        self.employee(employee)?
            .services
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| BookingError::UnknownService(name.to_string()))
    }
}
