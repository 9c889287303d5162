pub use self::parser::{
    AuthConfig, CacheConfig, Config, DatabaseConfig, LimitsConfig, LoggingConfig, QualifierConfig,
    ServerConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
