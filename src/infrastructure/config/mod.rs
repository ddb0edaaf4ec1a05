mod settings;

pub use settings::{
    DatabaseConfig, DeliveryConfig, LocalServiceConfig, LogConfig, OtelConfig, QueueConfig,
    ServerConfig, Settings,
};
