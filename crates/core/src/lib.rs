pub mod config;
pub mod converter;
pub mod metrics;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    ServerConfig,
};
pub use converter::{
    CalibreConverter, ConversionProgress, ConversionRequest, ConversionResult, Converter,
    ConverterConfig, ConverterError, EbookFormat, ErrorKind, Quality, TargetDevice,
};
