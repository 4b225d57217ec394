use super::{types::Config, ConfigError, GenerationMode};

/// Upper bound for `generation.workers`.
pub const MAX_WORKERS: usize = 1024;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Queue mode has at least one worker and a non-empty queue
/// - Queue mode does not ask for more than `MAX_WORKERS` workers
/// - A generation timeout is only set in queue mode, and is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.generation.mode == GenerationMode::Queue {
        if config.generation.workers == 0 {
            return Err(ConfigError::ValidationError(
                "generation.workers must be at least 1 in queue mode".to_string(),
            ));
        }
        if config.generation.workers > MAX_WORKERS {
            return Err(ConfigError::ValidationError(format!(
                "generation.workers cannot exceed {}",
                MAX_WORKERS
            )));
        }
        if config.generation.queue_size == 0 {
            return Err(ConfigError::ValidationError(
                "generation.queue_size must be at least 1 in queue mode".to_string(),
            ));
        }
    }

    // Inline generation finishes before the caller can start waiting.
    if config.generation.mode == GenerationMode::Inline
        && config.generation.timeout_secs.is_some()
    {
        return Err(ConfigError::ValidationError(
            "generation.timeout_secs requires generation.mode = \"queue\"".to_string(),
        ));
    }

    if config.generation.timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "generation.timeout_secs cannot be 0 (omit it to wait without limit)".to_string(),
        ));
    }

    Ok(())
}
