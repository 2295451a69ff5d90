// Macros file - tracing macros are referenced by full path inside the macro bodies

/// Standardized logging macros for consistent field names and message patterns
///
/// These macros ensure:
/// - Consistent field naming conventions
/// - Appropriate logging levels for different scenarios
/// - Structured logging with context

// ============================================================================
// API Operation Logging Macros
// ============================================================================

/// Log the start of an API operation with consistent fields
#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, word_id = $word_id:expr) => {
        tracing::debug!(
            operation = $operation,
            word_id = %$word_id,
            "API operation started"
        );
    };
    ($operation:expr, song_id = $song_id:expr) => {
        tracing::debug!(
            operation = $operation,
            song_id = %$song_id,
            "API operation started"
        );
    };
    ($operation:expr, session_id = $session_id:expr) => {
        tracing::debug!(
            operation = $operation,
            session_id = %$session_id,
            "API operation started"
        );
    };
    ($operation:expr) => {
        tracing::debug!(operation = $operation, "API operation started");
    };
}

/// Log successful completion of an API operation
#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, word_id = $word_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            word_id = %$word_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, song_id = $song_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            song_id = %$song_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, session_id = $session_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            session_id = %$session_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, count = $count:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            count = $count,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::info!(operation = $operation, "API operation completed: {}", $msg);
    };
}

/// Log API operation errors with consistent structure
#[macro_export]
macro_rules! log_api_error {
    ($operation:expr, session_id = $session_id:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            session_id = %$session_id,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
    ($operation:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
}

/// Log API warnings with context
#[macro_export]
macro_rules! log_api_warn {
    ($operation:expr, word_id = $word_id:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            word_id = %$word_id,
            "API operation warning: {}", $msg
        );
    };
}

// ============================================================================
// Store Operation Logging Macros
// ============================================================================

/// Log key-value store operations and their results
#[macro_export]
macro_rules! log_store_operation {
    (debug, $operation:expr, keys = $keys:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            component = "store",
            operation = $operation,
            keys = ?$keys,
            duration_ms = $duration,
            "Store operation completed"
        );
    };
    (debug, $operation:expr, count = $count:expr) => {
        tracing::debug!(
            component = "store",
            operation = $operation,
            result_count = $count,
            "Store operation completed"
        );
    };
    (error, $operation:expr, error = $error:expr) => {
        tracing::error!(
            component = "store",
            operation = $operation,
            error = %$error,
            "Store operation failed"
        );
    };
}

// ============================================================================
// AI Gateway Logging Macros
// ============================================================================

/// Log completion calls with provider context
#[macro_export]
macro_rules! log_ai_operation {
    (start, $operation:expr, provider = $provider:expr, model = $model:expr) => {
        tracing::info!(
            component = "ai_gateway",
            operation = $operation,
            provider = %$provider,
            model = %$model,
            "AI operation started"
        );
    };
    (
        success,
        $operation:expr,
        provider = $provider:expr,
        duration_ms = $duration:expr,
        response_length = $length:expr
    ) => {
        tracing::info!(
            component = "ai_gateway",
            operation = $operation,
            provider = %$provider,
            duration_ms = $duration,
            response_length = $length,
            "AI operation completed successfully"
        );
    };
    (error, $operation:expr, provider = $provider:expr, error = $error:expr) => {
        tracing::error!(
            component = "ai_gateway",
            operation = $operation,
            provider = %$provider,
            error = %$error,
            "AI operation failed"
        );
    };
    (warn, $operation:expr, $msg:expr) => {
        tracing::warn!(
            component = "ai_gateway",
            operation = $operation,
            "AI operation warning: {}", $msg
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system startup and shutdown events
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (shutdown, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "shutdown",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

// ============================================================================
// Validation Logging Macros
// ============================================================================

/// Log validation results consistently
#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}
