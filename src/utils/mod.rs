//! The `utils` module holds the pieces shared across `minichat`: the error
//! taxonomy and logging setup.

pub mod error;
pub mod logging;

pub use error::{BrokerError, Result};

#[cfg(test)]
mod tests {
    use super::error::BrokerError;
    use super::logging;
    use std::time::Duration;

    #[test]
    fn logging_init_accepts_levels() {
        logging::init("info");
        logging::init("debug");
        logging::init("bogus");
    }

    #[test]
    fn parse_level_is_case_insensitive() {
        assert_eq!(logging::parse_level("WARNING"), tracing::Level::WARN);
        assert_eq!(logging::parse_level(" Debug "), tracing::Level::DEBUG);
        assert_eq!(logging::parse_level("nonsense"), tracing::Level::INFO);
    }

    #[test]
    fn error_display_is_client_facing_detail() {
        let err = BrokerError::UnknownChannel {
            channel: "room1".to_string(),
        };
        assert_eq!(err.to_string(), "Channel 'room1' does not exist");

        let err = BrokerError::DispatchTimeout {
            client_id: "bob".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "Dispatch to 'bob' timed out after 250ms");

        let err = BrokerError::NotRegistered {
            client_id: "ghost".to_string(),
        };
        assert_eq!(err.to_string(), "Client 'ghost' is not registered");

        let err = BrokerError::AtCapacity { limit: 10 };
        assert_eq!(err.to_string(), "Server is at capacity");
    }
}
