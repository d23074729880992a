#[derive(thiserror::Error, Debug)]
pub enum LockwardError {
    #[error("a lockout store must be configured when running in production")]
    StoreRequiredInProduction,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            LockwardError::InvalidConfig("window is zero".into()).to_string(),
            "invalid configuration: window is zero"
        );
        assert_eq!(
            LockwardError::StoreRequiredInProduction.to_string(),
            "a lockout store must be configured when running in production"
        );
    }
}
