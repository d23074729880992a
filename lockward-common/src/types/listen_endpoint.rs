use std::fmt::{Debug, Display};
use std::net::{SocketAddr, ToSocketAddrs};
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// A listen address, resolved once at config load time (`host:port`)
#[derive(Clone, PartialEq, Eq)]
pub struct ListenEndpoint(pub SocketAddr);

impl ListenEndpoint {
    pub fn address(&self) -> SocketAddr {
        self.0
    }
}

impl Deref for ListenEndpoint {
    type Target = SocketAddr;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ListenEndpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v: String = Deserialize::deserialize::<D>(deserializer)?;
        let v = v
            .to_socket_addrs()
            .map_err(|e| {
                serde::de::Error::custom(format!("cannot listen on {v}: {e}"))
            })?
            .next()
            .ok_or_else(|| serde::de::Error::custom(format!("cannot listen on {v}: no address")))?;
        Ok(Self(v))
    }
}

impl Serialize for ListenEndpoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl Display for ListenEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for ListenEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let endpoint: ListenEndpoint = serde_yaml::from_str("\"127.0.0.1:8888\"").unwrap();
        assert_eq!(endpoint.port(), 8888);
        assert_eq!(endpoint.to_string(), "127.0.0.1:8888");
        assert_eq!(serde_yaml::to_string(&endpoint).unwrap().trim(), "127.0.0.1:8888");
    }

    #[test]
    fn test_rejects_missing_port() {
        assert!(serde_yaml::from_str::<ListenEndpoint>("\"127.0.0.1\"").is_err());
    }
}
