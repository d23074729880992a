use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::ListenEndpoint;

pub(crate) const fn _default_true() -> bool {
    true
}

pub(crate) const fn _default_false() -> bool {
    false
}

#[inline]
pub(crate) fn _default_http_listen() -> ListenEndpoint {
    ListenEndpoint(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8888)))
}

#[inline]
pub(crate) fn _default_key_rotation_interval() -> Duration {
    Duration::from_secs(60 * 60 * 24)
}

#[inline]
pub(crate) fn _default_max_key_age() -> Duration {
    Duration::from_secs(60 * 60 * 48)
}

pub(crate) const fn _default_max_attempts() -> u32 {
    5
}

#[inline]
pub(crate) fn _default_lockout_window() -> Duration {
    Duration::from_secs(60 * 15)
}

#[inline]
pub(crate) fn _default_lockout_duration() -> Duration {
    Duration::from_secs(60 * 15)
}

#[inline]
pub(crate) fn _default_key_prefix() -> String {
    "lockward:".to_owned()
}

#[inline]
pub(crate) fn _default_store_timeout() -> Duration {
    Duration::from_millis(500)
}

#[inline]
pub(crate) fn _default_cleanup_interval() -> Duration {
    Duration::from_secs(60 * 5)
}

#[inline]
pub(crate) fn _default_store_connection_timeout() -> Duration {
    Duration::from_secs(2)
}

pub(crate) const fn _default_store_retries() -> usize {
    3
}
