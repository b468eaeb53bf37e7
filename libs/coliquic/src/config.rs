// Copyright 2026 Anapaya Systems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration of persistent QUIC dialers and listeners.

use std::time::Duration;

use quinn::{IdleTimeout, TransportConfig, VarInt, VarIntBoundsExceeded};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default time to wait for a stream to open on an existing session.
const DEFAULT_STREAM_OPEN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default idle timeout for sessions.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default keep alive interval.
const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Default number of concurrent bidirectional streams a peer may open.
const DEFAULT_MAX_CONCURRENT_BIDI_STREAMS: u32 = 100;

/// Default capacity of the listener queue of accepted streams.
const DEFAULT_ACCEPT_QUEUE_LEN: usize = 16;

/// Persistent QUIC configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentQuicConfig {
    /// Time to wait for a new stream on an existing session. A session that cannot
    /// open a stream in time is considered exhausted and replaced.
    pub stream_open_timeout: Duration,
    /// Idle timeout for sessions, `None` disables it.
    pub idle_timeout: Option<Duration>,
    /// Keep alive interval, `None` disables keep alives.
    pub keep_alive_interval: Option<Duration>,
    /// Bidirectional streams the peer may have open at the same time.
    pub max_concurrent_bidi_streams: u32,
    /// Accepted streams buffered by a listener until they are consumed.
    pub accept_queue_len: usize,
}

impl Default for PersistentQuicConfig {
    fn default() -> Self {
        Self {
            stream_open_timeout: DEFAULT_STREAM_OPEN_TIMEOUT,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            keep_alive_interval: Some(DEFAULT_KEEP_ALIVE_INTERVAL),
            max_concurrent_bidi_streams: DEFAULT_MAX_CONCURRENT_BIDI_STREAMS,
            accept_queue_len: DEFAULT_ACCEPT_QUEUE_LEN,
        }
    }
}

impl PersistentQuicConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> PersistentQuicConfigBuilder {
        PersistentQuicConfigBuilder::default()
    }

    /// Creates a quinn transport config from this configuration.
    pub fn to_transport_config(&self) -> Result<TransportConfig, SetupError> {
        let mut config = TransportConfig::default();
        let idle_timeout = self.idle_timeout.map(IdleTimeout::try_from).transpose()?;
        config.max_idle_timeout(idle_timeout);
        config.keep_alive_interval(self.keep_alive_interval);
        config.max_concurrent_bidi_streams(VarInt::from_u32(self.max_concurrent_bidi_streams));
        Ok(config)
    }
}

/// Builder for [`PersistentQuicConfig`].
#[derive(Debug, Default)]
pub struct PersistentQuicConfigBuilder {
    config: PersistentQuicConfig,
}

impl PersistentQuicConfigBuilder {
    /// Sets the stream open timeout.
    pub fn stream_open_timeout(mut self, timeout: Duration) -> Self {
        self.config.stream_open_timeout = timeout;
        self
    }

    /// Sets the idle timeout.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets the keep alive interval.
    pub fn keep_alive_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.keep_alive_interval = interval;
        self
    }

    /// Sets the number of concurrent bidirectional streams the peer may open.
    pub fn max_concurrent_bidi_streams(mut self, streams: u32) -> Self {
        self.config.max_concurrent_bidi_streams = streams;
        self
    }

    /// Sets the listener accept queue capacity. Zero is raised to one.
    pub fn accept_queue_len(mut self, len: usize) -> Self {
        self.config.accept_queue_len = len.max(1);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> PersistentQuicConfig {
        self.config
    }
}

/// Errors setting up a dialer or listener.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The idle timeout cannot be represented in QUIC.
    #[error("invalid idle timeout: {0}")]
    IdleTimeout(#[from] VarIntBoundsExceeded),
    /// The endpoint could not be bound or its address is unavailable.
    #[error("endpoint error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = PersistentQuicConfig::builder()
            .stream_open_timeout(Duration::from_millis(200))
            .max_concurrent_bidi_streams(1)
            .accept_queue_len(0)
            .build();
        assert_eq!(config.stream_open_timeout, Duration::from_millis(200));
        assert_eq!(config.max_concurrent_bidi_streams, 1);
        assert_eq!(config.accept_queue_len, 1);
        assert_eq!(config.idle_timeout, Some(DEFAULT_IDLE_TIMEOUT));
        assert!(config.to_transport_config().is_ok());
    }

    #[test]
    fn deserializes_partial_config() {
        let config: PersistentQuicConfig =
            serde_json::from_str(r#"{"accept_queue_len": 4, "idle_timeout": null}"#).unwrap();
        assert_eq!(config.accept_queue_len, 4);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.stream_open_timeout, DEFAULT_STREAM_OPEN_TIMEOUT);
    }
}
