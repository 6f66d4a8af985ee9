//! Startup configuration (§10.3): the `PORT` environment variable is the only
//! runtime knob. A typed error covers the one fallible step before the
//! server can start — everything after that is event-driven and, per §7, no
//! longer needs propagation out of its own task.

use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("PORT must be a valid u16, got {0:?}")]
    InvalidPort(String),
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Reads `PORT` from the environment, defaulting to 3000 when unset.
pub fn load_port() -> Result<u16, ServerError> {
    match std::env::var("PORT") {
        Err(_) => Ok(DEFAULT_PORT),
        Ok(raw) => raw.parse().map_err(|_| ServerError::InvalidPort(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        // SAFETY: tests run single-threaded within this module; no other
        // test touches PORT.
        unsafe {
            std::env::remove_var("PORT");
        }
        assert_eq!(load_port().unwrap(), DEFAULT_PORT);
    }

    #[test]
    fn rejects_unparsable_port() {
        unsafe {
            std::env::set_var("PORT", "not-a-port");
        }
        assert!(load_port().is_err());
        unsafe {
            std::env::remove_var("PORT");
        }
    }
}
