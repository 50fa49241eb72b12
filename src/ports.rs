use std::net::{TcpListener, TcpStream};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, bail};

/// Check if a local port is accepting connections (tunnel endpoint is live).
pub fn check_port(port: u16) -> bool {
    let addr = format!("127.0.0.1:{}", port);
    match addr.parse() {
        Ok(addr) => TcpStream::connect_timeout(&addr, Duration::from_secs(2)).is_ok(),
        Err(_) => false,
    }
}

/// Check if a local port is free (not already bound by another process).
pub fn is_port_free(port: u16) -> bool {
    TcpListener::bind(format!("127.0.0.1:{}", port)).is_ok()
}

/// Source of ephemeral local ports for tunnels declared without an explicit
/// local endpoint. Injected so the reconnect flow stays testable with a
/// deterministic sequence.
pub trait PortAllocator {
    fn allocate(&self) -> Result<u16>;
}

/// Lets the OS pick: binds port 0 and reports what it got.
pub struct OsPortAllocator;

impl PortAllocator for OsPortAllocator {
    fn allocate(&self) -> Result<u16> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        Ok(listener.local_addr()?.port())
    }
}

/// Hands out free ports from a configured inclusive range, skipping ports
/// already bound on the host and ports given out earlier in this process.
pub struct RangePortAllocator {
    min: u16,
    max: u16,
    next: Mutex<u16>,
}

impl RangePortAllocator {
    pub fn new(min: u16, max: u16) -> Result<Self> {
        if min == 0 || min > max {
            bail!("invalid port range {}-{}", min, max);
        }
        Ok(Self {
            min,
            max,
            next: Mutex::new(min),
        })
    }
}

impl PortAllocator for RangePortAllocator {
    fn allocate(&self) -> Result<u16> {
        let mut next = match self.next.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while *next <= self.max {
            let candidate = *next;
            *next = next.saturating_add(1);
            if is_port_free(candidate) {
                return Ok(candidate);
            }
        }
        bail!("no free port left in range {}-{}", self.min, self.max);
    }
}
