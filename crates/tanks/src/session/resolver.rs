//! Background host name resolution
//!
//! DNS lookups can block for seconds, so the client hands them to a worker
//! thread and polls for the answer once per frame.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use arena_engine::net::{resolve, Address, NetError};

/// A lookup running on a worker thread
#[derive(Debug)]
pub struct Resolver {
    host: String,
    receiver: Receiver<Result<Address, NetError>>,
}

impl Resolver {
    /// Start resolving `host`, using `default_port` when it names none
    pub fn spawn(host: &str, default_port: u16) -> Self {
        let (sender, receiver) = mpsc::channel();
        let target = host.to_owned();
        let spawned = thread::Builder::new()
            .name("resolver".to_string())
            .spawn(move || {
                let result = resolve(&target, default_port);
                // The client may have given up; nobody to tell then
                let _ = sender.send(result);
            });
        if let Err(error) = spawned {
            log::warn!("Failed to start resolver thread: {}", error);
        }
        log::debug!("Resolving '{}'", host);
        Self {
            host: host.to_owned(),
            receiver,
        }
    }

    /// Host being resolved
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The lookup result once it is ready
    pub fn poll(&self) -> Option<Result<Address, NetError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(NetError::Resolve(self.host.clone()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait(resolver: &Resolver) -> Result<Address, NetError> {
        for _ in 0..500 {
            if let Some(result) = resolver.poll() {
                return result;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("resolver never finished");
    }

    #[test]
    fn test_resolves_literal_address() {
        let resolver = Resolver::spawn("127.0.0.1", 28100);
        assert_eq!(resolver.host(), "127.0.0.1");
        assert_eq!(wait(&resolver).unwrap(), Address::loopback(28100));
    }

    #[test]
    fn test_empty_host_fails() {
        let resolver = Resolver::spawn("", 1);
        assert!(matches!(wait(&resolver), Err(NetError::Resolve(_))));
    }
}
