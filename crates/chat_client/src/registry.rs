use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use thiserror::Error;

use crate::transport::{ChatTransport, SharedTransport};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("transport '{0}' already registered")]
    DuplicateTransport(String),

    #[error("unknown transport '{name}' (available: {})", available.join(", "))]
    UnknownTransport { name: String, available: Vec<String> },

    #[error("transport name cannot be empty")]
    EmptyName,
}

/// Transports the CLI can pick from by name.
///
/// Built once at start-up and passed where it is needed.
#[derive(Default)]
pub struct TransportRegistry {
    transports: DashMap<String, SharedTransport>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `transport` under its own [`ChatTransport::name`].
    pub fn register<T>(&self, transport: T) -> Result<(), RegistryError>
    where
        T: ChatTransport + 'static,
    {
        let name = transport.name().trim().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        match self.transports.entry(name) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateTransport(entry.key().clone())),
            Entry::Vacant(entry) => {
                log::debug!("Registered '{}' transport", entry.key());
                entry.insert(Arc::new(transport));
                Ok(())
            }
        }
    }

    pub fn require(&self, name: &str) -> Result<SharedTransport, RegistryError> {
        match self.transports.get(name) {
            Some(entry) => Ok(Arc::clone(entry.value())),
            None => Err(RegistryError::UnknownTransport {
                name: name.to_string(),
                available: self.names(),
            }),
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .transports
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chat_stream::StreamResponse;

    use super::*;
    use crate::error::Result;
    use crate::transport::{ChatRequest, ChatResponse};

    struct NamedTransport(&'static str);

    #[async_trait]
    impl ChatTransport for NamedTransport {
        fn name(&self) -> &str {
            self.0
        }

        async fn send(&self, _request: &ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse::default())
        }

        async fn open_stream(&self, _request: &ChatRequest) -> Result<StreamResponse> {
            Ok(StreamResponse::from_chunks(Vec::<&'static str>::new()))
        }
    }

    #[test]
    fn register_and_require() {
        let registry = TransportRegistry::new();
        registry.register(NamedTransport("mock")).unwrap();
        registry.register(NamedTransport(" http ")).unwrap();

        assert_eq!(registry.names(), vec!["http", "mock"]);
        assert_eq!(registry.require("mock").unwrap().name(), "mock");
        assert_eq!(registry.require("http").unwrap().name(), " http ");
    }

    #[test]
    fn duplicate_and_empty_names_are_rejected() {
        let registry = TransportRegistry::new();
        registry.register(NamedTransport("http")).unwrap();

        assert_eq!(
            registry.register(NamedTransport("http")),
            Err(RegistryError::DuplicateTransport("http".to_string()))
        );
        assert_eq!(
            registry.register(NamedTransport("  ")),
            Err(RegistryError::EmptyName)
        );
    }

    #[test]
    fn unknown_transport_lists_the_alternatives() {
        let registry = TransportRegistry::new();
        registry.register(NamedTransport("http")).unwrap();

        let err = registry.require("grpc").err().unwrap();
        assert_eq!(err.to_string(), "unknown transport 'grpc' (available: http)");
    }
}
