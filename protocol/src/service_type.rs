use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// A DNS-SD style service type such as `_facingtime._tcp.local.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceType(String);

impl ServiceType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ServiceType {
    type Err = ServiceTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let labels: Vec<_> = value.trim_end_matches('.').split('.').collect();
        let [service, transport, domain] = labels.as_slice() else {
            return Err(ServiceTypeError::LabelCount(labels.len()));
        };
        let service_name = service
            .strip_prefix('_')
            .ok_or(ServiceTypeError::MissingUnderscore)?;
        if service_name.is_empty() || service_name.len() > 15 {
            return Err(ServiceTypeError::ServiceNameLength);
        }
        if *transport != "_tcp" && *transport != "_udp" {
            return Err(ServiceTypeError::Transport);
        }
        if *domain != "local" {
            return Err(ServiceTypeError::Domain);
        }
        Ok(Self(format!("{}.{}.{}.", service, transport, domain)))
    }
}

impl Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ServiceTypeError {
    #[error("Expecting 3 labels but found {0}")]
    LabelCount(usize),

    #[error("Service name must start with an underscore")]
    MissingUnderscore,

    #[error("Service name must have 1 to 15 characters")]
    ServiceNameLength,

    #[error("Transport must be `_tcp` or `_udp`")]
    Transport,

    #[error("Only the `local` domain is supported")]
    Domain,
}
