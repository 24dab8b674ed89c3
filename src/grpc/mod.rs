//! RPC front doors and the error-to-status mapping they share.

pub mod account_service;
pub mod scheduler_service;
pub mod server;

pub use account_service::AccountService;
pub use scheduler_service::JobService;
pub use server::GrpcServer;

use tonic::Status;

use crate::error::Error;

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match &err {
            Error::InvalidRequest(_) | Error::InvalidTier(_) => {
                Status::invalid_argument(err.to_string())
            }
            Error::RateLimited { .. } => Status::resource_exhausted(err.to_string()),
            Error::DuplicateJob => Status::already_exists(err.to_string()),
            // Backend outages, provisioning failures and codec errors are
            // all internal from the client's point of view.
            _ => Status::internal(err.to_string()),
        }
    }
}
