pub mod config;
pub mod error;
pub mod grpc;
pub mod lease;
pub mod provisioner;
pub mod queue;
pub mod scheduler;
pub mod shutdown;
pub mod throttle;
pub mod worker;

// Re-export generated protobuf types
pub mod proto {
    tonic::include_proto!("mcp.v1");
}
