//! Event flows: inbound channel → interceptor → feeder → engine → outbound channel.
//!
//! Each flow is built once at startup from its `FlowConfig` and runs its own worker
//! pool and classifier engine. Flows share only the model cache.

pub mod feeder;
pub mod inbound;
pub mod interceptor;
pub mod multiplexer;
pub mod outbound;
pub mod registry;
pub mod state;
pub mod stats;

pub use feeder::ModelFeeder;
pub use inbound::InboundChannel;
pub use interceptor::MessageInterceptor;
pub use multiplexer::{ChannelMultiplexer, FlowOutcome};
pub use outbound::{LoggingFeeder, OutboundChannel, OutboundFeeder};
pub use registry::{FlowHandle, FlowRegistry};
pub use state::FlowState;
pub use stats::{FlowStats, FlowStatsSnapshot};
