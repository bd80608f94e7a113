// rmad library - resumable RMA repair workflow
// This exposes the core components for the daemon binary and for testing

pub mod clock;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod handlers;
pub mod hardware;
pub mod logs;
pub mod metrics;
pub mod state;
pub mod store;
pub mod telemetry;

// Re-export key types for easy access
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::RmadConfig;
pub use controller::{ControllerOptions, ResumeError, RmadController, RmadReply};
pub use daemon::{build_controller, RmadCommand, RmadResponse, RmadService, RmadServiceHandle};
pub use error::RmadErrorCode;
pub use handlers::{HandlerContext, StateHandler, StateHandlerRegistry};
pub use hardware::{FakeDevice, Hardware};
pub use state::{RmadState, StateCase};
pub use store::{JsonStore, SharedStore};
pub use telemetry::{create_request_span, generate_correlation_id, init_telemetry};
