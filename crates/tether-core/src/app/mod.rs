//! Application layer: session state, the startup gate, and the keep-alive
//! loop that runs for the rest of the process lifetime.

pub mod gate;
pub mod keep_alive;
pub mod session;
pub mod status;

pub use self::gate::AcquisitionGate;
pub use self::keep_alive::{KeepAlive, ReacquirePolicy};
pub use self::session::LeaseSession;
pub use self::status::LeaseStatus;
