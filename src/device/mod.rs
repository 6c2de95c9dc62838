pub mod backend;
pub mod file;
pub mod session;
pub mod synthetic;

pub use backend::{AudioFrame, CaptureMode, DeviceBackend};
pub use file::FileDevice;
pub use session::{DeviceFactory, DeviceSession};
pub use synthetic::{PermissionScript, SyntheticDevice};
