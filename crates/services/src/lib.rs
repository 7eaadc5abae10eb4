pub mod background;
pub mod error;
pub mod system;
pub mod uploads;

pub use background::{Dispatcher, MaintenanceReport, SystemStats};
pub use error::{DispatchError, DispatchResult};
pub use uploads::{Upload, UploadStore};
