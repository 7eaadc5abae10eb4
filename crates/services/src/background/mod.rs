mod dispatcher;

pub use dispatcher::{Dispatcher, MaintenanceReport, SystemStats};
