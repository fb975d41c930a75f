pub mod batch;
pub mod controller;
pub mod selection;

pub use batch::{BatchActionCoordinator, BatchItem, BatchReport, NewReminder};
pub use controller::{CareSnapshot, ControllerHandle, ReminderLifecycleController};
pub use selection::Selection;
