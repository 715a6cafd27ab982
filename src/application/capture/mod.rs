pub mod change_source;
pub mod engine;
pub mod resync;

pub use change_source::{
    ChangeOp, ChangeSource, PollingChangeSource, TableChange, TriggerChangeSource, WatchedTable,
};
pub use engine::{restart_delay, CaptureEngine};
pub use resync::Resyncer;
