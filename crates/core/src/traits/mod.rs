pub mod collaborators;
pub mod dispatch;
pub mod sender;

pub use collaborators::{
    AuditLog, AuditRecord, FnTransformer, MonitoringEvent, MonitoringSink, NoopMonitoringSink,
    ResultPredicate, Transformer,
};
pub use dispatch::ItemDispatch;
pub use sender::{Listener, Sender};
