mod report;
mod service;
mod ticket;

pub use report::{NodeSyncOutcome, SyncReport, SyncStart};
pub use service::SyncService;
pub use ticket::{RemoteEffect, SyncAction, SyncCompletion, SyncTicket};
