use neurosync::NeuroSyncError;

pub const SUCCESS: i32 = 0;
pub const EXECUTION_ERROR: i32 = 1;
pub const INPUT_ERROR: i32 = 2;
pub const CONFIG_ERROR: i32 = 3;
pub const CONNECTION_ERROR: i32 = 4;

/// Exit code for a command failure
pub fn for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<NeuroSyncError>() {
        Some(NeuroSyncError::InvalidInput(_))
        | Some(NeuroSyncError::Engine(_))
        | Some(NeuroSyncError::NoSessions(_))
        | Some(NeuroSyncError::Format(_)) => INPUT_ERROR,
        Some(NeuroSyncError::Config(_)) => CONFIG_ERROR,
        Some(NeuroSyncError::Stream(_)) => CONNECTION_ERROR,
        _ => EXECUTION_ERROR,
    }
}

/// Print `err` with its context chain and return its exit code
pub fn report(err: anyhow::Error) -> i32 {
    eprintln!("Error: {:#}", err);
    for_error(&err)
}
