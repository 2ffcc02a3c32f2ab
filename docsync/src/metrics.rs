//! Metrics definitions for docsync monitoring.

/// Label for the change variant in metrics.
pub const CHANGE_LABEL: &str = "change";

/// Label for the reason a message was dropped.
pub const REASON_LABEL: &str = "reason";

/// Label for error kind in metrics.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Label for the partition a change was routed to.
pub const PARTITION_LABEL: &str = "partition";

/// Counter for messages received from the transport.
pub const DOCSYNC_MESSAGES_RECEIVED_TOTAL: &str = "docsync_messages_received_total";

/// Counter for messages dropped because they could not be decoded or projected.
pub const DOCSYNC_MESSAGES_DROPPED_TOTAL: &str = "docsync_messages_dropped_total";

/// Counter for changes applied to the store.
pub const DOCSYNC_EVENTS_APPLIED_TOTAL: &str = "docsync_events_applied_total";

/// Counter for changes whose application failed.
pub const DOCSYNC_EVENTS_FAILED_TOTAL: &str = "docsync_events_failed_total";

/// Histogram for the time spent merging one change, store calls included.
pub const DOCSYNC_MERGE_DURATION_SECONDS: &str = "docsync_merge_duration_seconds";

/// Counter for changes routed to each partition.
pub const DOCSYNC_CHANGES_ROUTED_TOTAL: &str = "docsync_changes_routed_total";

/// Counter for reconnections of the notification transport.
pub const DOCSYNC_TRANSPORT_RECONNECTS_TOTAL: &str = "docsync_transport_reconnects_total";
