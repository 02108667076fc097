// Domain models: vendor wire format, persisted records, sync status, dashboard views

mod dashboard;
mod heart_rate;
mod records;
mod status;

pub use dashboard::{
    CurrentDay, Dashboard, DayValue, PersonalRecords, ZoneBreakdown, zone_breakdown,
};
pub use heart_rate::{
    HeartRateIntraday, HeartRateOverview, HeartRateResponse, OverviewValue, VendorError,
    VendorErrorBody, WireSample, WireZone,
};
pub use records::{
    DailySummary, DayOverview, DayPayload, HeartSample, IntradaySample, ZoneEntry, ZoneName,
    ZoneSummary,
};
pub use status::{RunOutcome, SyncState, SyncStatus};
