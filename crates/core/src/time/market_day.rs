use crate::domain::history::HistoryRange;
use anyhow::Context;
use chrono::{DateTime, Duration, Months, TimeZone, Utc};

// History ranges are calendar ranges in the market's local day, not rolling
// 24h windows: "today" starts at local midnight.

pub fn resolve_since(
    range: HistoryRange,
    now_utc: DateTime<Utc>,
    utc_offset_hours: i32,
) -> anyhow::Result<Option<DateTime<Utc>>> {
    let offset = chrono::FixedOffset::east_opt(utc_offset_hours * 3600)
        .with_context(|| format!("invalid utc offset: {utc_offset_hours}h"))?;
    let now_local = now_utc.with_timezone(&offset);

    let start_local = match range {
        HistoryRange::All => return Ok(None),
        HistoryRange::Today => now_local,
        HistoryRange::Week => now_local - Duration::days(7),
        HistoryRange::Month => now_local
            .checked_sub_months(Months::new(1))
            .context("month rollback out of range")?,
    };

    let midnight = start_local
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .context("invalid local midnight")?;
    let start = offset
        .from_local_datetime(&midnight)
        .single()
        .context("ambiguous local midnight")?;

    Ok(Some(start.with_timezone(&Utc)))
}
