use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    to_primitive_utc(OffsetDateTime::now_utc())
}

pub(crate) fn to_primitive_utc(value: OffsetDateTime) -> PrimitiveDateTime {
    let utc = value.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

/// Same instant as a `chrono` UTC timestamp, for the iCalendar builder.
pub(crate) fn to_chrono_utc(value: PrimitiveDateTime) -> Option<chrono::DateTime<chrono::Utc>> {
    let utc = value.assume_utc();
    chrono::DateTime::from_timestamp(utc.unix_timestamp(), utc.nanosecond())
}
