//! RFC 5545 export of a single workshop.

use anyhow::Context;
use icalendar::{Calendar, Component, Event, EventLike, Property};
use time::PrimitiveDateTime;

use crate::core::time::to_chrono_utc;
use crate::db::models::Workshop;

const PRODUCT_ID: &str = "-//Culina//Workshops//EN";

pub(crate) fn workshop_event(
    workshop: &Workshop,
    join_url: &str,
    host: &str,
    now: PrimitiveDateTime,
) -> anyhow::Result<String> {
    let description = match workshop.description.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => format!("{text}\n\nJoin: {join_url}"),
        _ => format!("Join: {join_url}"),
    };
    let location = workshop
        .location
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(join_url);

    let stamp = to_chrono_utc(now).context("DTSTAMP out of range")?;
    let starts = to_chrono_utc(workshop.start_time).context("workshop start out of range")?;
    let ends = to_chrono_utc(workshop.end_time()).context("workshop end out of range")?;

    let event = Event::new()
        .uid(&format!("workshop-{}@{host}", workshop.id))
        .timestamp(stamp)
        .starts(starts)
        .ends(ends)
        .summary(&workshop.title)
        .description(&description)
        .location(location)
        .add_property("URL", join_url)
        .done();

    let mut calendar = Calendar::new();
    calendar.name(&workshop.title);
    calendar.append_property(Property::new("PRODID", PRODUCT_ID));
    calendar.append_property(Property::new("METHOD", "PUBLISH"));
    calendar.push(event);

    Ok(calendar.done().to_string())
}

pub(crate) fn file_name(workshop: &Workshop) -> String {
    let slug: String = workshop
        .title
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.split('-').filter(|part| !part.is_empty()).collect::<Vec<_>>().join("-");
    if slug.is_empty() {
        format!("workshop-{}.ics", workshop.id)
    } else {
        format!("{slug}.ics")
    }
}
