pub(crate) mod calendar;
pub(crate) mod certificates;
pub(crate) mod deletion;
pub(crate) mod mailer;
pub(crate) mod progress_gate;
pub(crate) mod quiz_scoring;
pub(crate) mod reminders;
pub(crate) mod reservations;
pub(crate) mod storage;
