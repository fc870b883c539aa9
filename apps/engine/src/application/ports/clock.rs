use chrono::{NaiveDate, NaiveDateTime};

/// Source of "today" for every billing decision.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}
