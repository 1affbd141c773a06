use chrono::{Datelike, SecondsFormat, Utc};

/// Creation stamp written on new records, e.g. `2024-05-01T09:30:00.000Z`.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn current_year() -> i32 {
    Utc::now().year()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_year_is_reasonable() {
        let year = current_year();
        assert!(year > 2017);
        assert!(year < 2100);
    }

    #[test]
    fn rfc3339_stamp_is_utc_with_millis() {
        let stamp = now_rfc3339();
        assert!(stamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
        assert_eq!(stamp.len(), "2024-05-01T09:30:00.000Z".len());
    }
}
