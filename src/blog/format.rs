use chrono::{DateTime, Datelike, Timelike, Utc};

const MONTHS_PT_BR: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

fn month_abbreviation(date: &DateTime<Utc>) -> &'static str {
    MONTHS_PT_BR[date.month0() as usize]
}

/// `15 mar 21`
pub fn format_date(date: &DateTime<Utc>) -> String {
    format!(
        "{:02} {} {:02}",
        date.day(),
        month_abbreviation(date),
        date.year() % 100
    )
}

/// `19 mar 2021, às 15:49`
pub fn format_edited(date: &DateTime<Utc>) -> String {
    format!(
        "{:02} {} {}, às {:02}:{:02}",
        date.day(),
        month_abbreviation(date),
        date.year(),
        date.hour(),
        date.minute()
    )
}

pub fn format_optional_date(date: Option<&DateTime<Utc>>) -> String {
    date.map(format_date).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_date() {
        let date = Utc.with_ymd_and_hms(2021, 3, 15, 19, 25, 28).unwrap();
        assert_eq!(format_date(&date), "15 mar 21");

        let date = Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(format_date(&date), "01 fev 21");

        let date = Utc.with_ymd_and_hms(2009, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(format_date(&date), "31 dez 09");
    }

    #[test]
    fn test_format_edited() {
        let date = Utc.with_ymd_and_hms(2021, 3, 19, 15, 49, 0).unwrap();
        assert_eq!(format_edited(&date), "19 mar 2021, às 15:49");
    }

    #[test]
    fn test_format_missing_date() {
        assert_eq!(format_optional_date(None), "");
    }
}
