//! Published-date parsing. Providers return anything from a bare year to a
//! full timestamp; everything normalizes to a full calendar date with 01-01
//! (or -01) expansion.

use chrono::NaiveDate;

pub fn parse_published_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    // Full timestamps ("2012-06-26T00:00:00Z") reduce to their date part.
    let s = s.split('T').next().unwrap_or(s);

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Some((year, month)) = s.split_once('-') {
        if let (Ok(y), Ok(m)) = (year.parse::<i32>(), month.parse::<u32>()) {
            return NaiveDate::from_ymd_opt(y, m, 1);
        }
    }
    if s.len() == 4 {
        if let Ok(y) = s.parse::<i32>() {
            return NaiveDate::from_ymd_opt(y, 1, 1);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_partial_dates() {
        assert_eq!(
            parse_published_date("1977"),
            NaiveDate::from_ymd_opt(1977, 1, 1)
        );
        assert_eq!(
            parse_published_date("1977-01"),
            NaiveDate::from_ymd_opt(1977, 1, 1)
        );
        assert_eq!(
            parse_published_date("1977-01-28"),
            NaiveDate::from_ymd_opt(1977, 1, 28)
        );
    }

    #[test]
    fn accepts_timestamps_and_rejects_garbage() {
        assert_eq!(
            parse_published_date("2012-06-26T00:00:00Z"),
            NaiveDate::from_ymd_opt(2012, 6, 26)
        );
        assert_eq!(parse_published_date("June 1977"), None);
        assert_eq!(parse_published_date(""), None);
    }
}
