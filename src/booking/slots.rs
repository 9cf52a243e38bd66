use chrono::NaiveTime;

/// Times offered by the date & time step, in display form.
pub const TIME_SLOTS: [&str; 23] = [
    "08:00 AM", "08:30 AM", "09:00 AM", "09:30 AM", "10:00 AM", "10:30 AM", "11:00 AM", "11:30 AM",
    "12:00 PM", "12:30 PM", "01:00 PM", "01:30 PM", "02:00 PM", "02:30 PM", "03:00 PM", "03:30 PM",
    "04:00 PM", "04:30 PM", "05:00 PM", "05:30 PM", "06:00 PM", "06:30 PM", "07:00 PM",
];

pub fn is_offered(slot: &str) -> bool {
    TIME_SLOTS.contains(&slot.trim())
}

/// `"09:30 AM"` -> `"09:30"`, `"12:00 AM"` -> `"00:00"`.
pub fn to_24_hour(display: &str) -> Option<String> {
    NaiveTime::parse_from_str(display.trim(), "%I:%M %p")
        .ok()
        .map(|t| t.format("%H:%M").to_string())
}

/// `"14:00"` -> `"02:00 PM"`.
pub fn to_12_hour(hhmm: &str) -> Option<String> {
    NaiveTime::parse_from_str(hhmm.trim(), "%H:%M")
        .ok()
        .map(|t| t.format("%I:%M %p").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_24_hour() {
        assert_eq!(to_24_hour("09:30 AM").as_deref(), Some("09:30"));
        assert_eq!(to_24_hour("02:00 PM").as_deref(), Some("14:00"));
        assert_eq!(to_24_hour("12:00 PM").as_deref(), Some("12:00"));
        assert_eq!(to_24_hour("12:00 AM").as_deref(), Some("00:00"));
        assert_eq!(to_24_hour("07:00 PM").as_deref(), Some("19:00"));
    }

    #[test]
    fn rejects_malformed_times() {
        assert_eq!(to_24_hour("25:00 PM"), None);
        assert_eq!(to_24_hour("09:30"), None);
        assert_eq!(to_24_hour(""), None);
        assert_eq!(to_12_hour("9 o'clock"), None);
    }

    #[test]
    fn every_offered_slot_converts_back_to_itself() {
        for slot in TIME_SLOTS {
            let hhmm = to_24_hour(slot).unwrap();
            assert_eq!(to_12_hour(&hhmm).as_deref(), Some(slot), "slot {slot}");
        }
    }

    #[test]
    fn offered_set_is_half_hourly_from_eight_to_seven() {
        assert!(is_offered("08:00 AM"));
        assert!(is_offered(" 12:30 PM "));
        assert!(!is_offered("07:30 PM"));
        assert!(!is_offered("07:30 AM"));
        assert_eq!(to_24_hour(TIME_SLOTS[0]).as_deref(), Some("08:00"));
        assert_eq!(to_24_hour(TIME_SLOTS[TIME_SLOTS.len() - 1]).as_deref(), Some("19:00"));
    }
}
