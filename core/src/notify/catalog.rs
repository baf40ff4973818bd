//! Emergency contacts and message templates.

use crate::notify::model::{Contact, Severity};

type ContactRow = (&'static str, &'static str, &'static str);

const PRIMARY: [ContactRow; 3] = [
    ("Coast Guard", "+1-800-USCG-911", "ops@uscg.gov"),
    ("Emergency Management", "+1-555-EMG-MGMT", "emergency@county.gov"),
    ("Environmental Protection", "+1-555-EPA-HOTL", "response@epa.gov"),
];

const SECONDARY: [ContactRow; 3] = [
    ("National Weather Service", "+1-555-WEATHER", "forecast@noaa.gov"),
    ("Health Department", "+1-555-HEALTH", "alerts@health.gov"),
    ("Water Utilities", "+1-555-WATER", "ops@waterutil.gov"),
];

const MEDIA: [ContactRow; 2] = [
    ("Emergency Broadcast System", "+1-555-EBS-CAST", "alerts@ebs.gov"),
    ("Local News Networks", "+1-555-NEWS-NET", "newsroom@localnews.com"),
];

// (alert type, severity key, template)
const TEMPLATES: [(&str, &str, &str); 6] = [
    (
        "tsunami",
        "watch",
        "TSUNAMI WATCH issued for [LOCATION]. Monitor official channels for updates. Prepare to evacuate if conditions worsen.",
    ),
    (
        "tsunami",
        "warning",
        "TSUNAMI WARNING - EVACUATE NOW! Move to higher ground immediately. Tsunami waves expected within [TIME]. Follow evacuation routes.",
    ),
    (
        "contamination",
        "advisory",
        "WATER QUALITY ADVISORY: Elevated contamination detected in [LOCATION]. Avoid water contact. Boil water before consumption.",
    ),
    (
        "contamination",
        "emergency",
        "WATER EMERGENCY: Dangerous contamination levels. DO NOT USE TAP WATER. Alternative water sources available at [LOCATIONS].",
    ),
    (
        "storm",
        "watch",
        "STORM SURGE WATCH: Potential flooding in coastal areas. Monitor conditions and prepare to evacuate low-lying areas.",
    ),
    (
        "storm",
        "warning",
        "STORM SURGE WARNING: Life-threatening flooding imminent. Evacuate flood-prone areas immediately.",
    ),
];

pub const LOCATION_PLACEHOLDER: &str = "[LOCATION]";

fn contacts(rows: &[ContactRow]) -> impl Iterator<Item = Contact> + '_ {
    rows.iter().map(|(name, phone, email)| Contact {
        name: name.to_string(),
        phone: phone.to_string(),
        email: email.to_string(),
    })
}

/// Recipient tiers: primary always; secondary from warning; media only for critical.
pub fn recipients_for(severity: &Severity) -> Vec<Contact> {
    let mut out: Vec<Contact> = contacts(&PRIMARY).collect();
    if severity.is_elevated() {
        out.extend(contacts(&SECONDARY));
    }
    if severity.is_critical() {
        out.extend(contacts(&MEDIA));
    }
    out
}

pub fn template_for(alert_type: &str, severity: &Severity) -> Option<&'static str> {
    TEMPLATES
        .iter()
        .find(|(t, s, _)| *t == alert_type && *s == severity.as_str())
        .map(|(_, _, text)| *text)
}

/// Template text with the location filled in, or the generic fallback.
pub fn default_message(alert_type: &str, severity: &Severity, location: &str) -> String {
    match template_for(alert_type, severity) {
        Some(t) => t.replace(LOCATION_PLACEHOLDER, location),
        None => format!(
            "{} {} detected at {}. Follow official guidance.",
            severity.as_str().to_uppercase(),
            alert_type,
            location
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_grow_with_severity() {
        assert_eq!(recipients_for(&Severity::Info).len(), 3);
        assert_eq!(recipients_for(&Severity::Advisory).len(), 3);
        assert_eq!(recipients_for(&Severity::Warning).len(), 6);
        let critical = recipients_for(&Severity::Critical);
        assert_eq!(critical.len(), 8);
        assert_eq!(critical[7].email, "newsroom@localnews.com");
    }

    #[test]
    fn media_tier_is_critical_only() {
        let media = |s: &Severity| {
            recipients_for(s)
                .iter()
                .filter(|c| MEDIA.iter().any(|(_, _, email)| *email == c.email))
                .count()
        };
        assert!(Severity::Warning.is_elevated());
        assert_eq!(media(&Severity::Warning), 0);
        assert_eq!(media(&Severity::Critical), 2);
    }

    #[test]
    fn template_fills_location() {
        let m = default_message("tsunami", &Severity::from("watch"), "Harbor Bay");
        assert!(m.starts_with("TSUNAMI WATCH issued for Harbor Bay."));
    }

    #[test]
    fn fallback_message_for_unknown_pair() {
        let m = default_message("algal_bloom", &Severity::Warning, "North Pier");
        assert_eq!(m, "WARNING algal_bloom detected at North Pier. Follow official guidance.");
    }
}
