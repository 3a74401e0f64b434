// libs/notification-cell/src/templates.rs
//
// Message templates keyed by therapy name. Unknown therapies fall back to the
// generic wording, so a new catalog entry never breaks notification planning.

use chrono::{DateTime, Utc};

struct TherapyCopy {
    therapy: &'static str,
    pre_procedure: &'static str,
    post_procedure: &'static str,
}

const THERAPY_COPY: &[TherapyCopy] = &[
    TherapyCopy {
        therapy: "physiotherapy",
        pre_procedure: "Wear loose clothing and arrive 10 minutes early so your therapist can review your movement goals.",
        post_procedure: "Mild soreness for 24-48 hours is normal. Keep up the home exercises your therapist assigned.",
    },
    TherapyCopy {
        therapy: "hydrotherapy",
        pre_procedure: "Bring swimwear and a towel. Avoid a heavy meal within two hours of your session.",
        post_procedure: "Drink plenty of water and rest. Avoid strenuous activity for the remainder of the day.",
    },
    TherapyCopy {
        therapy: "massage_therapy",
        pre_procedure: "Stay hydrated before your session and let your therapist know about any tender areas.",
        post_procedure: "Drink water to help flush metabolic waste. A warm bath this evening can ease any tenderness.",
    },
    TherapyCopy {
        therapy: "occupational_therapy",
        pre_procedure: "Bring any splints or aids you currently use so your therapist can check their fit.",
        post_procedure: "Practice the adapted techniques covered today before your next session.",
    },
];

fn copy_for(therapy: &str) -> Option<&'static TherapyCopy> {
    THERAPY_COPY.iter().find(|c| c.therapy == therapy)
}

pub fn confirmation_title(therapy: &str) -> String {
    format!("Your {} appointment is booked", display_name(therapy))
}

pub fn confirmation_message(therapy: &str, start_time: DateTime<Utc>) -> String {
    format!(
        "Your {} session on {} has been scheduled. We look forward to seeing you.",
        display_name(therapy),
        start_time.format("%Y-%m-%d at %H:%M UTC"),
    )
}

pub fn reminder_title(therapy: &str) -> String {
    format!("Upcoming {} session", display_name(therapy))
}

pub fn reminder_message(therapy: &str, start_time: DateTime<Utc>) -> String {
    format!(
        "Reminder: your {} session starts at {}. Please arrive a few minutes early.",
        display_name(therapy),
        start_time.format("%H:%M UTC on %Y-%m-%d"),
    )
}

pub fn pre_procedure_title(therapy: &str) -> String {
    format!("Preparing for your {} session", display_name(therapy))
}

pub fn pre_procedure_message(therapy: &str) -> String {
    match copy_for(therapy) {
        Some(copy) => copy.pre_procedure.to_string(),
        None => "Please arrive a few minutes early and bring any relevant medical records.".to_string(),
    }
}

pub fn post_procedure_title(therapy: &str) -> String {
    format!("After your {} session", display_name(therapy))
}

pub fn post_procedure_message(therapy: &str) -> String {
    match copy_for(therapy) {
        Some(copy) => copy.post_procedure.to_string(),
        None => "Take it easy for the rest of the day and follow any instructions from your practitioner.".to_string(),
    }
}

pub fn cancellation_title(therapy: &str) -> String {
    format!("{} appointment cancelled", display_name(therapy))
}

pub fn cancellation_message(therapy: &str, start_time: DateTime<Utc>, reason: Option<&str>) -> String {
    let base = format!(
        "Your {} session scheduled for {} has been cancelled.",
        display_name(therapy),
        start_time.format("%Y-%m-%d at %H:%M UTC"),
    );
    match reason {
        Some(reason) if !reason.is_empty() => format!("{} Reason: {}", base, reason),
        _ => base,
    }
}

pub fn feedback_request_title() -> String {
    "How was your session?".to_string()
}

pub fn feedback_request_message(therapy: &str) -> String {
    format!(
        "Your {} session is complete. A minute of feedback helps us improve your care.",
        display_name(therapy),
    )
}

pub fn progress_title(therapy: &str) -> String {
    format!("{} progress update", display_name(therapy))
}

pub fn progress_message(therapy: &str, milestone: &str) -> String {
    format!(
        "Great news: you reached the '{}' milestone in your {} plan.",
        milestone,
        display_name(therapy),
    )
}

/// Human form of a snake_case catalog name.
fn display_name(therapy: &str) -> String {
    therapy.replace('_', " ")
}
