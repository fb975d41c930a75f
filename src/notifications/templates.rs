use serde_json::json;

use super::NotificationContent;
use crate::care::{Reminder, ReminderType};

/// Device notification bodies are cut to this many characters.
pub const MAX_BODY_CHARS: usize = 120;

pub struct NotificationTemplates;

impl NotificationTemplates {
    /// Title for a reminder, unless the reminder carries its own.
    pub fn reminder_title(reminder_type: ReminderType, plant_name: &str) -> String {
        match reminder_type {
            ReminderType::Watering => format!("💧 Time to water {}", plant_name),
            ReminderType::Nutrients => format!("🌱 {} needs nutrients", plant_name),
            ReminderType::Inspection => format!("🔍 Check on {}", plant_name),
            ReminderType::Other => format!("🪴 Reminder for {}", plant_name),
        }
    }

    pub fn reminder_body(reminder: &Reminder, plant_name: &str) -> String {
        let text = match reminder.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => description.to_string(),
            _ => match reminder.reminder_type {
                ReminderType::Watering => format!("{} is due for watering.", plant_name),
                ReminderType::Nutrients => format!("Feed {} its scheduled nutrients.", plant_name),
                ReminderType::Inspection => {
                    format!("Take a look at {} for pests and new growth.", plant_name)
                }
                ReminderType::Other => format!("You have a care task for {}.", plant_name),
            },
        };
        truncate_chars(&text, MAX_BODY_CHARS)
    }

    /// Full notification for a reminder, tagged with ids for deep-linking.
    pub fn reminder(reminder: &Reminder, plant_name: &str) -> NotificationContent {
        let title = match reminder.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => Self::reminder_title(reminder.reminder_type, plant_name),
        };
        NotificationContent {
            title,
            body: Self::reminder_body(reminder, plant_name),
            data: json!({
                "reminder_id": reminder.id,
                "plant_id": reminder.plant_id,
                "type": reminder.reminder_type.as_str(),
            }),
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::care::testing::{plant, reminder_for};
    use chrono::Utc;

    #[test]
    fn default_title_depends_on_type() {
        assert_eq!(
            NotificationTemplates::reminder_title(ReminderType::Watering, "Basil"),
            "💧 Time to water Basil"
        );
        assert!(NotificationTemplates::reminder_title(ReminderType::Inspection, "Fern").contains("Fern"));
    }

    #[test]
    fn custom_title_and_description_win() {
        let p = plant("Basil");
        let mut r = reminder_for(&p, Utc::now());
        r.title = Some("Water the basil".into());
        r.description = Some("Use rain water".into());

        let content = NotificationTemplates::reminder(&r, &p.name);
        assert_eq!(content.title, "Water the basil");
        assert_eq!(content.body, "Use rain water");
        assert_eq!(content.data["type"], "watering");
        assert_eq!(content.data["reminder_id"], json!(r.id));
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundaries() {
        let p = plant("Basil");
        let mut r = reminder_for(&p, Utc::now());
        r.description = Some("🌿".repeat(200));

        let body = NotificationTemplates::reminder_body(&r, &p.name);
        assert_eq!(body.chars().count(), MAX_BODY_CHARS);
        assert!(body.ends_with("..."));
    }
}
