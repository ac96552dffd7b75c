//! services/notifier/src/adapters/template.rs
//!
//! The default content renderer: a fixed French plain-text template. It never
//! performs I/O and never fails.

use async_trait::async_trait;
use compliance_core::domain::{EntitySnapshot, NotificationItem, RenderedEmail};
use compliance_core::ports::{ContentRenderer, PortResult};
use compliance_core::schema::label_for;

const SIGNATURE: &str = "Agent Artificiel de Surveillance";

/// Renders reminder e-mails from a fixed template.
#[derive(Clone, Debug, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn subject(snapshot: &EntitySnapshot, items: &[NotificationItem]) -> String {
        let prefix = if items.iter().any(NotificationItem::is_urgent) {
            "URGENT - RAPPEL"
        } else {
            "Rappel"
        };
        format!("{} - {}", prefix, snapshot.display_name())
    }

    /// The entity block: one line per display field, then the comment.
    pub fn entity_block(snapshot: &EntitySnapshot) -> String {
        let mut lines: Vec<String> = snapshot
            .display
            .iter()
            .map(|(field, value)| {
                let value = value.as_deref().unwrap_or("N/A");
                format!("- {}: {}", label_for(field), value)
            })
            .collect();
        lines.push(format!(
            "- Commentaire: {}",
            snapshot.comment.as_deref().unwrap_or("Aucun commentaire")
        ));
        lines.join("\n")
    }

    pub fn item_lines(items: &[NotificationItem]) -> String {
        items
            .iter()
            .map(|item| {
                let flag = if item.is_urgent() { "🚨 URGENT " } else { "" };
                format!(
                    "- {}{} prévu pour le {} : {}",
                    flag,
                    item.label,
                    item.due_date.format("%d/%m/%Y"),
                    item.message
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn body(snapshot: &EntitySnapshot, items: &[NotificationItem]) -> String {
        let entity = Self::entity_block(snapshot);
        let notifications = Self::item_lines(items);

        if items.iter().any(NotificationItem::is_urgent) {
            format!(
                "🚨🚨🚨 ALERTE URGENTE 🚨🚨🚨\n\n\
                 Bonjour,\n\n\
                 ⚠️ ACTION IMMÉDIATE REQUISE ⚠️\n\n\
                 {entity}\n\n\
                 🔴 NOTIFICATIONS URGENTES :\n\
                 {notifications}\n\n\
                 🚫 ACTION REQUISE IMMÉDIATEMENT :\n\
                 - PRENDRE CONTACT AVEC LA PERSONNE OU LE SERVICE CONCERNÉ\n\
                 - PLANIFIER LA FORMATION, LA VISITE OU LE CONTRÔLE NÉCESSAIRE\n\
                 - CONFIRMER LA PLANIFICATION PAR RETOUR DE MAIL\n\n\
                 ⚖️ RISQUES LÉGAUX ET DE SÉCURITÉ :\n\
                 - Non-conformité avec les obligations légales\n\
                 - Risques pour la sécurité des personnes et de l'entreprise\n\n\
                 Merci de confirmer la réception et la planification par retour de mail.\n\n\
                 URGENT - {SIGNATURE}"
            )
        } else {
            format!(
                "Bonjour,\n\n\
                 {entity}\n\n\
                 Notifications :\n\
                 {notifications}\n\n\
                 Merci de planifier les actions nécessaires.\n\n\
                 Cordialement,\n\n\
                 {SIGNATURE}"
            )
        }
    }
}

#[async_trait]
impl ContentRenderer for TemplateRenderer {
    async fn render(
        &self,
        snapshot: &EntitySnapshot,
        items: &[NotificationItem],
    ) -> PortResult<RenderedEmail> {
        Ok(RenderedEmail {
            subject: Self::subject(snapshot, items),
            body: Self::body(snapshot, items),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use compliance_core::domain::TrackedField;

    fn snapshot(prenom: Option<&str>, comment: Option<&str>) -> EntitySnapshot {
        EntitySnapshot {
            table: "collaborateurs".into(),
            id: 1,
            display: vec![
                ("nom".into(), Some("Dupont".into())),
                ("prenom".into(), prenom.map(str::to_string)),
            ],
            comment: comment.map(str::to_string),
        }
    }

    fn item(days: i64) -> NotificationItem {
        let today = NaiveDate::from_ymd_opt(2025, 7, 10).unwrap();
        NotificationItem::new(
            &TrackedField::new("visite_med", "Visite médicale"),
            today + chrono::Duration::days(days),
            days,
            None,
        )
    }

    #[tokio::test]
    async fn regular_reminder() {
        let email = TemplateRenderer::new()
            .render(&snapshot(Some("Jean"), None), &[item(10)])
            .await
            .unwrap();
        assert_eq!(email.subject, "Rappel - Dupont Jean");
        assert!(email.body.starts_with("Bonjour,"));
        let line = "- Visite médicale prévu pour le 20/07/2025 : \
                    Visite médicale à renouveler dans 10 jours";
        assert!(email.body.contains(line));
        assert!(email.body.contains("- Commentaire: Aucun commentaire"));
        assert!(!email.body.contains("URGENT"));
    }

    #[tokio::test]
    async fn urgent_reminder_uses_alert_layout() {
        let email = TemplateRenderer::new()
            .render(&snapshot(None, Some("En arrêt maladie")), &[item(3), item(12)])
            .await
            .unwrap();
        assert_eq!(email.subject, "URGENT - RAPPEL - Dupont");
        assert!(email.body.starts_with("🚨🚨🚨 ALERTE URGENTE"));
        assert!(email.body.contains("- 🚨 URGENT Visite médicale prévu pour le 13/07/2025"));
        assert!(email.body.contains("- Prenom: N/A"));
        assert!(email.body.contains("- Commentaire: En arrêt maladie"));
    }
}
