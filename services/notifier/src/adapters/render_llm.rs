//! services/notifier/src/adapters/render_llm.rs
//!
//! This module contains the AI-written e-mail adapter. It implements the
//! `ContentRenderer` port using an OpenAI-compatible chat model for the body,
//! and falls back to the fixed template whenever the model is unavailable.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use compliance_core::{
    domain::{EntitySnapshot, NotificationItem, RenderedEmail},
    ports::{ContentRenderer, PortError, PortResult},
};
use tracing::warn;

use crate::adapters::template::TemplateRenderer;

const SYSTEM_PROMPT: &str = "Tu es une intelligence artificielle qui rédige des e-mails en \
français pour le suivi des échéances réglementaires d'une PME de travaux publics : contrôles \
techniques des véhicules, visites médicales et habilitations du personnel. Rédige un e-mail \
de rappel clair et professionnel destiné au responsable concerné. Reprends exactement les \
dates fournies, signale explicitement les échéances urgentes, et termine par la signature \
'Agent Artificiel de Surveillance'. Réponds uniquement avec le corps de l'e-mail, sans objet.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContentRenderer` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiRenderer {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiRenderer {
    /// Creates a new `OpenAiRenderer`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// The facts handed to the model.
    fn prompt(snapshot: &EntitySnapshot, items: &[NotificationItem]) -> String {
        format!(
            "Informations :\n{}\n\nÉchéances :\n{}",
            TemplateRenderer::entity_block(snapshot),
            TemplateRenderer::item_lines(items)
        )
    }

    async fn write_body(
        &self,
        snapshot: &EntitySnapshot,
        items: &[NotificationItem],
    ) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Render(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(Self::prompt(snapshot, items))
                .build()
                .map_err(|e| PortError::Render(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Render(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Render(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| PortError::Render("Renderer LLM returned no text content.".to_string()))
    }
}

//=========================================================================================
// `ContentRenderer` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentRenderer for OpenAiRenderer {
    /// The subject always comes from the template so that urgency prefixes
    /// stay predictable; only the body is written by the model.
    async fn render(
        &self,
        snapshot: &EntitySnapshot,
        items: &[NotificationItem],
    ) -> PortResult<RenderedEmail> {
        let subject = TemplateRenderer::subject(snapshot, items);
        let body = match self.write_body(snapshot, items).await {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    entity = %snapshot.display_name(),
                    error = %e,
                    "AI renderer unavailable; using the template body"
                );
                TemplateRenderer::body(snapshot, items)
            }
        };
        Ok(RenderedEmail { subject, body })
    }
}
