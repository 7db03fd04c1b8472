//! services/personalization_service.rs
//! Personaliza un lote de mensajes para un segmento con una sola llamada al LLM.

use anyhow::{Context, Result};
use regex::Regex;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use crate::{models::automation_model::MessageToPersonalize, services::gemini_service::TextGenerator};

/// Guía de tono por palabras clave del nombre del segmento.
const SEGMENT_GUIDANCE: &[(&[&str], &str)] = &[
    (
        &["parent", "baby", "newborn", "expecting"],
        "New parents: use reassuring, supportive language; offer guidance and stress ease of use.",
    ),
    (
        &["women", "woman", "mom", "mother"],
        "Emphasize care, quality, convenience and family values.",
    ),
    (
        &["price", "budget", "deal", "discount", "saver"],
        "Highlight value, savings and smart choices.",
    ),
    (
        &["eco", "green", "sustain"],
        "Mention sustainability and responsible choices, without exaggerated claims.",
    ),
    (
        &["loyal", "vip"],
        "Show appreciation and recognize their loyalty.",
    ),
    (
        &["lapsed", "inactive", "churn", "dormant"],
        "Welcome them back warmly with a low-pressure invitation to return.",
    ),
];

const DEFAULT_GUIDANCE: &str = "Keep the brand voice: warm, supportive, trustworthy.";

fn message_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[\s*#]*MESSAGE\s+\d+\s*:\**").expect("regex válida"))
}

fn liquid_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}").expect("regex válida"))
}

/// Líneas de guía que aplican al segmento; la guía por defecto si ninguna coincide.
pub fn guidance_for(segment: &str) -> Vec<&'static str> {
    let normalized = segment.to_lowercase();
    let matched: Vec<&'static str> = SEGMENT_GUIDANCE
        .iter()
        .filter(|(keywords, _)| keywords.iter().any(|k| normalized.contains(k)))
        .map(|(_, guidance)| *guidance)
        .collect();

    if matched.is_empty() {
        vec![DEFAULT_GUIDANCE]
    } else {
        matched
    }
}

pub fn build_prompt(messages: &[MessageToPersonalize], segment: &str) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are a marketing copy editor personalizing campaign messages for the \"{}\" audience segment.\n",
        segment
    );

    prompt.push_str("SEGMENT GUIDANCE:\n");
    for line in guidance_for(segment) {
        let _ = writeln!(prompt, "- {}", line);
    }

    let _ = write!(
        prompt,
        "\nRULES:\n\
         1. Make at least one meaningful edit to every message, but keep it small: change at most 15 words or 25% of the message length, whichever is smaller.\n\
         2. Preserve every Liquid placeholder ({{{{ ... }}}} and {{% ... %}}), URL, link and HTML markup exactly as written.\n\
         3. Adapt tone and wording to the segment guidance above.\n\
         4. Do not add commentary, explanations or headings.\n\
         5. Return exactly {} messages, in the same order, using this format:\n\
         MESSAGE 1:\n<personalized text>\n\
         MESSAGE 2:\n<personalized text>\n\n\
         INPUT MESSAGES:\n",
        messages.len()
    );

    for (i, msg) in messages.iter().enumerate() {
        match &msg.subject {
            Some(subject) => {
                let _ = writeln!(
                    prompt,
                    "INPUT {} (type: {}, subject: \"{}\"):\n{}\n",
                    i + 1,
                    msg.kind,
                    subject,
                    msg.message
                );
            }
            None => {
                let _ = writeln!(prompt, "INPUT {} (type: {}):\n{}\n", i + 1, msg.kind, msg.message);
            }
        }
    }

    prompt
}

/// Separa la respuesta en bloques `MESSAGE n:`. Si no hay exactamente un bloque
/// por mensaje de entrada, devuelve los originales sin tocar.
pub fn parse_response(response: &str, originals: &[MessageToPersonalize]) -> Vec<String> {
    let markers: Vec<_> = message_marker().find_iter(response).collect();

    let blocks: Vec<&str> = markers
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let end = markers
                .get(i + 1)
                .map(|next| next.start())
                .unwrap_or(response.len());
            response[m.end()..end].trim()
        })
        .collect();

    if blocks.len() != originals.len() {
        log::warn!(
            "(parse_response) Se esperaban {} mensajes y llegaron {}; se usan los originales",
            originals.len(),
            blocks.len()
        );
        return originals.iter().map(|m| m.message.clone()).collect();
    }

    blocks
        .into_iter()
        .zip(originals)
        .map(|(block, original)| {
            if block.is_empty() || !keeps_placeholders(&original.message, block) {
                log::warn!("(parse_response) Bloque vacío o sin placeholders Liquid; se conserva el original");
                original.message.clone()
            } else {
                block.to_string()
            }
        })
        .collect()
}

fn keeps_placeholders(original: &str, personalized: &str) -> bool {
    liquid_placeholder()
        .find_iter(original)
        .all(|p| personalized.contains(p.as_str()))
}

#[derive(Clone)]
pub struct PersonalizationService {
    generator: Arc<dyn TextGenerator>,
}

impl PersonalizationService {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Devuelve un texto por mensaje, en el mismo orden. Errores del LLM se
    /// propagan; el llamador decide el fallback.
    pub async fn personalize(
        &self,
        messages: &[MessageToPersonalize],
        segment: &str,
    ) -> Result<Vec<String>> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        log::info!(
            "(personalize) Personalizando {} mensajes para segmento '{}'",
            messages.len(),
            segment
        );

        let prompt = build_prompt(messages, segment);
        let response = self
            .generator
            .generate_content(&prompt)
            .await
            .with_context(|| format!("Personalización falló para segmento '{}'", segment))?;

        Ok(parse_response(&response, messages))
    }
}
