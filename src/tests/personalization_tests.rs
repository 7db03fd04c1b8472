//! tests/personalization_tests.rs

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::models::automation_model::MessageToPersonalize;
    use crate::services::personalization_service::{
        build_prompt, guidance_for, parse_response, PersonalizationService,
    };
    use crate::tests::fakes::FakeGenerator;

    fn msg(text: &str) -> MessageToPersonalize {
        MessageToPersonalize {
            message: text.to_string(),
            kind: "email".to_string(),
            subject: None,
        }
    }

    #[test]
    fn test_guia_por_segmento() {
        let parents = guidance_for("New_Parents");
        assert_eq!(parents.len(), 1);
        assert!(parents[0].contains("reassuring"));

        // Dos reglas coinciden
        assert_eq!(guidance_for("vip_budget_shoppers").len(), 2);

        let fallback = guidance_for("all_users");
        assert_eq!(fallback, vec!["Keep the brand voice: warm, supportive, trustworthy."]);
    }

    #[test]
    fn test_prompt_incluye_entradas_y_formato() {
        let mut with_subject = msg("Your cart misses you");
        with_subject.subject = Some("Come back".to_string());
        let prompt = build_prompt(&[with_subject, msg("Second")], "new_parents");

        assert!(prompt.contains("\"new_parents\""));
        assert!(prompt.contains("Return exactly 2 messages"));
        assert!(prompt.contains("INPUT 1 (type: email, subject: \"Come back\"):\nYour cart misses you"));
        assert!(prompt.contains("INPUT 2 (type: email):\nSecond"));
        assert!(prompt.contains("{{ ... }}"));
    }

    #[test]
    fn test_parse_respuesta_correcta() {
        let originals = [msg("one"), msg("two")];
        let response = "MESSAGE 1:\nFirst, improved\n\n**MESSAGE 2:**\nSecond, improved\n";

        assert_eq!(
            parse_response(response, &originals),
            vec!["First, improved".to_string(), "Second, improved".to_string()]
        );
    }

    #[test]
    fn test_parse_conserva_cantidad_si_no_coincide() {
        let originals = [msg("one"), msg("two"), msg("three")];

        for response in ["", "Sorry, I can't help.", "MESSAGE 1: only one", "MESSAGE 1: a\nMESSAGE 2: b\nMESSAGE 3: c\nMESSAGE 4: d"] {
            let parsed = parse_response(response, &originals);
            assert_eq!(parsed, vec!["one", "two", "three"]);
        }
    }

    #[test]
    fn test_parse_respeta_placeholders_liquid() {
        let originals = [
            msg("Hi {{${first_name}}}, your cart awaits"),
            msg("{% if vip %}Thanks{% endif %} for shopping"),
            msg("Plain text"),
        ];
        let response = "MESSAGE 1:\nHello friend, your cart awaits\n\
                        MESSAGE 2:\n{% if vip %}Thank you{% endif %} for shopping with us\n\
                        MESSAGE 3:\n";

        let parsed = parse_response(response, &originals);
        // 1 perdió el placeholder y 3 vino vacío: se conservan los originales
        assert_eq!(parsed[0], "Hi {{${first_name}}}, your cart awaits");
        assert_eq!(parsed[1], "{% if vip %}Thank you{% endif %} for shopping with us");
        assert_eq!(parsed[2], "Plain text");
    }

    #[actix_rt::test]
    async fn test_personalize_sin_mensajes_no_llama_al_modelo() {
        let generator = Arc::new(FakeGenerator::replying("MESSAGE 1: x"));
        let svc = PersonalizationService::new(generator.clone());

        let out = svc.personalize(&[], "vip").await.unwrap();

        assert!(out.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[actix_rt::test]
    async fn test_personalize_una_llamada_por_lote() {
        let generator = Arc::new(FakeGenerator::replying("MESSAGE 1:\nA!\nMESSAGE 2:\nB!"));
        let svc = PersonalizationService::new(generator.clone());

        let out = svc.personalize(&[msg("A"), msg("B")], "eco_friendly").await.unwrap();

        assert_eq!(out, vec!["A!", "B!"]);
        assert_eq!(generator.calls(), 1);
        assert!(generator.prompts.lock().unwrap()[0].contains("sustainability"));
    }

    #[actix_rt::test]
    async fn test_personalize_propaga_error_del_modelo() {
        let svc = PersonalizationService::new(Arc::new(FakeGenerator::failing("quota exceeded")));

        let err = svc.personalize(&[msg("A")], "vip").await.unwrap_err();

        assert!(format!("{:#}", err).contains("quota exceeded"));
    }
}
