//! tests/orchestration_tests.rs
//! Flujo completo personalizar -> desplegar -> programar contra fakes.

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use chrono::{Duration, TimeZone, Utc};

    use crate::error::status_for;
    use crate::models::automation_model::{
        DeploymentRecordStatus, DeploymentStatus, OrchestrationOutcome, OrchestrationPhase,
        RollbackStatus, ScheduleStatus, StageErrorKind,
    };
    use crate::services::pacing::RequestPacer;
    use crate::tests::fakes::{email_canvas, harness, harness_with, FakeGenerator, FakePlatform};

    const CART: &str = "You left items in your cart";
    const HELP: &str = "MESSAGE 1: We're here to help with your cart";

    fn segments(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[actix_rt::test]
    async fn test_escenario_completo_un_segmento() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)),
            FakeGenerator::replying(HELP),
        );
        let when = Utc.with_ymd_and_hms(2030, 1, 15, 9, 30, 0).unwrap();

        let result = h
            .service
            .personalize_and_deploy_canvas("c1", &segments(&["new_parents"]), Some(when))
            .await
            .unwrap();

        assert_eq!(result.status, OrchestrationOutcome::Success);
        assert_eq!(result.canvas_name, "Cart Abandonment");
        assert!(result.errors.is_empty());
        assert!(result.duration >= 0);

        assert_eq!(result.deployment.total_content_blocks, 1);
        assert_eq!(result.deployment.successful_blocks, 1);
        let block = &result.deployment.content_blocks[0];
        assert_eq!(block.status, DeploymentStatus::Success);
        assert_eq!(block.content_block_name, "c1_s1_email_body_new_parents");

        assert_eq!(result.campaigns.successful, 1);
        let schedule = &result.campaigns.schedules[0];
        assert_eq!(schedule.status, ScheduleStatus::Scheduled);
        assert_eq!(schedule.schedule_time, when);

        // Lo que recibió Braze
        let blocks = h.platform.block_requests.lock().unwrap();
        assert_eq!(blocks[0].content, "We're here to help with your cart");
        let schedules = h.platform.schedule_requests.lock().unwrap();
        let props = &schedules[0].canvas_entry_properties;
        assert_eq!(schedules[0].schedule.time, when.to_rfc3339());
        assert_eq!(props["segment"], "new_parents");
        assert_eq!(props["orchestration_id"], result.orchestration_id.as_str());
        assert_eq!(
            props["content_blocks"]["s1_email_body"],
            "c1_s1_email_body_new_parents"
        );

        // Estado y registro finales
        let status = h
            .service
            .get_orchestration_status(&result.orchestration_id)
            .unwrap();
        assert_eq!(status.status, OrchestrationPhase::Completed);
        assert!(status.status.is_terminal());
        assert_eq!(status.progress.total_steps, 5);
        assert_eq!(status.progress.completed_steps, 5);
        assert_eq!(status.progress.percentage, 100);
        assert_eq!(status.results.as_ref(), Some(&result));

        let record = h.ledger.record(&result.orchestration_id).unwrap();
        assert_eq!(record.status, DeploymentRecordStatus::Completed);
        assert!(record.completed_at.is_some());
        assert_eq!(record.summary.scheduled_campaigns, 1);
        assert_eq!(h.generator.calls(), 1);
    }

    #[actix_rt::test]
    async fn test_tres_segmentos_resultado_parcial() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART))
                .failing_blocks_for("beta")
                .failing_schedules_for("gamma"),
            FakeGenerator::replying(HELP),
        );

        let result = h
            .service
            .personalize_and_deploy_canvas("c1", &segments(&["alpha", "beta", "gamma"]), None)
            .await
            .unwrap();

        assert_eq!(result.status, OrchestrationOutcome::Partial);
        assert!(result.errors.len() >= 2);
        assert_eq!(result.campaigns.successful, 1);
        assert_eq!(result.campaigns.failed, 2);
        assert_eq!(result.campaigns.total_scheduled, 3);
        assert_eq!(result.deployment.successful_blocks, 2);
        assert_eq!(result.deployment.failed_blocks, 1);

        let kinds: Vec<(StageErrorKind, Option<&str>)> = result
            .errors
            .iter()
            .map(|e| (e.kind, e.segment.as_deref()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (StageErrorKind::Deployment, Some("beta")),
                (StageErrorKind::Scheduling, Some("gamma")),
            ]
        );

        // beta no se programa; gamma se intenta y falla
        assert_eq!(h.platform.schedule_calls(), 2);
        let beta = &result.campaigns.schedules[1];
        assert_eq!(beta.status, ScheduleStatus::Failed);
        assert!(beta.error.as_deref().unwrap_or_default().starts_with("Skipped"));

        // Envío por defecto: ahora + offset
        let alpha = &result.campaigns.schedules[0];
        assert!(alpha.schedule_time > Utc::now() + Duration::seconds(200));

        let record = h.ledger.record(&result.orchestration_id).unwrap();
        assert_eq!(record.status, DeploymentRecordStatus::Partial);
        assert_eq!(record.content_blocks.len(), 3);
        assert_eq!(record.campaign_schedules.len(), 3);
    }

    #[actix_rt::test]
    async fn test_falla_del_modelo_usa_originales() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)),
            FakeGenerator::failing("quota exceeded"),
        );

        let result = h
            .service
            .personalize_and_deploy_canvas("c1", &segments(&["vip", "lapsed"]), None)
            .await
            .unwrap();

        assert_eq!(result.status, OrchestrationOutcome::Partial);
        assert_eq!(result.errors.len(), 2);
        assert!(result
            .errors
            .iter()
            .all(|e| e.kind == StageErrorKind::Personalization));
        assert!(result.errors[0].message.starts_with("Step s1:"));
        assert_eq!(result.campaigns.successful, 2);

        let blocks = h.platform.block_requests.lock().unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.content == CART));
    }

    #[actix_rt::test]
    async fn test_todo_falla_resultado_fallido() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)).failing_blocks_for("vip"),
            FakeGenerator::replying(HELP),
        );

        let result = h
            .service
            .personalize_and_deploy_canvas("c1", &segments(&["vip"]), None)
            .await
            .unwrap();

        assert_eq!(result.status, OrchestrationOutcome::Failed);
        let status = h
            .service
            .get_orchestration_status(&result.orchestration_id)
            .unwrap();
        assert_eq!(status.status, OrchestrationPhase::Failed);
        assert_eq!(
            h.ledger.record(&result.orchestration_id).map(|r| r.status),
            Some(DeploymentRecordStatus::Failed)
        );
    }

    #[actix_rt::test]
    async fn test_canvas_inexistente_corta_la_corrida() {
        let h = harness(FakePlatform::without_canvas(), FakeGenerator::replying(HELP));

        let err = h
            .service
            .personalize_and_deploy_canvas("missing", &segments(&["vip"]), None)
            .await
            .unwrap_err();

        assert_eq!(status_for(&err), StatusCode::NOT_FOUND);
        assert_eq!(h.platform.block_calls(), 0);
        assert_eq!(h.generator.calls(), 0);

        let records = h.service.get_all_orchestrations();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, DeploymentRecordStatus::Failed);

        let status = h.service.get_orchestration_status(&records[0].id).unwrap();
        assert_eq!(status.status, OrchestrationPhase::Failed);
        assert_eq!(status.error.as_deref(), Some("Braze: Canvas not found"));
    }

    #[actix_rt::test]
    async fn test_validacion_antes_de_llamar_afuera() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)),
            FakeGenerator::replying(HELP),
        );

        for (canvas_id, segs) in [
            ("", segments(&["vip"])),
            ("c1", Vec::new()),
            ("c1", segments(&["vip", " "])),
        ] {
            let err = h
                .service
                .personalize_and_deploy_canvas(canvas_id, &segs, None)
                .await
                .unwrap_err();
            assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);
        }

        assert!(h.service.get_all_orchestrations().is_empty());
        assert_eq!(h.generator.calls(), 0);
    }

    #[actix_rt::test]
    async fn test_preview_sin_efectos() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)),
            FakeGenerator::replying(HELP),
        );

        let preview = h
            .service
            .preview_personalization("c1", "new_parents")
            .await
            .unwrap();

        assert_eq!(preview.steps.len(), 1);
        let m = &preview.steps[0].messages[0];
        assert_eq!(m.original_message, CART);
        assert_eq!(m.personalized_message, "We're here to help with your cart");
        assert_eq!(m.channel, "email");
        assert_eq!(m.field, "body");
        assert!(!preview.steps[0].fallback);
        assert!(preview.steps[0].error.is_none());

        assert_eq!(h.platform.block_calls(), 0);
        assert_eq!(h.platform.schedule_calls(), 0);
        assert!(h.ledger.content_blocks().is_empty());
        assert!(h.ledger.schedules().is_empty());
        assert!(h.service.get_all_orchestrations().is_empty());

        let err = h.service.preview_personalization("c1", "").await.unwrap_err();
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_preview_con_modelo_caido_devuelve_originales() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)),
            FakeGenerator::failing("timeout"),
        );

        let preview = h.service.preview_personalization("c1", "vip").await.unwrap();

        let step = &preview.steps[0];
        assert_eq!(step.messages[0].personalized_message, CART);
        assert!(step.fallback);
        assert!(step.error.as_deref().unwrap_or_default().contains("timeout"));

        // Respuesta sin el formato esperado: se muestran los originales, sin error
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)),
            FakeGenerator::replying("no entiendo"),
        );
        let preview = h.service.preview_personalization("c1", "vip").await.unwrap();
        assert!(preview.steps[0].fallback);
        assert!(preview.steps[0].error.is_none());
    }

    #[actix_rt::test]
    async fn test_consultas_por_canvas() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)),
            FakeGenerator::replying(HELP),
        );

        h.service
            .personalize_and_deploy_canvas("c1", &segments(&["vip"]), None)
            .await
            .unwrap();
        h.service
            .personalize_and_deploy_canvas("c2", &segments(&["vip"]), None)
            .await
            .unwrap();

        assert_eq!(h.service.get_all_orchestrations().len(), 2);
        let c2 = h.service.get_orchestrations_by_canvas_id("c2");
        assert_eq!(c2.len(), 1);
        assert_eq!(c2[0].canvas_id, "c2");

        let err = h.service.get_orchestration_status("nope").unwrap_err();
        assert_eq!(status_for(&err), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_rollback_cancela_envios_programados() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)).failing_blocks_for("beta"),
            FakeGenerator::replying(HELP),
        );
        let result = h
            .service
            .personalize_and_deploy_canvas("c1", &segments(&["alpha", "beta", "gamma"]), None)
            .await
            .unwrap();

        let rollback = h
            .service
            .rollback_deployment(&result.orchestration_id)
            .await
            .unwrap();

        assert_eq!(rollback.status, RollbackStatus::RolledBack);
        assert_eq!(rollback.cancelled_campaigns, 2);
        assert_eq!(rollback.failed_cancellations, 0);
        assert!(rollback.note.contains("Content blocks remain"));
        assert_eq!(h.platform.delete_calls(), 2);

        let record = h.ledger.record(&result.orchestration_id).unwrap();
        assert_eq!(record.status, DeploymentRecordStatus::RolledBack);
        assert_eq!(record.summary.scheduled_campaigns, 0);
        let cancelled = record
            .campaign_schedules
            .iter()
            .filter(|s| s.status == ScheduleStatus::Cancelled)
            .count();
        assert_eq!(cancelled, 2);
        // Los content blocks siguen ahí
        assert_eq!(record.summary.successful_blocks, 2);
        assert_eq!(h.ledger.content_blocks().len(), 3);
        // El índice de envíos ya no tiene los cancelados
        assert!(h
            .ledger
            .schedules()
            .iter()
            .all(|s| s.status != ScheduleStatus::Scheduled));
        assert_eq!(h.service.get_schedules().len(), 1);
    }

    #[actix_rt::test]
    async fn test_rollback_parcial_y_desconocido() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)).failing_deletes(),
            FakeGenerator::replying(HELP),
        );
        let result = h
            .service
            .personalize_and_deploy_canvas("c1", &segments(&["vip"]), None)
            .await
            .unwrap();

        let rollback = h
            .service
            .rollback_deployment(&result.orchestration_id)
            .await
            .unwrap();
        assert_eq!(rollback.status, RollbackStatus::Partial);
        assert_eq!(rollback.failed_cancellations, 1);
        assert_eq!(
            h.ledger.record(&result.orchestration_id).map(|r| r.status),
            Some(DeploymentRecordStatus::Completed)
        );

        let err = h.service.rollback_deployment("unknown").await.unwrap_err();
        assert_eq!(status_for(&err), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_templates_de_email_omite_fallidos() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)).failing_templates_for("beta"),
            FakeGenerator::replying(HELP),
        );
        let result = h
            .service
            .personalize_and_deploy_canvas("c1", &segments(&["alpha", "beta"]), None)
            .await
            .unwrap();

        let templates = h
            .service
            .create_email_templates(&result.orchestration_id, None)
            .await
            .unwrap();

        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].segment, "alpha");
        assert_eq!(templates[0].template_name, "template_c1_s1_email_body_alpha");

        let sent = h.platform.template_requests.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "Personalized Message for alpha");
        assert_eq!(sent[0].body, "{{content_blocks.${c1_s1_email_body_alpha}}}");
        assert_eq!(sent[0].description, "Auto-generated template for alpha");
    }

    #[actix_rt::test]
    async fn test_templates_con_asunto_y_orquestacion_desconocida() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)),
            FakeGenerator::replying(HELP),
        );
        let result = h
            .service
            .personalize_and_deploy_canvas("c1", &segments(&["vip"]), None)
            .await
            .unwrap();

        let templates = h
            .service
            .create_email_templates(&result.orchestration_id, Some("Don't forget"))
            .await
            .unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(
            h.platform.template_requests.lock().unwrap()[0].subject,
            "Don't forget"
        );

        let err = h
            .service
            .create_email_templates("unknown", None)
            .await
            .unwrap_err();
        assert_eq!(status_for(&err), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_corrida_sigue_si_el_llamador_se_cae() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)),
            FakeGenerator::replying(HELP).with_delay(std::time::Duration::from_millis(200)),
        );

        // El llamador abandona a mitad de la corrida
        let dropped = tokio::time::timeout(
            std::time::Duration::from_millis(300),
            h.service
                .run_detached("c1".to_string(), segments(&["alpha", "beta"]), None),
        )
        .await;
        assert!(dropped.is_err());

        let mut finished = None;
        for _ in 0..60 {
            if let Some(record) = h.ledger.records().first() {
                let status = h.service.get_orchestration_status(&record.id).unwrap();
                if status.status.is_terminal() {
                    finished = Some(status);
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        let status = finished.expect("la corrida nunca terminó");
        assert_eq!(status.status, OrchestrationPhase::Completed);
        let record = h.ledger.record(&status.id).unwrap();
        assert_eq!(record.status, DeploymentRecordStatus::Completed);
        assert_eq!(record.summary.scheduled_campaigns, 2);

        let rollback = h.service.rollback_deployment(&status.id).await.unwrap();
        assert_eq!(rollback.status, RollbackStatus::RolledBack);
        assert_eq!(h.platform.delete_calls(), 2);
    }

    #[actix_rt::test]
    async fn test_run_detached_devuelve_el_resultado() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)),
            FakeGenerator::replying(HELP),
        );
        let result = h
            .service
            .run_detached("c1".to_string(), segments(&["vip"]), None)
            .await
            .unwrap();
        assert_eq!(result.status, OrchestrationOutcome::Success);

        let err = h
            .service
            .run_detached("c1".to_string(), Vec::new(), None)
            .await
            .unwrap_err();
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_desfase_enorme_no_rompe_la_corrida() {
        let h = harness_with(
            FakePlatform::with_canvas(email_canvas(CART)),
            FakeGenerator::replying(HELP),
            RequestPacer::disabled(),
            std::time::Duration::from_secs(u64::MAX),
        );
        let before = Utc::now();

        let result = h
            .service
            .personalize_and_deploy_canvas("c1", &segments(&["vip"]), None)
            .await
            .unwrap();

        assert_eq!(result.status, OrchestrationOutcome::Success);
        let schedule = &h.ledger.schedules()[0];
        assert!(schedule.schedule_time > before);
        assert!(schedule.schedule_time <= before + Duration::days(91));
    }

    #[actix_rt::test]
    async fn test_consulta_de_content_blocks() {
        let h = harness(
            FakePlatform::with_canvas(email_canvas(CART)),
            FakeGenerator::replying(HELP),
        );
        h.service
            .personalize_and_deploy_canvas("c1", &segments(&["alpha", "beta"]), None)
            .await
            .unwrap();
        h.service
            .personalize_and_deploy_canvas("c2", &segments(&["alpha"]), None)
            .await
            .unwrap();

        let block = h.service.get_content_block("c1", "s1", "beta").unwrap();
        assert_eq!(block.content_block_name, "c1_s1_email_body_beta");
        assert_eq!(block.status, DeploymentStatus::Success);

        assert_eq!(h.service.get_content_blocks(None).len(), 3);
        let c1 = h.service.get_content_blocks(Some("c1"));
        assert_eq!(c1.len(), 2);
        assert!(c1.iter().all(|b| b.canvas_id == "c1"));
        assert_eq!(h.service.get_schedules().len(), 3);

        let err = h.service.get_content_block("c1", "s1", "gamma").unwrap_err();
        assert_eq!(status_for(&err), StatusCode::NOT_FOUND);
    }
}
