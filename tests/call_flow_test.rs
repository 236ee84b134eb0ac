//! IVR call flow scenarios driven through the call flow service

mod common;

use callflow::application::{CallFlowService, CallbackRoute, DeliveryReport};
use callflow::domain::call::value_object::{CallPhase, RejectReason};
use callflow::domain::shared::error::DomainError;
use callflow::domain::shared::value_objects::{CorrelationId, Identifier};
use callflow::infrastructure::events::{decode_cloud_events, decode_event_grid};
use common::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::sync::Arc;

const CALLER: &str = "+14255550100";
const CALL: (&str, &str, &str) = ("corr-1", "conn-1", "server-corr-1");

async fn admit(service: &CallFlowService, correlation_id: &str, context: &str, caller: &str) {
    let decoded = decode_event_grid(&batch(&[incoming_call_event(correlation_id, context, caller)]));
    assert!(decoded.errors.is_empty());
    let report = service.handle_events(decoded.events, &CallbackRoute::Shared).await;
    assert_eq!(report.failed, 0);
}

async fn deliver(service: &CallFlowService, route: &CallbackRoute, entries: &[Value]) -> DeliveryReport {
    let decoded = decode_cloud_events(&batch(entries));
    assert!(decoded.errors.is_empty(), "{:?}", decoded.errors);
    service.handle_events(decoded.events, route).await
}

async fn phase(service: &CallFlowService, correlation_id: &str) -> Option<CallPhase> {
    let handle = service.store().get(&CorrelationId::new(correlation_id)).await?;
    let session = handle.lock().await;
    Some(session.phase())
}

fn per_call_route(caller: &str) -> CallbackRoute {
    CallbackRoute::PerCall {
        context_id: "7d0f3a52-2f4e-4d7b-9c55-0a3c2e6b9f10".to_string(),
        caller_id: Identifier::from_raw_id(&format!("4:{caller}")),
    }
}

fn recognize(call: &str, caller: &str) -> Command {
    Command::Recognize {
        call: call.to_string(),
        target: format!("4:{caller}"),
        prompt_uri: prompt_uri("MainMenu.wav"),
        initial_silence_secs: 5,
        max_tones: 1,
        interrupt_prompt: true,
    }
}

fn play(call: &str, file: &str) -> Command {
    Command::Play {
        call: call.to_string(),
        prompt_uri: prompt_uri(file),
    }
}

fn stop_recording(server_call_id: &str) -> Command {
    Command::StopRecording {
        recording_id: recording_id_for(server_call_id),
    }
}

fn hang_up(call: &str) -> Command {
    Command::HangUp {
        call: call.to_string(),
        for_everyone: true,
    }
}

/// Admit, answer and connect an inbound call; returns with the call awaiting input
async fn connected_inbound_call(gateway: &FakeGateway, service: &CallFlowService) {
    gateway.on_answer("abc", CALL.0, CALL.1);
    admit(service, CALL.0, "abc", CALLER).await;
    service.answer_call(None).await.unwrap();
    deliver(
        service,
        &per_call_route(CALLER),
        &[call_event("CallConnected", CALL, json!({}))],
    )
    .await;
    assert_eq!(phase(service, CALL.0).await, Some(CallPhase::AwaitingInput));
    gateway.clear();
}

#[tokio::test]
async fn test_inbound_call_confirmed_selection() {
    let gateway = FakeGateway::new();
    let service = service(gateway.clone());
    gateway.on_answer("abc", CALL.0, CALL.1);

    admit(&service, CALL.0, "abc", CALLER).await;
    assert_eq!(phase(&service, CALL.0).await, Some(CallPhase::Offered));

    let answered = service.answer_call(None).await.unwrap();
    assert_eq!(answered.phase, CallPhase::Ringing);
    match &gateway.commands()[..] {
        [Command::AnswerCall {
            context,
            callback_uri,
        }] => {
            assert_eq!(context, "abc");
            assert!(callback_uri.starts_with(&format!("{CALLBACK_BASE}/api/calls/")));
            assert!(callback_uri.ends_with("?callerId=4%3A%2B14255550100"));
        }
        other => panic!("unexpected commands {other:?}"),
    }
    gateway.clear();

    let route = per_call_route(CALLER);
    deliver(&service, &route, &[call_event("CallConnected", CALL, json!({}))]).await;
    assert_eq!(
        gateway.commands(),
        vec![
            Command::StartRecording {
                server_call_id: CALL.2.to_string()
            },
            recognize(CALL.1, CALLER),
        ]
    );
    {
        let handle = service.store().get(&CorrelationId::new(CALL.0)).await.unwrap();
        let session = handle.lock().await;
        assert_eq!(session.phase(), CallPhase::AwaitingInput);
        assert_eq!(
            session.recording_id().map(|id| id.as_str().to_string()),
            Some(recording_id_for(CALL.2))
        );
    }
    gateway.clear();

    deliver(&service, &route, &[recognize_completed(CALL, &["one"])]).await;
    assert_eq!(gateway.commands(), vec![play(CALL.1, "Confirmed.wav")]);
    assert_eq!(phase(&service, CALL.0).await, Some(CallPhase::Responding));
    gateway.clear();

    deliver(&service, &route, &[call_event("PlayCompleted", CALL, json!({}))]).await;
    assert_eq!(
        gateway.commands(),
        vec![stop_recording(CALL.2), hang_up(CALL.1)]
    );

    // Ended calls are evicted and their late events are no-ops
    assert_eq!(phase(&service, CALL.0).await, None);
    assert!(service.store().has_ended(&CorrelationId::new(CALL.0)).await);
    gateway.clear();
    deliver(
        &service,
        &route,
        &[
            call_event("CallDisconnected", CALL, json!({})),
            call_event("PlayCompleted", CALL, json!({})),
        ],
    )
    .await;
    assert!(gateway.commands().is_empty());
}

#[tokio::test]
async fn test_selection_prompts() {
    for (tones, prompt) in [
        (vec!["two"], "Goodbye.wav"),
        (vec!["three"], "Invalid.wav"),
        (vec!["pound"], "Invalid.wav"),
        (vec!["one", "two"], "Invalid.wav"),
        (vec![], "Invalid.wav"),
        (vec!["flash"], "Invalid.wav"),
    ] {
        let gateway = FakeGateway::new();
        let service = service(gateway.clone());
        connected_inbound_call(&gateway, &service).await;

        deliver(
            &service,
            &CallbackRoute::Shared,
            &[recognize_completed(CALL, &tones)],
        )
        .await;
        assert_eq!(gateway.commands(), vec![play(CALL.1, prompt)], "tones {tones:?}");
        assert_eq!(phase(&service, CALL.0).await, Some(CallPhase::Responding));
    }
}

#[tokio::test]
async fn test_silence_timeout_plays_timeout_then_terminates() {
    let gateway = FakeGateway::new();
    let service = service(gateway.clone());
    connected_inbound_call(&gateway, &service).await;

    deliver(&service, &CallbackRoute::Shared, &[recognize_failed(CALL, 8510)]).await;
    assert_eq!(gateway.commands(), vec![play(CALL.1, "Timeout.wav")]);
    gateway.clear();

    deliver(
        &service,
        &CallbackRoute::Shared,
        &[call_event("PlayCompleted", CALL, json!({}))],
    )
    .await;
    assert_eq!(
        gateway.commands(),
        vec![stop_recording(CALL.2), hang_up(CALL.1)]
    );
    assert_eq!(phase(&service, CALL.0).await, None);
}

#[tokio::test]
async fn test_other_recognize_failure_is_unhandled() {
    let gateway = FakeGateway::new();
    let service = service(gateway.clone());
    connected_inbound_call(&gateway, &service).await;

    let report = deliver(&service, &CallbackRoute::Shared, &[recognize_failed(CALL, 8532)]).await;
    assert_eq!(report.failed, 1);
    assert!(gateway.commands().is_empty());
    assert_eq!(phase(&service, CALL.0).await, Some(CallPhase::AwaitingInput));

    let decoded = decode_cloud_events(&batch(&[recognize_failed(CALL, 8508)]));
    let result = service
        .handle_event(decoded.events.into_iter().next().unwrap(), &CallbackRoute::Shared)
        .await;
    assert!(matches!(
        result,
        Err(DomainError::UnhandledEventReason { .. })
    ));
    assert_eq!(phase(&service, CALL.0).await, Some(CallPhase::AwaitingInput));
}

#[tokio::test]
async fn test_play_failed_terminates_like_play_completed() {
    let mut sequences = Vec::new();
    for finished in [call_event("PlayCompleted", CALL, json!({})), play_failed(CALL)] {
        let gateway = FakeGateway::new();
        let service = service(gateway.clone());
        connected_inbound_call(&gateway, &service).await;

        deliver(&service, &CallbackRoute::Shared, &[recognize_completed(CALL, &["two"])]).await;
        gateway.clear();
        deliver(&service, &CallbackRoute::Shared, &[finished]).await;

        assert_eq!(phase(&service, CALL.0).await, None);
        sequences.push(gateway.commands());
    }

    assert_eq!(sequences[0], sequences[1]);
    assert_eq!(sequences[0], vec![stop_recording(CALL.2), hang_up(CALL.1)]);
}

#[tokio::test]
async fn test_failed_recording_stop_still_hangs_up() {
    let gateway = FakeGateway::new();
    let service = service(gateway.clone());
    connected_inbound_call(&gateway, &service).await;
    gateway.fail_stop_recording();

    deliver(&service, &CallbackRoute::Shared, &[recognize_completed(CALL, &["one"])]).await;
    gateway.clear();
    let report = deliver(
        &service,
        &CallbackRoute::Shared,
        &[call_event("PlayCompleted", CALL, json!({}))],
    )
    .await;

    assert_eq!(report.failed, 0);
    assert_eq!(
        gateway.commands(),
        vec![stop_recording(CALL.2), hang_up(CALL.1)]
    );
    assert_eq!(phase(&service, CALL.0).await, None);
}

#[tokio::test]
async fn test_duplicate_events_are_harmless() {
    let gateway = FakeGateway::new();
    let service = service(gateway.clone());
    connected_inbound_call(&gateway, &service).await;

    // A redelivered connect does not start a second recording or recognition
    let report = deliver(
        &service,
        &CallbackRoute::Shared,
        &[call_event("CallConnected", CALL, json!({}))],
    )
    .await;
    assert_eq!(report.failed, 0);
    assert!(gateway.commands().is_empty());

    // Neither does a play event before any prompt was answered
    deliver(
        &service,
        &CallbackRoute::Shared,
        &[call_event("PlayCompleted", CALL, json!({}))],
    )
    .await;
    assert!(gateway.commands().is_empty());
    assert_eq!(phase(&service, CALL.0).await, Some(CallPhase::AwaitingInput));

    // Events the flow does not use are ignored
    deliver(
        &service,
        &CallbackRoute::Shared,
        &[call_event("ParticipantsUpdated", CALL, json!({ "participants": [] }))],
    )
    .await;
    assert!(gateway.commands().is_empty());
}

#[tokio::test]
async fn test_failed_hang_up_waits_for_disconnect() {
    let gateway = FakeGateway::new();
    let service = service(gateway.clone());
    connected_inbound_call(&gateway, &service).await;
    gateway.fail_hang_up(true);

    deliver(&service, &CallbackRoute::Shared, &[recognize_completed(CALL, &["one"])]).await;
    let report = deliver(
        &service,
        &CallbackRoute::Shared,
        &[call_event("PlayCompleted", CALL, json!({}))],
    )
    .await;
    assert_eq!(report.failed, 1);
    assert_eq!(phase(&service, CALL.0).await, Some(CallPhase::Terminating));

    deliver(
        &service,
        &CallbackRoute::Shared,
        &[call_event("CallDisconnected", CALL, json!({}))],
    )
    .await;
    assert_eq!(phase(&service, CALL.0).await, None);
}

#[tokio::test]
async fn test_disconnect_mid_flow_ends_call() {
    let gateway = FakeGateway::new();
    let service = service(gateway.clone());
    connected_inbound_call(&gateway, &service).await;

    deliver(
        &service,
        &CallbackRoute::Shared,
        &[call_event("CallDisconnected", CALL, json!({}))],
    )
    .await;
    assert_eq!(phase(&service, CALL.0).await, None);

    deliver(&service, &CallbackRoute::Shared, &[recognize_completed(CALL, &["one"])]).await;
    assert!(gateway.commands().is_empty());
}

#[tokio::test]
async fn test_outbound_call_listens_to_dialled_number() {
    let gateway = FakeGateway::new();
    let service = service(gateway.clone());
    gateway.on_create("corr-out", "conn-out");

    let summary = service.start_outbound_call().await.unwrap();
    assert_eq!(summary.phase, CallPhase::Ringing);
    assert_eq!(
        gateway.commands(),
        vec![Command::CreateCall {
            target: format!("4:{TARGET_NUMBER}"),
            callback_uri: format!("{CALLBACK_BASE}/api/callbacks"),
        }]
    );
    gateway.clear();

    let call = ("corr-out", "conn-out", "server-out");
    deliver(&service, &CallbackRoute::Shared, &[call_event("CallConnected", call, json!({}))]).await;
    assert_eq!(
        gateway.commands(),
        vec![
            Command::StartRecording {
                server_call_id: "server-out".to_string()
            },
            recognize("conn-out", TARGET_NUMBER),
        ]
    );
}

#[tokio::test]
async fn test_connect_before_create_response_is_adopted() {
    let gateway = FakeGateway::new();
    let service = service(gateway.clone());
    gateway.on_create("corr-out", "conn-out");

    let call = ("corr-out", "conn-out", "server-out");
    deliver(&service, &CallbackRoute::Shared, &[call_event("CallConnected", call, json!({}))]).await;
    assert_eq!(phase(&service, "corr-out").await, Some(CallPhase::AwaitingInput));

    // The late create response keeps the progressed session
    let summary = service.start_outbound_call().await.unwrap();
    assert_eq!(summary.phase, CallPhase::AwaitingInput);
    assert_eq!(service.store().len().await, 1);
}

#[tokio::test]
async fn test_create_response_after_call_ended_is_not_stored() {
    let gateway = FakeGateway::new();
    let service = service(gateway.clone());
    gateway.on_create("corr-out", "conn-out");

    let call = ("corr-out", "conn-out", "server-out");
    deliver(
        &service,
        &CallbackRoute::Shared,
        &[
            call_event("CallConnected", call, json!({})),
            call_event("CallDisconnected", call, json!({})),
        ],
    )
    .await;
    assert!(service.store().has_ended(&CorrelationId::new("corr-out")).await);

    let summary = service.start_outbound_call().await.unwrap();
    assert_eq!(summary.phase, CallPhase::Ended);
    assert!(service.store().is_empty().await);

    gateway.clear();
    assert!(matches!(
        service.hang_up(None).await,
        Err(DomainError::InvalidState(_))
    ));
    assert!(gateway.commands().is_empty());
}

#[tokio::test]
async fn test_operator_actions_on_active_call() {
    let gateway = FakeGateway::new();
    let service = service(gateway.clone());
    connected_inbound_call(&gateway, &service).await;

    service.add_participant(None).await.unwrap();
    service.transfer_call(Some(CorrelationId::new(CALL.0))).await.unwrap();
    assert_eq!(
        gateway.commands(),
        vec![
            Command::AddParticipant {
                call: CALL.1.to_string(),
                participant: format!("4:{PARTICIPANT_NUMBER}"),
                source: format!("4:{SOURCE_NUMBER}"),
            },
            Command::TransferCall {
                call: CALL.1.to_string(),
                target: format!("4:{TARGET_NUMBER}"),
            },
        ]
    );
    assert_eq!(phase(&service, CALL.0).await, Some(CallPhase::AwaitingInput));
    gateway.clear();

    let summary = service.hang_up(None).await.unwrap();
    assert_eq!(summary.phase, CallPhase::Ended);
    assert_eq!(gateway.commands(), vec![hang_up(CALL.1)]);
    assert!(service.store().is_empty().await);

    assert!(matches!(
        service.hang_up(None).await,
        Err(DomainError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_redirect_and_reject_consume_the_offer() {
    let gateway = FakeGateway::new();
    let service = service(gateway.clone());
    admit(&service, "corr-a", "ctx-a", CALLER).await;
    admit(&service, "corr-b", "ctx-b", "+14255550101").await;

    service
        .redirect_call(Some(CorrelationId::new("corr-a")))
        .await
        .unwrap();
    service.reject_call(None).await.unwrap();

    assert_eq!(
        gateway.commands(),
        vec![
            Command::RedirectCall {
                context: "ctx-a".to_string(),
                target: format!("4:{TARGET_NUMBER}"),
            },
            Command::RejectCall {
                context: "ctx-b".to_string(),
                reason: RejectReason::Forbidden,
            },
        ]
    );
    assert!(service.store().is_empty().await);
    assert!(matches!(
        service.answer_call(None).await,
        Err(DomainError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_recording_location_after_call_ended() {
    let gateway = FakeGateway::new();
    let service = service(gateway.clone());
    connected_inbound_call(&gateway, &service).await;
    deliver(
        &service,
        &CallbackRoute::Shared,
        &[call_event("CallDisconnected", CALL, json!({}))],
    )
    .await;

    let decoded = decode_event_grid(&batch(&[recording_status_event(
        CALL.2,
        "https://storage.example.com/recording/chunk-1",
    )]));
    service.handle_events(decoded.events, &CallbackRoute::Shared).await;

    let summary = service.download_recording(None).await.unwrap();
    assert_eq!(summary.bytes, 4096);
    assert_eq!(
        gateway.commands().last(),
        Some(&Command::Download {
            location: "https://storage.example.com/recording/chunk-1".to_string(),
            destination: "testfile.wav".into(),
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_do_not_interfere() {
    let selections = [("one", "Confirmed.wav"), ("two", "Goodbye.wav"), ("nine", "Invalid.wav"), ("one", "Confirmed.wav")];

    for seed in 0..16u64 {
        let gateway = FakeGateway::new();
        gateway.interleave();
        let service = service(gateway.clone());
        let mut rng = StdRng::seed_from_u64(seed);

        let calls: Vec<(String, String, String, String)> = (0..selections.len())
            .map(|i| {
                (
                    format!("corr-{i}"),
                    format!("conn-{i}"),
                    format!("server-corr-{i}"),
                    format!("+1425555020{i}"),
                )
            })
            .collect();

        for (i, (correlation_id, call_connection_id, _, caller)) in calls.iter().enumerate() {
            let context = format!("ctx-{i}");
            gateway.on_answer(&context, correlation_id, call_connection_id);
            admit(&service, correlation_id, &context, caller).await;
            service
                .answer_call(Some(CorrelationId::new(correlation_id.as_str())))
                .await
                .unwrap();
        }
        gateway.clear();

        let mut tasks = Vec::new();
        for (i, (correlation_id, call_connection_id, server_call_id, _)) in calls.iter().enumerate() {
            let call = (
                correlation_id.as_str(),
                call_connection_id.as_str(),
                server_call_id.as_str(),
            );
            let script = vec![
                call_event("CallConnected", call, json!({})),
                recognize_completed(call, &[selections[i].0]),
                call_event("PlayCompleted", call, json!({})),
            ];
            let pauses: Vec<usize> = script.iter().map(|_| rng.gen_range(0..6)).collect();
            let service: Arc<CallFlowService> = service.clone();

            tasks.push(tokio::spawn(async move {
                for (entry, pause) in script.into_iter().zip(pauses) {
                    for _ in 0..pause {
                        tokio::task::yield_now().await;
                    }
                    let decoded = decode_cloud_events(&batch(&[entry]));
                    service.handle_events(decoded.events, &CallbackRoute::Shared).await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        for (i, (_, call_connection_id, server_call_id, caller)) in calls.iter().enumerate() {
            assert_eq!(
                gateway.commands_for(call_connection_id, server_call_id),
                vec![
                    Command::StartRecording {
                        server_call_id: server_call_id.clone()
                    },
                    recognize(call_connection_id, caller),
                    play(call_connection_id, selections[i].1),
                    stop_recording(server_call_id),
                    hang_up(call_connection_id),
                ],
                "seed {seed}, call {i}"
            );
        }
        assert!(service.store().is_empty().await, "seed {seed}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_deliveries_for_one_call_are_serialized() {
    async fn race(service: &Arc<CallFlowService>, entry: Value) {
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let service = service.clone();
                let entry = entry.clone();
                tokio::spawn(async move {
                    let decoded = decode_cloud_events(&batch(&[entry]));
                    service.handle_events(decoded.events, &CallbackRoute::Shared).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
    }

    for _ in 0..16 {
        let gateway = FakeGateway::new();
        gateway.interleave();
        let service = service(gateway.clone());
        gateway.on_answer("abc", CALL.0, CALL.1);
        admit(&service, CALL.0, "abc", CALLER).await;
        service.answer_call(None).await.unwrap();
        gateway.clear();

        race(&service, call_event("CallConnected", CALL, json!({}))).await;
        assert_eq!(
            gateway.commands(),
            vec![
                Command::StartRecording {
                    server_call_id: CALL.2.to_string()
                },
                recognize(CALL.1, CALLER),
            ]
        );
        gateway.clear();

        race(&service, recognize_completed(CALL, &["one"])).await;
        assert_eq!(gateway.commands(), vec![play(CALL.1, "Confirmed.wav")]);
        gateway.clear();

        race(&service, call_event("PlayCompleted", CALL, json!({}))).await;
        assert_eq!(
            gateway.commands(),
            vec![stop_recording(CALL.2), hang_up(CALL.1)]
        );
        assert!(service.store().is_empty().await);
    }
}
