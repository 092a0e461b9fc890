mod common;

use std::collections::HashSet;

use common::*;
use raffle_engine::{
    CreatorId, EngineConfig, EntryKind, Ineligibility, InstructionOutcome, ParticipantId,
    Processor, RaffleEngine, RaffleError, RaffleEvent, RaffleInstruction, RaffleStatus,
    RaffleType, RequirementKind, RequirementSpec, Stage,
};

// Test creating a raffle
#[tokio::test]
async fn test_create_raffle() {
    let h = Harness::new(1);
    let raffle = h.draft(params(
        RaffleType::Standard,
        10,
        1,
        vec![],
        vec![token_requirement(5)],
    ));

    assert_eq!(raffle.status, RaffleStatus::Draft);
    assert_eq!(raffle.creator, OWNER);
    assert_eq!(raffle.current_entries, 0);
    assert_eq!(raffle.current_stage, Stage::Final);

    let requirements = h.engine.requirements(raffle.id).unwrap();
    assert_eq!(requirements.len(), 1);
    assert_eq!(requirements[0].token_id, Some(TOKEN));
    assert_eq!(requirements[0].required_amount, 5);
}

#[tokio::test]
async fn test_create_raffle_rejects_bad_parameters() {
    let h = Harness::new(1);
    let lifecycle = h.engine.lifecycle();

    let mut backwards = free(10, 1);
    backwards.end_date = backwards.start_date;
    assert!(matches!(
        lifecycle.create_raffle(OWNER, backwards),
        Err(RaffleError::InvalidArgument(_))
    ));

    assert!(matches!(
        lifecycle.create_raffle(OWNER, free(0, 1)),
        Err(RaffleError::InvalidArgument(_))
    ));

    // two-stage raffles need an advancing count for the primary stage
    assert!(matches!(
        lifecycle.create_raffle(OWNER, params(RaffleType::TwoStage, 10, 1, vec![], vec![])),
        Err(RaffleError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_publish_before_start_date() {
    let h = Harness::new(1);
    let raffle = h.draft(free(10, 1));

    h.clock.set(START - 1);
    assert_eq!(
        h.engine.lifecycle().publish(OWNER, raffle.id),
        Err(RaffleError::RaffleNotStarted)
    );

    h.clock.set(START);
    let published = h.engine.lifecycle().publish(OWNER, raffle.id).unwrap();
    assert_eq!(published.status, RaffleStatus::Active);
}

#[tokio::test]
async fn test_publish_after_end_date() {
    let h = Harness::new(1);
    let raffle = h.draft(free(10, 1));

    h.pass_end();
    assert_eq!(
        h.engine.lifecycle().publish(OWNER, raffle.id),
        Err(RaffleError::InvalidState("raffle window has already closed"))
    );
    assert_eq!(h.engine.raffle(raffle.id).unwrap().status, RaffleStatus::Draft);
}

#[tokio::test]
async fn test_only_owner_manages_raffle() {
    let h = Harness::new(1);
    let raffle = h.draft(free(10, 1));
    let stranger = CreatorId(99);

    assert_eq!(
        h.engine.lifecycle().publish(stranger, raffle.id),
        Err(RaffleError::NotRaffleOwner)
    );
    assert_eq!(
        h.engine.lifecycle().cancel(stranger, raffle.id),
        Err(RaffleError::NotRaffleOwner)
    );
    assert_eq!(h.engine.raffle(raffle.id).unwrap().status, RaffleStatus::Draft);
}

#[tokio::test]
async fn test_invalid_transitions() {
    let h = Harness::new(1);
    let raffle = h.active(free(10, 1));
    let lifecycle = h.engine.lifecycle();

    assert_eq!(
        lifecycle.publish(OWNER, raffle.id),
        Err(RaffleError::InvalidTransition {
            from: RaffleStatus::Active,
            to: RaffleStatus::Active,
        })
    );

    lifecycle.cancel(OWNER, raffle.id).unwrap();
    assert_eq!(
        lifecycle.cancel(OWNER, raffle.id),
        Err(RaffleError::InvalidTransition {
            from: RaffleStatus::Cancelled,
            to: RaffleStatus::Cancelled,
        })
    );
    assert_eq!(
        lifecycle.close_early(OWNER, raffle.id),
        Err(RaffleError::InvalidTransition {
            from: RaffleStatus::Cancelled,
            to: RaffleStatus::Ended,
        })
    );
}

#[tokio::test]
async fn test_end_if_due() {
    let h = Harness::new(1);
    let raffle = h.active(free(10, 1));

    let still_active = h.engine.lifecycle().end_if_due(raffle.id).unwrap();
    assert_eq!(still_active.status, RaffleStatus::Active);

    // the window is inclusive of the end date
    h.clock.set(END);
    assert_eq!(
        h.engine.lifecycle().end_if_due(raffle.id).unwrap().status,
        RaffleStatus::Active
    );

    h.pass_end();
    let ended = h.engine.lifecycle().end_if_due(raffle.id).unwrap();
    assert_eq!(ended.status, RaffleStatus::Ended);
}

#[tokio::test]
async fn test_early_close_can_be_disabled() {
    let clock = std::sync::Arc::new(raffle_engine::ManualClock::new(START));
    let engine = RaffleEngine::builder()
        .clock(clock.clone())
        .config(EngineConfig {
            allow_early_close: false,
            ..EngineConfig::default()
        })
        .build()
        .unwrap();
    let raffle = engine.lifecycle().create_raffle(OWNER, free(10, 1)).unwrap();
    engine.lifecycle().publish(OWNER, raffle.id).unwrap();

    assert!(matches!(
        engine.lifecycle().close_early(OWNER, raffle.id),
        Err(RaffleError::InvalidState(_))
    ));
    assert_eq!(engine.raffle(raffle.id).unwrap().status, RaffleStatus::Active);
}

// Buying tickets with a token requirement
#[tokio::test]
async fn test_token_entry_debits_balance() {
    let h = Harness::new(1);
    let raffle = h.active(params(
        RaffleType::Standard,
        10,
        1,
        vec![],
        vec![token_requirement(5)],
    ));
    let participant = ParticipantId(10);
    h.engine.ledger().credit(participant, TOKEN, 20).unwrap();

    let entry = h
        .engine
        .entries()
        .submit_entry(participant, raffle.id, 2, Some(TOKEN))
        .unwrap();

    assert_eq!(entry.kind, EntryKind::Token);
    assert_eq!(entry.tokens_spent, 10);
    assert_eq!(entry.entry_numbers, vec![1, 2]);
    assert_eq!(entry.stage, Stage::Final);
    assert_eq!(h.engine.ledger().balance(participant, TOKEN).unwrap(), 10);
    assert_eq!(h.engine.raffle(raffle.id).unwrap().current_entries, 2);
    assert_eq!(h.engine.participant_entries(participant).unwrap(), vec![entry]);
}

#[tokio::test]
async fn test_insufficient_balance_changes_nothing() {
    let h = Harness::new(1);
    let raffle = h.active(params(
        RaffleType::Standard,
        10,
        1,
        vec![],
        vec![token_requirement(5)],
    ));
    let participant = ParticipantId(10);
    h.engine.ledger().credit(participant, TOKEN, 3).unwrap();

    assert_eq!(
        h.engine
            .entries()
            .submit_entry(participant, raffle.id, 1, Some(TOKEN)),
        Err(RaffleError::InsufficientBalance {
            needed: 5,
            available: 3,
        })
    );

    assert_eq!(h.engine.ledger().balance(participant, TOKEN).unwrap(), 3);
    assert!(h.engine.raffle_entries(raffle.id).unwrap().is_empty());
    assert_eq!(h.engine.raffle(raffle.id).unwrap().current_entries, 0);
}

#[tokio::test]
async fn test_multi_ticket_cost_exceeds_balance() {
    let h = Harness::new(1);
    let raffle = h.active(params(
        RaffleType::Standard,
        10,
        1,
        vec![],
        vec![token_requirement(5)],
    ));
    let participant = ParticipantId(10);
    h.engine.ledger().credit(participant, TOKEN, 10).unwrap();

    assert_eq!(
        h.engine
            .entries()
            .submit_entry(participant, raffle.id, 3, Some(TOKEN)),
        Err(RaffleError::InsufficientBalance {
            needed: 15,
            available: 10,
        })
    );
    assert_eq!(h.engine.ledger().balance(participant, TOKEN).unwrap(), 10);
}

#[tokio::test]
async fn test_capacity_exceeded() {
    let h = Harness::new(1);
    let raffle = h.active(free(3, 1));

    h.engine
        .entries()
        .submit_entry(ParticipantId(10), raffle.id, 2, None)
        .unwrap();
    assert_eq!(
        h.engine
            .entries()
            .submit_entry(ParticipantId(11), raffle.id, 2, None),
        Err(RaffleError::CapacityExceeded {
            requested: 2,
            remaining: 1,
        })
    );

    let last = h
        .engine
        .entries()
        .submit_entry(ParticipantId(11), raffle.id, 1, None)
        .unwrap();
    assert_eq!(last.kind, EntryKind::Free);
    assert_eq!(last.entry_numbers, vec![3]);
}

#[tokio::test]
async fn test_entries_outside_window_rejected() {
    let h = Harness::new(1);
    let draft = h.draft(free(10, 1));
    assert_eq!(
        h.engine
            .entries()
            .submit_entry(ParticipantId(10), draft.id, 1, None),
        Err(RaffleError::RaffleNotActive)
    );

    let raffle = h.active(free(10, 1));
    h.pass_end();
    assert_eq!(
        h.engine
            .entries()
            .submit_entry(ParticipantId(10), raffle.id, 1, None),
        Err(RaffleError::RaffleNotActive)
    );
}

#[tokio::test]
async fn test_ticket_count_validated() {
    let h = Harness::new(1);
    let raffle = h.active(free(5_000, 1));
    let limit = h.engine.config().max_tickets_per_submission;

    assert!(matches!(
        h.engine
            .entries()
            .submit_entry(ParticipantId(10), raffle.id, 0, None),
        Err(RaffleError::InvalidArgument(_))
    ));
    assert!(matches!(
        h.engine
            .entries()
            .submit_entry(ParticipantId(10), raffle.id, limit + 1, None),
        Err(RaffleError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_follow_requirement() {
    let h = Harness::new(1);
    let raffle = h.active(params(
        RaffleType::Standard,
        10,
        1,
        vec![],
        vec![follow_requirement(false)],
    ));
    let participant = ParticipantId(10);

    assert_eq!(
        h.engine
            .entries()
            .submit_entry(participant, raffle.id, 1, None),
        Err(RaffleError::RequirementNotMet(Ineligibility::NotFollowing))
    );

    h.follows.follow(participant, OWNER);
    let entry = h
        .engine
        .entries()
        .submit_entry(participant, raffle.id, 1, None)
        .unwrap();
    assert_eq!(entry.kind, EntryKind::Follow);
    assert_eq!(entry.tokens_spent, 0);
}

#[tokio::test]
async fn test_optional_paths() {
    let h = Harness::new(1);
    // either hold 5 tokens per ticket or follow the creator
    let raffle = h.active(params(
        RaffleType::Standard,
        10,
        1,
        vec![],
        vec![
            RequirementSpec {
                optional: true,
                ..token_requirement(5)
            },
            follow_requirement(true),
        ],
    ));
    let holder = ParticipantId(10);
    let follower = ParticipantId(11);
    h.engine.ledger().credit(holder, TOKEN, 5).unwrap();
    h.follows.follow(follower, OWNER);

    let eligibility = h.engine.evaluator().evaluate(ParticipantId(12), raffle.id).unwrap();
    assert!(!eligibility.eligible);
    assert!(eligibility.reason.is_some());

    let token_entry = h
        .engine
        .entries()
        .submit_entry(holder, raffle.id, 1, Some(TOKEN))
        .unwrap();
    assert_eq!(token_entry.kind, EntryKind::Token);
    assert_eq!(h.engine.ledger().balance(holder, TOKEN).unwrap(), 0);

    let follow_entry = h
        .engine
        .entries()
        .submit_entry(follower, raffle.id, 1, None)
        .unwrap();
    assert_eq!(follow_entry.kind, EntryKind::Follow);
}

#[tokio::test]
async fn test_either_requirement_prefers_token_spend() {
    let h = Harness::new(1);
    let raffle = h.active(params(
        RaffleType::Standard,
        10,
        1,
        vec![],
        vec![RequirementSpec {
            token_id: Some(TOKEN),
            required_amount: 2,
            kind: RequirementKind::Either,
            optional: false,
        }],
    ));
    let participant = ParticipantId(10);
    h.engine.ledger().credit(participant, TOKEN, 4).unwrap();
    h.follows.follow(participant, OWNER);

    let by_follow = h
        .engine
        .entries()
        .submit_entry(participant, raffle.id, 1, None)
        .unwrap();
    assert_eq!(by_follow.kind, EntryKind::Follow);
    assert_eq!(h.engine.ledger().balance(participant, TOKEN).unwrap(), 4);

    let by_token = h
        .engine
        .entries()
        .submit_entry(participant, raffle.id, 1, Some(TOKEN))
        .unwrap();
    assert_eq!(by_token.kind, EntryKind::Token);
    assert_eq!(h.engine.ledger().balance(participant, TOKEN).unwrap(), 2);
}

// Mandatory tokens with a follow alternative
fn token_or_follow() -> raffle_engine::NewRaffle {
    params(
        RaffleType::Standard,
        10,
        1,
        vec![],
        vec![token_requirement(5), follow_requirement(true)],
    )
}

#[tokio::test]
async fn test_follow_path_spends_no_tokens() {
    let h = Harness::new(1);
    let raffle = h.active(token_or_follow());
    let participant = ParticipantId(10);
    h.engine.ledger().credit(participant, TOKEN, 5).unwrap();
    h.follows.follow(participant, OWNER);

    let entry = h
        .engine
        .entries()
        .submit_entry(participant, raffle.id, 1, None)
        .unwrap();
    assert_eq!(entry.kind, EntryKind::Follow);
    assert_eq!(entry.tokens_spent, 0);
    assert_eq!(h.engine.ledger().balance(participant, TOKEN).unwrap(), 5);

    let spent = h
        .engine
        .entries()
        .submit_entry(participant, raffle.id, 1, Some(TOKEN))
        .unwrap();
    assert_eq!(spent.kind, EntryKind::Token);
    assert_eq!(h.engine.ledger().balance(participant, TOKEN).unwrap(), 0);
}

#[tokio::test]
async fn test_unaffordable_ticket_count_falls_back_to_follow() {
    let h = Harness::new(1);
    let raffle = h.active(token_or_follow());
    let participant = ParticipantId(10);
    h.engine.ledger().credit(participant, TOKEN, 5).unwrap();
    h.follows.follow(participant, OWNER);

    for token in [None, Some(TOKEN)] {
        let entry = h
            .engine
            .entries()
            .submit_entry(participant, raffle.id, 3, token)
            .unwrap();
        assert_eq!(entry.kind, EntryKind::Follow);
    }
    assert_eq!(h.engine.ledger().balance(participant, TOKEN).unwrap(), 5);
    assert_eq!(h.engine.raffle(raffle.id).unwrap().current_entries, 6);

    let eligibility = h
        .engine
        .evaluator()
        .evaluate_with(participant, raffle.id, 3, Some(TOKEN))
        .unwrap();
    assert_eq!(eligibility.path.unwrap().kind, EntryKind::Follow);
}

#[tokio::test]
async fn test_either_requirement_follows_when_tokens_run_short() {
    let h = Harness::new(1);
    let raffle = h.active(params(
        RaffleType::Standard,
        10,
        1,
        vec![],
        vec![RequirementSpec {
            token_id: Some(TOKEN),
            required_amount: 5,
            kind: RequirementKind::Either,
            optional: false,
        }],
    ));
    let participant = ParticipantId(10);
    h.engine.ledger().credit(participant, TOKEN, 5).unwrap();
    h.follows.follow(participant, OWNER);

    let entry = h
        .engine
        .entries()
        .submit_entry(participant, raffle.id, 2, Some(TOKEN))
        .unwrap();
    assert_eq!(entry.kind, EntryKind::Follow);
    assert_eq!(h.engine.ledger().balance(participant, TOKEN).unwrap(), 5);
}

#[tokio::test]
async fn test_first_failing_path_decides_the_error() {
    let h = Harness::new(1);
    let participant = ParticipantId(10);
    h.engine.ledger().credit(participant, TOKEN, 3).unwrap();

    // token path first: its shortfall is reported even though follow failed too
    let tokens_first = h.active(token_or_follow());
    assert_eq!(
        h.engine
            .entries()
            .submit_entry(participant, tokens_first.id, 1, None),
        Err(RaffleError::InsufficientBalance {
            needed: 5,
            available: 3,
        })
    );

    let follow_first = h.active(params(
        RaffleType::Standard,
        10,
        1,
        vec![],
        vec![
            follow_requirement(false),
            RequirementSpec {
                optional: true,
                ..token_requirement(5)
            },
        ],
    ));
    assert_eq!(
        h.engine
            .entries()
            .submit_entry(participant, follow_first.id, 1, None),
        Err(RaffleError::RequirementNotMet(Ineligibility::NotFollowing))
    );
    assert_eq!(h.engine.ledger().balance(participant, TOKEN).unwrap(), 3);
}

#[tokio::test]
async fn test_sponsored_entry() {
    let h = Harness::new(1);
    let raffle = h.active(params(
        RaffleType::Standard,
        10,
        1,
        vec![],
        vec![token_requirement(5)],
    ));
    let participant = ParticipantId(10);

    assert_eq!(
        h.engine
            .entries()
            .grant_sponsored_entry(CreatorId(99), participant, raffle.id, 1),
        Err(RaffleError::NotRaffleOwner)
    );

    let entry = h
        .engine
        .entries()
        .grant_sponsored_entry(OWNER, participant, raffle.id, 3)
        .unwrap();
    assert_eq!(entry.kind, EntryKind::Sponsored);
    assert_eq!(entry.tokens_spent, 0);
    assert_eq!(entry.entry_numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_cancel_reports_refunds() {
    let h = Harness::new(1);
    let raffle = h.active(params(
        RaffleType::Standard,
        10,
        1,
        vec![],
        vec![token_requirement(5)],
    ));
    let participant = ParticipantId(10);
    h.engine.ledger().credit(participant, TOKEN, 20).unwrap();
    let entry = h
        .engine
        .entries()
        .submit_entry(participant, raffle.id, 2, Some(TOKEN))
        .unwrap();
    h.engine
        .entries()
        .grant_sponsored_entry(OWNER, ParticipantId(11), raffle.id, 1)
        .unwrap();

    let refunds = h.engine.lifecycle().cancel(OWNER, raffle.id).unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].participant, participant);
    assert_eq!(refunds[0].entry_id, entry.id);
    assert_eq!(refunds[0].amount, 10);

    // refunds are reported, not paid out
    assert_eq!(h.engine.ledger().balance(participant, TOKEN).unwrap(), 10);
    assert_eq!(
        h.engine
            .entries()
            .submit_entry(participant, raffle.id, 1, Some(TOKEN)),
        Err(RaffleError::RaffleNotActive)
    );
    assert_eq!(
        h.engine.draws().draw_stage(raffle.id, Stage::Final),
        Err(RaffleError::InvalidState("raffle was cancelled"))
    );
}

#[tokio::test]
async fn test_events_follow_state_changes() {
    let h = Harness::new(1);
    let mut events = h.engine.subscribe();
    let raffle = h.active(free(10, 1));
    let entry = h
        .engine
        .entries()
        .submit_entry(ParticipantId(10), raffle.id, 1, None)
        .unwrap();
    h.engine.lifecycle().close_early(OWNER, raffle.id).unwrap();

    assert_eq!(
        events.try_recv().unwrap(),
        RaffleEvent::RaffleCreated {
            raffle_id: raffle.id,
            creator: OWNER,
        }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        RaffleEvent::RafflePublished { raffle_id: raffle.id }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        RaffleEvent::EntryRecorded {
            raffle_id: raffle.id,
            entry_id: entry.id,
            participant: ParticipantId(10),
            entry_numbers: vec![1],
            tokens_spent: 0,
        }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        RaffleEvent::RaffleEnded { raffle_id: raffle.id }
    );
    assert!(events.try_recv().is_err());
}

// Driving the engine through packed instructions
#[tokio::test]
async fn test_processor_instructions() {
    let h = Harness::new(1);
    let engine = &h.engine;
    let participant = ParticipantId(10);

    let create = RaffleInstruction::CreateRaffle {
        owner: OWNER,
        raffle: params(RaffleType::Standard, 10, 1, vec![], vec![token_requirement(5)]),
    };
    let raffle = match Processor::process(engine, &create.pack().unwrap()).unwrap() {
        InstructionOutcome::Raffle(raffle) => raffle,
        other => panic!("unexpected outcome {:?}", other),
    };

    let credit = RaffleInstruction::CreditTokens {
        participant,
        token_id: TOKEN,
        amount: 20,
    };
    assert_eq!(
        Processor::process(engine, &credit.pack().unwrap()).unwrap(),
        InstructionOutcome::Balance(20)
    );

    let publish = RaffleInstruction::PublishRaffle {
        owner: OWNER,
        raffle_id: raffle.id,
    };
    Processor::process(engine, &publish.pack().unwrap()).unwrap();

    let submit = RaffleInstruction::SubmitEntry {
        participant,
        raffle_id: raffle.id,
        ticket_count: 2,
        token_id: Some(TOKEN),
    };
    match Processor::process(engine, &submit.pack().unwrap()).unwrap() {
        InstructionOutcome::Entry(entry) => assert_eq!(entry.entry_numbers, vec![1, 2]),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(engine.ledger().balance(participant, TOKEN).unwrap(), 10);

    assert_eq!(
        Processor::process(engine, &[42, 0, 1]),
        Err(RaffleError::InvalidInstructionData)
    );
}

#[tokio::test]
async fn test_processor_json_instruction() {
    let h = Harness::new(1);
    let raffle = h.active(free(10, 1));

    let instruction = RaffleInstruction::from_json(&format!(
        r#"{{ "instruction": "submit_entry", "participant": 10, "raffle_id": {},
             "ticket_count": 3, "token_id": null }}"#,
        raffle.id
    ))
    .unwrap();
    match Processor::process_instruction(&h.engine, instruction).unwrap() {
        InstructionOutcome::Entry(entry) => assert_eq!(entry.entry_count, 3),
        other => panic!("unexpected outcome {:?}", other),
    }
}

// Many participants racing for the last tickets
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_entries_respect_capacity() {
    let h = Harness::new(1);
    let raffle = h.active(free(10, 1));
    let raffle_id = raffle.id;

    let mut handles = Vec::new();
    for i in 0..40u64 {
        let engine = h.engine.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            engine
                .entries()
                .submit_entry(ParticipantId(100 + i), raffle_id, 1, None)
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => assert!(matches!(err, RaffleError::CapacityExceeded { .. })),
        }
    }
    assert_eq!(accepted, 10);

    let entries = h.engine.raffle_entries(raffle.id).unwrap();
    let numbers: HashSet<u64> = entries
        .iter()
        .flat_map(|entry| entry.entry_numbers.iter().copied())
        .collect();
    assert_eq!(numbers, (1..=10).collect::<HashSet<u64>>());
    assert_eq!(h.engine.raffle(raffle.id).unwrap().current_entries, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let h = Harness::new(1);
    let raffle = h.active(params(
        RaffleType::Standard,
        100,
        1,
        vec![],
        vec![token_requirement(5)],
    ));
    let participant = ParticipantId(10);
    h.engine.ledger().credit(participant, TOKEN, 20).unwrap();
    let raffle_id = raffle.id;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = h.engine.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            engine
                .entries()
                .submit_entry(participant, raffle_id, 1, Some(TOKEN))
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => assert!(matches!(err, RaffleError::InsufficientBalance { .. })),
        }
    }
    assert_eq!(accepted, 4);
    assert_eq!(h.engine.ledger().balance(participant, TOKEN).unwrap(), 0);
}
