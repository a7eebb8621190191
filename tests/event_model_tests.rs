mod common;

use common::{bundle, definition, herbs, step, tier, wine, NOW};
use rendezvous::event::{select_event, EventTable};
use rendezvous::Error;

#[test]
fn test_discovers_ongoing_event() {
    let table = EventTable::discover(&bundle(), NOW).unwrap().expect("event 7");
    let event = &table.definition;

    assert_eq!(event.id, 7);
    assert_eq!(event.version, 3);
    assert_eq!(event.name, "Spring Date");
    assert!(event.contains(NOW));
    assert!(!event.contains(event.end));
    assert_eq!(event.primary, wine());
    assert_eq!(event.secondary, Some(herbs()));

    println!("Event: ongoing event discovered");
}

#[test]
fn test_steps_are_ordered_with_costs() {
    let table = EventTable::discover(&bundle(), NOW).unwrap().unwrap();

    assert_eq!(table.step_count(), 2);
    let indices: Vec<u32> = table.steps().map(|s| s.index).collect();
    assert_eq!(indices, vec![1, 2]);

    let chapter = table.step(2).unwrap();
    assert_eq!(chapter.max_exp, 1000);
    assert_eq!(chapter.options[1].unlock_exp, 400);
    assert_eq!(chapter.options[1].cost.amount, 30);
    assert_eq!(chapter.options[1].cost.asset, wine());
    assert!(table.is_final_step(2));
    assert!(!table.is_final_step(1));
}

#[test]
fn test_tier_upgrade_cost_comes_from_next_tier() {
    let table = EventTable::discover(&bundle(), NOW).unwrap().unwrap();

    let t1 = table.tier(1).unwrap();
    assert_eq!(t1.interval, 3600);
    assert_eq!(t1.cap, 86_400);
    assert_eq!(t1.yield_per_interval, 10);
    assert_eq!(t1.upgrade_cost.as_ref().map(|c| c.amount), Some(500));
    assert_eq!(table.tier(2).unwrap().upgrade_cost.as_ref().map(|c| c.amount), Some(800));
    assert!(table.tier(3).unwrap().upgrade_cost.is_none());
    assert!(matches!(table.tier(4), Err(Error::MissingTier(4))));
}

#[test]
fn test_dialogue_answers() {
    let table = EventTable::discover(&bundle(), NOW).unwrap().unwrap();
    let chapters = table.dialogue();

    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].name, "First Meeting");
    assert_eq!(chapters[0].answers.len(), 1);
    let answer = &chapters[0].answers[0];
    assert_eq!(answer.message_id, 101);
    assert_eq!(answer.choice, 2);
    assert_eq!(answer.content, "Stay");
    assert_eq!(answer.cost, Some(5));
}

#[test]
fn test_upcoming_event_when_none_ongoing() {
    let config = bundle();

    let before = select_event(&config.sexual_dating_settings, 1_709_000_000).unwrap();
    assert_eq!(before.event_id, 7);

    let between = EventTable::discover(&config, 1_711_500_000).unwrap().unwrap();
    assert_eq!(between.definition.id, 8);
    assert_eq!(between.definition.primary.asset_id, "700101");
    assert!(between.definition.secondary.is_none());
    // Options without a cost are free.
    assert_eq!(between.step(1).unwrap().options[0].cost.amount, 0);

    assert!(EventTable::discover(&config, 1_714_000_000).unwrap().is_none());
}

#[test]
fn test_rejects_gaps_in_steps() {
    let result = EventTable::new(
        definition(0, 100),
        vec![step(1, 10, &[(1, 0, 1)]), step(3, 10, &[(1, 0, 1)])],
        vec![tier(1, 60, 600, 1, None)],
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_rejects_unproductive_tier() {
    let result = EventTable::new(
        definition(0, 100),
        vec![step(1, 10, &[(1, 0, 1)])],
        vec![tier(1, 0, 600, 1, None)],
    );
    assert!(matches!(result, Err(Error::Config(_))));

    let result = EventTable::new(definition(0, 100), vec![step(1, 10, &[])], vec![tier(1, 60, 600, 1, None)]);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_option_lookup() {
    let chapter = step(1, 100, &[(10, 0, 5)]);
    assert_eq!(chapter.option(0).unwrap().exp, 10);
    assert!(matches!(
        chapter.option(3),
        Err(Error::MissingOption { step: 1, option: 3 })
    ));
    assert_eq!(chapter.target_exp(0, 50), 100);
    assert!(chapter.is_complete(100));
}
