//! Prints the event a bundle currently schedules: chapters, machine tiers and
//! the correct dialogue selections.

use anyhow::Context;
use rendezvous::event::{ConfigLoader, EventTable, HttpConfigLoader};
use rendezvous::kernel::time::{format_ts, Clock, SystemClock};
use rendezvous::services::HttpTransport;
use rendezvous::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = Settings::resolve_path(std::env::args().nth(1));
    let settings = Settings::load(&path).with_context(|| format!("loading {}", path.display()))?;

    let client = HttpTransport::build_client(settings.request_timeout());
    let loader = HttpConfigLoader::new(client, &settings.data_url).with_cache(&settings.bundle_dir);
    let config = loader
        .load(&settings.bundle_name)
        .await
        .with_context(|| format!("loading bundle {}", settings.bundle_name))?;

    let Some(table) = EventTable::discover(&config, SystemClock.now())? else {
        println!("No ongoing or upcoming event in {}", settings.bundle_name);
        return Ok(());
    };

    let event = &table.definition;
    println!("[EVENT] {} (id {}, version {})", event.name, event.id, event.version);
    println!("        {} -> {}", format_ts(event.start), format_ts(event.end));
    println!("        primary asset {}", event.primary.asset_id);
    if let Some(secondary) = &event.secondary {
        println!("        upgrade asset {}", secondary.asset_id);
    }

    println!("\n[CHAPTERS]");
    for step in table.steps() {
        println!("  chapter {} (max exp {})", step.index, step.max_exp);
        for option in &step.options {
            println!(
                "    option {}: +{} exp for {} (unlocks at {})",
                option.index, option.exp, option.cost.amount, option.unlock_exp
            );
        }
    }

    println!("\n[MACHINE]");
    for tier in table.tiers() {
        let upgrade = tier
            .upgrade_cost
            .as_ref()
            .map(|c| c.amount.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  tier {}: {} every {}s, cap {}s, next tier costs {}",
            tier.tier, tier.yield_per_interval, tier.interval, tier.cap, upgrade
        );
    }

    println!("\n[ANSWERS]");
    for chapter in table.dialogue() {
        println!("  chapter {} {}", chapter.chapter, chapter.name);
        for answer in &chapter.answers {
            let cost = answer
                .cost
                .map(|c| format!(" (costs {})", c))
                .unwrap_or_default();
            println!("    message {}: choice {} \"{}\"{}", answer.message_id, answer.choice, answer.content, cost);
        }
    }
    Ok(())
}
